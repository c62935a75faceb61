use chrono::Weekday;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static tag pattern"));

/// One journal page, keyed by (week, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub week: u32,
    #[serde(with = "weekday_name")]
    pub day: Weekday,
    pub content: String,
    pub word_count: u32,
    pub character_count: u32,
    /// Distinguishes "no entry yet" from an entry whose text is empty.
    pub exists: bool,
}

impl JournalEntry {
    pub fn empty(week: u32, day: Weekday) -> Self {
        Self {
            week,
            day,
            content: String::new(),
            word_count: 0,
            character_count: 0,
            exists: false,
        }
    }

    pub fn from_draft(week: u32, day: Weekday, draft: &JournalDraft) -> Self {
        Self {
            week,
            day,
            content: draft.content.clone(),
            word_count: draft.word_count,
            character_count: draft.character_count,
            exists: true,
        }
    }

    pub fn has_content(&self) -> bool {
        self.exists && !plain_text(&self.content).is_empty()
    }
}

/// Rich-text content validated for saving, with its text metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalDraft {
    pub content: String,
    pub word_count: u32,
    pub character_count: u32,
}

impl JournalDraft {
    pub fn new(content: impl Into<String>) -> AppResult<Self> {
        let content = content.into();
        let text = plain_text(&content);
        if text.is_empty() {
            return Err(AppError::Validation(
                "Please write something before saving".into(),
            ));
        }
        Ok(Self {
            word_count: text.split_whitespace().count() as u32,
            character_count: text.chars().count() as u32,
            content,
        })
    }
}

/// Editor HTML with tags removed and surrounding whitespace trimmed.
pub fn plain_text(html: &str) -> String {
    TAG.replace_all(html, "")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

/// Serde adapter for full English weekday names ("Monday").
pub mod weekday_name {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::tracking::week_clock::weekday_full_name;

    pub fn serialize<S>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(weekday_full_name(*day))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Weekday, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse::<Weekday>()
            .map_err(|_| serde::de::Error::custom(format!("unknown weekday: {raw}")))
    }
}
