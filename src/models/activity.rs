use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Opaque, owner-scoped activity identifier assigned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(String);

impl ActivityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One trackable self-care action and the calendar days it was performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    pub title: String,
    pub description: String,
    pub performed_dates: BTreeSet<NaiveDate>,
}

impl Activity {
    pub fn new(id: impl Into<ActivityId>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            performed_dates: BTreeSet::new(),
        }
    }

    /// Attaches completion days, rejecting a day that appears twice.
    pub fn with_dates<I>(mut self, dates: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        for date in dates {
            if !self.performed_dates.insert(date) {
                return Err(AppError::Conflict(format!(
                    "activity {} has more than one completion on {date}",
                    self.id
                )));
            }
        }
        Ok(self)
    }

    /// Same as [`Activity::with_dates`] for raw timestamps, bucketed by UTC day.
    pub fn with_instants<'a, I>(self, instants: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = &'a DateTime<Utc>>,
    {
        self.with_dates(instants.into_iter().map(|instant| instant.date_naive()))
    }

    pub fn last_performed(&self) -> Option<NaiveDate> {
        self.performed_dates.iter().next_back().copied()
    }
}

impl From<String> for ActivityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// User input for a new activity. Both fields are trimmed and required.
#[derive(Debug, Clone, Validate)]
pub struct NewActivity {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,
}

impl NewActivity {
    pub fn new(title: &str, description: &str) -> AppResult<Self> {
        let draft = Self {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
        };
        if draft.title.is_empty() || draft.description.is_empty() {
            return Err(AppError::Validation(
                "Title and description are required".into(),
            ));
        }
        draft
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(draft)
    }
}

/// Values derived from an activity's history for a given day. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedActivityView {
    pub weekly_count: u32,
    pub weekly_percent: u8,
    pub completed_today: bool,
    pub last_performed: Option<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    Idle,
    Pending,
    Confirmed,
    RolledBack,
}

impl Default for MutationStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// What the view layer renders for one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub id: ActivityId,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub derived: DerivedActivityView,
    pub status: MutationStatus,
}

/// Share of activities completed today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}
