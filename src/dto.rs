//! # Remote API wire shapes
//!
//! Every request and response body exchanged with the persistence API.
//! Field names follow the API's camelCase JSON; conversions into the
//! domain models live next to the shape they convert.
//!
//! Conventions:
//! - `*Request`  → serialized into a request body
//! - `*Response` / `*Wire` → deserialized from a response body
//! - Validation is expressed via `validator` derive macros
//! - Serde defaults cover fields older API versions omit

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::activity::{Activity, ActivityId, NewActivity};
use crate::models::journal::{weekday_name, JournalDraft, JournalEntry};
use crate::models::mood::{MoodValue, TimeOfDay};
use crate::models::user::UserId;

// ============================================================================
// Common
// ============================================================================

/// Body of mutations that only identify the owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: UserId,
}

/// `?userId=` query string
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery<'a> {
    pub user_id: &'a UserId,
}

// ============================================================================
// Self-care activities
// ============================================================================

/// Activity as stored remotely: completions are raw timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityWire {
    #[serde(alias = "_id")]
    pub id: ActivityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub performed_dates: Vec<DateTime<Utc>>,
}

impl TryFrom<ActivityWire> for Activity {
    type Error = AppError;

    /// Fails with `Conflict` when two completions fall on the same UTC day.
    fn try_from(wire: ActivityWire) -> AppResult<Self> {
        let id = wire.id.clone();
        Activity::new(wire.id, wire.title, wire.description)
            .with_instants(&wire.performed_dates)
            .map_err(|e| {
                tracing::warn!(activity_id = %id, error = %e, "rejecting activity from remote");
                e
            })
    }
}

pub fn into_activities(wires: Vec<ActivityWire>) -> AppResult<Vec<Activity>> {
    wires.into_iter().map(Activity::try_from).collect()
}

/// GET /selfcare, DELETE /selfcare/:id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivitiesEnvelope {
    #[serde(default)]
    pub activities: Vec<ActivityWire>,
}

/// POST /selfcare
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,

    pub user_id: UserId,
}

impl CreateActivityRequest {
    pub fn new(draft: NewActivity, user_id: UserId) -> Self {
        Self {
            title: draft.title,
            description: draft.description,
            user_id,
        }
    }
}

/// Response to POST /selfcare: either the full list or only the new activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateActivityResponse {
    #[serde(default)]
    pub activities: Option<Vec<ActivityWire>>,
    #[serde(default)]
    pub activity: Option<ActivityWire>,
}

/// PATCH /selfcare/:id/increment and /decrement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleResponse {
    #[serde(default)]
    pub success: bool,
    pub activity: Option<ActivityWire>,
}

// ============================================================================
// Mood
// ============================================================================

/// POST /mood/update
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MoodUpdateRequest {
    #[validate(range(min = 1, max = 5, message = "Mood must be 1-5"))]
    pub mood_value: u8,
    pub time_of_day: TimeOfDay,
    pub user_id: UserId,
}

impl MoodUpdateRequest {
    pub fn new(mood: MoodValue, slot: TimeOfDay, user_id: UserId) -> Self {
        Self {
            mood_value: mood.get(),
            time_of_day: slot,
            user_id,
        }
    }
}

/// GET /mood/check query params
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodCheckQuery<'a> {
    pub user_id: &'a UserId,
    pub time_of_day: TimeOfDay,
}

/// Response of GET /mood/check. A value of 1 or more means the slot is logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodCheckResponse {
    #[serde(default)]
    pub mood_value: Option<i64>,
}

impl MoodCheckResponse {
    pub fn logged_value(&self) -> Option<MoodValue> {
        self.mood_value
            .filter(|v| *v >= 1)
            .and_then(|v| u8::try_from(v).ok())
            .and_then(|v| MoodValue::new(v).ok())
    }
}

// ============================================================================
// Journal
// ============================================================================

/// GET /journal/week/:week query params
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalWeekQuery<'a> {
    pub year: i32,
    pub user_id: &'a UserId,
}

/// Journal entry as returned by the API. `content` may be null for days that
/// were never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntryWire {
    #[serde(default)]
    pub week: Option<u32>,
    #[serde(with = "weekday_name")]
    pub day: Weekday,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub character_count: u32,
    #[serde(default)]
    pub exists: Option<bool>,
}

impl JournalEntryWire {
    /// A single-entry read only returns stored entries, so a missing
    /// `exists` flag means the entry exists.
    pub fn into_entry(self, week: u32) -> JournalEntry {
        JournalEntry {
            week: self.week.unwrap_or(week),
            day: self.day,
            content: self.content.unwrap_or_default(),
            word_count: self.word_count,
            character_count: self.character_count,
            exists: self.exists.unwrap_or(true),
        }
    }
}

/// `{success, data, error}` envelope of every journal endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> JournalEnvelope<T> {
    /// `success: false` is a failure even on a 2xx status.
    pub fn into_result(self) -> AppResult<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::Remote {
                status: 200,
                message: self.error.unwrap_or_else(|| "API error".into()),
            })
        }
    }
}

pub type JournalWeekResponse = JournalEnvelope<Vec<JournalEntryWire>>;
pub type JournalEntryResponse = JournalEnvelope<JournalEntryWire>;

/// POST|PUT /journal/:week/:day
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveJournalRequest {
    pub week: u32,
    #[serde(with = "weekday_name")]
    pub day: Weekday,
    pub content: String,
    pub user_id: UserId,
    pub word_count: u32,
    pub character_count: u32,
}

impl SaveJournalRequest {
    pub fn new(week: u32, day: Weekday, draft: &JournalDraft, user_id: UserId) -> Self {
        Self {
            week,
            day,
            content: draft.content.clone(),
            user_id,
            word_count: draft.word_count,
            character_count: draft.character_count,
        }
    }
}
