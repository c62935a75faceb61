//! Seam between the engine and the remote persistence API.

pub mod http;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use chrono::Weekday;

use crate::error::AppResult;
use crate::models::activity::{Activity, ActivityId, NewActivity};
use crate::models::journal::{JournalDraft, JournalEntry};
use crate::models::mood::{MoodTrends, MoodValue, TimeOfDay};
use crate::models::user::UserId;

pub use http::HttpRemote;

/// What `POST /selfcare` answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedActivities {
    /// The whole list; replaces what is loaded.
    List(Vec<Activity>),
    /// Only the new activity.
    Single(Activity),
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn list_activities(&self, user: &UserId) -> AppResult<Vec<Activity>>;

    async fn create_activity(&self, user: &UserId, draft: &NewActivity) -> AppResult<CreatedActivities>;

    /// Marks today done on the server and returns the updated activity.
    async fn increment(&self, user: &UserId, id: &ActivityId) -> AppResult<Activity>;

    async fn decrement(&self, user: &UserId, id: &ActivityId) -> AppResult<Activity>;

    /// Returns the activities left after the delete.
    async fn delete_activity(&self, user: &UserId, id: &ActivityId) -> AppResult<Vec<Activity>>;

    async fn update_mood(&self, user: &UserId, mood: MoodValue, slot: TimeOfDay) -> AppResult<()>;

    /// The mood already logged for `slot` today, if any.
    async fn check_mood(&self, user: &UserId, slot: TimeOfDay) -> AppResult<Option<MoodValue>>;

    async fn mood_trends(&self, user: &UserId) -> AppResult<MoodTrends>;

    /// `None` when the week has no entries yet.
    async fn journal_week(&self, user: &UserId, week: u32, year: i32) -> AppResult<Option<Vec<JournalEntry>>>;

    /// `None` when the entry does not exist yet.
    async fn journal_entry(&self, user: &UserId, week: u32, day: Weekday) -> AppResult<Option<JournalEntry>>;

    async fn create_journal_entry(
        &self,
        user: &UserId,
        week: u32,
        day: Weekday,
        draft: &JournalDraft,
    ) -> AppResult<()>;

    async fn update_journal_entry(
        &self,
        user: &UserId,
        week: u32,
        day: Weekday,
        draft: &JournalDraft,
    ) -> AppResult<()>;

    async fn toggle(&self, user: &UserId, id: &ActivityId, on: bool) -> AppResult<Activity> {
        if on {
            self.increment(user, id).await
        } else {
            self.decrement(user, id).await
        }
    }
}
