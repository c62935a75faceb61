use chrono::{Duration, NaiveDate};

use crate::error::{AppError, AppResult};
use crate::models::activity::{Activity, ActivityId};

/// Length of the rolling window, today included.
pub const WINDOW_DAYS: i64 = 7;

/// Per-activity, day-deduplicated completion dates, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionHistory {
    activities: Vec<Activity>,
}

impl CompletionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_activities(activities: Vec<Activity>) -> Self {
        Self { activities }
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn get(&self, id: &ActivityId) -> AppResult<&Activity> {
        self.activities
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub fn contains(&self, id: &ActivityId) -> bool {
        self.activities.iter().any(|a| &a.id == id)
    }

    /// Inserts or replaces by id, keeping the position of an existing entry.
    pub fn upsert(&mut self, activity: Activity) {
        match self.activities.iter_mut().find(|a| a.id == activity.id) {
            Some(slot) => *slot = activity,
            None => self.activities.push(activity),
        }
    }

    pub fn remove(&mut self, id: &ActivityId) -> Option<Activity> {
        let idx = self.activities.iter().position(|a| &a.id == id)?;
        Some(self.activities.remove(idx))
    }

    /// Marks `date` done (`on`) or not done. Idempotent in both directions.
    /// Returns whether the activity is completed on `date` afterwards.
    pub fn toggle(&mut self, id: &ActivityId, date: NaiveDate, on: bool) -> AppResult<bool> {
        let activity = self
            .activities
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| not_found(id))?;

        if on {
            activity.performed_dates.insert(date);
        } else {
            activity.performed_dates.remove(&date);
        }
        Ok(activity.performed_dates.contains(&date))
    }

    pub fn weekly_count(&self, id: &ActivityId, today: NaiveDate) -> AppResult<u32> {
        Ok(count_in_window(self.get(id)?, today))
    }

    pub fn completed_today(&self, id: &ActivityId, today: NaiveDate) -> AppResult<bool> {
        Ok(self.get(id)?.performed_dates.contains(&today))
    }
}

/// Completions within `[today - 6 days, today]`.
pub fn count_in_window(activity: &Activity, today: NaiveDate) -> u32 {
    let start = today - Duration::days(WINDOW_DAYS - 1);
    activity.performed_dates.range(start..=today).count() as u32
}

fn not_found(id: &ActivityId) -> AppError {
    AppError::NotFound(format!("activity {id}"))
}
