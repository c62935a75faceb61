use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::models::journal::weekday_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Completed,
    Missing,
    Pending,
    Upcoming,
}

impl DayStatus {
    /// `completed` and `missing` are settled once the day has passed.
    pub fn is_terminal(self) -> bool {
        matches!(self, DayStatus::Completed | DayStatus::Missing)
    }
}

/// Derived `{day, status}` pair shown in the weekly log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayLogStatus {
    #[serde(with = "weekday_name")]
    pub day: Weekday,
    pub status: DayStatus,
    pub accessible: bool,
}
