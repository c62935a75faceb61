use chrono::{DateTime, TimeZone, Timelike};

use crate::models::mood::TimeOfDay;

/// Morning is [05:00, 12:00), afternoon [12:00, 18:00), evening the rest.
pub fn bucket_for<Tz: TimeZone>(instant: &DateTime<Tz>) -> TimeOfDay {
    bucket_for_hour(instant.hour())
}

pub fn bucket_for_hour(hour: u32) -> TimeOfDay {
    match hour {
        5..=11 => TimeOfDay::Morning,
        12..=17 => TimeOfDay::Afternoon,
        _ => TimeOfDay::Evening,
    }
}
