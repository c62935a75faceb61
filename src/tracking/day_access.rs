use chrono::Weekday;

use crate::models::day_log::{DayLogStatus, DayStatus};
use crate::tracking::week_clock::{WeekConvention, WeekId};

/// Days up to and including today may be read and written; later days may not.
pub fn can_access(day: Weekday, today: Weekday, weeks: WeekConvention) -> bool {
    weeks.index(day) <= weeks.index(today)
}

/// `has_content` is decided by the caller; the policy only orders days.
pub fn status_of(day: Weekday, today: Weekday, has_content: bool, weeks: WeekConvention) -> DayStatus {
    use std::cmp::Ordering;

    match weeks.index(day).cmp(&weeks.index(today)) {
        Ordering::Less if has_content => DayStatus::Completed,
        Ordering::Less => DayStatus::Missing,
        Ordering::Equal if has_content => DayStatus::Completed,
        Ordering::Equal => DayStatus::Pending,
        Ordering::Greater => DayStatus::Upcoming,
    }
}

/// Statuses of one week as they evolve while the view stays open.
///
/// Transitions only move forward: upcoming → pending → completed | missing.
/// A settled day never goes back to pending or upcoming, and a completed day
/// never becomes missing. A missing day written later may still complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekLog {
    week: WeekId,
    weeks: WeekConvention,
    days: [DayStatus; 7],
}

impl WeekLog {
    pub fn new(week: WeekId, weeks: WeekConvention) -> Self {
        Self {
            week,
            weeks,
            days: [DayStatus::Upcoming; 7],
        }
    }

    pub fn week(&self) -> WeekId {
        self.week
    }

    pub fn status(&self, day: Weekday) -> DayStatus {
        self.days[self.weeks.index(day) as usize]
    }

    /// Re-derives every day for `today`. Returns whether anything changed.
    pub fn update<F>(&mut self, today: Weekday, has_content: F) -> bool
    where
        F: Fn(Weekday) -> bool,
    {
        let weeks = self.weeks;
        let mut changed = false;
        for day in weeks.days() {
            let slot = &mut self.days[weeks.index(day) as usize];
            let next = advance(*slot, status_of(day, today, has_content(day), weeks));
            if next != *slot {
                tracing::debug!(day = ?day, from = ?*slot, to = ?next, "day status changed");
                *slot = next;
                changed = true;
            }
        }
        changed
    }

    pub fn statuses(&self, today: Weekday) -> Vec<DayLogStatus> {
        self.weeks
            .days()
            .iter()
            .map(|&day| DayLogStatus {
                day,
                status: self.status(day),
                accessible: can_access(day, today, self.weeks),
            })
            .collect()
    }
}

fn advance(current: DayStatus, derived: DayStatus) -> DayStatus {
    match (current, derived) {
        (DayStatus::Completed, _) => DayStatus::Completed,
        (DayStatus::Missing, DayStatus::Completed) => DayStatus::Completed,
        (DayStatus::Missing, _) => DayStatus::Missing,
        // Only reachable when the clock steps back a day.
        (DayStatus::Pending, DayStatus::Upcoming) => DayStatus::Pending,
        (_, derived) => derived,
    }
}
