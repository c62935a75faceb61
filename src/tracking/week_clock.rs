use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// How weeks are numbered and which day opens them.
///
/// `Calendar` counts Sunday-started weeks inside the calendar year: week 1
/// holds January 1st, and the week containing December 31st is cut short
/// so the next year starts again at week 1. This is the numbering the
/// journal store is keyed by. `Iso` is ISO-8601 (Monday start, ISO
/// week-year).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekConvention {
    #[default]
    Calendar,
    Iso,
}

impl WeekConvention {
    pub fn first_day(self) -> Weekday {
        match self {
            WeekConvention::Calendar => Weekday::Sun,
            WeekConvention::Iso => Weekday::Mon,
        }
    }

    /// Position of `day` in the week, starting at 0 for [`Self::first_day`].
    pub fn index(self, day: Weekday) -> u32 {
        match self {
            WeekConvention::Calendar => day.num_days_from_sunday(),
            WeekConvention::Iso => day.num_days_from_monday(),
        }
    }

    /// The seven days in display order.
    pub fn days(self) -> [Weekday; 7] {
        let mut day = self.first_day();
        std::array::from_fn(|_| {
            let current = day;
            day = day.succ();
            current
        })
    }

    pub fn week_of<Tz: TimeZone>(self, instant: &DateTime<Tz>) -> WeekId {
        let date = instant.date_naive();
        match self {
            WeekConvention::Calendar => {
                let day0 = date.ordinal0();
                // Weekday of January 1st, Sunday = 0.
                let jan1 = (date.weekday().num_days_from_sunday() + 7 - day0 % 7) % 7;
                WeekId {
                    year: date.year(),
                    week: (day0 + jan1) / 7 + 1,
                }
            }
            WeekConvention::Iso => {
                let iso = date.iso_week();
                WeekId {
                    year: iso.year(),
                    week: iso.week(),
                }
            }
        }
    }
}

impl FromStr for WeekConvention {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calendar" => Ok(WeekConvention::Calendar),
            "iso" => Ok(WeekConvention::Iso),
            other => Err(AppError::Validation(format!(
                "unknown week convention '{other}', expected 'calendar' or 'iso'"
            ))),
        }
    }
}

/// A week number paired with the year it counts in. Ordering holds across
/// January 1st under either convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekId {
    pub year: i32,
    pub week: u32,
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

pub fn weekday_of<Tz: TimeZone>(instant: &DateTime<Tz>) -> Weekday {
    instant.weekday()
}

pub fn weekday_full_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Remembers the last observed week and reports when it changes.
#[derive(Debug, Clone, Default)]
pub struct WeekRollover {
    last: Option<WeekId>,
}

impl WeekRollover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<WeekId> {
        self.last
    }

    /// True on the first observation and whenever the week differs from the
    /// previous one, i.e. whenever weekly data must be re-initialised.
    pub fn observe(&mut self, week: WeekId) -> bool {
        if self.last == Some(week) {
            return false;
        }
        self.last = Some(week);
        true
    }
}
