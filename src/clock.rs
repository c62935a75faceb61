//! The single place "now" is read.
//!
//! Components never call `Utc::now()` directly; they hold a [`LocalClock`]
//! wrapping an injected [`ClockSource`], so tests can step across midnight or
//! a time-of-day boundary with a [`MockClock`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::tracking::WeekConvention;

pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl ClockSource for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A clock source paired with the user's UTC offset and week numbering.
#[derive(Clone)]
pub struct LocalClock {
    source: Arc<dyn ClockSource>,
    offset: FixedOffset,
    weeks: WeekConvention,
}

impl LocalClock {
    pub fn new(source: Arc<dyn ClockSource>, offset: FixedOffset) -> Self {
        Self {
            source,
            offset,
            weeks: WeekConvention::default(),
        }
    }

    pub fn with_week_convention(mut self, weeks: WeekConvention) -> Self {
        self.weeks = weeks;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.source.now()
    }

    pub fn weeks(&self) -> WeekConvention {
        self.weeks
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    pub fn now_local(&self) -> DateTime<FixedOffset> {
        self.to_local(self.now())
    }

    /// Calendar day (UTC) used as the completion dedup key.
    pub fn today_utc(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl std::fmt::Debug for LocalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalClock")
            .field("now", &self.now())
            .field("offset", &self.offset)
            .field("weeks", &self.weeks)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}
