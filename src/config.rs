use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::{AppError, AppResult};
use crate::tracking::WeekConvention;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub session_token: Option<String>,

    pub reconcile_interval_secs: u64,
    pub request_timeout_secs: u64,

    /// Offset of the user's wall clock from UTC, used for time-of-day
    /// buckets, weekday names and week numbers.
    pub utc_offset_minutes: i32,

    /// Week numbering shared with the journal store.
    pub week_convention: WeekConvention,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("WELLNESS_API_URL")
            .unwrap_or_else(|| "http://localhost:3000/api".into())
            .trim_end_matches('/')
            .to_string();

        let utc_offset_minutes = parse_or(&lookup, "UTC_OFFSET_MINUTES", 0i32)?;
        if !(-14 * 60..=14 * 60).contains(&utc_offset_minutes) {
            return Err(AppError::Validation(
                "UTC_OFFSET_MINUTES must be within ±840".into(),
            ));
        }

        let week_convention = match lookup("WEEK_CONVENTION") {
            Some(raw) => raw.parse()?,
            None => WeekConvention::default(),
        };

        Ok(Self {
            api_base_url,
            session_token: lookup("WELLNESS_SESSION_TOKEN").filter(|s| !s.trim().is_empty()),
            reconcile_interval_secs: parse_or(&lookup, "RECONCILE_INTERVAL_SECS", 60u64)?.max(1),
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 15u64)?.max(1),
            utc_offset_minutes,
            week_convention,
        })
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn utc_offset(&self) -> FixedOffset {
        // Range is checked in from_lookup.
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("{key} must be a number"))),
        None => Ok(default),
    }
}
