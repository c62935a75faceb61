//! Pure temporal rules: which slot "now" falls in, which week and weekday
//! it is, which days may be written, and what a completion history means
//! for a given day. Nothing here reads the clock.

pub mod day_access;
pub mod history;
pub mod streak;
pub mod time_bucket;
pub mod week_clock;

pub use day_access::{can_access, status_of, WeekLog};
pub use history::CompletionHistory;
pub use streak::{derive_view, progress};
pub use time_bucket::bucket_for;
pub use week_clock::{weekday_of, WeekConvention, WeekId, WeekRollover};
