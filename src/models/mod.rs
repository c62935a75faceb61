pub mod activity;
pub mod day_log;
pub mod journal;
pub mod mood;
pub mod user;
