//! Temporal tracking and sync engine for a personal wellness tracker:
//! mood slots, self-care completions with rolling weekly counts, and a
//! weekly journal, kept in step with a remote store through optimistic
//! mutations and a periodic reconciler.

pub mod auth;
pub mod clock;
pub mod config;
pub mod dto;
pub mod error;
pub mod events;
pub mod models;
pub mod remote;
pub mod sync;
pub mod tracking;

pub use clock::{ClockSource, LocalClock, MockClock, SystemClock};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use events::{EngineEvent, EventBus, Notification};
pub use sync::{SyncOutcome, Tracker};
