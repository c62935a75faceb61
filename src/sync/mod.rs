//! Optimistic mutations against the remote store, and the periodic
//! re-derivation that keeps time-dependent views current.

pub mod journal;
pub mod mood;
pub mod reconciler;
pub mod selfcare;
pub mod tracker;

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::events::{EventBus, Notification};
use crate::models::user::CurrentUser;

pub use journal::JournalCoordinator;
pub use mood::MoodCoordinator;
pub use reconciler::{PeriodicReconciler, ReconcilerHandle, TickReport};
pub use selfcare::SelfCareCoordinator;
pub use tracker::Tracker;

/// How a mutation ended once its remote call resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Server truth replaced the optimistic state.
    Confirmed,
    /// The remote call failed and local state is back to where it was.
    RolledBack { reason: String },
    /// The entity was superseded while the call was in flight; the response
    /// was dropped.
    Discarded,
}

/// Something the periodic reconciler re-derives on every tick.
#[async_trait]
pub trait Reconcile: Send + Sync {
    fn name(&self) -> &'static str;

    /// Re-reads the clock and recomputes derived state. Returns whether
    /// anything visible changed.
    async fn reconcile(&self) -> AppResult<bool>;
}

/// Every mutation needs a signed-in user; without one, nothing is sent.
pub(crate) fn require_user<'a>(
    user: Option<&'a CurrentUser>,
    events: &EventBus,
) -> AppResult<&'a CurrentUser> {
    crate::auth::jwt::require_user(user).map_err(|e| {
        events.notify(Notification::error("Authentication required"));
        e
    })
}

/// Runs `call` unless the owning view is torn down first.
pub(crate) async fn scoped<T, F>(scope: &CancellationToken, call: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    if scope.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    tokio::select! {
        _ = scope.cancelled() => Err(AppError::Cancelled),
        result = call => result,
    }
}
