use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::clock::LocalClock;
use crate::error::{AppError, AppResult};
use crate::events::{EngineEvent, EventBus};
use crate::models::user::CurrentUser;
use crate::remote::RemoteApi;
use crate::sync::{
    JournalCoordinator, MoodCoordinator, PeriodicReconciler, ReconcilerHandle, SelfCareCoordinator,
};

/// The tracking view: every coordinator, their shared event bus and the
/// scope that ends them all.
///
/// The current user and clock are handed in here and passed down; nothing
/// below reads them from ambient state.
pub struct Tracker {
    selfcare: Arc<SelfCareCoordinator>,
    mood: Arc<MoodCoordinator>,
    journal: Arc<JournalCoordinator>,
    clock: LocalClock,
    events: EventBus,
    scope: CancellationToken,
    reconciler: Option<ReconcilerHandle>,
}

impl Tracker {
    pub fn new(remote: Arc<dyn RemoteApi>, clock: LocalClock, user: Option<CurrentUser>) -> Self {
        let events = EventBus::new();
        let scope = CancellationToken::new();

        match &user {
            Some(user) => tracing::info!(user_id = %user.id, "tracker opened"),
            None => tracing::warn!("tracker opened without a signed-in user"),
        }

        Self {
            selfcare: Arc::new(SelfCareCoordinator::new(
                remote.clone(),
                clock.clone(),
                user.clone(),
                events.clone(),
                scope.child_token(),
            )),
            mood: Arc::new(MoodCoordinator::new(
                remote.clone(),
                clock.clone(),
                user.clone(),
                events.clone(),
                scope.child_token(),
            )),
            journal: Arc::new(JournalCoordinator::new(
                remote,
                clock.clone(),
                user,
                events.clone(),
                scope.child_token(),
            )),
            clock,
            events,
            scope,
            reconciler: None,
        }
    }

    pub fn selfcare(&self) -> &SelfCareCoordinator {
        &self.selfcare
    }

    pub fn mood(&self) -> &MoodCoordinator {
        &self.mood
    }

    pub fn journal(&self) -> &JournalCoordinator {
        &self.journal
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn is_torn_down(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Initial load of every view. Each failure has already been notified;
    /// the first one is returned.
    pub async fn refresh_all(&self) -> AppResult<()> {
        let (activities, mood, journal) = tokio::join!(
            self.selfcare.refresh(),
            self.mood.refresh_current_slot(),
            self.journal.load_week(),
        );
        activities?;
        mood?;
        journal?;
        Ok(())
    }

    /// Starts the periodic reconciler. Calling it twice keeps the first one.
    pub fn start_reconciler(&mut self, period: Duration) -> AppResult<()> {
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.reconciler.is_some() {
            return Ok(());
        }

        let reconciler = PeriodicReconciler::new(self.clock.clone(), period)
            .with(self.selfcare.clone())
            .with(self.mood.clone())
            .with(self.journal.clone());
        self.reconciler = Some(reconciler.spawn(self.scope.child_token()));
        Ok(())
    }

    /// Ends the view: the reconciler stops and every response still in
    /// flight is dropped without touching state.
    pub async fn teardown(&mut self) {
        self.scope.cancel();
        if let Some(handle) = self.reconciler.take() {
            handle.shutdown().await;
        }
        tracing::info!("tracker torn down");
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
