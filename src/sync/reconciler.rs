use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::LocalClock;
use crate::error::ErrorClass;
use crate::sync::Reconcile;

/// Result of one pass over the targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Targets whose visible state changed.
    pub changed: usize,
    /// Targets that failed for a reason other than teardown.
    pub failed: usize,
}

/// Re-derives time-dependent state on a fixed interval, so that crossing
/// midnight or a mood slot boundary shows up without user action.
pub struct PeriodicReconciler {
    clock: LocalClock,
    period: Duration,
    targets: Vec<Arc<dyn Reconcile>>,
}

impl PeriodicReconciler {
    pub fn new(clock: LocalClock, period: Duration) -> Self {
        Self {
            clock,
            period,
            targets: Vec::new(),
        }
    }

    pub fn with(mut self, target: Arc<dyn Reconcile>) -> Self {
        self.targets.push(target);
        self
    }

    /// One pass over every target. A failing target does not stop the rest.
    pub async fn tick(&self) -> TickReport {
        let now = self.clock.now_local();
        let mut report = TickReport::default();
        for target in &self.targets {
            match target.reconcile().await {
                Ok(true) => report.changed += 1,
                Ok(false) => {}
                Err(e) => match e.class() {
                    ErrorClass::Cancelled => {}
                    ErrorClass::Transient => {
                        report.failed += 1;
                        tracing::warn!(target = target.name(), error = %e, "reconcile failed, retrying next tick");
                    }
                    ErrorClass::Precondition | ErrorClass::Invariant => {
                        report.failed += 1;
                        tracing::error!(target = target.name(), error = %e, "reconcile rejected");
                    }
                },
            }
        }
        tracing::debug!(now = %now, changed = report.changed, failed = report.failed, "reconcile tick");
        report
    }

    /// Runs until `cancel` fires. The first tick comes one period after start.
    pub fn spawn(self, cancel: CancellationToken) -> ReconcilerHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            tracing::info!(period_secs = self.period.as_secs(), "reconciler started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = self.tick() => {}
                        }
                    }
                }
            }
            tracing::info!("reconciler stopped");
        });

        ReconcilerHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Owning handle of a running reconciler. Dropping it stops the task.
pub struct ReconcilerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReconcilerHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "reconciler task ended abnormally");
            }
        }
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::FixedOffset;

    use crate::clock::{utc, MockClock};
    use crate::error::{AppError, AppResult};
    use crate::events::EventBus;
    use crate::models::activity::Activity;
    use crate::models::user::CurrentUser;
    use crate::remote::testing::FakeRemote;
    use crate::sync::SelfCareCoordinator;

    #[derive(Default)]
    struct Counter {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Reconcile for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn reconcile(&self) -> AppResult<bool> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    struct Broken;

    #[async_trait]
    impl Reconcile for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn reconcile(&self) -> AppResult<bool> {
            Err(AppError::Remote {
                status: 500,
                message: "down".into(),
            })
        }
    }

    fn local(clock: Arc<MockClock>) -> LocalClock {
        LocalClock::new(clock, FixedOffset::east_opt(0).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn fires_every_period_until_cancelled() {
        let clock = Arc::new(MockClock::new(utc(2024, 5, 10, 9, 0)));
        let counter = Arc::new(Counter::default());
        let handle = PeriodicReconciler::new(local(clock), Duration::from_secs(60))
            .with(counter.clone())
            .spawn(CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 3);

        assert!(handle.is_running());
        handle.shutdown().await;

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_task() {
        let clock = Arc::new(MockClock::new(utc(2024, 5, 10, 9, 0)));
        let counter = Arc::new(Counter::default());
        let token = CancellationToken::new();
        let handle = PeriodicReconciler::new(local(clock), Duration::from_secs(1))
            .with(counter.clone())
            .spawn(token.clone());

        drop(handle);
        assert!(token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn a_failing_target_does_not_stop_the_others() {
        let clock = Arc::new(MockClock::new(utc(2024, 5, 10, 9, 0)));
        let counter = Arc::new(Counter::default());
        let reconciler = PeriodicReconciler::new(local(clock), Duration::from_secs(60))
            .with(Arc::new(Broken))
            .with(counter.clone());

        assert_eq!(reconciler.tick().await, TickReport { changed: 1, failed: 1 });
        assert_eq!(counter.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn torn_down_targets_are_not_failures() {
        let clock = Arc::new(MockClock::new(utc(2024, 5, 10, 9, 0)));
        let scope = CancellationToken::new();
        let selfcare = Arc::new(SelfCareCoordinator::new(
            Arc::new(FakeRemote::new(clock.clone())),
            local(clock.clone()),
            Some(CurrentUser::new("u1")),
            EventBus::new(),
            scope.clone(),
        ));
        let reconciler = PeriodicReconciler::new(local(clock), Duration::from_secs(60))
            .with(selfcare)
            .with(Arc::new(Broken));

        scope.cancel();
        assert_eq!(reconciler.tick().await, TickReport { changed: 0, failed: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn tick_after_midnight_clears_completed_today() {
        let clock = Arc::new(MockClock::new(utc(2024, 5, 10, 23, 59)));
        let remote = Arc::new(FakeRemote::new(clock.clone()).with_activities(vec![
            Activity::new("a1", "Meditation", "15 minutes")
                .with_dates([chrono::NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()])
                .unwrap(),
        ]));
        let scope = CancellationToken::new();
        let selfcare = Arc::new(SelfCareCoordinator::new(
            remote,
            local(clock.clone()),
            Some(CurrentUser::new("u1")),
            EventBus::new(),
            scope.clone(),
        ));
        selfcare.refresh().await.unwrap();
        let history = selfcare.history().await;
        assert!(selfcare.views().await[0].derived.completed_today);

        let handle = PeriodicReconciler::new(local(clock.clone()), Duration::from_secs(60))
            .with(selfcare.clone())
            .spawn(scope.child_token());

        clock.set(utc(2024, 5, 11, 0, 0));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(!selfcare.views().await[0].derived.completed_today);
        assert_eq!(selfcare.history().await, history);
        handle.shutdown().await;
    }
}
