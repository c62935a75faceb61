use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::LocalClock;
use crate::error::{AppError, AppResult};
use crate::events::{EngineEvent, EventBus, Notification};
use crate::models::activity::MutationStatus;
use crate::models::mood::{MoodEntry, MoodSlotKey, MoodTrends, MoodValue};
use crate::models::user::CurrentUser;
use crate::remote::RemoteApi;
use crate::sync::{require_user, scoped, Reconcile, SyncOutcome};
use crate::tracking::bucket_for;

#[derive(Default)]
struct MoodState {
    /// Last slot the view was told about.
    current: Option<MoodSlotKey>,
    logged: HashMap<MoodSlotKey, MoodEntry>,
    statuses: HashMap<MoodSlotKey, MutationStatus>,
    in_flight: HashMap<MoodSlotKey, u64>,
    next_seq: u64,
    trends: MoodTrends,
}

/// Mood logging for the current (local day, time-of-day) slot.
pub struct MoodCoordinator {
    remote: Arc<dyn RemoteApi>,
    clock: LocalClock,
    user: Option<CurrentUser>,
    events: EventBus,
    scope: CancellationToken,
    state: Mutex<MoodState>,
}

impl MoodCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        clock: LocalClock,
        user: Option<CurrentUser>,
        events: EventBus,
        scope: CancellationToken,
    ) -> Self {
        Self {
            remote,
            clock,
            user,
            events,
            scope,
            state: Mutex::new(MoodState::default()),
        }
    }

    /// The slot "now" falls in, on the user's local calendar.
    pub fn current_slot(&self) -> MoodSlotKey {
        let now = self.clock.now_local();
        MoodSlotKey {
            day: now.date_naive(),
            time_of_day: bucket_for(&now),
        }
    }

    pub async fn logged(&self, slot: MoodSlotKey) -> Option<MoodValue> {
        self.entry(slot).await.map(|entry| entry.mood_value)
    }

    pub async fn entry(&self, slot: MoodSlotKey) -> Option<MoodEntry> {
        self.state.lock().await.logged.get(&slot).cloned()
    }

    fn record(&self, user: &CurrentUser, slot: MoodSlotKey, mood: MoodValue) -> MoodEntry {
        MoodEntry {
            user_id: user.id.clone(),
            time_of_day: slot.time_of_day,
            mood_value: mood,
            logged_at: self.clock.now(),
        }
    }

    pub async fn status(&self, slot: MoodSlotKey) -> MutationStatus {
        self.state
            .lock()
            .await
            .statuses
            .get(&slot)
            .copied()
            .unwrap_or_default()
    }

    /// Records a mood for the current slot. A later value in the same slot
    /// replaces the earlier one.
    pub async fn log_mood(&self, value: u8) -> AppResult<SyncOutcome> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        let mood = MoodValue::new(value)?;
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let slot = self.current_slot();

        let (seq, previous) = {
            let mut state = self.state.lock().await;
            if state.in_flight.contains_key(&slot) {
                return Err(AppError::Conflict(format!(
                    "{} mood is already being saved",
                    slot.time_of_day
                )));
            }
            state.next_seq += 1;
            let seq = state.next_seq;
            let previous = state.logged.insert(slot, self.record(user, slot, mood));
            state.in_flight.insert(slot, seq);
            state.statuses.insert(slot, MutationStatus::Pending);
            tracing::debug!(slot = %slot.time_of_day, day = %slot.day, seq, mood = mood.get(), "mood pending");
            (seq, previous)
        };

        let result = scoped(
            &self.scope,
            self.remote.update_mood(&user.id, mood, slot.time_of_day),
        )
        .await;
        if matches!(result, Err(AppError::Cancelled)) || self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        if state.in_flight.get(&slot) != Some(&seq) {
            tracing::warn!(seq, "stale mood response discarded");
            return Ok(SyncOutcome::Discarded);
        }
        state.in_flight.remove(&slot);

        match result {
            Ok(()) => {
                state.statuses.insert(slot, MutationStatus::Confirmed);
                tracing::info!(slot = %slot.time_of_day, mood = mood.label(), "mood logged");
                self.events
                    .notify(Notification::success("Mood updated successfully"));
                Ok(SyncOutcome::Confirmed)
            }
            Err(e) => {
                match previous {
                    Some(prev) => state.logged.insert(slot, prev),
                    None => state.logged.remove(&slot),
                };
                state.statuses.insert(slot, MutationStatus::RolledBack);
                tracing::warn!(slot = %slot.time_of_day, error = %e, "mood update rolled back");
                self.events.notify(Notification::error("Mood update failed"));
                Ok(SyncOutcome::RolledBack {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Asks the server whether the current slot already has a mood.
    pub async fn refresh_current_slot(&self) -> AppResult<Option<MoodValue>> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        let slot = self.current_slot();
        let logged = scoped(&self.scope, self.remote.check_mood(&user.id, slot.time_of_day))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Error checking mood log");
                e
            })?;
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        if !state.in_flight.contains_key(&slot) {
            match logged {
                Some(mood) => state.logged.insert(slot, self.record(user, slot, mood)),
                None => state.logged.remove(&slot),
            };
        }
        Ok(state.logged.get(&slot).map(|entry| entry.mood_value))
    }

    pub async fn trends(&self) -> AppResult<MoodTrends> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        let trends = scoped(&self.scope, self.remote.mood_trends(&user.id))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Error fetching mood trends");
                e
            })?;
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.state.lock().await.trends = trends.clone();
        Ok(trends)
    }

    pub async fn cached_trends(&self) -> MoodTrends {
        self.state.lock().await.trends.clone()
    }
}

#[async_trait]
impl Reconcile for MoodCoordinator {
    fn name(&self) -> &'static str {
        "mood"
    }

    /// Announces a new slot when the clock crosses 05:00, 12:00, 18:00 or
    /// local midnight.
    async fn reconcile(&self) -> AppResult<bool> {
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let slot = self.current_slot();
        let mut state = self.state.lock().await;
        if state.current == Some(slot) {
            return Ok(false);
        }
        state.current = Some(slot);
        tracing::debug!(slot = %slot.time_of_day, day = %slot.day, "mood slot changed");
        self.events.publish(EngineEvent::MoodSlotChanged {
            day: slot.day,
            slot: slot.time_of_day,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, FixedOffset};

    use crate::clock::{utc, MockClock};
    use crate::events::{drain, notifications, NotificationLevel};
    use crate::models::mood::TimeOfDay;
    use crate::remote::testing::FakeRemote;

    fn fixture(offset_hours: i32) -> (Arc<MockClock>, Arc<FakeRemote>, MoodCoordinator, EventBus) {
        let clock = Arc::new(MockClock::new(utc(2024, 5, 10, 9, 0)));
        let remote = Arc::new(FakeRemote::new(clock.clone()));
        let events = EventBus::new();
        let coordinator = MoodCoordinator::new(
            remote.clone(),
            LocalClock::new(clock.clone(), FixedOffset::east_opt(offset_hours * 3600).unwrap()),
            Some(CurrentUser::new("u1")),
            events.clone(),
            CancellationToken::new(),
        );
        (clock, remote, coordinator, events)
    }

    #[tokio::test]
    async fn log_mood_confirms_and_notifies() {
        let (_clock, remote, coordinator, events) = fixture(0);
        let mut rx = events.subscribe();

        assert_eq!(coordinator.log_mood(4).await.unwrap(), SyncOutcome::Confirmed);
        let slot = coordinator.current_slot();
        assert_eq!(slot.time_of_day, TimeOfDay::Morning);
        assert_eq!(coordinator.logged(slot).await.map(MoodValue::get), Some(4));
        assert_eq!(coordinator.status(slot).await, MutationStatus::Confirmed);
        assert_eq!(remote.mood(TimeOfDay::Morning).map(MoodValue::get), Some(4));

        let entry = coordinator.entry(slot).await.unwrap();
        assert_eq!(entry.user_id.as_str(), "u1");
        assert_eq!(entry.time_of_day, TimeOfDay::Morning);
        assert_eq!(entry.logged_at, utc(2024, 5, 10, 9, 0));
        assert_eq!(
            notifications(&drain(&mut rx), NotificationLevel::Success),
            vec!["Mood updated successfully"]
        );
    }

    #[tokio::test]
    async fn failed_update_restores_previous_mood() {
        let (_clock, remote, coordinator, events) = fixture(0);
        coordinator.log_mood(2).await.unwrap();
        let mut rx = events.subscribe();

        remote.fail_next("update_mood", 500);
        let outcome = coordinator.log_mood(5).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::RolledBack { .. }));

        let slot = coordinator.current_slot();
        assert_eq!(coordinator.logged(slot).await.map(MoodValue::get), Some(2));
        assert_eq!(
            notifications(&drain(&mut rx), NotificationLevel::Error),
            vec!["Mood update failed"]
        );
    }

    #[tokio::test]
    async fn out_of_range_mood_is_rejected_before_network() {
        let (_clock, remote, coordinator, _events) = fixture(0);
        assert!(matches!(
            coordinator.log_mood(0).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(remote.calls("update_mood"), 0);
    }

    #[tokio::test]
    async fn slot_uses_local_time() {
        // 09:00 UTC is 18:00 in UTC+9.
        let (_clock, _remote, coordinator, _events) = fixture(9);
        assert_eq!(coordinator.current_slot().time_of_day, TimeOfDay::Evening);
    }

    #[tokio::test]
    async fn check_reports_already_logged_slot() {
        let (_clock, remote, coordinator, _events) = fixture(0);
        assert_eq!(coordinator.refresh_current_slot().await.unwrap(), None);

        remote.set_mood(TimeOfDay::Morning, MoodValue::new(3).unwrap());
        assert_eq!(
            coordinator.refresh_current_slot().await.unwrap().map(MoodValue::get),
            Some(3)
        );
    }

    #[tokio::test]
    async fn reconcile_announces_each_new_slot_once() {
        let (clock, _remote, coordinator, events) = fixture(0);
        let mut rx = events.subscribe();

        assert!(coordinator.reconcile().await.unwrap());
        assert!(!coordinator.reconcile().await.unwrap());

        clock.set(utc(2024, 5, 10, 11, 59));
        assert!(!coordinator.reconcile().await.unwrap());

        clock.advance(Duration::minutes(1));
        assert!(coordinator.reconcile().await.unwrap());

        clock.set(utc(2024, 5, 11, 1, 0));
        assert!(coordinator.reconcile().await.unwrap());

        let slots: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::MoodSlotChanged { slot, .. } => Some(slot),
                _ => None,
            })
            .collect();
        assert_eq!(
            slots,
            vec![TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Evening]
        );
    }

    #[tokio::test]
    async fn trends_are_cached() {
        let (_clock, remote, coordinator, _events) = fixture(0);
        let mut trends = MoodTrends::default();
        trends.weekly_data.labels = vec!["Mon".into()];
        remote.set_trends(trends.clone());

        assert_eq!(coordinator.trends().await.unwrap(), trends);
        assert_eq!(coordinator.cached_trends().await, trends);
    }
}
