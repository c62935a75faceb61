use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::LocalClock;
use crate::error::{AppError, AppResult};
use crate::events::{EngineEvent, EventBus, Notification};
use crate::models::activity::{Activity, ActivityId, ActivityView, MutationStatus, NewActivity, Progress};
use crate::models::user::CurrentUser;
use crate::remote::{CreatedActivities, RemoteApi};
use crate::sync::{require_user, scoped, Reconcile, SyncOutcome};
use crate::tracking::{derive_view, progress, CompletionHistory};

struct InFlight {
    seq: u64,
    snapshot: Activity,
}

#[derive(Default)]
struct SelfCareState {
    history: CompletionHistory,
    statuses: HashMap<ActivityId, MutationStatus>,
    in_flight: HashMap<ActivityId, InFlight>,
    next_seq: u64,
    published: Vec<ActivityView>,
}

impl SelfCareState {
    fn views(&self, clock: &LocalClock) -> Vec<ActivityView> {
        let today = clock.today_utc();
        self.history
            .activities()
            .iter()
            .map(|activity| ActivityView {
                id: activity.id.clone(),
                title: activity.title.clone(),
                description: activity.description.clone(),
                derived: derive_view(activity, today),
                status: self.statuses.get(&activity.id).copied().unwrap_or_default(),
            })
            .collect()
    }

    /// Takes the server's list, except for activities with a mutation in
    /// flight: those keep their local state. Pending activities the server no
    /// longer has are dropped, and their late responses become stale.
    fn merge(&mut self, server: Vec<Activity>) {
        let mut merged = CompletionHistory::new();
        for activity in server {
            match self.in_flight.contains_key(&activity.id) {
                true => {
                    if let Ok(local) = self.history.get(&activity.id) {
                        merged.upsert(local.clone());
                    }
                }
                false => merged.upsert(activity),
            }
        }

        self.in_flight.retain(|id, _| merged.contains(id));
        let in_flight = &self.in_flight;
        self.statuses.retain(|id, status| {
            if !in_flight.contains_key(id) {
                *status = MutationStatus::Idle;
            }
            merged.contains(id)
        });
        self.history = merged;
    }
}

/// Owns the self-care activity list and serializes mutations per activity.
pub struct SelfCareCoordinator {
    remote: Arc<dyn RemoteApi>,
    clock: LocalClock,
    user: Option<CurrentUser>,
    events: EventBus,
    scope: CancellationToken,
    state: Mutex<SelfCareState>,
}

impl SelfCareCoordinator {
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
            state: Mutex::new(SelfCareState::default()),
        }
    }

    pub async fn views(&self) -> Vec<ActivityView> {
        self.state.lock().await.views(&self.clock)
    }

    pub async fn progress(&self) -> Progress {
        progress(&self.views().await)
    }

    pub async fn history(&self) -> CompletionHistory {
        self.state.lock().await.history.clone()
    }

    /// Loads the activity list from the server.
    pub async fn refresh(&self) -> AppResult<()> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        let activities = match scoped(&self.scope, self.remote.list_activities(&user.id)).await {
            Ok(activities) => activities,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "Error fetching activities");
                self.events
                    .notify(Notification::error("Failed to fetch activities"));
                return Err(e);
            }
        };
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        state.merge(activities);
        tracing::debug!(count = state.history.len(), "activities loaded");
        self.publish(&mut state);
        Ok(())
    }

    /// Marks today done (`on`) or not done for one activity.
    ///
    /// The change is visible immediately as `Pending`; the server's answer
    /// then replaces it, or the previous state comes back on failure. A
    /// second toggle of the same activity while the first is unresolved is
    /// refused with `Conflict`.
    pub async fn toggle(&self, id: &ActivityId, on: bool) -> AppResult<SyncOutcome> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let seq = {
            let mut state = self.state.lock().await;
            let snapshot = state.history.get(id)?.clone();
            if state.in_flight.contains_key(id) {
                return Err(AppError::Conflict(format!("activity {id} is already being updated")));
            }

            state.next_seq += 1;
            let seq = state.next_seq;
            state.history.toggle(id, self.clock.today_utc(), on)?;
            state.in_flight.insert(id.clone(), InFlight { seq, snapshot });
            state.statuses.insert(id.clone(), MutationStatus::Pending);
            tracing::debug!(activity_id = %id, seq, on, "toggle pending");
            self.publish(&mut state);
            seq
        };

        let result = scoped(&self.scope, self.remote.toggle(&user.id, id, on)).await;
        if matches!(result, Err(AppError::Cancelled)) || self.scope.is_cancelled() {
            tracing::debug!(activity_id = %id, seq, "toggle response dropped after teardown");
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        let Some(in_flight) = take_if_current(&mut state.in_flight, id, seq) else {
            tracing::warn!(activity_id = %id, seq, "stale toggle response discarded");
            return Ok(SyncOutcome::Discarded);
        };

        let outcome = match result {
            Ok(server) => {
                state.history.upsert(server);
                state.statuses.insert(id.clone(), MutationStatus::Confirmed);
                tracing::info!(activity_id = %id, seq, on, "toggle confirmed");
                SyncOutcome::Confirmed
            }
            Err(e) => {
                state.history.upsert(in_flight.snapshot);
                state.statuses.insert(id.clone(), MutationStatus::RolledBack);
                tracing::warn!(activity_id = %id, seq, error = %e, "toggle rolled back");
                self.events.notify(Notification::error(match e {
                    AppError::Unauthorized => "Authentication required",
                    _ => "Failed to update activity",
                }));
                SyncOutcome::RolledBack {
                    reason: e.to_string(),
                }
            }
        };
        self.publish(&mut state);
        Ok(outcome)
    }

    pub async fn add_activity(&self, title: &str, description: &str) -> AppResult<SyncOutcome> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        let draft = NewActivity::new(title, description).map_err(|e| {
            if let AppError::Validation(msg) = &e {
                self.events.notify(Notification::error(msg.clone()));
            }
            e
        })?;

        let created = match scoped(&self.scope, self.remote.create_activity(&user.id, &draft)).await {
            Ok(created) => created,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "Error adding activity");
                self.events.notify(Notification::error("Failed to add activity"));
                return Ok(SyncOutcome::RolledBack {
                    reason: e.to_string(),
                });
            }
        };
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        match created {
            CreatedActivities::List(all) => state.merge(all),
            CreatedActivities::Single(activity) => {
                tracing::info!(activity_id = %activity.id, "activity added");
                state.history.upsert(activity);
            }
        }
        self.publish(&mut state);
        Ok(SyncOutcome::Confirmed)
    }

    pub async fn delete_activity(&self, id: &ActivityId) -> AppResult<SyncOutcome> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        {
            let state = self.state.lock().await;
            state.history.get(id)?;
            if state.in_flight.contains_key(id) {
                return Err(AppError::Conflict(format!("activity {id} is being updated")));
            }
        }

        let remaining = match scoped(&self.scope, self.remote.delete_activity(&user.id, id)).await {
            Ok(remaining) => remaining,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(activity_id = %id, error = %e, "Error deleting activity");
                self.events
                    .notify(Notification::error("Failed to delete activity"));
                return Ok(SyncOutcome::RolledBack {
                    reason: e.to_string(),
                });
            }
        };
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        state.merge(remaining);
        // A toggle issued after the check above must not resurrect it.
        state.in_flight.remove(id);
        state.history.remove(id);
        state.statuses.remove(id);
        tracing::info!(activity_id = %id, "activity deleted");
        self.publish(&mut state);
        Ok(SyncOutcome::Confirmed)
    }

    fn publish(&self, state: &mut SelfCareState) -> bool {
        let views = state.views(&self.clock);
        if views == state.published {
            return false;
        }
        state.published = views.clone();
        self.events.publish(EngineEvent::ActivitiesChanged(views));
        true
    }
}

fn take_if_current(
    in_flight: &mut HashMap<ActivityId, InFlight>,
    id: &ActivityId,
    seq: u64,
) -> Option<InFlight> {
    match in_flight.get(id) {
        Some(current) if current.seq == seq => in_flight.remove(id),
        _ => None,
    }
}

#[async_trait]
impl Reconcile for SelfCareCoordinator {
    fn name(&self) -> &'static str {
        "selfcare"
    }

    /// Re-derives every view for the current day. Histories are left as
    /// they are, so a pending toggle is never overwritten.
    async fn reconcile(&self) -> AppResult<bool> {
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let mut state = self.state.lock().await;
        Ok(self.publish(&mut state))
    }
}
