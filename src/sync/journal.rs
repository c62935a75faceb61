use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Weekday;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::LocalClock;
use crate::error::{AppError, AppResult};
use crate::events::{EngineEvent, EventBus, Notification};
use crate::models::activity::MutationStatus;
use crate::models::day_log::DayLogStatus;
use crate::models::journal::{JournalDraft, JournalEntry};
use crate::models::user::CurrentUser;
use crate::remote::RemoteApi;
use crate::sync::{require_user, scoped, Reconcile, SyncOutcome};
use crate::tracking::{can_access, weekday_of, WeekConvention, WeekId, WeekLog, WeekRollover};

struct PendingSave {
    seq: u64,
    snapshot: JournalEntry,
}

struct JournalState {
    weeks: WeekConvention,
    rollover: WeekRollover,
    week: WeekId,
    entries: HashMap<Weekday, JournalEntry>,
    statuses: HashMap<Weekday, MutationStatus>,
    in_flight: HashMap<Weekday, PendingSave>,
    next_seq: u64,
    log: WeekLog,
    published: Vec<DayLogStatus>,
}

impl JournalState {
    fn new(week: WeekId, weeks: WeekConvention) -> Self {
        Self {
            weeks,
            rollover: WeekRollover::new(),
            week,
            entries: empty_week(week, weeks),
            statuses: HashMap::new(),
            in_flight: HashMap::new(),
            next_seq: 0,
            log: WeekLog::new(week, weeks),
            published: Vec::new(),
        }
    }

    /// Switches to `week` if it is new. In-flight saves of the old week are
    /// forgotten, so their responses are discarded.
    fn enter_week(&mut self, week: WeekId) -> bool {
        let first = self.rollover.last().is_none();
        if !self.rollover.observe(week) {
            return false;
        }
        if !first || self.week != week {
            self.entries = empty_week(week, self.weeks);
            self.statuses.clear();
            self.in_flight.clear();
            self.log = WeekLog::new(week, self.weeks);
            self.published.clear();
        }
        self.week = week;
        !first
    }

    fn entry(&self, day: Weekday) -> JournalEntry {
        self.entries
            .get(&day)
            .cloned()
            .unwrap_or_else(|| JournalEntry::empty(self.week.week, day))
    }

    /// Only confirmed content counts; a pending save completes its day once
    /// the server accepts it.
    fn refresh_log(&mut self, today: Weekday) -> Vec<DayLogStatus> {
        let entries = &self.entries;
        let in_flight = &self.in_flight;
        self.log.update(today, |day| {
            !in_flight.contains_key(&day) && entries.get(&day).map_or(false, JournalEntry::has_content)
        });
        self.log.statuses(today)
    }
}

fn empty_week(week: WeekId, weeks: WeekConvention) -> HashMap<Weekday, JournalEntry> {
    weeks
        .days()
        .into_iter()
        .map(|day| (day, JournalEntry::empty(week.week, day)))
        .collect()
}

/// One week of journal pages and the derived per-day log.
pub struct JournalCoordinator {
    remote: Arc<dyn RemoteApi>,
    clock: LocalClock,
    user: Option<CurrentUser>,
    events: EventBus,
    scope: CancellationToken,
    state: Mutex<JournalState>,
}

impl JournalCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        clock: LocalClock,
        user: Option<CurrentUser>,
        events: EventBus,
        scope: CancellationToken,
    ) -> Self {
        let weeks = clock.weeks();
        let week = weeks.week_of(&clock.now_local());
        Self {
            remote,
            clock,
            user,
            events,
            scope,
            state: Mutex::new(JournalState::new(week, weeks)),
        }
    }

    fn today(&self) -> (WeekId, Weekday) {
        let now = self.clock.now_local();
        (self.clock.weeks().week_of(&now), weekday_of(&now))
    }

    pub async fn week(&self) -> WeekId {
        self.state.lock().await.week
    }

    pub async fn entries(&self) -> Vec<JournalEntry> {
        let state = self.state.lock().await;
        state.weeks.days().into_iter().map(|day| state.entry(day)).collect()
    }

    pub async fn entry(&self, day: Weekday) -> JournalEntry {
        self.state.lock().await.entry(day)
    }

    pub async fn save_status(&self, day: Weekday) -> MutationStatus {
        self.state
            .lock()
            .await
            .statuses
            .get(&day)
            .copied()
            .unwrap_or_default()
    }

    /// Current `{day, status}` list for the week.
    pub async fn day_statuses(&self) -> Vec<DayLogStatus> {
        let (_, today) = self.today();
        self.state.lock().await.refresh_log(today)
    }

    /// Loads the current week. A week with no entries yet is not an error.
    pub async fn load_week(&self) -> AppResult<Vec<DayLogStatus>> {
        let user = require_user(self.user.as_ref(), &self.events)?;
        let (week, _) = self.today();
        {
            let mut state = self.state.lock().await;
            if state.enter_week(week) {
                tracing::info!(week = %week, "journal week rolled over");
                self.events.publish(EngineEvent::WeekRolledOver(week));
            }
        }

        let loaded = scoped(
            &self.scope,
            self.remote.journal_week(&user.id, week.week, week.year),
        )
        .await;
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(AppError::Unauthorized) => {
                self.events.notify(Notification::error("Authentication error"));
                return Err(AppError::Unauthorized);
            }
            Err(e) => {
                tracing::warn!(week = %week, error = %e, "Error loading weekly journals");
                self.events
                    .notify(Notification::error("Error loading journals"));
                return Err(e);
            }
        };
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        if state.week != week {
            // The week moved on while loading; the next load handles it.
            return Ok(state.published.clone());
        }
        let mut entries = empty_week(week, state.weeks);
        if loaded.is_none() {
            tracing::debug!(week = %week, "no journal entries for this week yet");
        }
        for entry in loaded.unwrap_or_default() {
            entries.insert(entry.day, entry);
        }
        for (day, pending) in &state.in_flight {
            tracing::debug!(day = ?day, seq = pending.seq, "keeping pending journal entry");
            if let Some(local) = state.entries.get(day) {
                entries.insert(*day, local.clone());
            }
        }
        state.entries = entries;
        Ok(self.publish(&mut state))
    }

    /// Opens one day's page. Future days are refused.
    pub async fn load_entry(&self, day: Weekday) -> AppResult<JournalEntry> {
        let (week, today) = self.today();
        if !can_access(day, today, self.clock.weeks()) {
            return Err(AppError::Forbidden("Future days are not accessible".into()));
        }
        let user = require_user(self.user.as_ref(), &self.events)?;

        let fetched = match scoped(&self.scope, self.remote.journal_entry(&user.id, week.week, day)).await {
            Ok(fetched) => fetched,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(AppError::Unauthorized) => {
                self.events.notify(Notification::error("Authentication error"));
                return Err(AppError::Unauthorized);
            }
            Err(e) => {
                tracing::warn!(day = ?day, error = %e, "Error loading journal entry");
                return Err(e);
            }
        };
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let entry = fetched.unwrap_or_else(|| JournalEntry::empty(week.week, day));
        if self.today().0 != week {
            // The week moved on during the fetch; the page is not cached.
            return Ok(entry);
        }

        let mut state = self.state.lock().await;
        if state.enter_week(week) {
            tracing::info!(week = %week, "journal week rolled over");
            self.events.publish(EngineEvent::WeekRolledOver(week));
        }
        if state.in_flight.contains_key(&day) {
            return Ok(state.entry(day));
        }
        state.entries.insert(day, entry.clone());
        self.publish(&mut state);
        Ok(entry)
    }

    /// Saves `content` for `day` of the current week: create when the day has
    /// no entry yet, update otherwise.
    pub async fn save_entry(&self, day: Weekday, content: &str) -> AppResult<SyncOutcome> {
        let (week, today) = self.today();
        if !can_access(day, today, self.clock.weeks()) {
            return Err(AppError::Forbidden("Future days are not accessible".into()));
        }
        let draft = JournalDraft::new(content).map_err(|e| {
            if let AppError::Validation(msg) = &e {
                self.events.notify(Notification::error(msg.clone()));
            }
            e
        })?;
        let user = require_user(self.user.as_ref(), &self.events)?;
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let (seq, exists) = {
            let mut state = self.state.lock().await;
            if state.enter_week(week) {
                self.events.publish(EngineEvent::WeekRolledOver(week));
            }
            if state.in_flight.contains_key(&day) {
                return Err(AppError::Conflict(format!(
                    "{day} entry is already being saved"
                )));
            }

            let snapshot = state.entry(day);
            let exists = snapshot.exists;
            state.next_seq += 1;
            let seq = state.next_seq;
            state
                .entries
                .insert(day, JournalEntry::from_draft(week.week, day, &draft));
            state.in_flight.insert(day, PendingSave { seq, snapshot });
            state.statuses.insert(day, MutationStatus::Pending);
            tracing::debug!(day = ?day, seq, exists, words = draft.word_count, "journal save pending");
            (seq, exists)
        };

        let call = async {
            if exists {
                self.remote
                    .update_journal_entry(&user.id, week.week, day, &draft)
                    .await
            } else {
                self.remote
                    .create_journal_entry(&user.id, week.week, day, &draft)
                    .await
            }
        };
        let result = scoped(&self.scope, call).await;
        if matches!(result, Err(AppError::Cancelled)) || self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut state = self.state.lock().await;
        let current = state.week == week
            && state.in_flight.get(&day).map_or(false, |p| p.seq == seq);
        let pending = if current { state.in_flight.remove(&day) } else { None };
        let Some(pending) = pending else {
            tracing::warn!(day = ?day, seq, "stale journal save discarded");
            return Ok(SyncOutcome::Discarded);
        };

        let outcome = match result {
            Ok(()) => {
                state.statuses.insert(day, MutationStatus::Confirmed);
                tracing::info!(week = %week, day = ?day, "journal entry saved");
                self.events.notify(Notification::success("Saved successfully!"));
                SyncOutcome::Confirmed
            }
            Err(e) => {
                state.entries.insert(day, pending.snapshot);
                state.statuses.insert(day, MutationStatus::RolledBack);
                tracing::warn!(day = ?day, error = %e, "journal save rolled back");
                self.events.notify(Notification::error(format!("Error: {e}")));
                SyncOutcome::RolledBack {
                    reason: e.to_string(),
                }
            }
        };
        self.publish(&mut state);
        Ok(outcome)
    }

    fn publish(&self, state: &mut JournalState) -> Vec<DayLogStatus> {
        let (_, today) = self.today();
        let statuses = state.refresh_log(today);
        if statuses != state.published {
            state.published = statuses.clone();
            self.events
                .publish(EngineEvent::DayStatusesChanged(statuses.clone()));
        }
        statuses
    }
}

#[async_trait]
impl Reconcile for JournalCoordinator {
    fn name(&self) -> &'static str {
        "journal"
    }

    /// Reloads on a new week; otherwise re-derives day statuses for today.
    async fn reconcile(&self) -> AppResult<bool> {
        if self.scope.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let (week, _) = self.today();
        {
            let mut state = self.state.lock().await;
            if state.rollover.last() == Some(week) {
                let before = state.published.clone();
                return Ok(self.publish(&mut state) != before);
            }
        }
        self.load_week().await.map(|_| true)
    }
}
