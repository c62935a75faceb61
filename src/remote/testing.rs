//! Scripted in-memory `RemoteApi` for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Weekday;
use reqwest::StatusCode;
use tokio::sync::oneshot;

use crate::clock::ClockSource;
use crate::error::{AppError, AppResult};
use crate::models::activity::{Activity, ActivityId, NewActivity};
use crate::models::journal::{JournalDraft, JournalEntry};
use crate::models::mood::{MoodTrends, MoodValue, TimeOfDay};
use crate::models::user::UserId;
use crate::remote::{CreatedActivities, RemoteApi};
use crate::tracking::WeekConvention;

#[derive(Default)]
struct Store {
    activities: Vec<Activity>,
    moods: HashMap<TimeOfDay, MoodValue>,
    journal: HashMap<(u32, Weekday), JournalEntry>,
    trends: MoodTrends,
    reply_single_on_create: bool,
    next_id: u32,
}

/// Server double. Operations are named by their `RemoteApi` method.
pub struct FakeRemote {
    clock: Arc<dyn ClockSource>,
    store: Mutex<Store>,
    failures: Mutex<HashMap<&'static str, VecDeque<u16>>>,
    gates: Mutex<HashMap<&'static str, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeRemote {
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            clock,
            store: Mutex::new(Store::default()),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_activities(self, activities: Vec<Activity>) -> Self {
        self.store.lock().unwrap().activities = activities;
        self
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.store.lock().unwrap().activities.clone()
    }

    pub fn set_activities(&self, activities: Vec<Activity>) {
        self.store.lock().unwrap().activities = activities;
    }

    pub fn set_mood(&self, slot: TimeOfDay, mood: MoodValue) {
        self.store.lock().unwrap().moods.insert(slot, mood);
    }

    pub fn mood(&self, slot: TimeOfDay) -> Option<MoodValue> {
        self.store.lock().unwrap().moods.get(&slot).copied()
    }

    pub fn set_trends(&self, trends: MoodTrends) {
        self.store.lock().unwrap().trends = trends;
    }

    pub fn put_journal(&self, entry: JournalEntry) {
        self.store
            .lock()
            .unwrap()
            .journal
            .insert((entry.week, entry.day), entry);
    }

    pub fn journal(&self, week: u32, day: Weekday) -> Option<JournalEntry> {
        self.store.lock().unwrap().journal.get(&(week, day)).cloned()
    }

    pub fn reply_single_on_create(&self) {
        self.store.lock().unwrap().reply_single_on_create = true;
    }

    /// The next call of `op` fails with `status`.
    pub fn fail_next(&self, op: &'static str, status: u16) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(status);
    }

    /// The next call of `op` waits until the returned sender fires (or is dropped).
    pub fn gate_next(&self, op: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().entry(op).or_default().push_back(rx);
        tx
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Bookkeeping every operation goes through: count, wait on a gate, then
    /// maybe fail. The gate is awaited without holding any lock.
    async fn enter(&self, op: &'static str) -> AppResult<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;

        let gate = self
            .gates
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(status) => Err(AppError::from_status(
                StatusCode::from_u16(status).unwrap(),
                format!("scripted {op} failure"),
            )),
            None => Ok(()),
        }
    }

    fn set_today(&self, id: &ActivityId, on: bool) -> AppResult<Activity> {
        let today = self.clock.now().date_naive();
        let mut store = self.store.lock().unwrap();
        let activity = store
            .activities
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| AppError::NotFound(format!("activity {id}")))?;
        if on {
            activity.performed_dates.insert(today);
        } else {
            activity.performed_dates.remove(&today);
        }
        Ok(activity.clone())
    }

    fn save(&self, week: u32, day: Weekday, draft: &JournalDraft) {
        self.put_journal(JournalEntry::from_draft(week, day, draft));
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn list_activities(&self, _user: &UserId) -> AppResult<Vec<Activity>> {
        self.enter("list_activities").await?;
        Ok(self.activities())
    }

    async fn create_activity(&self, _user: &UserId, draft: &NewActivity) -> AppResult<CreatedActivities> {
        self.enter("create_activity").await?;
        let mut store = self.store.lock().unwrap();
        store.next_id += 1;
        let activity = Activity::new(
            format!("new-{}", store.next_id),
            draft.title.clone(),
            draft.description.clone(),
        );
        store.activities.push(activity.clone());
        if store.reply_single_on_create {
            Ok(CreatedActivities::Single(activity))
        } else {
            Ok(CreatedActivities::List(store.activities.clone()))
        }
    }

    async fn increment(&self, _user: &UserId, id: &ActivityId) -> AppResult<Activity> {
        self.enter("increment").await?;
        self.set_today(id, true)
    }

    async fn decrement(&self, _user: &UserId, id: &ActivityId) -> AppResult<Activity> {
        self.enter("decrement").await?;
        self.set_today(id, false)
    }

    async fn delete_activity(&self, _user: &UserId, id: &ActivityId) -> AppResult<Vec<Activity>> {
        self.enter("delete_activity").await?;
        let mut store = self.store.lock().unwrap();
        store.activities.retain(|a| &a.id != id);
        Ok(store.activities.clone())
    }

    async fn update_mood(&self, _user: &UserId, mood: MoodValue, slot: TimeOfDay) -> AppResult<()> {
        self.enter("update_mood").await?;
        self.set_mood(slot, mood);
        Ok(())
    }

    async fn check_mood(&self, _user: &UserId, slot: TimeOfDay) -> AppResult<Option<MoodValue>> {
        self.enter("check_mood").await?;
        Ok(self.mood(slot))
    }

    async fn mood_trends(&self, _user: &UserId) -> AppResult<MoodTrends> {
        self.enter("mood_trends").await?;
        Ok(self.store.lock().unwrap().trends.clone())
    }

    async fn journal_week(&self, _user: &UserId, week: u32, _year: i32) -> AppResult<Option<Vec<JournalEntry>>> {
        self.enter("journal_week").await?;
        let store = self.store.lock().unwrap();
        if !store.journal.keys().any(|(w, _)| *w == week) {
            return Ok(None);
        }
        Ok(Some(
            WeekConvention::default()
                .days()
                .into_iter()
                .map(|day| {
                    store
                        .journal
                        .get(&(week, day))
                        .cloned()
                        .unwrap_or_else(|| JournalEntry::empty(week, day))
                })
                .collect(),
        ))
    }

    async fn journal_entry(&self, _user: &UserId, week: u32, day: Weekday) -> AppResult<Option<JournalEntry>> {
        self.enter("journal_entry").await?;
        Ok(self.journal(week, day))
    }

    async fn create_journal_entry(
        &self,
        _user: &UserId,
        week: u32,
        day: Weekday,
        draft: &JournalDraft,
    ) -> AppResult<()> {
        self.enter("create_journal_entry").await?;
        self.save(week, day, draft);
        Ok(())
    }

    async fn update_journal_entry(
        &self,
        _user: &UserId,
        week: u32,
        day: Weekday,
        draft: &JournalDraft,
    ) -> AppResult<()> {
        self.enter("update_journal_entry").await?;
        self.save(week, day, draft);
        Ok(())
    }
}
