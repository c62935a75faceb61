use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::activity::ActivityView;
use crate::models::day_log::DayLogStatus;
use crate::models::mood::TimeOfDay;
use crate::tracking::WeekId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A user-visible toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything the view layer needs to re-render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    Notification(Notification),
    ActivitiesChanged(Vec<ActivityView>),
    MoodSlotChanged { day: NaiveDate, slot: TimeOfDay },
    WeekRolledOver(WeekId),
    DayStatusesChanged(Vec<DayLogStatus>),
}

const CAPACITY: usize = 256;

/// Fan-out of engine events. Sending with no subscriber is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notify(&self, notification: Notification) {
        if notification.level == NotificationLevel::Error {
            tracing::warn!(message = %notification.message, "error notification");
        }
        self.publish(EngineEvent::Notification(notification));
    }
}

#[cfg(test)]
pub(crate) fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
pub(crate) fn notifications(events: &[EngineEvent], level: NotificationLevel) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Notification(n) if n.level == level => Some(n.message.clone()),
            _ => None,
        })
        .collect()
}
