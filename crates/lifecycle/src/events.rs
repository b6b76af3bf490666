//! In-process lifecycle event bus backed by a `tokio::sync::broadcast`
//! channel.
//!
//! Every model transition and every best-effort cleanup failure is published
//! here. Nothing inside the lifecycle crate depends on a subscriber being
//! present.

use chrono::{DateTime, Utc};
use modelbay_core::model::ModelStatus;
use modelbay_core::types::ModelId;
use modelbay_docker::controller::CleanupError;
use serde::Serialize;
use tokio::sync::broadcast;

/// What happened to a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    Deployed,
    StatusChanged { status: ModelStatus },
    Deleted,
    Tested { inputs: usize, completed: usize },
    CleanupFailed { error: CleanupError },
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub model_id: ModelId,
    pub model_name: String,
    #[serde(flatten)]
    pub kind: LifecycleEventKind,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(model_id: ModelId, model_name: impl Into<String>, kind: LifecycleEventKind) -> Self {
        Self {
            model_id,
            model_name: model_name.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus for [`LifecycleEvent`]s, shared via `Arc`.
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Slow receivers that fall more than `capacity` events behind observe
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: LifecycleEvent) {
        // A send error only means nobody is subscribed.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Write every received event to the log. Returns once the bus is dropped.
pub async fn log_events(mut rx: broadcast::Receiver<LifecycleEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match &event.kind {
                LifecycleEventKind::CleanupFailed { error } => tracing::warn!(
                    model_id = %event.model_id,
                    model = %event.model_name,
                    step = %error.step,
                    resource = %error.resource,
                    "Lifecycle cleanup failure",
                ),
                kind => tracing::debug!(
                    model_id = %event.model_id,
                    model = %event.model_name,
                    ?kind,
                    "Lifecycle event",
                ),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Lifecycle event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let id = uuid::Uuid::new_v4();

        bus.publish(LifecycleEvent::new(id, "detector", LifecycleEventKind::Deployed));

        let event = rx.recv().await.expect("event");
        assert_eq!(event.model_id, id);
        assert_eq!(event.kind, LifecycleEventKind::Deployed);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        EventBus::new(4).publish(LifecycleEvent::new(
            uuid::Uuid::new_v4(),
            "detector",
            LifecycleEventKind::Deleted,
        ));
    }

    #[tokio::test]
    async fn log_events_returns_when_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(log_events(bus.subscribe()));
        bus.publish(LifecycleEvent::new(
            uuid::Uuid::new_v4(),
            "detector",
            LifecycleEventKind::Deployed,
        ));
        drop(bus);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("logger should stop")
            .expect("logger task");
    }

    #[test]
    fn event_serializes_kind_inline() {
        let event = LifecycleEvent::new(
            uuid::Uuid::nil(),
            "detector",
            LifecycleEventKind::StatusChanged {
                status: ModelStatus::Running,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "status_changed");
        assert_eq!(json["status"], "running");
        assert_eq!(json["model_name"], "detector");
    }
}
