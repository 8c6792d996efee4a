//! Event sink implementations.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing;

use formflow_core::events::{DomainEvent, EventPayload, QueueEvent};
use formflow_core::traits::events::EventSink;

/// Writes every event to the log. Dead letters are logged at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: DomainEvent) {
        let payload = serde_json::to_string(&event.payload).unwrap_or_default();
        match &event.payload {
            EventPayload::Queue(QueueEvent::JobDeadLettered { .. }) => {
                tracing::error!(event_id = %event.id, event = event.name(), %payload, "Domain event");
            }
            _ => {
                tracing::info!(event_id = %event.id, event = event.name(), %payload, "Domain event");
            }
        }
    }
}

/// In-process fan-out over a tokio broadcast channel.
///
/// Events emitted while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventSink {
    /// Create a sink buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();

        sink.emit(QueueEvent::JobsPurged { count: 4 }.into()).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "queue.jobs_purged");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let sink = BroadcastEventSink::new(8);
        sink.emit(QueueEvent::StaleJobsRecovered { count: 1 }.into())
            .await;
        TracingEventSink
            .emit(QueueEvent::StaleJobsRecovered { count: 1 }.into())
            .await;
    }
}
