//! Domain events emitted by the job queue and its handlers.
//!
//! Events are handed to an [`EventSink`](crate::traits::events::EventSink)
//! and consumed by logging, alerting, and any subscriber of the broadcast
//! sink.

pub mod queue;
pub mod signature;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use queue::QueueEvent;
pub use signature::SignatureEvent;

/// Wrapper for all domain events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub payload: EventPayload,
}

/// Union of all domain event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event")]
pub enum EventPayload {
    /// A queue bookkeeping event.
    Queue(QueueEvent),
    /// An e-signature workflow event.
    Signature(SignatureEvent),
}

impl DomainEvent {
    /// Create a new domain event.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Dotted event name, e.g. `queue.job_dead_lettered`.
    pub fn name(&self) -> &'static str {
        match &self.payload {
            EventPayload::Queue(event) => event.name(),
            EventPayload::Signature(event) => event.name(),
        }
    }
}

impl From<QueueEvent> for DomainEvent {
    fn from(event: QueueEvent) -> Self {
        Self::new(EventPayload::Queue(event))
    }
}

impl From<SignatureEvent> for DomainEvent {
    fn from(event: SignatureEvent) -> Self {
        Self::new(EventPayload::Signature(event))
    }
}
