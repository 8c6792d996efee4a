//! Event sink trait for publishing domain events.

use async_trait::async_trait;

use crate::events::DomainEvent;

/// Destination for domain events (logs, alerting, in-process subscribers).
///
/// Emission is fire-and-forget: a sink that cannot deliver an event must
/// not fail the operation that raised it.
#[async_trait]
pub trait EventSink: Send + Sync + std::fmt::Debug + 'static {
    /// Publish an event.
    async fn emit(&self, event: DomainEvent);
}
