use chrono::{DateTime, Utc};

/// A domain event emitted by an aggregate.
///
/// Events are immutable facts. The orchestrator logs them by `event_type` and
/// derives audit entries from them; they are not stored as a stream.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "purchasing.transaction.leg_delivered").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
