//! The external, push-capable data source seen by the subscription manager.
//!
//! A source accepts a [`LiveQuery`] and a sink, and keeps calling the sink with
//! the full set of matching documents every time that set changes, until the
//! returned [`CancellationHandle`] is cancelled. Deliveries for one subscription
//! must arrive in the order the source produced them; deliveries for different
//! subscriptions may interleave freely.

use crate::errors::SubscriptionError;
use crate::live::key::LiveQuery;
use serde_json::Value;
use std::sync::Arc;

/// A schema-less document as delivered by the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id, unique within its collection
    pub id: String,
    /// Document body
    pub data: Value,
}

impl Document {
    /// Creates a document.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// One delivery: a complete snapshot of matching documents, or an error.
pub type SourceEvent = std::result::Result<Vec<Document>, SubscriptionError>;

/// Callback a source invokes for every delivery.
pub type SnapshotSink = Arc<dyn Fn(SourceEvent) + Send + Sync>;

/// Stops a subscription. Consuming `self` makes double cancellation impossible.
pub trait CancellationHandle: Send {
    /// Asks the source to stop delivering. Best effort: a delivery already handed
    /// to the sink's executor may still run.
    fn cancel(self: Box<Self>);
}

/// Capability to open live queries.
pub trait DataSource: Send + Sync {
    /// Opens a live query.
    ///
    /// Must not block on network I/O: the source registers the request and returns.
    ///
    /// # Errors
    /// Returns a `SubscriptionError` if the query cannot be registered at all.
    fn subscribe(
        &self,
        query: &LiveQuery,
        sink: SnapshotSink,
    ) -> Result<Box<dyn CancellationHandle>, SubscriptionError>;
}
