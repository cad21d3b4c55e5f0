//! Live layer - Keeps typed snapshots of a trip in sync with a push-capable
//! document source.
//!
//! [`LiveQueryManager`] owns the subscriptions, [`DataSource`] is the seam to
//! whatever delivers documents, and [`MemorySource`] plus [`LedgerFeed`] wire the
//! SQLite ledger into that seam for local runs and tests.

/// Republishing ledger rows as documents
pub mod feed;

/// Callback bundle for a trip's subscriptions
pub mod handlers;

/// Subscription keys and live queries
pub mod key;

/// Subscription registry
pub mod manager;

/// In-memory data source
pub mod memory;

/// Mapping documents onto entities
pub mod decode;

/// Data-source capability
pub mod source;

pub use feed::LedgerFeed;
pub use handlers::TripHandlers;
pub use key::{EntityKind, LiveQuery, SubscriptionKey};
pub use manager::LiveQueryManager;
pub use memory::MemorySource;
pub use source::{CancellationHandle, DataSource, Document, SnapshotSink};
