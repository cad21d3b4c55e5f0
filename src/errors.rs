//! Unified error types and result handling.
//!
//! Synchronous failures (validation, unbalanced settlement input, database errors)
//! are returned as [`Error`]. Live-query failures travel through subscription
//! callbacks as [`SubscriptionError`] and never cross the async boundary as a
//! returned error. [`DecodeError`] is per record and is swallowed at batch level.

use thiserror::Error;

/// Errors raised by the ledger, the settlement engine and configuration loading.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read, parsed or validated
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON column or document could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Amount is zero, negative where it must be positive, or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Balances handed to the settlement engine do not sum to zero
    #[error("Balances do not sum to zero (sum {sum}, epsilon {epsilon})")]
    UnbalancedInput {
        /// Actual sum of the input balances
        sum: f64,
        /// Tolerance that was exceeded
        epsilon: f64,
    },

    /// No trip with this id
    #[error("Trip not found: {id}")]
    TripNotFound {
        /// Trip id
        id: String,
    },

    /// No category with this id, or it belongs to another trip
    #[error("Category not found: {id}")]
    CategoryNotFound {
        /// Category id
        id: i64,
    },

    /// No spending item with this id
    #[error("Spending item not found: {id}")]
    SpendingItemNotFound {
        /// Spending item id
        id: i64,
    },

    /// Input rejected by a business rule
    #[error("Validation error: {message}")]
    Validation {
        /// Rule that was violated
        message: String,
    },

    /// A live subscription could not be established
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
}

/// Failures of the external live data source, delivered through `on_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The data source cannot accept subscriptions right now (no runtime, shut down)
    #[error("data source unavailable: {message}")]
    Unavailable {
        /// Reason
        message: String,
    },

    /// The data source refused the query (permission, malformed filter)
    #[error("subscription to '{collection}' rejected: {message}")]
    Rejected {
        /// Collection the query targeted
        collection: String,
        /// Reason given by the source
        message: String,
    },

    /// A previously established subscription reported an error
    #[error("transient data source error: {message}")]
    Transient {
        /// Reason given by the source
        message: String,
    },
}

/// A single delivered document could not be mapped onto its entity type.
#[derive(Debug, Error)]
#[error("failed to decode document '{document_id}': {source}")]
pub struct DecodeError {
    /// Id of the offending document
    pub document_id: String,
    /// Underlying serde failure
    #[source]
    pub source: serde_json::Error,
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
