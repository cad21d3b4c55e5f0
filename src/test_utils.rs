//! Shared test utilities for `travel-buddy`.
//!
//! This module provides common helper functions for setting up test databases,
//! creating ledger rows with sensible defaults, and a hand-driven data source
//! for exercising the subscription manager without a runtime.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{category, spending, trip},
    entities,
    errors::{Result, SubscriptionError},
    live::{
        key::LiveQuery,
        source::{CancellationHandle, DataSource, SnapshotSink, SourceEvent},
    },
};
use sea_orm::DatabaseConnection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Sets up a database holding one trip with id `"trip1"`.
pub async fn setup_with_trip() -> Result<(DatabaseConnection, entities::trip::Model)> {
    let db = setup_test_db().await?;
    let trip = trip::create_trip(&db, "trip1", "Test Trip").await?;
    Ok((db, trip))
}

/// Sets up a trip with a "Food" category.
/// Returns (db, trip, category) for spending-related tests.
pub async fn setup_with_category() -> Result<(
    DatabaseConnection,
    entities::trip::Model,
    entities::category::Model,
)> {
    let (db, trip) = setup_with_trip().await?;
    let category = create_test_category(&db, &trip.id, "Food").await?;
    Ok((db, trip, category))
}

/// Creates a test category.
///
/// # Defaults
/// * `emoji`: "🧳"
/// * `budget`: 100.0
pub async fn create_test_category(
    db: &DatabaseConnection,
    trip_id: &str,
    name: &str,
) -> Result<entities::category::Model> {
    category::create_category(db, trip_id, name, "🧳", 100.0).await
}

/// Builds spending item input; the payer also records it.
pub fn new_item(
    trip_id: &str,
    category_id: i64,
    amount: f64,
    payer: &str,
    participants: &[&str],
) -> spending::NewSpendingItem {
    spending::NewSpendingItem {
        trip_id: trip_id.to_string(),
        category_id,
        amount,
        description: "Test expense".to_string(),
        date: None,
        spent_by_user_id: payer.to_string(),
        added_by_user_id: payer.to_string(),
        participant_ids: participants.iter().map(ToString::to_string).collect(),
        receipt_url: None,
    }
}

/// Records a test spending item split evenly between `participants`.
pub async fn create_test_spending_item(
    db: &DatabaseConnection,
    trip_id: &str,
    category_id: i64,
    amount: f64,
    payer: &str,
    participants: &[&str],
) -> Result<entities::spending_item::Model> {
    spending::create_spending_item(db, new_item(trip_id, category_id, amount, payer, participants))
        .await
}

/// One subscription opened on a [`ManualSource`].
pub struct ManualSubscription {
    /// Query it was opened with
    pub query: LiveQuery,
    sink: SnapshotSink,
    cancelled: Arc<AtomicUsize>,
}

/// Data source driven by hand: records every subscribe and delivers only
/// when told to, on the calling thread.
#[derive(Default)]
pub struct ManualSource {
    subscriptions: Mutex<Vec<ManualSubscription>>,
    reject_next: Mutex<Option<SubscriptionError>>,
}

impl ManualSource {
    /// Creates a source with no subscriptions.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next subscribe fail with `error`.
    pub fn reject_next(&self, error: SubscriptionError) {
        *self.reject_next.lock().unwrap() = Some(error);
    }

    /// Number of successful subscribes so far.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// How many times the `index`-th subscription was cancelled.
    pub fn cancel_count(&self, index: usize) -> usize {
        self.subscriptions.lock().unwrap()[index]
            .cancelled
            .load(Ordering::SeqCst)
    }

    /// Query of the `index`-th subscription.
    pub fn query(&self, index: usize) -> LiveQuery {
        self.subscriptions.lock().unwrap()[index].query.clone()
    }

    /// Pushes an event into the `index`-th subscription's sink, cancelled or not.
    pub fn deliver(&self, index: usize, event: SourceEvent) {
        let sink = Arc::clone(&self.subscriptions.lock().unwrap()[index].sink);
        sink(event);
    }
}

impl DataSource for ManualSource {
    fn subscribe(
        &self,
        query: &LiveQuery,
        sink: SnapshotSink,
    ) -> std::result::Result<Box<dyn CancellationHandle>, SubscriptionError> {
        if let Some(error) = self.reject_next.lock().unwrap().take() {
            return Err(error);
        }
        let cancelled = Arc::new(AtomicUsize::new(0));
        self.subscriptions.lock().unwrap().push(ManualSubscription {
            query: query.clone(),
            sink,
            cancelled: Arc::clone(&cancelled),
        });
        Ok(Box::new(ManualHandle { cancelled }))
    }
}

struct ManualHandle {
    cancelled: Arc<AtomicUsize>,
}

impl CancellationHandle for ManualHandle {
    fn cancel(self: Box<Self>) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}
