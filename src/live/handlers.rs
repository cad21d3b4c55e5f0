//! Typed callbacks for the per-trip subscription bundle started by
//! [`LiveQueryManager::start_all`](crate::live::manager::LiveQueryManager::start_all).
//!
//! # Example
//!
//! ```rust
//! use travel_buddy::live::TripHandlers;
//!
//! let handlers = TripHandlers::new()
//!     .on_balances(|snapshots| {
//!         println!("{} balance snapshots", snapshots.len());
//!     })
//!     .on_error(|key, error| {
//!         eprintln!("{key}: {error}");
//!     });
//! # let _ = handlers;
//! ```

use crate::entities::{balance, category, participant, spending_item, trip};
use crate::errors::SubscriptionError;
use crate::live::key::SubscriptionKey;
use std::sync::Arc;

/// Callback receiving a decoded snapshot.
pub type UpdateCallback<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;

/// Callback receiving one participant's snapshot, with the user id it was keyed by.
pub type ParticipantCallback = Arc<dyn Fn(&str, Vec<participant::Model>) + Send + Sync>;

/// Callback receiving a subscription failure for a key.
pub type KeyedErrorCallback = Arc<dyn Fn(&SubscriptionKey, SubscriptionError) + Send + Sync>;

/// One callback per entity kind plus a shared error callback. Unset callbacks do nothing.
#[derive(Clone)]
pub struct TripHandlers {
    pub(crate) on_trip: UpdateCallback<trip::Model>,
    pub(crate) on_categories: UpdateCallback<category::Model>,
    pub(crate) on_spending_items: UpdateCallback<spending_item::Model>,
    pub(crate) on_balances: UpdateCallback<balance::Model>,
    pub(crate) on_participant: ParticipantCallback,
    pub(crate) on_error: KeyedErrorCallback,
}

impl Default for TripHandlers {
    fn default() -> Self {
        Self {
            on_trip: Arc::new(|_| {}),
            on_categories: Arc::new(|_| {}),
            on_spending_items: Arc::new(|_| {}),
            on_balances: Arc::new(|_| {}),
            on_participant: Arc::new(|_, _| {}),
            on_error: Arc::new(|_, _| {}),
        }
    }
}

impl TripHandlers {
    /// Handlers that ignore everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the trip document (zero or one element).
    #[must_use]
    pub fn on_trip<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<trip::Model>) + Send + Sync + 'static,
    {
        self.on_trip = Arc::new(f);
        self
    }

    /// Called with all categories of the trip.
    #[must_use]
    pub fn on_categories<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<category::Model>) + Send + Sync + 'static,
    {
        self.on_categories = Arc::new(f);
        self
    }

    /// Called with all spending items of the trip.
    #[must_use]
    pub fn on_spending_items<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<spending_item::Model>) + Send + Sync + 'static,
    {
        self.on_spending_items = Arc::new(f);
        self
    }

    /// Called with all balance snapshots of the trip.
    #[must_use]
    pub fn on_balances<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<balance::Model>) + Send + Sync + 'static,
    {
        self.on_balances = Arc::new(f);
        self
    }

    /// Called with one participant's documents.
    #[must_use]
    pub fn on_participant<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Vec<participant::Model>) + Send + Sync + 'static,
    {
        self.on_participant = Arc::new(f);
        self
    }

    /// Called when any subscription of the bundle fails.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionKey, SubscriptionError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(f);
        self
    }

    /// Error callback bound to one key, in the shape `start` expects.
    pub(crate) fn error_for(
        &self,
        key: &SubscriptionKey,
    ) -> impl Fn(SubscriptionError) + Send + Sync + use<> {
        let on_error = Arc::clone(&self.on_error);
        let key = key.clone();
        move |error| on_error(&key, error)
    }
}

impl std::fmt::Debug for TripHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripHandlers").finish_non_exhaustive()
    }
}
