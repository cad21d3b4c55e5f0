//! `LiveQueryManager` - owns every live subscription of the application.
//!
//! Each [`SubscriptionKey`] is either inactive or has exactly one active
//! registration. Starting an active key first closes and cancels the old
//! registration, then subscribes again, so two handles for the same key are
//! never live at once.
//!
//! Every delivery passes through a per-registration gate. Stopping a key
//! closes its gate before the source handle is cancelled, so a source that
//! keeps delivering for a moment after cancellation cannot reach the
//! subscriber. A delivery that already passed the gate when the key was
//! stopped can still complete; consumers that must be exact can compare
//! [`LiveQueryManager::generation`] against the generation they started.
//!
//! The key table is guarded by one mutex. The data source is never called, and
//! no handle is cancelled, while that mutex is held, so a source that delivers
//! synchronously from inside `subscribe` or `cancel` cannot deadlock the manager.

use crate::errors::SubscriptionError;
use crate::live::{
    decode::decode_batch,
    handlers::TripHandlers,
    key::{EntityKind, LiveQuery, SubscriptionKey},
    source::{CancellationHandle, DataSource, SnapshotSink, SourceEvent},
};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

/// Lets deliveries through until closed.
#[derive(Debug)]
struct DeliveryGate {
    generation: u64,
    open: AtomicBool,
}

impl DeliveryGate {
    const fn new(generation: u64) -> Self {
        Self {
            generation,
            open: AtomicBool::new(true),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

struct ActiveSubscription {
    gate: Arc<DeliveryGate>,
    handle: Box<dyn CancellationHandle>,
}

impl ActiveSubscription {
    fn shutdown(self, key: &SubscriptionKey) {
        self.gate.close();
        self.handle.cancel();
        debug!(
            "Stopped subscription {} (generation {})",
            key, self.gate.generation
        );
    }
}

#[derive(Default)]
struct Registry {
    active: BTreeMap<SubscriptionKey, ActiveSubscription>,
    generations: HashMap<SubscriptionKey, u64>,
}

impl Registry {
    fn next_generation(&mut self, key: &SubscriptionKey) -> u64 {
        let generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        *generation
    }
}

/// Registry of live subscriptions keyed by [`SubscriptionKey`].
///
/// Meant to be owned by one logical owner (a session or the application's
/// composition root) and shared by reference or `Arc`.
pub struct LiveQueryManager {
    source: Arc<dyn DataSource>,
    registry: Mutex<Registry>,
}

impl LiveQueryManager {
    /// Creates a manager over a data source.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            registry: Mutex::new(Registry::default()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // The table holds no invariants a panicking callback could break halfway.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts (or restarts) the subscription for `key`.
    ///
    /// Decoded snapshots go to `on_update`; undecodable records are logged and
    /// dropped. If the source refuses the query, `on_error` is called exactly
    /// once and the key stays inactive. Errors reported later by the source also
    /// go to `on_error` and leave the subscription in place.
    pub fn start<T, U, E>(
        &self,
        key: SubscriptionKey,
        query: &LiveQuery,
        on_update: U,
        on_error: E,
    ) where
        T: DeserializeOwned + 'static,
        U: Fn(Vec<T>) + Send + Sync + 'static,
        E: Fn(SubscriptionError) + Send + Sync + 'static,
    {
        let (previous, generation) = {
            let mut registry = self.registry();
            let previous = registry.active.remove(&key);
            (previous, registry.next_generation(&key))
        };
        if let Some(previous) = previous {
            debug!("Replacing active subscription {}", key);
            previous.shutdown(&key);
        }

        let gate = Arc::new(DeliveryGate::new(generation));
        let on_error: Arc<dyn Fn(SubscriptionError) + Send + Sync> = Arc::new(on_error);
        let sink = Self::gated_sink(
            key.clone(),
            Arc::clone(&gate),
            on_update,
            Arc::clone(&on_error),
        );

        match self.source.subscribe(query, sink) {
            Ok(handle) => {
                let subscription = ActiveSubscription { gate, handle };
                let displaced = {
                    let mut registry = self.registry();
                    if registry.generations.get(&key) == Some(&generation) {
                        registry.active.insert(key.clone(), subscription)
                    } else {
                        // A newer start for this key won the race; this one is already stale.
                        Some(subscription)
                    }
                };
                if let Some(displaced) = displaced {
                    displaced.shutdown(&key);
                }
                debug!("Started subscription {} (generation {})", key, generation);
            }
            Err(error) => {
                gate.close();
                warn!("Could not start subscription {}: {}", key, error);
                on_error(error);
            }
        }
    }

    fn gated_sink<T, U>(
        key: SubscriptionKey,
        gate: Arc<DeliveryGate>,
        on_update: U,
        on_error: Arc<dyn Fn(SubscriptionError) + Send + Sync>,
    ) -> SnapshotSink
    where
        T: DeserializeOwned + 'static,
        U: Fn(Vec<T>) + Send + Sync + 'static,
    {
        Arc::new(move |event: SourceEvent| {
            if !gate.is_open() {
                trace!(
                    "Discarding delivery for stopped subscription {} (generation {})",
                    key, gate.generation
                );
                return;
            }
            match event {
                Ok(documents) => {
                    trace!("{} documents on {}", documents.len(), key);
                    on_update(decode_batch::<T>(&key, documents));
                }
                Err(error) => {
                    warn!("Subscription {} reported an error: {}", key, error);
                    on_error(error);
                }
            }
        })
    }

    /// Stops the subscription for `key`. Stopping an inactive key does nothing.
    pub fn stop(&self, key: &SubscriptionKey) {
        let removed = self.registry().active.remove(key);
        if let Some(subscription) = removed {
            subscription.shutdown(key);
        }
    }

    /// Stops every active subscription, in key order.
    ///
    /// When this returns the key table is empty and every gate is closed.
    pub fn stop_all(&self) {
        let drained = std::mem::take(&mut self.registry().active);
        if drained.is_empty() {
            return;
        }
        info!("Stopping {} live subscriptions", drained.len());
        for (key, subscription) in drained {
            subscription.shutdown(&key);
        }
    }

    /// Replaces everything with the subscriptions of one trip: the trip itself,
    /// its categories, spending items and balances, plus one subscription per
    /// participant.
    ///
    /// Not atomic: each subscription that fails reports through
    /// `handlers.on_error` and the others keep running.
    pub fn start_all(&self, trip_id: &str, participant_ids: &[String], handlers: &TripHandlers) {
        self.stop_all();
        info!(
            "Starting live subscriptions for trip {} ({} participants)",
            trip_id,
            participant_ids.len()
        );

        let key = SubscriptionKey::new(EntityKind::Trip, trip_id);
        let on_trip = Arc::clone(&handlers.on_trip);
        let on_error = handlers.error_for(&key);
        self.start(
            key.clone(),
            &key.query(),
            move |trips| on_trip(trips),
            on_error,
        );

        let key = SubscriptionKey::new(EntityKind::Categories, trip_id);
        let on_categories = Arc::clone(&handlers.on_categories);
        let on_error = handlers.error_for(&key);
        self.start(
            key.clone(),
            &key.query(),
            move |categories| on_categories(categories),
            on_error,
        );

        let key = SubscriptionKey::new(EntityKind::SpendingItems, trip_id);
        let on_spending_items = Arc::clone(&handlers.on_spending_items);
        let on_error = handlers.error_for(&key);
        self.start(
            key.clone(),
            &key.query(),
            move |items| on_spending_items(items),
            on_error,
        );

        let key = SubscriptionKey::new(EntityKind::Balances, trip_id);
        let on_balances = Arc::clone(&handlers.on_balances);
        let on_error = handlers.error_for(&key);
        self.start(
            key.clone(),
            &key.query(),
            move |balances| on_balances(balances),
            on_error,
        );

        for user_id in participant_ids {
            let key = SubscriptionKey::new(EntityKind::Participant(user_id.clone()), trip_id);
            let on_participant = Arc::clone(&handlers.on_participant);
            let on_error = handlers.error_for(&key);
            let user_id = user_id.clone();
            self.start(
                key.clone(),
                &key.query(),
                move |participants| on_participant(&user_id, participants),
                on_error,
            );
        }
    }

    /// Whether `key` currently has an active registration.
    #[must_use]
    pub fn is_active(&self, key: &SubscriptionKey) -> bool {
        self.registry().active.contains_key(key)
    }

    /// Active keys in key order.
    #[must_use]
    pub fn active_keys(&self) -> Vec<SubscriptionKey> {
        self.registry().active.keys().cloned().collect()
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry().active.len()
    }

    /// Latest generation issued for `key` (bumped on every start), if it was ever started.
    #[must_use]
    pub fn generation(&self, key: &SubscriptionKey) -> Option<u64> {
        self.registry().generations.get(key).copied()
    }
}

impl Drop for LiveQueryManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for LiveQueryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQueryManager")
            .field("active", &self.active_keys())
            .finish_non_exhaustive()
    }
}
