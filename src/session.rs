//! Trip session - the live view of one trip and its settlement plan.
//!
//! A [`TripSession`] owns the subscriptions of one trip through an explicitly
//! passed [`LiveQueryManager`] and folds every delivery into a shared
//! [`TripState`]. Whenever the balance snapshots change, the newest unsettled
//! snapshot is classified and turned into a settlement plan.

use crate::{
    core::settlement::{
        self, DEFAULT_EPSILON, ParticipantStanding, Transaction, classify_participants_with_epsilon,
    },
    entities::{balance, category, participant, spending_item, trip},
    errors::Result,
    live::{LiveQueryManager, SubscriptionKey, TripHandlers},
};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Everything known about a trip from its live subscriptions.
#[derive(Debug, Clone, Default)]
pub struct TripState {
    /// The trip document, once delivered
    pub trip: Option<trip::Model>,
    /// Categories ordered by id
    pub categories: Vec<category::Model>,
    /// Spending items ordered by id
    pub spending_items: Vec<spending_item::Model>,
    /// Newest unsettled balance snapshot
    pub current_balance: Option<balance::Model>,
    /// Participants by user id
    pub participants: BTreeMap<String, participant::Model>,
    /// Standings derived from `current_balance`
    pub standings: Vec<ParticipantStanding>,
    /// Settlement plan derived from `current_balance`
    pub plan: Vec<Transaction>,
    /// Most recent subscription or settlement failure
    pub last_error: Option<String>,
}

/// Live session for one trip.
#[derive(Debug)]
pub struct TripSession {
    trip_id: String,
    epsilon: f64,
    manager: Arc<LiveQueryManager>,
    state: Arc<RwLock<TripState>>,
    changes: Arc<watch::Sender<u64>>,
}

impl TripSession {
    /// Creates a stopped session using [`DEFAULT_EPSILON`].
    pub fn new(trip_id: impl Into<String>, manager: Arc<LiveQueryManager>) -> Self {
        Self::with_epsilon(trip_id, manager, DEFAULT_EPSILON)
    }

    /// Creates a stopped session with a custom currency tolerance.
    pub fn with_epsilon(
        trip_id: impl Into<String>,
        manager: Arc<LiveQueryManager>,
        epsilon: f64,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            trip_id: trip_id.into(),
            epsilon,
            manager,
            state: Arc::new(RwLock::new(TripState::default())),
            changes: Arc::new(changes),
        }
    }

    /// Trip this session follows.
    #[must_use]
    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Subscribes to the trip and the given participants, replacing whatever the
    /// manager was running before. State from a previous start is cleared.
    pub fn start(&self, participant_ids: &[String]) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = TripState::default();
        info!(
            "Starting session for trip {} with {} participants",
            self.trip_id,
            participant_ids.len()
        );
        let handlers = self.handlers();
        self.manager.start_all(&self.trip_id, participant_ids, &handlers);
    }

    /// Stops every subscription of the session.
    pub fn stop(&self) {
        self.manager.stop_all();
        info!("Stopped session for trip {}", self.trip_id);
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> TripState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current settlement plan.
    #[must_use]
    pub fn settlement(&self) -> Vec<Transaction> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .plan
            .clone()
    }

    /// Current standings, creditors first.
    #[must_use]
    pub fn standings(&self) -> Vec<ParticipantStanding> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .standings
            .clone()
    }

    /// Waits until the state satisfies `predicate` and returns it.
    ///
    /// Does not time out on its own; wrap it in `tokio::time::timeout`.
    pub async fn wait_for<F>(&self, predicate: F) -> TripState
    where
        F: Fn(&TripState) -> bool,
    {
        let mut changes = self.changes.subscribe();
        loop {
            let state = self.snapshot();
            if predicate(&state) {
                return state;
            }
            if changes.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    fn handlers(&self) -> TripHandlers {
        let epsilon = self.epsilon;
        TripHandlers::new()
            .on_trip(self.updater(|state, trips: Vec<trip::Model>| {
                state.trip = trips.into_iter().next();
            }))
            .on_categories(self.updater(|state, mut categories: Vec<category::Model>| {
                categories.sort_by_key(|c| c.id);
                state.categories = categories;
            }))
            .on_spending_items(self.updater(|state, mut items: Vec<spending_item::Model>| {
                items.sort_by_key(|i| i.id);
                state.spending_items = items;
            }))
            .on_balances(self.updater(move |state, snapshots: Vec<balance::Model>| {
                apply_balances(state, snapshots, epsilon);
            }))
            .on_participant({
                let state = Arc::clone(&self.state);
                let changes = Arc::clone(&self.changes);
                move |user_id: &str, participants: Vec<participant::Model>| {
                    {
                        let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
                        match participants.into_iter().next() {
                            Some(participant) => {
                                state.participants.insert(user_id.to_string(), participant);
                            }
                            None => {
                                state.participants.remove(user_id);
                            }
                        }
                    }
                    changes.send_modify(|n| *n += 1);
                }
            })
            .on_error({
                let state = Arc::clone(&self.state);
                let changes = Arc::clone(&self.changes);
                move |key: &SubscriptionKey, err| {
                    state
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .last_error = Some(format!("{key}: {err}"));
                    changes.send_modify(|n| *n += 1);
                }
            })
    }

    /// Wraps a state mutation into an update callback that also signals waiters.
    fn updater<T, F>(&self, apply: F) -> impl Fn(Vec<T>) + Send + Sync + use<T, F>
    where
        T: 'static,
        F: Fn(&mut TripState, Vec<T>) + Send + Sync + 'static,
    {
        let state = Arc::clone(&self.state);
        let changes = Arc::clone(&self.changes);
        move |batch| {
            apply(
                &mut *state.write().unwrap_or_else(PoisonError::into_inner),
                batch,
            );
            changes.send_modify(|n| *n += 1);
        }
    }
}

/// Picks the newest unsettled snapshot and recomputes standings and plan from it.
fn apply_balances(state: &mut TripState, snapshots: Vec<balance::Model>, epsilon: f64) {
    state.current_balance = snapshots
        .into_iter()
        .filter(|snapshot| !snapshot.settled)
        .max_by_key(|snapshot| snapshot.id);

    let Some(current) = &state.current_balance else {
        debug!("No unsettled balance snapshot, nothing to settle");
        state.standings.clear();
        state.plan.clear();
        return;
    };

    match plan_for(current, epsilon) {
        Ok((standings, plan)) => {
            debug!(
                "Balance snapshot {} gives {} payments",
                current.id,
                plan.len()
            );
            state.standings = standings;
            state.plan = plan;
        }
        Err(e) => {
            error!("Cannot settle balance snapshot {}: {}", current.id, e);
            state.standings.clear();
            state.plan.clear();
            state.last_error = Some(e.to_string());
        }
    }
}

fn plan_for(
    snapshot: &balance::Model,
    epsilon: f64,
) -> Result<(Vec<ParticipantStanding>, Vec<Transaction>)> {
    let balances = snapshot.balance_map().inspect_err(|e| {
        warn!("Balance snapshot {} is malformed: {}", snapshot.id, e);
    })?;
    let standings = classify_participants_with_epsilon(&balances, epsilon);
    let plan = settlement::compute_settlement_plan_with_epsilon(&balances, epsilon)?;
    Ok((standings, plan))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::settlement::Role;
    use crate::live::{Document, EntityKind, MemorySource, key::BALANCES, key::PARTICIPANTS};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn balance_doc(id: i64, settled: bool, balances: serde_json::Value) -> Document {
        Document::new(
            id.to_string(),
            json!({
                "id": id,
                "travel_id": "trip1",
                "item_ids": [],
                "balances": balances,
                "settled": settled,
                "created_at": "2026-01-01T00:00:00Z",
            }),
        )
    }

    fn session_over(source: &MemorySource) -> TripSession {
        let manager = Arc::new(LiveQueryManager::new(Arc::new(source.clone())));
        TripSession::new("trip1", manager)
    }

    async fn wait<F: Fn(&TripState) -> bool>(session: &TripSession, predicate: F) -> TripState {
        timeout(Duration::from_secs(2), session.wait_for(predicate))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_plan_follows_balances() {
        let source = MemorySource::new();
        source.upsert(BALANCES, balance_doc(1, false, json!({"ana": 30.0, "ben": -30.0})));
        let session = session_over(&source);
        session.start(&[]);

        let state = wait(&session, |s| !s.plan.is_empty()).await;
        assert_eq!(
            state.plan,
            vec![Transaction {
                debtor_id: "ben".to_string(),
                creditor_id: "ana".to_string(),
                amount: 30.0,
            }]
        );
        assert_eq!(state.standings[0].role, Role::Creditor);
        assert_eq!(state.standings[1].role, Role::Debtor);

        source.upsert(BALANCES, balance_doc(2, false, json!({"ana": 0.0, "ben": 0.0})));
        let state = wait(&session, |s| s.plan.is_empty()).await;
        assert_eq!(state.current_balance.unwrap().id, 2);
        assert!(session.settlement().is_empty());
    }

    #[tokio::test]
    async fn test_newest_unsettled_snapshot_wins() {
        let source = MemorySource::new();
        source.upsert(BALANCES, balance_doc(1, false, json!({"ana": 10.0, "ben": -10.0})));
        source.upsert(BALANCES, balance_doc(3, false, json!({"ana": 5.0, "ben": -5.0})));
        source.upsert(BALANCES, balance_doc(4, true, json!({"ana": 7.0, "ben": -7.0})));
        let session = session_over(&source);
        session.start(&[]);

        let state = wait(&session, |s| s.current_balance.is_some()).await;
        assert_eq!(state.current_balance.as_ref().unwrap().id, 3);
        assert_eq!(state.plan[0].amount, 5.0);
    }

    #[tokio::test]
    async fn test_unbalanced_snapshot_is_recorded() {
        let source = MemorySource::new();
        source.upsert(BALANCES, balance_doc(1, false, json!({"ana": 10.0, "ben": -5.0})));
        let session = session_over(&source);
        session.start(&[]);

        let state = wait(&session, |s| s.last_error.is_some()).await;
        assert!(state.plan.is_empty());
        assert!(state.last_error.unwrap().contains("sum"));
    }

    #[tokio::test]
    async fn test_participants_and_stop() {
        let source = MemorySource::new();
        source.upsert(
            PARTICIPANTS,
            Document::new(
                "trip1:ana",
                json!({"id": 1, "travel_id": "trip1", "user_id": "ana", "display_name": "Ana"}),
            ),
        );
        let session = session_over(&source);
        session.start(&["ana".to_string(), "ben".to_string()]);

        let state = wait(&session, |s| s.participants.contains_key("ana")).await;
        assert_eq!(state.participants["ana"].display_name, "Ana");
        assert!(!state.participants.contains_key("ben"));
        assert_eq!(source.watcher_count(), 6);

        session.stop();
        assert_eq!(source.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_subscription_is_recorded() {
        let source = MemorySource::new();
        source.reject_collection(
            EntityKind::Categories.collection(),
            "permission denied",
        );
        let session = session_over(&source);
        session.start(&[]);

        let state = session.snapshot();
        assert!(state.last_error.unwrap().starts_with("cat:trip1"));
    }
}
