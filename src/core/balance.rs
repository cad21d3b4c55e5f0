//! Balance business logic - Recomputes who owes what for a trip.
//!
//! Each unsettled spending item credits its payer with the full amount and debits
//! every participant with an equal share, so the resulting map always sums to
//! zero. A new snapshot row is written on every recompute; the newest unsettled
//! snapshot is the trip's current balance.

use crate::{
    entities::{Balance, SpendingItem, balance, spending_item},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Computes signed per-user balances from a trip's spending items.
///
/// Settled items are ignored. Items without participants cannot be split and are
/// skipped with a warning. The payer does not need to be one of the participants.
#[must_use]
pub fn compute_balances(items: &[spending_item::Model]) -> BTreeMap<String, f64> {
    let mut balances: BTreeMap<String, f64> = BTreeMap::new();

    for item in items.iter().filter(|item| !item.settled) {
        let participants = item.participant_list();
        if participants.is_empty() {
            warn!(
                "Spending item {} has no participants, leaving it out of the balance",
                item.id
            );
            continue;
        }

        #[allow(clippy::cast_precision_loss)]
        let share = item.amount / participants.len() as f64;

        *balances.entry(item.spent_by_user_id.clone()).or_default() += item.amount;
        for participant in participants {
            *balances.entry(participant).or_default() -= share;
        }
    }

    balances
}

/// Recomputes the trip's balance from its spending items and stores a new snapshot.
///
/// Generic over the connection so it can run inside the same database transaction
/// as the spending item change that triggered it.
pub async fn recompute_trip_balance<C>(db: &C, trip_id: &str) -> Result<balance::Model>
where
    C: ConnectionTrait,
{
    let items = SpendingItem::find()
        .filter(spending_item::Column::TravelId.eq(trip_id))
        .order_by_asc(spending_item::Column::Id)
        .all(db)
        .await?;

    let balances = compute_balances(&items);
    let item_ids: Vec<i64> = items
        .iter()
        .filter(|item| !item.settled)
        .map(|item| item.id)
        .collect();

    debug!(
        "Recomputed balance for trip {} from {} items: {:?}",
        trip_id,
        item_ids.len(),
        balances
    );

    let snapshot = balance::ActiveModel {
        travel_id: Set(trip_id.to_string()),
        item_ids: Set(serde_json::to_value(&item_ids)?),
        balances: Set(serde_json::to_value(&balances)?),
        settled: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    snapshot.insert(db).await.map_err(Into::into)
}

/// Retrieves the newest balance snapshot for a trip, settled or not.
pub async fn latest_balance<C>(db: &C, trip_id: &str) -> Result<Option<balance::Model>>
where
    C: ConnectionTrait,
{
    Balance::find()
        .filter(balance::Column::TravelId.eq(trip_id))
        .order_by_desc(balance::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every balance snapshot of a trip, oldest first.
pub async fn get_balances_for_trip<C>(db: &C, trip_id: &str) -> Result<Vec<balance::Model>>
where
    C: ConnectionTrait,
{
    Balance::find()
        .filter(balance::Column::TravelId.eq(trip_id))
        .order_by_asc(balance::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks the trip as settled: every unsettled spending item and the newest
/// snapshot are flagged, then a fresh (empty) snapshot is written so the
/// current balance reflects that nobody owes anything.
///
/// Returns the fresh snapshot.
pub async fn settle_trip(db: &DatabaseConnection, trip_id: &str) -> Result<balance::Model> {
    let txn = db.begin().await?;

    let latest = latest_balance(&txn, trip_id)
        .await?
        .ok_or_else(|| Error::Validation {
            message: format!("trip {trip_id} has no balance to settle"),
        })?;

    SpendingItem::update_many()
        .col_expr(spending_item::Column::Settled, Expr::value(true))
        .filter(spending_item::Column::TravelId.eq(trip_id))
        .filter(spending_item::Column::Settled.eq(false))
        .exec(&txn)
        .await?;

    let mut settled: balance::ActiveModel = latest.into();
    settled.settled = Set(true);
    settled.update(&txn).await?;

    let fresh = recompute_trip_balance(&txn, trip_id).await?;
    txn.commit().await?;

    info!("Trip {} settled", trip_id);
    Ok(fresh)
}
