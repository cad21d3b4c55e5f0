//! Spending item business logic - Recording, editing and deleting expenses.
//!
//! Every change runs inside a single database transaction that also keeps the
//! owning category's item list in order and writes a fresh balance snapshot for
//! the trip, so the ledger never shows an expense without its effect on who
//! owes whom.

use crate::{
    core::{balance::recompute_trip_balance, category},
    entities::{SpendingItem, spending_item},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Input for [`create_spending_item`].
#[derive(Debug, Clone)]
pub struct NewSpendingItem {
    /// Trip the expense belongs to
    pub trip_id: String,
    /// Category to file it under; must belong to the same trip
    pub category_id: i64,
    /// Amount paid, must be positive and finite
    pub amount: f64,
    /// What the money was spent on
    pub description: String,
    /// When it happened; defaults to now
    pub date: Option<DateTime<Utc>>,
    /// User who paid
    pub spent_by_user_id: String,
    /// User who recorded the expense
    pub added_by_user_id: String,
    /// Users sharing the cost; must not be empty
    pub participant_ids: Vec<String>,
    /// Optional receipt reference
    pub receipt_url: Option<String>,
}

/// Changes applied by [`update_spending_item`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SpendingItemUpdate {
    /// New amount
    pub amount: Option<f64>,
    /// New description
    pub description: Option<String>,
    /// New payer
    pub spent_by_user_id: Option<String>,
    /// New participant list
    pub participant_ids: Option<Vec<String>>,
    /// New category (moves the item between category lists)
    pub category_id: Option<i64>,
}

fn validate_amount(amount: f64) -> Result<()> {
    if amount <= 0.0 || !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

fn validate_participants(participant_ids: &[String]) -> Result<()> {
    if participant_ids.is_empty() || participant_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(Error::Validation {
            message: "A spending item needs at least one participant".to_string(),
        });
    }
    Ok(())
}

fn validate_payer(payer: &str) -> Result<()> {
    if payer.trim().is_empty() {
        return Err(Error::Validation {
            message: "A spending item needs a payer".to_string(),
        });
    }
    Ok(())
}

/// Deduplicates participant ids while keeping the first-seen order.
fn normalize_participants(participant_ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    participant_ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Records a new expense, appends it to its category and recomputes the trip balance.
pub async fn create_spending_item(
    db: &DatabaseConnection,
    new_item: NewSpendingItem,
) -> Result<spending_item::Model> {
    validate_amount(new_item.amount)?;
    validate_participants(&new_item.participant_ids)?;
    validate_payer(&new_item.spent_by_user_id)?;

    let txn = db.begin().await?;

    let owning_category = category::get_category_by_id(&txn, new_item.category_id)
        .await?
        .filter(|c| c.travel_id == new_item.trip_id)
        .ok_or(Error::CategoryNotFound {
            id: new_item.category_id,
        })?;

    let participants = normalize_participants(new_item.participant_ids);
    let model = spending_item::ActiveModel {
        travel_id: Set(new_item.trip_id.clone()),
        category_id: Set(new_item.category_id),
        amount: Set(new_item.amount),
        description: Set(new_item.description.trim().to_string()),
        date: Set(new_item.date.unwrap_or_else(Utc::now)),
        spent_by_user_id: Set(new_item.spent_by_user_id.trim().to_string()),
        added_by_user_id: Set(new_item.added_by_user_id.trim().to_string()),
        participant_ids: Set(serde_json::to_value(&participants)?),
        receipt_url: Set(new_item.receipt_url),
        settled: Set(false),
        ..Default::default()
    };
    let created = model.insert(&txn).await?;

    let mut item_ids = owning_category.item_id_list();
    item_ids.push(created.id);
    category::set_item_ids(&txn, owning_category, &item_ids).await?;

    recompute_trip_balance(&txn, &new_item.trip_id).await?;
    txn.commit().await?;

    info!(
        "Recorded spending item {} ({}) for trip {}",
        created.id, created.amount, created.travel_id
    );
    Ok(created)
}

/// Edits an expense in place and recomputes the trip balance.
///
/// Moving an item to another category removes it from the old category's list
/// and appends it to the new one.
pub async fn update_spending_item(
    db: &DatabaseConnection,
    item_id: i64,
    update: SpendingItemUpdate,
) -> Result<spending_item::Model> {
    if let Some(amount) = update.amount {
        validate_amount(amount)?;
    }
    if let Some(participants) = &update.participant_ids {
        validate_participants(participants)?;
    }
    if let Some(payer) = &update.spent_by_user_id {
        validate_payer(payer)?;
    }

    let txn = db.begin().await?;

    let existing = SpendingItem::find_by_id(item_id)
        .one(&txn)
        .await?
        .ok_or(Error::SpendingItemNotFound { id: item_id })?;
    let trip_id = existing.travel_id.clone();
    let previous_category_id = existing.category_id;

    if let Some(new_category_id) = update.category_id.filter(|id| *id != previous_category_id) {
        let target = category::get_category_by_id(&txn, new_category_id)
            .await?
            .filter(|c| c.travel_id == trip_id)
            .ok_or(Error::CategoryNotFound {
                id: new_category_id,
            })?;

        if let Some(source) = category::get_category_by_id(&txn, previous_category_id).await? {
            let remaining: Vec<i64> = source
                .item_id_list()
                .into_iter()
                .filter(|id| *id != item_id)
                .collect();
            category::set_item_ids(&txn, source, &remaining).await?;
        }

        let mut item_ids = target.item_id_list();
        item_ids.push(item_id);
        category::set_item_ids(&txn, target, &item_ids).await?;
    }

    let mut active: spending_item::ActiveModel = existing.into();
    if let Some(amount) = update.amount {
        active.amount = Set(amount);
    }
    if let Some(description) = update.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(payer) = update.spent_by_user_id {
        active.spent_by_user_id = Set(payer.trim().to_string());
    }
    if let Some(participants) = update.participant_ids {
        active.participant_ids = Set(serde_json::to_value(normalize_participants(participants))?);
    }
    if let Some(category_id) = update.category_id {
        active.category_id = Set(category_id);
    }
    let updated = active.update(&txn).await?;

    recompute_trip_balance(&txn, &trip_id).await?;
    txn.commit().await?;

    Ok(updated)
}

/// Deletes an expense, removes it from its category and recomputes the trip balance.
pub async fn delete_spending_item(db: &DatabaseConnection, item_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let existing = SpendingItem::find_by_id(item_id)
        .one(&txn)
        .await?
        .ok_or(Error::SpendingItemNotFound { id: item_id })?;
    let trip_id = existing.travel_id.clone();

    if let Some(owner) = category::get_category_by_id(&txn, existing.category_id).await? {
        let remaining: Vec<i64> = owner
            .item_id_list()
            .into_iter()
            .filter(|id| *id != item_id)
            .collect();
        category::set_item_ids(&txn, owner, &remaining).await?;
    }

    existing.delete(&txn).await?;
    recompute_trip_balance(&txn, &trip_id).await?;
    txn.commit().await?;

    info!("Deleted spending item {} from trip {}", item_id, trip_id);
    Ok(())
}

/// Retrieves all spending items of a trip, oldest first.
pub async fn get_spending_items_for_trip<C>(
    db: &C,
    trip_id: &str,
) -> Result<Vec<spending_item::Model>>
where
    C: ConnectionTrait,
{
    SpendingItem::find()
        .filter(spending_item::Column::TravelId.eq(trip_id))
        .order_by_asc(spending_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a spending item by id.
pub async fn get_spending_item_by_id<C>(
    db: &C,
    item_id: i64,
) -> Result<Option<spending_item::Model>>
where
    C: ConnectionTrait,
{
    SpendingItem::find_by_id(item_id)
        .one(db)
        .await
        .map_err(Into::into)
}
