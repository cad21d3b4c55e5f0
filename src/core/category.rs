//! Category business logic - Budget categories within a trip.

use crate::{
    entities::{Category, category},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Creates an empty category for a trip, validating name and budget.
pub async fn create_category<C>(
    db: &C,
    trip_id: &str,
    name: &str,
    emoji: &str,
    budget: f64,
) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Category name cannot be empty".to_string(),
        });
    }

    if budget < 0.0 || !budget.is_finite() {
        return Err(Error::InvalidAmount { amount: budget });
    }

    crate::core::trip::get_trip(db, trip_id)
        .await?
        .ok_or_else(|| Error::TripNotFound {
            id: trip_id.to_string(),
        })?;

    let category = category::ActiveModel {
        travel_id: Set(trip_id.to_string()),
        name: Set(name.trim().to_string()),
        emoji: Set(emoji.trim().to_string()),
        budget: Set(budget),
        item_ids: Set(serde_json::json!([])),
        ..Default::default()
    };

    category.insert(db).await.map_err(Into::into)
}

/// Retrieves all categories of a trip in creation order.
pub async fn get_categories_for_trip<C>(db: &C, trip_id: &str) -> Result<Vec<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find()
        .filter(category::Column::TravelId.eq(trip_id))
        .order_by_asc(category::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by id.
pub async fn get_category_by_id<C>(db: &C, category_id: i64) -> Result<Option<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find_by_id(category_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Rewrites a category's ordered item id list.
pub(crate) async fn set_item_ids<C>(
    db: &C,
    category: category::Model,
    item_ids: &[i64],
) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let mut active: category::ActiveModel = category.into();
    active.item_ids = Set(serde_json::to_value(item_ids)?);
    active.update(db).await.map_err(Into::into)
}
