//! Category entity - A budgeted bucket of spending within a trip.
//!
//! `item_ids` is a JSON array holding the ids of the spending items filed under
//! this category, in the order they were added.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Trip this category belongs to
    pub travel_id: String,
    /// Category name (e.g., "Food", "Lodging")
    pub name: String,
    /// Emoji shown next to the name
    pub emoji: String,
    /// Planned budget for the category
    pub budget: f64,
    /// Ordered spending item ids (JSON array of integers)
    pub item_ids: Json,
}

impl Model {
    /// Spending item ids owned by this category, in insertion order.
    ///
    /// Malformed JSON yields an empty list rather than an error so one bad row
    /// cannot block rendering a whole trip.
    #[must_use]
    pub fn item_id_list(&self) -> Vec<i64> {
        serde_json::from_value(self.item_ids.clone()).unwrap_or_default()
    }
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each category belongs to one trip
    #[sea_orm(
        belongs_to = "super::trip::Entity",
        from = "Column::TravelId",
        to = "super::trip::Column::Id"
    )]
    Trip,
    /// One category has many spending items
    #[sea_orm(has_many = "super::spending_item::Entity")]
    SpendingItems,
}

impl Related<super::trip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trip.def()
    }
}

impl Related<super::spending_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SpendingItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
