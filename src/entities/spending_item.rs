//! Spending item entity - One expense paid by a single user and shared by a
//! list of participants.
//!
//! `spent_by_user_id` is who paid, `added_by_user_id` is who recorded it.
//! `participant_ids` is a JSON array of the user ids sharing the cost equally.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Spending item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "spending_items")]
pub struct Model {
    /// Unique identifier for the spending item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Trip the expense belongs to
    pub travel_id: String,
    /// Category the expense is filed under
    pub category_id: i64,
    /// Amount paid, always positive
    pub amount: f64,
    /// What the money was spent on
    pub description: String,
    /// When the expense happened
    pub date: DateTimeUtc,
    /// User who paid
    pub spent_by_user_id: String,
    /// User who recorded the expense
    pub added_by_user_id: String,
    /// Users sharing the cost (JSON array of strings)
    pub participant_ids: Json,
    /// Optional reference to a stored receipt image
    pub receipt_url: Option<String>,
    /// Whether the expense has been settled
    pub settled: bool,
}

impl Model {
    /// Users sharing this expense. Malformed JSON yields an empty list.
    #[must_use]
    pub fn participant_list(&self) -> Vec<String> {
        serde_json::from_value(self.participant_ids.clone()).unwrap_or_default()
    }
}

/// Defines relationships between `SpendingItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each spending item belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
