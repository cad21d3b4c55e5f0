//! Balance entity - A snapshot of who owes what for a trip.
//!
//! A new snapshot is written every time a spending item of the trip changes;
//! older snapshots are kept as history. `balances` is a JSON object mapping
//! user id to signed amount (positive = is owed money, negative = owes money)
//! and always sums to zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balance snapshot database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    /// Unique identifier for the snapshot
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Trip the snapshot belongs to
    pub travel_id: String,
    /// Spending items that contributed (JSON array of integers)
    pub item_ids: Json,
    /// User id to signed amount (JSON object)
    pub balances: Json,
    /// Whether the trip was settled at this snapshot
    pub settled: bool,
    /// When the snapshot was computed
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Decodes the balance mapping.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if the stored column is not an object of numbers.
    pub fn balance_map(&self) -> Result<BTreeMap<String, f64>, serde_json::Error> {
        serde_json::from_value(self.balances.clone())
    }

    /// Spending item ids that contributed to this snapshot.
    #[must_use]
    pub fn item_id_list(&self) -> Vec<i64> {
        serde_json::from_value(self.item_ids.clone()).unwrap_or_default()
    }
}

/// Defines relationships between Balance and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each snapshot belongs to one trip
    #[sea_orm(
        belongs_to = "super::trip::Entity",
        from = "Column::TravelId",
        to = "super::trip::Column::Id"
    )]
    Trip,
}

impl Related<super::trip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trip.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
