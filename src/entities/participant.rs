//! Participant entity - Membership of one user in one trip.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Participant database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participants")]
pub struct Model {
    /// Unique identifier for the membership row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Trip this participant belongs to
    pub travel_id: String,
    /// User id as used in spending items and balances
    pub user_id: String,
    /// Name shown in reports
    pub display_name: String,
}

/// Defines relationships between Participant and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each participant belongs to one trip
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
