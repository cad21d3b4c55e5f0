//! Trip entity - A shared travel plan grouping participants, categories,
//! spending items and balance snapshots.
//!
//! Trip ids are chosen by the caller (they double as live-query keys), so the
//! primary key is a string and is never auto-generated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Trip database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trips")]
pub struct Model {
    /// Caller-supplied trip identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Human-readable trip name (e.g., "Lisbon 2026")
    pub name: String,
    /// When the trip was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Trip and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One trip has many categories
    #[sea_orm(has_many = "super::category::Entity")]
    Categories,
    /// One trip has many participants
    #[sea_orm(has_many = "super::participant::Entity")]
    Participants,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
