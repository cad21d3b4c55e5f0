//! Entity module - Contains all SeaORM entity definitions for the trip ledger.
//! Each entity has a Model struct for data and an Entity struct for operations.
//! Models also derive serde so they can travel as live-query documents.

pub mod balance;
pub mod category;
pub mod participant;
pub mod spending_item;
pub mod trip;

// Re-export specific types to avoid conflicts
pub use balance::{Column as BalanceColumn, Entity as Balance, Model as BalanceModel};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use participant::{
    Column as ParticipantColumn, Entity as Participant, Model as ParticipantModel,
};
pub use spending_item::{
    Column as SpendingItemColumn, Entity as SpendingItem, Model as SpendingItemModel,
};
pub use trip::{Column as TripColumn, Entity as Trip, Model as TripModel};
