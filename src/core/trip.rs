//! Trip business logic - Creating trips and managing their participants.

use crate::{
    config::app::TripConfig,
    core::category,
    entities::{Participant, Trip, participant, trip},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Creates a trip with a caller-chosen id.
///
/// The id and name are trimmed and must not be empty. An existing id is rejected.
pub async fn create_trip<C>(db: &C, id: &str, name: &str) -> Result<trip::Model>
where
    C: ConnectionTrait,
{
    let id = id.trim();
    let name = name.trim();
    if id.is_empty() || name.is_empty() {
        return Err(Error::Validation {
            message: "Trip id and name cannot be empty".to_string(),
        });
    }

    if Trip::find_by_id(id.to_string()).one(db).await?.is_some() {
        return Err(Error::Validation {
            message: format!("Trip '{id}' already exists"),
        });
    }

    let trip = trip::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        created_at: Set(chrono::Utc::now()),
    };

    let result = trip.insert(db).await?;
    info!("Created trip {} ({})", result.id, result.name);
    Ok(result)
}

/// Finds a trip by id.
pub async fn get_trip<C>(db: &C, trip_id: &str) -> Result<Option<trip::Model>>
where
    C: ConnectionTrait,
{
    Trip::find_by_id(trip_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists every trip, oldest first.
pub async fn get_all_trips<C>(db: &C) -> Result<Vec<trip::Model>>
where
    C: ConnectionTrait,
{
    Trip::find()
        .order_by_asc(trip::Column::CreatedAt)
        .order_by_asc(trip::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates the configured trips that do not exist yet, with their participants
/// and categories. Existing trips are left untouched. Each trip is seeded in
/// its own transaction, so a failing entry leaves nothing behind.
///
/// Returns how many trips were created.
pub async fn seed_trips(db: &DatabaseConnection, trips: &[TripConfig]) -> Result<usize> {
    info!("Seeding trips. Found {} configured trips.", trips.len());
    let mut created = 0;

    for cfg_trip in trips {
        if get_trip(db, &cfg_trip.id).await?.is_some() {
            debug!("Trip '{}' already exists. Skipping.", cfg_trip.id);
            continue;
        }

        let txn = db.begin().await?;
        let trip = create_trip(&txn, &cfg_trip.id, &cfg_trip.name).await?;
        for cfg_participant in &cfg_trip.participants {
            add_participant(
                &txn,
                &trip.id,
                &cfg_participant.user_id,
                cfg_participant.display_name.as_deref().unwrap_or_default(),
            )
            .await?;
        }
        for cfg_category in &cfg_trip.categories {
            category::create_category(
                &txn,
                &trip.id,
                &cfg_category.name,
                &cfg_category.emoji,
                cfg_category.budget,
            )
            .await?;
        }
        txn.commit().await?;
        created += 1;
    }

    info!("Seeded {} new trips", created);
    Ok(created)
}

/// Adds a user to a trip. Each user can join a trip once.
///
/// An empty display name falls back to the user id.
pub async fn add_participant<C>(
    db: &C,
    trip_id: &str,
    user_id: &str,
    display_name: &str,
) -> Result<participant::Model>
where
    C: ConnectionTrait,
{
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(Error::Validation {
            message: "User id cannot be empty".to_string(),
        });
    }

    get_trip(db, trip_id)
        .await?
        .ok_or_else(|| Error::TripNotFound {
            id: trip_id.to_string(),
        })?;

    let existing = Participant::find()
        .filter(participant::Column::TravelId.eq(trip_id))
        .filter(participant::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::Validation {
            message: format!("User '{user_id}' already belongs to trip '{trip_id}'"),
        });
    }

    let display_name = match display_name.trim() {
        "" => user_id,
        name => name,
    };

    let participant = participant::ActiveModel {
        travel_id: Set(trip_id.to_string()),
        user_id: Set(user_id.to_string()),
        display_name: Set(display_name.to_string()),
        ..Default::default()
    };

    participant.insert(db).await.map_err(Into::into)
}

/// Lists a trip's participants in the order they joined.
pub async fn get_participants<C>(db: &C, trip_id: &str) -> Result<Vec<participant::Model>>
where
    C: ConnectionTrait,
{
    Participant::find()
        .filter(participant::Column::TravelId.eq(trip_id))
        .order_by_asc(participant::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
