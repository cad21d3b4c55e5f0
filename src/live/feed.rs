//! Republishes the ledger stored in the database as live documents.

use crate::{
    core::{balance, category, spending, trip},
    errors::{Error, Result},
    live::{
        key::{BALANCES, CATEGORIES, EntityKind, LiveQuery, PARTICIPANTS, SPENDING_ITEMS},
        memory::MemorySource,
        source::Document,
    },
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::info;

/// Copies a trip's rows from the database into a [`MemorySource`].
///
/// Each publish replaces the trip's documents wholesale, so rows deleted from
/// the database disappear from the live view too.
#[derive(Debug, Clone)]
pub struct LedgerFeed {
    db: DatabaseConnection,
    source: MemorySource,
}

impl LedgerFeed {
    /// Creates a feed writing into `source`.
    #[must_use]
    pub const fn new(db: DatabaseConnection, source: MemorySource) -> Self {
        Self { db, source }
    }

    /// The source this feed writes into.
    #[must_use]
    pub const fn source(&self) -> &MemorySource {
        &self.source
    }

    /// Publishes the trip, its participants, categories, spending items and
    /// balance snapshots.
    pub async fn publish_trip(&self, trip_id: &str) -> Result<()> {
        let trip = trip::get_trip(&self.db, trip_id)
            .await?
            .ok_or_else(|| Error::TripNotFound {
                id: trip_id.to_string(),
            })?;
        let participants = trip::get_participants(&self.db, trip_id).await?;
        let categories = category::get_categories_for_trip(&self.db, trip_id).await?;
        let items = spending::get_spending_items_for_trip(&self.db, trip_id).await?;
        let balances = balance::get_balances_for_trip(&self.db, trip_id).await?;

        self.source.replace_matching(
            &EntityKind::Trip.query(trip_id),
            vec![to_document(trip.id.clone(), &trip)?],
        );

        let trip_scope =
            |collection: &str| LiveQuery::collection(collection).where_eq("travel_id", trip_id);

        let participant_count = participants.len();
        let documents = participants
            .iter()
            .map(|p| to_document(format!("{}:{}", p.travel_id, p.user_id), p))
            .collect::<Result<Vec<_>>>()?;
        self.source.replace_matching(&trip_scope(PARTICIPANTS), documents);

        let documents = categories
            .iter()
            .map(|c| to_document(c.id.to_string(), c))
            .collect::<Result<Vec<_>>>()?;
        self.source.replace_matching(&trip_scope(CATEGORIES), documents);

        let documents = items
            .iter()
            .map(|i| to_document(i.id.to_string(), i))
            .collect::<Result<Vec<_>>>()?;
        self.source.replace_matching(&trip_scope(SPENDING_ITEMS), documents);

        let documents = balances
            .iter()
            .map(|b| to_document(b.id.to_string(), b))
            .collect::<Result<Vec<_>>>()?;
        self.source.replace_matching(&trip_scope(BALANCES), documents);

        info!(
            "Published trip {} ({} participants, {} categories, {} items, {} balance snapshots)",
            trip_id,
            participant_count,
            categories.len(),
            items.len(),
            balances.len()
        );
        Ok(())
    }
}

fn to_document<T: Serialize>(id: String, model: &T) -> Result<Document> {
    Ok(Document::new(id, serde_json::to_value(model)?))
}
