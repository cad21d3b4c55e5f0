//! Database configuration module for the trip ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{Balance, Category, Participant, SpendingItem, Trip};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::{debug, info};

/// Database used when neither `DATABASE_URL` nor config.toml names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/travel_buddy.sqlite?mode=rwc";

/// Resolves the database URL: `DATABASE_URL` from the environment wins,
/// then the configured URL, then [`DEFAULT_DATABASE_URL`].
#[must_use]
pub fn resolve_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        configured.map_or_else(|| DEFAULT_DATABASE_URL.to_string(), str::to_string)
    })
}

/// File path of a file-backed `SQLite` URL, without query parameters.
fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty() && path != ":memory:").then(|| Path::new(path))
}

/// Establishes a connection to the database at `database_url`, creating the
/// parent directory of a file-backed `SQLite` database when missing.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(parent) = sqlite_file_path(database_url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    debug!("Connecting to database at {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all ledger tables using `SeaORM`'s schema generation from entity definitions.
///
/// Tables are created with `IF NOT EXISTS`, so calling this against an existing
/// database is harmless.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Trip).if_not_exists().to_owned(),
        schema.create_table_from_entity(Participant).if_not_exists().to_owned(),
        schema.create_table_from_entity(Category).if_not_exists().to_owned(),
        schema.create_table_from_entity(SpendingItem).if_not_exists().to_owned(),
        schema.create_table_from_entity(Balance).if_not_exists().to_owned(),
    ];

    for table in &tables {
        db.execute(builder.build(table)).await?;
    }

    info!("Ledger tables ready");
    Ok(())
}
