use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use travel_buddy::{
    config::{
        app::load_default_config,
        database::{create_connection, create_tables, resolve_database_url},
    },
    core::{report, trip},
    errors::Result,
    live::{LedgerFeed, LiveQueryManager, MemorySource},
    session::{TripSession, TripState},
};

/// How long to wait for a trip's first balance delivery before reporting anyway.
const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!(
        "Configuration loaded (epsilon {}, {} seeded trips)",
        app_config.settlement.epsilon,
        app_config.trips.len()
    );

    // 4. Initialize database
    let database_url = resolve_database_url(app_config.database.url.as_deref());
    let db = create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db).await?;

    // 5. Seed configured trips
    trip::seed_trips(&db, &app_config.trips)
        .await
        .inspect_err(|e| error!("Failed to seed trips: {}", e))?;

    // 6. Wire the live layer: ledger -> in-memory source -> subscriptions
    let source = MemorySource::new();
    let feed = LedgerFeed::new(db.clone(), source.clone());
    let manager = Arc::new(LiveQueryManager::new(Arc::new(source)));

    // 7. Report each trip from its live view
    let trips = trip::get_all_trips(&db).await?;
    if trips.is_empty() {
        warn!("No trips found. Add [[trips]] to config.toml to seed one.");
    }

    for trip in trips {
        feed.publish_trip(&trip.id).await?;
        let participants = trip::get_participants(&db, &trip.id).await?;
        let participant_ids: Vec<String> =
            participants.iter().map(|p| p.user_id.clone()).collect();

        let session = TripSession::with_epsilon(
            trip.id.clone(),
            Arc::clone(&manager),
            app_config.settlement.epsilon,
        );
        session.start(&participant_ids);

        let ready = |s: &TripState| {
            s.trip.is_some() && (s.current_balance.is_some() || s.last_error.is_some())
        };
        let state = tokio::time::timeout(FIRST_SNAPSHOT_TIMEOUT, session.wait_for(ready))
            .await
            .unwrap_or_else(|_| {
                warn!("Trip {} has no balance yet", trip.id);
                session.snapshot()
            });

        log_trip(&db, &trip, &participants, &state).await?;
        session.stop();
    }

    Ok(())
}

async fn log_trip(
    db: &sea_orm::DatabaseConnection,
    trip: &travel_buddy::entities::TripModel,
    participants: &[travel_buddy::entities::ParticipantModel],
    state: &TripState,
) -> Result<()> {
    info!("Trip {} ({})", trip.name, trip.id);

    for category_report in report::generate_trip_report(db, &trip.id).await? {
        info!(
            "  {} {}: {} of {} {}",
            category_report.category.emoji,
            category_report.category.name,
            report::format_amount(category_report.amount_spent),
            report::format_amount(category_report.category.budget),
            report::format_progress_bar(category_report.progress_percent, None)
        );
    }

    if let Some(e) = &state.last_error {
        warn!("  Last error: {}", e);
    }
    for line in report::format_settlement_plan(&state.plan, participants).lines() {
        info!("  {}", line);
    }
    Ok(())
}
