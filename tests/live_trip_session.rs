//! End-to-end: ledger writes in SQLite flow through the ledger feed and the
//! in-memory source into a live trip session and its settlement plan.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use travel_buddy::{
    config::database::{create_connection, create_tables},
    core::{
        balance, category,
        settlement::{Role, Transaction},
        spending::{self, NewSpendingItem},
        trip,
    },
    errors::Result,
    live::{Document, LedgerFeed, LiveQueryManager, MemorySource, key::CATEGORIES},
    session::{TripSession, TripState},
};

async fn setup_ledger() -> Result<(DatabaseConnection, i64)> {
    let db = create_connection("sqlite::memory:").await?;
    create_tables(&db).await?;
    trip::create_trip(&db, "lisbon", "Lisbon").await?;
    for (user_id, name) in [("ana", "Ana"), ("ben", "Ben"), ("cy", "Cy")] {
        trip::add_participant(&db, "lisbon", user_id, name).await?;
    }
    let food = category::create_category(&db, "lisbon", "Food", "🍜", 300.0).await?;
    Ok((db, food.id))
}

fn expense(category_id: i64, amount: f64, payer: &str, participants: &[&str]) -> NewSpendingItem {
    NewSpendingItem {
        trip_id: "lisbon".to_string(),
        category_id,
        amount,
        description: "Dinner".to_string(),
        date: None,
        spent_by_user_id: payer.to_string(),
        added_by_user_id: payer.to_string(),
        participant_ids: participants.iter().map(ToString::to_string).collect(),
        receipt_url: None,
    }
}

fn pays(debtor: &str, creditor: &str, amount: f64) -> Transaction {
    Transaction {
        debtor_id: debtor.to_string(),
        creditor_id: creditor.to_string(),
        amount,
    }
}

async fn wait<F: Fn(&TripState) -> bool>(session: &TripSession, predicate: F) -> TripState {
    tokio::time::timeout(Duration::from_secs(5), session.wait_for(predicate))
        .await
        .unwrap()
}

fn participants() -> Vec<String> {
    vec!["ana".to_string(), "ben".to_string(), "cy".to_string()]
}

#[tokio::test]
async fn test_settlement_plan_follows_the_ledger() -> Result<()> {
    let (db, food) = setup_ledger().await?;
    spending::create_spending_item(&db, expense(food, 90.0, "ana", &["ana", "ben", "cy"])).await?;

    let source = MemorySource::new();
    let feed = LedgerFeed::new(db.clone(), source.clone());
    feed.publish_trip("lisbon").await?;

    let manager = Arc::new(LiveQueryManager::new(Arc::new(source.clone())));
    let session = TripSession::new("lisbon", Arc::clone(&manager));
    session.start(&participants());

    let state = wait(&session, |s| !s.plan.is_empty() && s.participants.len() == 3).await;
    assert_eq!(state.plan, vec![pays("ben", "ana", 30.0), pays("cy", "ana", 30.0)]);
    assert_eq!(state.standings[0].user_id, "ana");
    assert_eq!(state.standings[0].role, Role::Creditor);
    assert_eq!(state.trip.unwrap().name, "Lisbon");
    assert_eq!(state.categories.len(), 1);
    assert_eq!(state.spending_items.len(), 1);

    // Ben covers a round for everyone
    spending::create_spending_item(&db, expense(food, 30.0, "ben", &["ana", "ben", "cy"])).await?;
    feed.publish_trip("lisbon").await?;
    let expected = vec![pays("cy", "ana", 40.0), pays("ben", "ana", 10.0)];
    let state = wait(&session, |s| s.plan == expected).await;
    assert_eq!(state.spending_items.len(), 2);

    balance::settle_trip(&db, "lisbon").await?;
    feed.publish_trip("lisbon").await?;
    let state = wait(&session, |s| {
        s.plan.is_empty()
            && s.spending_items.iter().all(|item| item.settled)
            && s.current_balance.is_some()
    })
    .await;
    assert!(state.standings.is_empty());
    assert!(state.last_error.is_none());

    session.stop();
    assert_eq!(manager.active_count(), 0);
    assert_eq!(source.watcher_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_stopped_session_ignores_later_changes() -> Result<()> {
    let (db, _food) = setup_ledger().await?;
    let source = MemorySource::new();
    LedgerFeed::new(db.clone(), source.clone())
        .publish_trip("lisbon")
        .await?;

    let manager = Arc::new(LiveQueryManager::new(Arc::new(source.clone())));
    let session = TripSession::new("lisbon", manager);
    session.start(&participants());
    let before = wait(&session, |s| s.categories.len() == 1).await;

    session.stop();
    source.upsert(
        CATEGORIES,
        Document::new(
            "99",
            serde_json::json!({
                "id": 99,
                "travel_id": "lisbon",
                "name": "Late",
                "emoji": "",
                "budget": 1.0,
                "item_ids": [],
            }),
        ),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.snapshot().categories, before.categories);
    Ok(())
}

#[tokio::test]
async fn test_restart_replaces_subscriptions() -> Result<()> {
    let (db, _food) = setup_ledger().await?;
    let source = MemorySource::new();
    LedgerFeed::new(db.clone(), source.clone())
        .publish_trip("lisbon")
        .await?;

    let manager = Arc::new(LiveQueryManager::new(Arc::new(source.clone())));
    let session = TripSession::new("lisbon", Arc::clone(&manager));
    session.start(&participants());
    session.start(&["ana".to_string()]);

    assert_eq!(manager.active_count(), 5);
    assert_eq!(source.watcher_count(), 5);
    let state = wait(&session, |s| s.participants.contains_key("ana")).await;
    assert_eq!(state.participants.len(), 1);
    Ok(())
}
