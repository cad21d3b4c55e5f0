//! Report generation business logic.
//!
//! This module provides category budget progress and a readable "who owes whom"
//! rendering of a settlement plan. All functions are framework-agnostic and
//! return plain data or strings that a front end can display as-is.

use crate::{
    core::{category, settlement::Transaction, spending, trip},
    entities::{category as category_entity, participant, spending_item},
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use std::collections::HashMap;

/// Spending against one category's budget.
#[derive(Debug, Clone)]
pub struct CategoryReport {
    /// The category being reported on
    pub category: category_entity::Model,
    /// Expenses filed under the category, oldest first
    pub items: Vec<spending_item::Model>,
    /// Total spent in the category
    pub amount_spent: f64,
    /// Budget left (negative when over budget)
    pub amount_remaining: f64,
    /// Remaining budget as a percentage of the budget
    pub progress_percent: f64,
}

/// Builds a budget report for every category of a trip.
pub async fn generate_trip_report<C>(db: &C, trip_id: &str) -> Result<Vec<CategoryReport>>
where
    C: ConnectionTrait,
{
    trip::get_trip(db, trip_id)
        .await?
        .ok_or_else(|| Error::TripNotFound {
            id: trip_id.to_string(),
        })?;

    let categories = category::get_categories_for_trip(db, trip_id).await?;
    let items = spending::get_spending_items_for_trip(db, trip_id).await?;

    Ok(categories
        .into_iter()
        .map(|category| build_category_report(category, &items))
        .collect())
}

fn build_category_report(
    category: category_entity::Model,
    items: &[spending_item::Model],
) -> CategoryReport {
    let items: Vec<spending_item::Model> = items
        .iter()
        .filter(|item| item.category_id == category.id)
        .cloned()
        .collect();
    let amount_spent: f64 = items.iter().map(|item| item.amount).sum();
    let amount_remaining = category.budget - amount_spent;
    let progress_percent = calculate_progress(amount_remaining, category.budget);

    CategoryReport {
        category,
        items,
        amount_spent,
        amount_remaining,
        progress_percent,
    }
}

/// Calculates how much of a budget is left, as a percentage.
///
/// - 100% = nothing spent
/// - 0% = budget fully spent
/// - Negative percentages indicate overspending
#[must_use]
pub fn calculate_progress(remaining: f64, budget: f64) -> f64 {
    if budget == 0.0 {
        return 0.0;
    }

    (remaining / budget) * 100.0
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80.0%`
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // clamped_progress ∈ [0, 100] and length is small, truncation is intended.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!(
        "[{}{}] {progress_percent:.1}%",
        "█".repeat(filled),
        "░".repeat(empty)
    )
}

/// Formats an amount as currency, e.g. `$12.50`.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Renders one line per payment: `Ana pays Ben $12.50`.
///
/// User ids are replaced by participant display names when known. An empty
/// plan renders as a single "All settled up" line.
#[must_use]
pub fn format_settlement_plan(plan: &[Transaction], participants: &[participant::Model]) -> String {
    if plan.is_empty() {
        return "All settled up".to_string();
    }

    let names: HashMap<&str, &str> = participants
        .iter()
        .map(|p| (p.user_id.as_str(), p.display_name.as_str()))
        .collect();
    let name = |user_id: &str| -> String {
        names.get(user_id).map_or_else(|| user_id.to_string(), |n| (*n).to_string())
    };

    plan.iter()
        .map(|tx| {
            format!(
                "{} pays {} {}",
                name(&tx.debtor_id),
                name(&tx.creditor_id),
                format_amount(tx.amount)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
