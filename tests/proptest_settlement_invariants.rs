//! Property-based invariant tests for the settlement engine.
//!
//! For any set of balances (in whole cents) that sums to zero:
//! 1. The plan never has more payments than nonzero participants minus one.
//! 2. Replaying the plan brings every balance back to zero.
//! 3. Every payment is positive and flows from a debtor to a creditor.
//! 4. The plan does not depend on the map type or insertion order.
//!
//! And for classification:
//! 5. Standings are sorted by amount descending, then user id ascending.
//! 6. Roles agree with the sign of the balance.
//!
//! Balances that do not sum to zero are always rejected.

#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use travel_buddy::core::settlement::{
    DEFAULT_EPSILON, Role, Transaction, classify_participants, compute_settlement_plan,
};
use travel_buddy::errors::Error;

// ── Strategies ────────────────────────────────────────────────────────────

/// Balances in cents for up to 12 users; the last user absorbs the remainder.
fn balanced_strategy() -> impl Strategy<Value = BTreeMap<String, f64>> {
    proptest::collection::vec(-100_000i64..=100_000, 1..=11).prop_map(|cents| {
        let remainder: i64 = -cents.iter().sum::<i64>();
        cents
            .into_iter()
            .chain(std::iter::once(remainder))
            .enumerate()
            .map(|(i, c)| (format!("user{i:02}"), cents_to_amount(c)))
            .collect()
    })
}

#[allow(clippy::cast_precision_loss)]
fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn replay(balances: &BTreeMap<String, f64>, plan: &[Transaction]) -> BTreeMap<String, f64> {
    let mut state = balances.clone();
    for tx in plan {
        *state.get_mut(&tx.debtor_id).unwrap() += tx.amount;
        *state.get_mut(&tx.creditor_id).unwrap() -= tx.amount;
    }
    state
}

// ═════════════════════════════════════════════════════════════════════════
// Settlement plan
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn plan_has_at_most_n_minus_one_payments(balances in balanced_strategy()) {
        let plan = compute_settlement_plan(&balances).unwrap();
        let nonzero = balances.values().filter(|v| v.abs() > DEFAULT_EPSILON).count();
        prop_assert!(plan.len() <= nonzero.saturating_sub(1));
    }

    #[test]
    fn replaying_plan_zeroes_every_balance(balances in balanced_strategy()) {
        let plan = compute_settlement_plan(&balances).unwrap();
        for (user_id, residue) in replay(&balances, &plan) {
            prop_assert!(residue.abs() < 1e-6, "{} left with {}", user_id, residue);
        }
    }

    #[test]
    fn payments_flow_from_debtors_to_creditors(balances in balanced_strategy()) {
        let plan = compute_settlement_plan(&balances).unwrap();
        for tx in &plan {
            prop_assert!(tx.amount > DEFAULT_EPSILON);
            prop_assert_ne!(&tx.debtor_id, &tx.creditor_id);
            prop_assert!(balances[&tx.debtor_id] < 0.0);
            prop_assert!(balances[&tx.creditor_id] > 0.0);
        }
    }

    #[test]
    fn plan_is_deterministic(balances in balanced_strategy()) {
        let hashed: HashMap<String, f64> = balances.clone().into_iter().rev().collect();
        prop_assert_eq!(
            compute_settlement_plan(&balances).unwrap(),
            compute_settlement_plan(&hashed).unwrap()
        );
    }

    #[test]
    fn nonzero_sum_is_rejected(
        mut balances in balanced_strategy(),
        offset_cents in 1i64..=10_000,
    ) {
        *balances.get_mut("user00").unwrap() += cents_to_amount(offset_cents);
        let result = compute_settlement_plan(&balances);
        let is_unbalanced = matches!(result, Err(Error::UnbalancedInput { .. }));
        prop_assert!(is_unbalanced);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Classification
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn standings_are_sorted(balances in balanced_strategy()) {
        let standings = classify_participants(&balances);
        prop_assert_eq!(standings.len(), balances.len());
        for pair in standings.windows(2) {
            let ordered = pair[0].amount > pair[1].amount
                || (pair[0].amount == pair[1].amount && pair[0].user_id < pair[1].user_id);
            prop_assert!(ordered, "{:?} before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn roles_match_signs(balances in balanced_strategy()) {
        for standing in classify_participants(&balances) {
            let expected = if standing.amount > DEFAULT_EPSILON {
                Role::Creditor
            } else if standing.amount < -DEFAULT_EPSILON {
                Role::Debtor
            } else {
                Role::Settled
            };
            prop_assert_eq!(standing.role, expected);
        }
    }
}
