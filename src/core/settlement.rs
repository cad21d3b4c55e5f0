//! Settlement engine - turns a trip's signed balances into point-to-point payments.
//!
//! Positive balances are creditors (they are owed money), negative balances are
//! debtors. The plan is built greedily: the largest remaining creditor is always
//! matched with the largest remaining debtor, the smaller of the two amounts is
//! paid, and whoever still has money outstanding goes back into the pool.
//!
//! Every payment zeroes at least one party, so `n` participants with a nonzero
//! balance never produce more than `n - 1` payments. The greedy does not
//! always find the smallest possible number of payments (that problem is
//! NP-hard in general); it is kept because it is predictable and good enough
//! for group trips.
//!
//! A remainder below the tolerance is still owed. Several such remainders can
//! add up to a creditor above the tolerance, so a party goes back into the pool
//! until only floating-point noise is left of its balance. Payments smaller than
//! the tolerance can therefore appear for inputs that are not whole cents.
//!
//! All functions here are pure and synchronous.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Currency tolerance used when none is configured.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// One payment in a settlement plan: `debtor_id` pays `amount` to `creditor_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// User who pays
    pub debtor_id: String,
    /// User who receives
    pub creditor_id: String,
    /// Amount paid, always positive
    pub amount: f64,
}

/// Where a participant stands before settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Is owed money
    Creditor,
    /// Owes money
    Debtor,
    /// Balance is zero within tolerance
    Settled,
}

/// A participant's role and signed balance, as returned by [`classify_participants`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantStanding {
    /// User id
    pub user_id: String,
    /// Creditor, debtor or settled
    pub role: Role,
    /// Signed balance
    pub amount: f64,
}

/// A party in the matching heap. Orders by outstanding amount, larger first,
/// then by user id ascending so equal amounts pop in a reproducible order.
#[derive(Debug)]
struct Party {
    user_id: String,
    outstanding: f64,
}

impl PartialEq for Party {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Party {}

impl PartialOrd for Party {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Party {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse the id comparison so "a" pops before "b".
        self.outstanding
            .total_cmp(&other.outstanding)
            .then_with(|| other.user_id.cmp(&self.user_id))
    }
}

/// Computes a settlement plan with the default tolerance ([`DEFAULT_EPSILON`]).
///
/// # Errors
/// Returns `Error::UnbalancedInput` if the balances do not sum to zero.
pub fn compute_settlement_plan<'a, I>(balances: I) -> Result<Vec<Transaction>>
where
    I: IntoIterator<Item = (&'a String, &'a f64)>,
{
    compute_settlement_plan_with_epsilon(balances, DEFAULT_EPSILON)
}

/// Computes the payments that bring every balance to zero.
///
/// Balances whose magnitude is within `epsilon` are treated as settled and
/// never appear in a payment. The result is deterministic for a given input,
/// regardless of the iteration order of the map it came from.
///
/// # Errors
/// Returns `Error::UnbalancedInput` if the balances sum to more than `epsilon`
/// away from zero, or if any balance is not finite.
pub fn compute_settlement_plan_with_epsilon<'a, I>(
    balances: I,
    epsilon: f64,
) -> Result<Vec<Transaction>>
where
    I: IntoIterator<Item = (&'a String, &'a f64)>,
{
    let mut creditors = BinaryHeap::new();
    let mut debtors = BinaryHeap::new();
    let mut sum = 0.0;

    for (user_id, &amount) in balances {
        if !amount.is_finite() {
            return Err(Error::UnbalancedInput {
                sum: amount,
                epsilon,
            });
        }
        sum += amount;
        if amount > epsilon {
            creditors.push(Party {
                user_id: user_id.clone(),
                outstanding: amount,
            });
        } else if amount < -epsilon {
            debtors.push(Party {
                user_id: user_id.clone(),
                outstanding: -amount,
            });
        }
    }

    if sum.abs() > epsilon {
        return Err(Error::UnbalancedInput { sum, epsilon });
    }

    let noise = rounding_noise(&creditors, &debtors, epsilon);
    let mut plan = Vec::with_capacity(creditors.len().max(debtors.len()));
    while !creditors.is_empty() && !debtors.is_empty() {
        let (Some(mut creditor), Some(mut debtor)) = (creditors.pop(), debtors.pop()) else {
            break;
        };
        let amount = creditor.outstanding.min(debtor.outstanding);
        plan.push(Transaction {
            debtor_id: debtor.user_id.clone(),
            creditor_id: creditor.user_id.clone(),
            amount,
        });

        creditor.outstanding -= amount;
        debtor.outstanding -= amount;
        if creditor.outstanding > noise {
            creditors.push(creditor);
        }
        if debtor.outstanding > noise {
            debtors.push(debtor);
        }
    }

    // Anything left over is the input's imbalance, which is inside the tolerance.
    for leftover in creditors.iter().chain(debtors.iter()) {
        tracing::trace!(
            "Dropping residual {} for {} after settlement",
            leftover.outstanding,
            leftover.user_id
        );
    }

    Ok(plan)
}

/// Remainders at or below this are float error from the subtractions, not money.
/// The error of a remainder grows with the number of parties it passed through.
#[allow(clippy::cast_precision_loss)]
fn rounding_noise(
    creditors: &BinaryHeap<Party>,
    debtors: &BinaryHeap<Party>,
    epsilon: f64,
) -> f64 {
    let largest = creditors
        .peek()
        .into_iter()
        .chain(debtors.peek())
        .map(|p| p.outstanding)
        .fold(1.0, f64::max);
    let parties = (creditors.len() + debtors.len()) as f64;
    (largest * f64::EPSILON * 4.0 * parties).min(epsilon / 2.0)
}

/// Classifies every participant as creditor, debtor or settled, using [`DEFAULT_EPSILON`].
#[must_use]
pub fn classify_participants<'a, I>(balances: I) -> Vec<ParticipantStanding>
where
    I: IntoIterator<Item = (&'a String, &'a f64)>,
{
    classify_participants_with_epsilon(balances, DEFAULT_EPSILON)
}

/// Classifies every participant, sorted by amount descending and then by user id
/// ascending. Balances within `epsilon` of zero are [`Role::Settled`].
#[must_use]
pub fn classify_participants_with_epsilon<'a, I>(
    balances: I,
    epsilon: f64,
) -> Vec<ParticipantStanding>
where
    I: IntoIterator<Item = (&'a String, &'a f64)>,
{
    let mut standings: Vec<ParticipantStanding> = balances
        .into_iter()
        .map(|(user_id, &amount)| {
            let role = if amount > epsilon {
                Role::Creditor
            } else if amount < -epsilon {
                Role::Debtor
            } else {
                Role::Settled
            };
            ParticipantStanding {
                user_id: user_id.clone(),
                role,
                amount,
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    standings
}
