//! Core business logic - framework-agnostic settlement engine and trip ledger.

/// Balance recompute and trip settlement
pub mod balance;
/// Budget categories
pub mod category;
/// Budget and settlement reports
pub mod report;
/// Greedy settlement plan computation
pub mod settlement;
/// Spending item create/update/delete
pub mod spending;
/// Trips and participants
pub mod trip;
