//! `TravelBuddy` - The expense core of a group travel app
//!
//! This crate records a trip's shared spending in SQLite, keeps per-user
//! balances, turns them into a short list of "who pays whom" payments, and keeps
//! a live, typed view of a trip in sync through subscription-managed queries.

#![deny(
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    // Runtime hygiene: library code propagates errors instead of panicking
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::exit,
    // Money is f64; equality goes through the settlement tolerance
    clippy::float_cmp,
    clippy::clone_on_ref_ptr,
    clippy::needless_pass_by_value,
    clippy::large_types_passed_by_value,
    clippy::too_many_lines,
    clippy::match_same_arms,
    clippy::semicolon_if_nothing_returned,
    clippy::redundant_closure_for_method_calls,
    future_incompatible,
    rust_2018_idioms,
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::significant_drop_tightening,
)]

/// Configuration management for database and application settings
pub mod config;
/// Core business logic - settlement engine and trip ledger operations
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Live queries - subscription manager, data sources and decoding
pub mod live;
/// Live view of one trip and its settlement plan
pub mod session;

#[cfg(test)]
pub mod test_utils;
