//! SQLite persistence for sessions and quotes.
//!
//! This crate handles:
//! - Schema migration (run once at process start)
//! - Scoped store handles, one per unit of work
//! - Idempotent session inserts and quote upserts
//! - Enumeration, range and comparison reads

pub mod database;
pub mod schema;
pub mod store;

pub use database::Database;
pub use store::{PairedQuotes, QuoteFilter, QuoteStore};
