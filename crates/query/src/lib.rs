//! Read-only query layer over the quote store.
//!
//! This crate provides:
//! - Broker, symbol, date and session enumeration
//! - Filtered quote ranges with ISO timestamps
//! - Paired (broker, symbol) comparison series

pub mod engine;

pub use engine::QueryEngine;
