//! Core types and configuration for the quote archive.
//!
//! This crate provides shared types used across all other crates:
//! - Session and quote records
//! - Typed request/response records for every service operation
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod contracts;
pub mod error;
pub mod types;

pub use config::Config;
pub use contracts::*;
pub use error::{Error, Result};
pub use types::*;
