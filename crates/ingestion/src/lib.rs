//! Archive ingestion for the quote archive.
//!
//! This crate handles:
//! - Member identity decoding (`<broker>_<symbol>_<session>.csv`)
//! - CSV row decoding with per-row fault tolerance
//! - Streaming ZIP member iteration
//! - Orchestrating archive and folder ingestion into the store

pub mod archive;
pub mod member;
pub mod orchestrator;
pub mod rows;

pub use archive::{ArchiveReader, MemberOutcome, ParsedMember};
pub use member::decode_member_name;
pub use orchestrator::Ingestor;
pub use rows::{decode_rows, DecodedRows, RowDecodeError};
