//! Request/response records for the service boundary.
//!
//! One record per operation; required fields are plain values and optional
//! filters are `Option`s. Adapters build these after validating their own
//! input, so the engines never see partially-formed requests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Lookback, TimestampMs};

/// Ingest one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Path to the ZIP archive.
    pub archive_path: PathBuf,
}

/// Outcome status of an archive ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// No fatal error; members may still have been skipped.
    Success,
    /// The archive could not be ingested.
    Failed,
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStatus::Success => write!(f, "success"),
            IngestStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Counters collected while ingesting one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// CSV members found in the archive.
    pub csv_members: u32,
    /// Sessions inserted by this run.
    pub sessions_created: u32,
    /// Sessions that already existed and were left untouched.
    pub sessions_existing: u32,
    /// Quotes inserted or refreshed.
    pub quotes_upserted: u64,
    /// Members skipped (no valid rows or undecodable name/header).
    pub members_skipped: u32,
    /// Members whose quote upsert was rejected by the store.
    pub members_failed: u32,
    /// Rows dropped by the row decoder.
    pub rows_rejected: u64,
}

impl IngestSummary {
    /// Number of sessions this run wrote quotes for.
    pub fn sessions_ingested(&self) -> u32 {
        self.sessions_created + self.sessions_existing
    }
}

/// Result of ingesting one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Success or failure.
    pub status: IngestStatus,
    /// Human-readable message.
    pub message: String,
    /// What the run did before it finished or failed.
    pub summary: IngestSummary,
}

impl IngestResponse {
    /// Successful outcome.
    pub fn success(message: impl Into<String>, summary: IngestSummary) -> Self {
        Self {
            status: IngestStatus::Success,
            message: message.into(),
            summary,
        }
    }

    /// Failed outcome, keeping the partial summary.
    pub fn failed(message: impl Into<String>, summary: IngestSummary) -> Self {
        Self {
            status: IngestStatus::Failed,
            message: message.into(),
            summary,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestStatus::Success
    }
}

/// Ingestion outcome for one archive of a folder run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    /// Archive path.
    pub archive_path: PathBuf,
    /// Ingestion result.
    pub response: IngestResponse,
}

/// Result of ingesting every archive in a folder, in listing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderIngestResponse {
    /// One outcome per archive.
    pub archives: Vec<ArchiveOutcome>,
}

impl FolderIngestResponse {
    /// Number of archives that ingested successfully.
    pub fn succeeded(&self) -> usize {
        self.archives.iter().filter(|a| a.response.is_success()).count()
    }

    /// Number of archives that failed.
    pub fn failed(&self) -> usize {
        self.archives.len() - self.succeeded()
    }
}

/// Distinct brokers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokersResponse {
    /// Broker names, sorted.
    pub brokers: Vec<String>,
}

/// Broker → symbols mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokersSymbolsResponse {
    /// Symbols per broker, both sorted.
    pub brokers: BTreeMap<String, Vec<String>>,
}

/// Symbols quoted by one broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSymbolsRequest {
    /// Broker name.
    pub broker: String,
}

/// Distinct symbols for a broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSymbolsResponse {
    /// Symbol names, sorted.
    pub symbols: Vec<String>,
}

/// Dates with quotes for one (broker, symbol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDatesRequest {
    /// Broker name.
    pub broker: String,
    /// Instrument symbol.
    pub symbol: String,
}

/// Calendar dates (UTC) with quotes, ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDatesResponse {
    /// Dates, serialized as `YYYY-MM-DD`.
    pub dates: Vec<NaiveDate>,
}

/// Sessions with quotes on one UTC day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsRequest {
    /// Broker name.
    pub broker: String,
    /// Instrument symbol.
    pub symbol: String,
    /// UTC calendar day.
    pub date: NaiveDate,
}

/// Session ids for a (broker, symbol, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    /// Session ids, sorted.
    pub sessions: Vec<String>,
}

/// Quote range filter. Every field is optional; bounds are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchQuotesRequest {
    /// Broker name.
    pub broker: Option<String>,
    /// Instrument symbol.
    pub symbol: Option<String>,
    /// Restricts the window to one UTC calendar day.
    pub date: Option<NaiveDate>,
    /// Earliest timestamp (ms), inclusive.
    pub start_time: Option<TimestampMs>,
    /// Latest timestamp (ms), inclusive.
    pub end_time: Option<TimestampMs>,
}

/// One stored quote as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Owning session.
    pub session_id: String,
    /// ISO-8601 UTC timestamp with `Z` suffix.
    pub timestamp: String,
    /// Bid price.
    pub bid: f64,
    /// Ask price.
    pub ask: f64,
}

/// Quotes ordered by timestamp ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchQuotesResponse {
    /// Matching quotes.
    pub quotes: Vec<QuoteRecord>,
}

/// Quote series of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuotesRequest {
    /// Session id.
    pub session_id: String,
}

/// Paired-symbol comparison query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRequest {
    /// Broker of pair A.
    pub broker_a: String,
    /// Symbol of pair A.
    pub symbol_a: String,
    /// Broker of pair B.
    pub broker_b: String,
    /// Symbol of pair B.
    pub symbol_b: String,
    /// Per-pair row cap; the configured default applies when absent.
    pub limit: Option<usize>,
    /// How far back to look; all history when absent.
    #[serde(default)]
    pub lookback: Lookback,
}

/// One row of a comparison series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    /// Broker name.
    pub broker: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Owning session.
    pub session_id: String,
    /// Bid price.
    pub bid: f64,
    /// Ask price.
    pub ask: f64,
    /// ISO-8601 UTC timestamp with `Z` suffix.
    pub timestamp: String,
}

/// Comparison rows: pair A newest-first, then pair B newest-first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonResponse {
    /// Pair A rows followed by pair B rows.
    pub data: Vec<ComparisonPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_status_serializes_lowercase() {
        let response = IngestResponse::failed("ZIP archive not found.", IngestSummary::default());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["summary"]["sessions_created"], 0);
    }

    #[test]
    fn test_folder_counts() {
        let ok = ArchiveOutcome {
            archive_path: PathBuf::from("a.zip"),
            response: IngestResponse::success("ok", IngestSummary::default()),
        };
        let bad = ArchiveOutcome {
            archive_path: PathBuf::from("b.zip"),
            response: IngestResponse::failed("bad", IngestSummary::default()),
        };
        let folder = FolderIngestResponse { archives: vec![ok, bad] };
        assert_eq!(folder.succeeded(), 1);
        assert_eq!(folder.failed(), 1);
    }

    #[test]
    fn test_dates_serialize_as_iso_dates() {
        let response = ListDatesResponse {
            dates: vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"dates":["2024-01-02"]}"#);
    }

    #[test]
    fn test_comparison_request_default_lookback() {
        let request: ComparisonRequest = serde_json::from_str(
            r#"{"broker_a":"b1","symbol_a":"XAUUSD","broker_b":"b2","symbol_b":"XAUUSDe","limit":null}"#,
        )
        .unwrap();
        assert_eq!(request.lookback, Lookback::All);
        assert!(request.limit.is_none());
    }

    #[test]
    fn test_comparison_request_lookback_hours() {
        let request: ComparisonRequest = serde_json::from_str(
            r#"{"broker_a":"b1","symbol_a":"EURUSD","broker_b":"b2","symbol_b":"EURUSD","limit":50,"lookback":24}"#,
        )
        .unwrap();
        assert_eq!(request.lookback, Lookback::Hours(24));
        assert_eq!(request.limit, Some(50));

        let rejected = serde_json::from_str::<ComparisonRequest>(
            r#"{"broker_a":"b1","symbol_a":"EURUSD","broker_b":"b2","symbol_b":"EURUSD","lookback":{"hours":0}}"#,
        );
        assert!(rejected.is_err());
    }
}
