//! CSV row decoding.
//!
//! Each row must carry a timestamp, a bid and an ask. A row that does not is
//! dropped with a warning; its siblings are unaffected.

use std::io::Read;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use quote_core::config::IngestionConfig;
use quote_core::{Error, QuoteTick, Result};
use thiserror::Error;
use tracing::warn;

/// Why a single row was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowDecodeError {
    /// The header has no such column, or the row is too short.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// The field is present but not a valid number, or the timestamp is out of range.
    #[error("invalid {column} value '{value}'")]
    InvalidField { column: String, value: String },

    /// The row could not be decoded as CSV (e.g. invalid UTF-8).
    #[error("undecodable row: {0}")]
    Malformed(String),
}

/// Rows decoded from one CSV member.
#[derive(Debug, Clone, Default)]
pub struct DecodedRows {
    /// Valid observations in file order.
    pub quotes: Vec<QuoteTick>,
    /// Rows dropped by the decoder.
    pub rejected: u64,
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone)]
struct ColumnIndices {
    timestamp: Option<usize>,
    bid: Option<usize>,
    ask: Option<usize>,
}

impl ColumnIndices {
    fn from_headers(headers: &StringRecord, config: &IngestionConfig) -> Self {
        let lookup = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
        };
        Self {
            timestamp: lookup(config.timestamp_column.as_str()),
            bid: lookup(config.bid_column.as_str()),
            ask: lookup(config.ask_column.as_str()),
        }
    }

    fn missing<'a>(&self, config: &'a IngestionConfig) -> Vec<&'a str> {
        let mut missing = Vec::new();
        if self.timestamp.is_none() {
            missing.push(config.timestamp_column.as_str());
        }
        if self.bid.is_none() {
            missing.push(config.bid_column.as_str());
        }
        if self.ask.is_none() {
            missing.push(config.ask_column.as_str());
        }
        missing
    }
}

fn field<'r>(
    record: &'r StringRecord,
    index: Option<usize>,
    column: &str,
) -> std::result::Result<&'r str, RowDecodeError> {
    index
        .and_then(|i| record.get(i))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RowDecodeError::MissingField(column.to_string()))
}

fn decode_record(
    record: &StringRecord,
    columns: &ColumnIndices,
    config: &IngestionConfig,
) -> std::result::Result<QuoteTick, RowDecodeError> {
    let ts_raw = field(record, columns.timestamp, &config.timestamp_column)?;
    let bid_raw = field(record, columns.bid, &config.bid_column)?;
    let ask_raw = field(record, columns.ask, &config.ask_column)?;

    let ts_ms = ts_raw
        .parse::<i64>()
        .ok()
        .filter(|&ts| DateTime::<Utc>::from_timestamp_millis(ts).is_some())
        .ok_or_else(|| RowDecodeError::InvalidField {
            column: config.timestamp_column.clone(),
            value: ts_raw.to_string(),
        })?;
    let price = |raw: &str, column: &str| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| RowDecodeError::InvalidField {
                column: column.to_string(),
                value: raw.to_string(),
            })
    };

    Ok(QuoteTick {
        ts_ms,
        bid: price(bid_raw, config.bid_column.as_str())?,
        ask: price(ask_raw, config.ask_column.as_str())?,
    })
}

/// Decode every row of a CSV stream.
///
/// Fails only when the header cannot be read or the underlying stream
/// breaks; individual bad rows are counted in [`DecodedRows::rejected`].
pub fn decode_rows<R: Read>(reader: R, member: &str, config: &IngestionConfig) -> Result<DecodedRows> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| Error::csv(format!("{member}: unreadable header: {e}")))?
        .clone();
    let columns = ColumnIndices::from_headers(&headers, config);
    let missing = columns.missing(config);
    if !missing.is_empty() {
        warn!(member = %member, missing = ?missing, "Header lacks required columns; every row will be skipped");
    }

    let mut decoded = DecodedRows::default();
    let mut record = StringRecord::new();
    let mut line: u64 = 1;
    loop {
        line += 1;
        let outcome = match csv.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => decode_record(&record, &columns, config),
            Err(e) if e.is_io_error() => {
                return Err(Error::csv(format!("{member}: read failed at line {line}: {e}")));
            }
            Err(e) => Err(RowDecodeError::Malformed(e.to_string())),
        };

        match outcome {
            Ok(quote) => decoded.quotes.push(quote),
            Err(reason) => {
                // Header-level gaps were already reported once.
                if missing.is_empty() {
                    warn!(member = %member, line, reason = %reason, "Skipping row");
                }
                decoded.rejected += 1;
            }
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decode(input: &str) -> DecodedRows {
        decode_rows(input.as_bytes(), "test.csv", &IngestionConfig::default()).unwrap()
    }

    #[test]
    fn test_valid_rows() {
        let rows = decode("Ts,Bid,Ask\n1000,1.1,1.2\n2000,1.15,1.25\n");
        assert_eq!(rows.quotes.len(), 2);
        assert_eq!(rows.rejected, 0);
        assert_eq!(rows.quotes[1].ts_ms, 2000);
        assert_relative_eq!(rows.quotes[1].bid, 1.15);
        assert_relative_eq!(rows.quotes[1].ask, 1.25);
    }

    #[test]
    fn test_column_order_and_extra_columns() {
        let rows = decode("Symbol,Ask,Ts,Bid,Volume\nEURUSD,1.2,1000,1.1,5\n");
        assert_eq!(rows.quotes, vec![QuoteTick { ts_ms: 1000, bid: 1.1, ask: 1.2 }]);
    }

    #[test]
    fn test_bad_rows_skipped_siblings_kept() {
        let rows = decode(
            "Ts,Bid,Ask\n\
             1000,1.1,1.2\n\
             1500,,1.2\n\
             abc,1.1,1.2\n\
             1600,x,1.2\n\
             1700,1.1\n\
             1800,NaN,1.2\n\
             2000,1.15,1.25\n",
        );
        assert_eq!(rows.quotes.len(), 2);
        assert_eq!(rows.rejected, 5);
        assert_eq!(rows.quotes[0].ts_ms, 1000);
        assert_eq!(rows.quotes[1].ts_ms, 2000);
    }

    #[test]
    fn test_fractional_timestamp_rejected() {
        let rows = decode("Ts,Bid,Ask\n1000.5,1.1,1.2\n");
        assert!(rows.quotes.is_empty());
        assert_eq!(rows.rejected, 1);
    }

    #[test]
    fn test_unrepresentable_timestamp_rejected() {
        let rows = decode("Ts,Bid,Ask\n1000,1.1,1.2\n9223372036854775807,1.1,1.2\n-9223372036854775808,1.1,1.2\n");
        assert_eq!(rows.quotes.len(), 1);
        assert_eq!(rows.rejected, 2);
        assert_eq!(rows.quotes[0].ts_ms, 1000);
    }

    #[test]
    fn test_whitespace_and_bom() {
        let rows = decode("\u{feff}Ts, Bid , Ask\n 1000 , 1.1 , 1.2 \n");
        assert_eq!(rows.quotes.len(), 1);
        assert_eq!(rows.quotes[0].ts_ms, 1000);
    }

    #[test]
    fn test_missing_header_column() {
        let rows = decode("Ts,Bid\n1000,1.1\n2000,1.2\n");
        assert!(rows.quotes.is_empty());
        assert_eq!(rows.rejected, 2);
    }

    #[test]
    fn test_invalid_utf8_row_skipped() {
        let mut input = b"Ts,Bid,Ask\n1000,1.1,1.2\n".to_vec();
        input.extend_from_slice(b"2000,\xff\xfe,1.2\n");
        input.extend_from_slice(b"3000,1.3,1.4\n");
        let rows = decode_rows(input.as_slice(), "t.csv", &IngestionConfig::default()).unwrap();
        assert_eq!(rows.quotes.len(), 2);
        assert_eq!(rows.rejected, 1);
    }

    #[test]
    fn test_custom_column_names() {
        let config = IngestionConfig {
            timestamp_column: "time".to_string(),
            bid_column: "b".to_string(),
            ask_column: "a".to_string(),
            ..Default::default()
        };
        let rows = decode_rows("time,b,a\n5,1.0,1.1\n".as_bytes(), "t.csv", &config).unwrap();
        assert_eq!(rows.quotes.len(), 1);
    }

    #[test]
    fn test_empty_member() {
        let rows = decode("");
        assert!(rows.quotes.is_empty());
        assert_eq!(rows.rejected, 0);
    }
}
