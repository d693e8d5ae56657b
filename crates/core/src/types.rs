//! Core data types for the quote archive.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Milliseconds in one UTC calendar day.
pub const MS_PER_DAY: TimestampMs = 86_400_000;

/// Milliseconds in one hour.
pub const MS_PER_HOUR: TimestampMs = 3_600_000;

/// Render an epoch-millisecond timestamp as an ISO-8601 UTC string with `Z`.
///
/// Whole seconds render without a fraction, anything else with milliseconds.
pub fn ms_to_iso(ts_ms: TimestampMs) -> Result<String> {
    let dt = DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .ok_or_else(|| Error::data(format!("timestamp out of range: {ts_ms}")))?;
    let format = if ts_ms.rem_euclid(1_000) == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Millis
    };
    Ok(dt.to_rfc3339_opts(format, true))
}

/// Inclusive `[start, end]` millisecond bounds of a UTC calendar day.
pub fn day_bounds(date: NaiveDate) -> (TimestampMs, TimestampMs) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis();
    (start, start + MS_PER_DAY - 1)
}

/// Current wall-clock time in epoch milliseconds.
#[inline]
pub fn now_ms() -> TimestampMs {
    Utc::now().timestamp_millis()
}

/// Identity of a CSV member, decoded from its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Broker token (first name token).
    pub broker: String,
    /// Symbol token (second name token).
    pub symbol: String,
    /// Remaining tokens rejoined with `_`.
    pub session_id: String,
}

/// A contiguous capture of quotes for one (broker, symbol) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Globally unique session id.
    pub session_id: String,
    /// Broker name.
    pub broker: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Source archive name (file stem).
    pub archive_name: String,
    /// Earliest quote timestamp at creation time.
    pub start_time: TimestampMs,
    /// Latest quote timestamp at creation time.
    pub end_time: TimestampMs,
}

impl Session {
    /// Build a session row from a member identity and its parsed quotes.
    ///
    /// Returns `None` when there are no quotes to bound the session.
    pub fn from_quotes(
        identity: &SessionIdentity,
        archive_name: &str,
        quotes: &[QuoteTick],
    ) -> Option<Self> {
        let start_time = quotes.iter().map(|q| q.ts_ms).min()?;
        let end_time = quotes.iter().map(|q| q.ts_ms).max()?;
        Some(Self {
            session_id: identity.session_id.clone(),
            broker: identity.broker.clone(),
            symbol: identity.symbol.clone(),
            archive_name: archive_name.to_string(),
            start_time,
            end_time,
        })
    }
}

/// One bid/ask observation as decoded from a CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteTick {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Bid price.
    pub bid: f64,
    /// Ask price.
    pub ask: f64,
}

/// Relative time range bounding comparison queries.
///
/// Serialized as `"all"` or a number of hours; deserialization also accepts
/// a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookback {
    /// All history.
    #[default]
    All,
    /// The last N hours relative to now.
    Hours(u32),
}

impl Lookback {
    /// Earliest timestamp included, relative to `now_ms`. `None` means unbounded.
    pub fn cutoff(self, now_ms: TimestampMs) -> Option<TimestampMs> {
        match self {
            Lookback::All => None,
            Lookback::Hours(hours) => Some(now_ms - i64::from(hours) * MS_PER_HOUR),
        }
    }
}

impl FromStr for Lookback {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Lookback::All);
        }
        match s.parse::<u32>() {
            Ok(hours) if hours > 0 => Ok(Lookback::Hours(hours)),
            _ => Err(Error::data(format!(
                "lookback must be 'all' or a positive number of hours, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::All => write!(f, "all"),
            Lookback::Hours(h) => write!(f, "{h}"),
        }
    }
}

impl Serialize for Lookback {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Lookback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Hours(i64),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Hours(hours) => hours.to_string(),
        };
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_iso_whole_seconds() {
        assert_eq!(ms_to_iso(1_700_000_000_000).unwrap(), "2023-11-14T22:13:20Z");
        assert_eq!(ms_to_iso(0).unwrap(), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_ms_to_iso_keeps_millis() {
        assert_eq!(ms_to_iso(1_700_000_000_500).unwrap(), "2023-11-14T22:13:20.500Z");
    }

    #[test]
    fn test_ms_to_iso_out_of_range() {
        assert!(ms_to_iso(i64::MAX).is_err());
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2023, 11, 14).unwrap();
        let (start, end) = day_bounds(date);
        assert_eq!(start, 1_699_920_000_000);
        assert_eq!(end - start, MS_PER_DAY - 1);
    }

    #[test]
    fn test_session_from_quotes() {
        let identity = SessionIdentity {
            broker: "broker1".to_string(),
            symbol: "EURUSD".to_string(),
            session_id: "s1".to_string(),
        };
        let quotes = [
            QuoteTick { ts_ms: 2000, bid: 1.15, ask: 1.25 },
            QuoteTick { ts_ms: 1000, bid: 1.1, ask: 1.2 },
        ];
        let session = Session::from_quotes(&identity, "broker1_EURUSD_s1", &quotes).unwrap();
        assert_eq!(session.start_time, 1000);
        assert_eq!(session.end_time, 2000);
        assert_eq!(session.archive_name, "broker1_EURUSD_s1");

        assert!(Session::from_quotes(&identity, "a", &[]).is_none());
    }

    #[test]
    fn test_lookback_serde() {
        let parse = |json: &str| serde_json::from_str::<Lookback>(json);
        assert_eq!(parse("\"all\"").unwrap(), Lookback::All);
        assert_eq!(parse("\"24\"").unwrap(), Lookback::Hours(24));
        assert_eq!(parse("24").unwrap(), Lookback::Hours(24));
        assert!(parse("0").is_err());
        assert!(parse("\"0\"").is_err());
        assert!(parse("-1").is_err());
        assert!(parse("{\"hours\":0}").is_err());

        assert_eq!(serde_json::to_string(&Lookback::All).unwrap(), "\"all\"");
        assert_eq!(serde_json::to_string(&Lookback::Hours(6)).unwrap(), "\"6\"");
    }

    #[test]
    fn test_lookback_parse() {
        assert_eq!("all".parse::<Lookback>().unwrap(), Lookback::All);
        assert_eq!("ALL".parse::<Lookback>().unwrap(), Lookback::All);
        assert_eq!("24".parse::<Lookback>().unwrap(), Lookback::Hours(24));
        assert!("0".parse::<Lookback>().is_err());
        assert!("-3".parse::<Lookback>().is_err());
        assert!("week".parse::<Lookback>().is_err());
    }

    #[test]
    fn test_lookback_cutoff() {
        let now = 10 * MS_PER_HOUR;
        assert_eq!(Lookback::All.cutoff(now), None);
        assert_eq!(Lookback::Hours(6).cutoff(now), Some(4 * MS_PER_HOUR));
    }
}
