//! Member identity decoding.
//!
//! A CSV member named `<broker>_<symbol>_<session tokens...>.csv` yields the
//! broker, the symbol, and the remaining tokens rejoined with `_` as the
//! session id.

use std::path::Path;

use quote_core::{Error, Result, SessionIdentity};

/// Whether `path` has the given extension (ASCII case-insensitive).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Decode broker, symbol and session id from a member's file name.
///
/// Any directory prefix is ignored. Names with fewer than three tokens, or
/// with an empty broker, symbol or session id, are rejected.
pub fn decode_member_name(name: &str) -> Result<SessionIdentity> {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::member_name(format!("'{name}' has no file name")))?;

    let mut tokens = stem.split('_');
    let broker = tokens.next().unwrap_or_default();
    let symbol = tokens.next().unwrap_or_default();
    let session_id = tokens.collect::<Vec<_>>().join("_");

    if broker.is_empty() || symbol.is_empty() || session_id.is_empty() {
        return Err(Error::member_name(format!(
            "'{name}' does not match <broker>_<symbol>_<session>"
        )));
    }

    Ok(SessionIdentity {
        broker: broker.to_string(),
        symbol: symbol.to_string(),
        session_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name() {
        let id = decode_member_name("broker1_EURUSD_s1.csv").unwrap();
        assert_eq!(id.broker, "broker1");
        assert_eq!(id.symbol, "EURUSD");
        assert_eq!(id.session_id, "s1");
    }

    #[test]
    fn test_session_tokens_rejoined() {
        let id = decode_member_name("Tradeview_XAUUSD_2024_01_15_London.csv").unwrap();
        assert_eq!(id.broker, "Tradeview");
        assert_eq!(id.symbol, "XAUUSD");
        assert_eq!(id.session_id, "2024_01_15_London");
    }

    #[test]
    fn test_directory_prefix_ignored() {
        let id = decode_member_name("exports/day1/broker1_EURUSD_s1.csv").unwrap();
        assert_eq!(id.broker, "broker1");
        assert_eq!(id.session_id, "s1");
    }

    #[test]
    fn test_dots_in_session_kept() {
        let id = decode_member_name("b_EURUSD_2024.01.15.csv").unwrap();
        assert_eq!(id.session_id, "2024.01.15");
    }

    #[test]
    fn test_too_few_tokens_rejected() {
        assert!(matches!(decode_member_name("EURUSD.csv"), Err(Error::MemberName(_))));
        assert!(matches!(decode_member_name("broker1_EURUSD.csv"), Err(Error::MemberName(_))));
    }

    #[test]
    fn test_empty_tokens_rejected() {
        assert!(decode_member_name("_EURUSD_s1.csv").is_err());
        assert!(decode_member_name("broker1__s1.csv").is_err());
        assert!(decode_member_name("broker1_EURUSD_.csv").is_err());
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a/b_c_d.csv"), "csv"));
        assert!(has_extension(Path::new("B_C_D.CSV"), "csv"));
        assert!(!has_extension(Path::new("b_c_d.csv.bak"), "csv"));
        assert!(!has_extension(Path::new("README"), "csv"));
    }
}
