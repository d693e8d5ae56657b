//! Configuration structures for the quote archive.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Archive ingestion configuration.
    pub ingestion: IngestionConfig,
    /// Query configuration.
    pub query: QueryConfig,
}

impl Config {
    /// Load configuration from a JSON file. Missing sections fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::not_found(path));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the core cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.db_path.as_os_str().is_empty() {
            return Err(Error::config("storage.db_path must not be empty"));
        }
        let columns = [
            ("ingestion.timestamp_column", &self.ingestion.timestamp_column),
            ("ingestion.bid_column", &self.ingestion.bid_column),
            ("ingestion.ask_column", &self.ingestion.ask_column),
            ("ingestion.csv_extension", &self.ingestion.csv_extension),
            ("ingestion.archive_extension", &self.ingestion.archive_extension),
        ];
        for (name, value) in columns {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{name} must not be empty")));
            }
        }
        if self.query.default_comparison_limit == 0 {
            return Err(Error::config("query.default_comparison_limit must be positive"));
        }
        if self.query.max_comparison_limit < self.query.default_comparison_limit {
            return Err(Error::config(
                "query.max_comparison_limit must be >= query.default_comparison_limit",
            ));
        }
        Ok(())
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log; readers never block on the writer.
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    /// Value for the `journal_mode` pragma.
    pub fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "wal",
            JournalMode::Delete => "delete",
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode applied when a handle is acquired.
    pub journal_mode: JournalMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("quotes.db"),
            busy_timeout_ms: 5_000,
            journal_mode: JournalMode::Wal,
        }
    }
}

/// Archive ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Extension of archive files picked up by folder ingestion.
    pub archive_extension: String,
    /// Extension of CSV members inside an archive.
    pub csv_extension: String,
    /// Header of the timestamp column (epoch milliseconds).
    pub timestamp_column: String,
    /// Header of the bid column.
    pub bid_column: String,
    /// Header of the ask column.
    pub ask_column: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            archive_extension: "zip".to_string(),
            csv_extension: "csv".to_string(),
            timestamp_column: "Ts".to_string(),
            bid_column: "Bid".to_string(),
            ask_column: "Ask".to_string(),
        }
    }
}

/// Query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Per-pair row cap for comparison queries when the caller gives none.
    pub default_comparison_limit: usize,
    /// Upper bound on any caller-supplied comparison limit.
    pub max_comparison_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_comparison_limit: 1_000,
            max_comparison_limit: 100_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.db_path, PathBuf::from("quotes.db"));
        assert_eq!(config.ingestion.timestamp_column, "Ts");
        assert_eq!(config.query.default_comparison_limit, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"storage": {{"db_path": "/tmp/q.db", "journal_mode": "delete"}}}}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/q.db"));
        assert_eq!(config.storage.journal_mode, JournalMode::Delete);
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
        assert_eq!(config.ingestion.bid_column, "Bid");
    }

    #[test]
    fn test_validate_rejects_empty_column() {
        let mut config = Config::default();
        config.ingestion.ask_column = " ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let mut config = Config::default();
        config.query.max_comparison_limit = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
