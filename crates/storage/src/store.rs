//! Store handle: writes and reads against one SQLite connection.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use quote_core::{
    day_bounds, ms_to_iso, ComparisonPoint, Error, QuoteRecord, QuoteTick, Result, Session,
    TimestampMs,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use tracing::{error, info, warn};

use crate::schema;

/// Map a rusqlite error into the core taxonomy.
pub(crate) fn sql_error(err: rusqlite::Error) -> Error {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => Error::constraint(err.to_string()),
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::DiskFull
            | ErrorCode::SystemIoFailure
            | ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly,
        ) => Error::storage_unavailable(err.to_string()),
        _ => Error::database(err.to_string()),
    }
}

/// Range filter for [`QuoteStore::fetch_quotes`]. Bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct QuoteFilter<'a> {
    /// Broker name.
    pub broker: Option<&'a str>,
    /// Instrument symbol.
    pub symbol: Option<&'a str>,
    /// Earliest timestamp (ms).
    pub start_time: Option<TimestampMs>,
    /// Latest timestamp (ms).
    pub end_time: Option<TimestampMs>,
}

/// Comparison rows for two (broker, symbol) pairs, each newest-first.
#[derive(Debug, Clone, Default)]
pub struct PairedQuotes {
    /// Rows for pair A.
    pub first: Vec<ComparisonPoint>,
    /// Rows for pair B.
    pub second: Vec<ComparisonPoint>,
}

impl PairedQuotes {
    /// Whether neither pair has rows.
    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }
}

/// One open handle onto the quote store.
#[derive(Debug)]
pub struct QuoteStore {
    conn: Connection,
}

impl QuoteStore {
    pub(crate) fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open a private, migrated in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_error)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(sql_error)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Whether a session row with this id exists.
    pub fn session_exists(&self, session_id: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sessions WHERE session_id = ?1)",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(sql_error)
    }

    /// Insert a new session row.
    ///
    /// Fails with `ConstraintViolation` if the id is already taken; callers
    /// check [`QuoteStore::session_exists`] first.
    pub fn insert_session(&self, session: &Session) -> Result<()> {
        if session.start_time > session.end_time {
            return Err(Error::data(format!(
                "session {} starts after it ends ({} > {})",
                session.session_id, session.start_time, session.end_time
            )));
        }

        self.conn
            .execute(
                "INSERT INTO sessions (session_id, broker, symbol, archive_name, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.session_id,
                    session.broker,
                    session.symbol,
                    session.archive_name,
                    session.start_time,
                    session.end_time,
                ],
            )
            .map_err(|e| match sql_error(e) {
                Error::ConstraintViolation(msg) => Error::constraint(format!(
                    "session {} already exists: {msg}",
                    session.session_id
                )),
                other => other,
            })?;

        info!(
            session_id = %session.session_id,
            broker = %session.broker,
            symbol = %session.symbol,
            start_time = session.start_time,
            end_time = session.end_time,
            "Inserted session"
        );
        Ok(())
    }

    /// Upsert a batch of quotes for one session in a single transaction.
    ///
    /// A repeated `(session_id, timestamp)` overwrites bid/ask. Returns the
    /// number of rows written; an empty batch is a no-op.
    pub fn insert_quotes_bulk(&mut self, session_id: &str, quotes: &[QuoteTick]) -> Result<usize> {
        if quotes.is_empty() {
            warn!(session_id = %session_id, "Skipped empty quote list");
            return Ok(0);
        }

        let result = (|| -> rusqlite::Result<usize> {
            let tx = self.conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO quotes (session_id, timestamp, bid, ask)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (session_id, timestamp)
                     DO UPDATE SET bid = excluded.bid, ask = excluded.ask",
                )?;
                for quote in quotes {
                    written += stmt.execute(params![session_id, quote.ts_ms, quote.bid, quote.ask])?;
                }
            }
            tx.commit()?;
            Ok(written)
        })();

        match result {
            Ok(written) => {
                info!(session_id = %session_id, quotes = written, "Quotes upserted");
                Ok(written)
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Error inserting quotes");
                Err(sql_error(e))
            }
        }
    }

    // ------------------------------------------------------------------
    // Enumeration reads
    // ------------------------------------------------------------------

    /// Distinct brokers.
    pub fn brokers(&self) -> Result<Vec<String>> {
        self.strings("SELECT DISTINCT broker FROM sessions ORDER BY broker", params![])
    }

    /// Distinct symbols for a broker.
    pub fn symbols_for_broker(&self, broker: &str) -> Result<Vec<String>> {
        self.strings(
            "SELECT DISTINCT symbol FROM sessions WHERE broker = ?1 ORDER BY symbol",
            params![broker],
        )
    }

    /// Every broker with its distinct symbols.
    pub fn brokers_with_symbols(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT broker, symbol FROM sessions ORDER BY broker, symbol")
            .map_err(sql_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(sql_error)?;

        let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (broker, symbol) = row.map_err(sql_error)?;
            mapping.entry(broker).or_default().push(symbol);
        }
        Ok(mapping)
    }

    /// Distinct UTC calendar dates with quotes for a (broker, symbol), ascending.
    ///
    /// Seconds are floored so pre-epoch quotes land on the same day as
    /// [`day_bounds`] puts them.
    pub fn dates_for(&self, broker: &str, symbol: &str) -> Result<Vec<NaiveDate>> {
        let raw = self.strings(
            "SELECT DISTINCT DATE((q.timestamp - ((q.timestamp % 1000) + 1000) % 1000) / 1000, 'unixepoch')
             FROM quotes q
             JOIN sessions s ON q.session_id = s.session_id
             WHERE s.broker = ?1 AND s.symbol = ?2
             ORDER BY 1",
            params![broker, symbol],
        )?;

        raw.iter()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|e| Error::data(format!("unexpected date '{d}': {e}")))
            })
            .collect()
    }

    /// Ids of sessions with quotes on a UTC calendar day.
    pub fn sessions_for_date(&self, broker: &str, symbol: &str, date: NaiveDate) -> Result<Vec<String>> {
        let (start, end) = day_bounds(date);
        self.strings(
            "SELECT DISTINCT s.session_id
             FROM sessions s
             JOIN quotes q ON s.session_id = q.session_id
             WHERE s.broker = ?1 AND s.symbol = ?2 AND q.timestamp BETWEEN ?3 AND ?4
             ORDER BY s.session_id",
            params![broker, symbol, start, end],
        )
    }

    /// Look up one session.
    pub fn session(&self, session_id: &str) -> Result<Option<Session>> {
        self.conn
            .query_row(
                "SELECT session_id, broker, symbol, archive_name, start_time, end_time
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(Session {
                        session_id: row.get(0)?,
                        broker: row.get(1)?,
                        symbol: row.get(2)?,
                        archive_name: row.get(3)?,
                        start_time: row.get(4)?,
                        end_time: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(sql_error)
    }

    /// Number of sessions.
    pub fn count_sessions(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .map_err(sql_error)
    }

    /// Number of quotes stored for a session.
    pub fn count_quotes(&self, session_id: &str) -> Result<u64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM quotes WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(sql_error)
    }

    // ------------------------------------------------------------------
    // Range reads
    // ------------------------------------------------------------------

    /// Quotes matching any combination of broker, symbol and time bounds,
    /// ordered by timestamp.
    pub fn fetch_quotes(&self, filter: &QuoteFilter<'_>) -> Result<Vec<QuoteRecord>> {
        let mut sql = String::from(
            "SELECT q.session_id, q.timestamp, q.bid, q.ask
             FROM quotes q
             JOIN sessions s ON q.session_id = s.session_id
             WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(broker) = filter.broker {
            values.push(Value::Text(broker.to_string()));
            sql.push_str(&format!(" AND s.broker = ?{}", values.len()));
        }
        if let Some(symbol) = filter.symbol {
            values.push(Value::Text(symbol.to_string()));
            sql.push_str(&format!(" AND s.symbol = ?{}", values.len()));
        }
        if let Some(start) = filter.start_time {
            values.push(Value::Integer(start));
            sql.push_str(&format!(" AND q.timestamp >= ?{}", values.len()));
        }
        if let Some(end) = filter.end_time {
            values.push(Value::Integer(end));
            sql.push_str(&format!(" AND q.timestamp <= ?{}", values.len()));
        }
        sql.push_str(" ORDER BY q.timestamp, q.session_id");

        let mut stmt = self.conn.prepare(&sql).map_err(sql_error)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), raw_quote_row)
            .map_err(sql_error)?;
        collect_quote_records(rows)
    }

    /// Every quote of one session, ordered by timestamp.
    pub fn quotes_for_session(&self, session_id: &str) -> Result<Vec<QuoteRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT session_id, timestamp, bid, ask
                 FROM quotes
                 WHERE session_id = ?1
                 ORDER BY timestamp",
            )
            .map_err(sql_error)?;
        let rows = stmt
            .query_map(params![session_id], raw_quote_row)
            .map_err(sql_error)?;
        collect_quote_records(rows)
    }

    /// Most recent quotes for two (broker, symbol) pairs.
    ///
    /// Each pair is capped at `limit` rows, newest first, and bounded below by
    /// `since` when given. If any requested broker or symbol is unknown the
    /// result is empty.
    pub fn comparison(
        &self,
        pair_a: (&str, &str),
        pair_b: (&str, &str),
        since: Option<TimestampMs>,
        limit: usize,
    ) -> Result<PairedQuotes> {
        for broker in [pair_a.0, pair_b.0] {
            if !self.exists("SELECT EXISTS(SELECT 1 FROM sessions WHERE broker = ?1)", broker)? {
                warn!(broker = %broker, "Broker not found for comparison");
                return Ok(PairedQuotes::default());
            }
        }
        for symbol in [pair_a.1, pair_b.1] {
            if !self.exists("SELECT EXISTS(SELECT 1 FROM sessions WHERE symbol = ?1)", symbol)? {
                warn!(symbol = %symbol, "Symbol not found for comparison");
                return Ok(PairedQuotes::default());
            }
        }

        Ok(PairedQuotes {
            first: self.recent_for_pair(pair_a, since, limit)?,
            second: self.recent_for_pair(pair_b, since, limit)?,
        })
    }

    fn recent_for_pair(
        &self,
        (broker, symbol): (&str, &str),
        since: Option<TimestampMs>,
        limit: usize,
    ) -> Result<Vec<ComparisonPoint>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT q.session_id, q.timestamp, q.bid, q.ask
                 FROM quotes q
                 JOIN sessions s ON q.session_id = s.session_id
                 WHERE s.broker = ?1 AND s.symbol = ?2 AND q.timestamp >= ?3
                 ORDER BY q.timestamp DESC, q.session_id
                 LIMIT ?4",
            )
            .map_err(sql_error)?;
        let rows = stmt
            .query_map(
                params![broker, symbol, since.unwrap_or(i64::MIN), limit],
                raw_quote_row,
            )
            .map_err(sql_error)?;

        let mut points = Vec::new();
        for row in rows {
            let (session_id, ts, bid, ask) = row.map_err(sql_error)?;
            points.push(ComparisonPoint {
                broker: broker.to_string(),
                symbol: symbol.to_string(),
                session_id,
                bid,
                ask,
                timestamp: ms_to_iso(ts)?,
            });
        }
        Ok(points)
    }

    fn exists(&self, sql: &str, value: &str) -> Result<bool> {
        self.conn
            .query_row(sql, params![value], |row| row.get(0))
            .map_err(sql_error)
    }

    fn strings(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql).map_err(sql_error)?;
        let rows = stmt
            .query_map(params, |row| row.get::<_, Option<String>>(0))
            .map_err(sql_error)?;

        let mut out = Vec::new();
        for row in rows {
            if let Some(value) = row.map_err(sql_error)? {
                out.push(value);
            }
        }
        Ok(out)
    }
}

type RawQuote = (String, TimestampMs, f64, f64);

fn raw_quote_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawQuote> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn collect_quote_records(
    rows: impl Iterator<Item = rusqlite::Result<RawQuote>>,
) -> Result<Vec<QuoteRecord>> {
    let mut records = Vec::new();
    for row in rows {
        let (session_id, ts, bid, ask) = row.map_err(sql_error)?;
        records.push(QuoteRecord {
            session_id,
            timestamp: ms_to_iso(ts)?,
            bid,
            ask,
        });
    }
    Ok(records)
}
