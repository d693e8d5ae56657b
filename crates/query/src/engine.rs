//! Query engine.
//!
//! Maps typed requests onto store reads. Every operation is read-only and
//! either returns a (possibly empty) result or propagates the store error.

use chrono::NaiveDate;
use quote_core::config::QueryConfig;
use quote_core::{
    day_bounds, now_ms, BrokersResponse, BrokersSymbolsResponse, ComparisonRequest,
    ComparisonResponse, FetchQuotesRequest, FetchQuotesResponse, ListDatesRequest,
    ListDatesResponse, ListSessionsRequest, ListSessionsResponse, ListSymbolsRequest,
    ListSymbolsResponse, Result, Session, SessionQuotesRequest, TimestampMs,
};
use quote_storage::{QuoteFilter, QuoteStore};
use tracing::debug;

/// Read-side facade over one store handle.
pub struct QueryEngine<'s> {
    store: &'s QuoteStore,
    config: QueryConfig,
}

impl<'s> QueryEngine<'s> {
    /// Engine over an acquired store handle.
    pub fn new(store: &'s QuoteStore, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Distinct brokers, sorted.
    pub fn list_brokers(&self) -> Result<BrokersResponse> {
        Ok(BrokersResponse {
            brokers: self.store.brokers()?,
        })
    }

    /// Every broker mapped to its symbols.
    pub fn list_brokers_with_symbols(&self) -> Result<BrokersSymbolsResponse> {
        Ok(BrokersSymbolsResponse {
            brokers: self.store.brokers_with_symbols()?,
        })
    }

    /// Distinct symbols for a broker, sorted.
    pub fn list_symbols(&self, request: &ListSymbolsRequest) -> Result<ListSymbolsResponse> {
        Ok(ListSymbolsResponse {
            symbols: self.store.symbols_for_broker(&request.broker)?,
        })
    }

    /// Distinct UTC dates with quotes, ascending.
    pub fn list_dates(&self, request: &ListDatesRequest) -> Result<ListDatesResponse> {
        Ok(ListDatesResponse {
            dates: self.store.dates_for(&request.broker, &request.symbol)?,
        })
    }

    /// Sessions with quotes on a UTC day.
    pub fn list_sessions(&self, request: &ListSessionsRequest) -> Result<ListSessionsResponse> {
        Ok(ListSessionsResponse {
            sessions: self
                .store
                .sessions_for_date(&request.broker, &request.symbol, request.date)?,
        })
    }

    /// Quotes matching the request, ascending by timestamp.
    ///
    /// A `date` narrows the window to that UTC day, intersected with any
    /// explicit start/end.
    pub fn fetch_quotes(&self, request: &FetchQuotesRequest) -> Result<FetchQuotesResponse> {
        let (start_time, end_time) = window(request.date, request.start_time, request.end_time);
        let filter = QuoteFilter {
            broker: request.broker.as_deref(),
            symbol: request.symbol.as_deref(),
            start_time,
            end_time,
        };
        debug!(?filter, "Fetching quotes");
        Ok(FetchQuotesResponse {
            quotes: self.store.fetch_quotes(&filter)?,
        })
    }

    /// One session, if it exists.
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.store.session(session_id)
    }

    /// Quotes of one session, ascending by timestamp.
    pub fn get_session_quotes(&self, request: &SessionQuotesRequest) -> Result<FetchQuotesResponse> {
        Ok(FetchQuotesResponse {
            quotes: self.store.quotes_for_session(&request.session_id)?,
        })
    }

    /// Recent quotes for two (broker, symbol) pairs, relative to now.
    pub fn fetch_comparison(&self, request: &ComparisonRequest) -> Result<ComparisonResponse> {
        self.fetch_comparison_at(request, now_ms())
    }

    /// Recent quotes for two pairs with the lookback measured from `now`.
    ///
    /// Pair A rows come first, then pair B, each newest-first and capped at
    /// the effective limit. Unknown brokers or symbols yield no rows.
    pub fn fetch_comparison_at(
        &self,
        request: &ComparisonRequest,
        now: TimestampMs,
    ) -> Result<ComparisonResponse> {
        let limit = self.effective_limit(request.limit);
        let since = request.lookback.cutoff(now);
        debug!(
            broker_a = %request.broker_a,
            symbol_a = %request.symbol_a,
            broker_b = %request.broker_b,
            symbol_b = %request.symbol_b,
            limit,
            lookback = %request.lookback,
            "Fetching comparison"
        );

        let paired = self.store.comparison(
            (request.broker_a.as_str(), request.symbol_a.as_str()),
            (request.broker_b.as_str(), request.symbol_b.as_str()),
            since,
            limit,
        )?;

        let mut data = paired.first;
        data.extend(paired.second);
        Ok(ComparisonResponse { data })
    }

    fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.default_comparison_limit)
            .min(self.config.max_comparison_limit)
    }
}

/// Intersect an optional calendar day with optional explicit bounds.
fn window(
    date: Option<NaiveDate>,
    start: Option<TimestampMs>,
    end: Option<TimestampMs>,
) -> (Option<TimestampMs>, Option<TimestampMs>) {
    let Some(date) = date else {
        return (start, end);
    };
    let (day_start, day_end) = day_bounds(date);
    (
        Some(start.map_or(day_start, |s| s.max(day_start))),
        Some(end.map_or(day_end, |e| e.min(day_end))),
    )
}
