//! Process-wide price history cache.
//!
//! The cache is populated once, before any run starts, and then shared
//! read-only (typically as `Arc<PriceCache>`) by every concurrent run. Entries
//! are keyed by ticker and stay fresh until the local calendar date changes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use openclose_core::{Error, Frequency, PriceBar, Quote, Result, Security};
use tracing::{debug, info, warn};

use crate::source::{trailing_start, validate_request, DataSource, HistoryProvider};

/// External source of full bar histories (a market-data vendor, a directory
/// of bar files, ...).
pub trait HistoryFetcher {
    /// Download the complete daily history of `ticker`.
    fn fetch(&self, ticker: &str) -> Result<Vec<PriceBar>>;
}

/// A cached history and the time it was fetched.
#[derive(Debug, Clone)]
pub struct CachedHistory {
    /// Bars sorted by date, one per date.
    pub bars: Arc<[PriceBar]>,
    /// Local time of the last refresh.
    pub refreshed_at: DateTime<Local>,
}

impl CachedHistory {
    /// Fresh until the local calendar date of `now` moves past the refresh date.
    pub fn is_fresh(&self, now: DateTime<Local>) -> bool {
        self.refreshed_at.date_naive() == now.date_naive()
    }
}

/// Price histories keyed by normalized ticker.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: HashMap<String, CachedHistory>,
}

impl PriceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a ticker. Class-share tickers use a dash (`BRK.B` -> `BRK-B`).
    pub fn normalize_ticker(ticker: &str) -> String {
        ticker.trim().replace('.', "-")
    }

    /// Store a history, replacing any previous entry. Bars are sorted by date
    /// and duplicate dates are dropped (first occurrence wins).
    ///
    /// Returns the number of bars stored.
    pub fn insert(&mut self, ticker: &str, mut bars: Vec<PriceBar>, refreshed_at: DateTime<Local>) -> usize {
        let key = Self::normalize_ticker(ticker);
        bars.sort_by_key(|bar| bar.date);
        let before = bars.len();
        bars.dedup_by_key(|bar| bar.date);
        if bars.len() != before {
            warn!(ticker = %key, dropped = before - bars.len(), "Dropped bars with duplicate dates");
        }

        let count = bars.len();
        self.entries.insert(
            key,
            CachedHistory {
                bars: bars.into(),
                refreshed_at,
            },
        );
        count
    }

    /// Cached entry for a ticker.
    pub fn get(&self, ticker: &str) -> Option<&CachedHistory> {
        self.entries.get(&Self::normalize_ticker(ticker))
    }

    /// Cached bars for a ticker.
    pub fn bars(&self, ticker: &str) -> Option<Arc<[PriceBar]>> {
        self.get(ticker).map(|entry| Arc::clone(&entry.bars))
    }

    /// Whether a ticker is cached and fresh at `now`.
    pub fn is_fresh(&self, ticker: &str, now: DateTime<Local>) -> bool {
        self.get(ticker).is_some_and(|entry| entry.is_fresh(now))
    }

    /// Remove stale entries, returning their keys.
    pub fn evict_stale(&mut self, now: DateTime<Local>) -> Vec<String> {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.entries.remove(key);
        }
        stale
    }

    /// Fetch every ticker that is missing or stale at `now`.
    ///
    /// Returns the number of tickers fetched. The first fetch failure aborts
    /// the preload.
    pub fn preload<F: HistoryFetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        tickers: &[String],
        now: DateTime<Local>,
    ) -> Result<usize> {
        let mut fetched = 0;
        for ticker in tickers {
            if self.is_fresh(ticker, now) {
                debug!(ticker = %ticker, "Cache hit");
                continue;
            }
            let key = Self::normalize_ticker(ticker);
            info!(ticker = %key, "Downloading price history");
            let bars = fetcher.fetch(&key)?;
            if bars.is_empty() {
                return Err(Error::data_unavailable(format!("no price history for {key}")));
            }
            self.insert(&key, bars, now);
            fetched += 1;
        }
        Ok(fetched)
    }

    /// Number of cached tickers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached tickers in sorted order.
    pub fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tickers.sort_unstable();
        tickers
    }
}

/// Full-history daily equity provider backed by a populated [`PriceCache`].
///
/// Used directly in live mode (everything in the cache is visible) and as the
/// history behind a point-in-time view during backtests.
#[derive(Debug, Clone)]
pub struct CachedHistoryProvider {
    cache: Arc<PriceCache>,
}

impl CachedHistoryProvider {
    /// Wrap a populated cache.
    pub fn new(cache: Arc<PriceCache>) -> Self {
        Self { cache }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }
}

impl HistoryProvider for CachedHistoryProvider {
    fn full_history(&self, security: &Security, frequency: Frequency) -> Result<Arc<[PriceBar]>> {
        validate_request(security, frequency, None)?;
        self.cache
            .bars(security.ticker())
            .ok_or_else(|| Error::data_unavailable(format!("{security} is not in the price cache")))
    }
}

impl DataSource for CachedHistoryProvider {
    fn price_history(
        &self,
        security: &Security,
        frequency: Frequency,
        bar_count: Option<usize>,
        _approx_eod_close: bool,
    ) -> Result<Vec<PriceBar>> {
        validate_request(security, frequency, bar_count)?;
        let bars = self.full_history(security, frequency)?;
        let start = trailing_start(bars.len(), bar_count);
        Ok(bars[start..].to_vec())
    }

    fn quote(&self, security: &Security) -> Result<Quote> {
        Err(Error::data_unavailable(format!("quote data is not available for {security}")))
    }
}
