//! Core data types for the openclose backtester.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Calendar date of a daily bar.
pub type TradeDate = NaiveDate;

/// Signed share count.
pub type Quantity = i64;

/// Asset class of a security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    /// A stock or share in a company.
    Equity,
}

/// A tradable security.
///
/// Two securities are equal iff their tickers match; the asset class does not
/// take part in equality, hashing or ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    ticker: String,
    asset_class: AssetClass,
}

impl Security {
    /// Create a security.
    pub fn new(ticker: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            ticker: ticker.into(),
            asset_class,
        }
    }

    /// Create an equity security.
    pub fn equity(ticker: impl Into<String>) -> Self {
        Self::new(ticker, AssetClass::Equity)
    }

    /// Ticker symbol.
    #[inline]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Asset class.
    #[inline]
    pub fn asset_class(&self) -> AssetClass {
        self.asset_class
    }
}

impl PartialEq for Security {
    fn eq(&self, other: &Self) -> bool {
        self.ticker == other.ticker
    }
}

impl Eq for Security {}

impl Hash for Security {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ticker.hash(state);
    }
}

impl PartialOrd for Security {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Security {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ticker.cmp(&other.ticker)
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ticker)
    }
}

/// Bar frequency. Only daily bars are served by the data sources in this
/// workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Minute,
    Day,
    Week,
    Month,
    Year,
}

/// Daily OHLCV bar, adjusted for dividends and splits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading date.
    pub date: TradeDate,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Total volume.
    pub volume: f64,
}

impl PriceBar {
    /// Create a bar.
    pub fn new(date: TradeDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// The bar as it looks at the opening bell: high, low and close collapse
    /// to the open and no volume has traded yet.
    pub fn masked_at_open(&self) -> Self {
        Self {
            date: self.date,
            open: self.open,
            high: self.open,
            low: self.open,
            close: self.open,
            volume: 0.0,
        }
    }

    /// Whether this bar carries no information beyond its open.
    pub fn is_open_only(&self) -> bool {
        self.high == self.open && self.low == self.open && self.close == self.open && self.volume == 0.0
    }
}

/// Current bid/ask quote for a security.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
    /// Time the quote was taken.
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Calculate mid price.
    #[inline]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Calculate spread.
    #[inline]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}
