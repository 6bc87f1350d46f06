//! Configuration structures for the openclose backtester.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for a backtest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backtest driver configuration.
    pub backtest: BacktestConfig,
    /// Tear sheet configuration.
    pub metrics: MetricsConfig,
    /// Symbols traded by the strategy.
    pub universe: UniverseConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.backtest.validate()?;
        self.metrics.validate()?;
        if self.universe.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::config("universe contains an empty ticker"));
        }
        Ok(())
    }
}

/// Backtest driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Starting cash.
    pub initial_capital: f64,
    /// First simulated date (inclusive). `None` starts at the first calendar day.
    pub start_date: Option<NaiveDate>,
    /// Last simulated date (inclusive). `None` runs to the end of the calendar.
    pub end_date: Option<NaiveDate>,
    /// Benchmark ticker.
    pub benchmark: String,
    /// Ticker whose bar history defines the trading calendar.
    pub calendar_reference: String,
    /// Log progress every N trading days (0 = never).
    pub log_every: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 50_000.0,
            start_date: None,
            end_date: None,
            benchmark: "SPY".to_string(),
            calendar_reference: "SPY".to_string(),
            log_every: 50,
        }
    }
}

impl BacktestConfig {
    fn validate(&self) -> Result<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(Error::config(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(Error::config(format!("start date {start} is after end date {end}")));
            }
        }
        if self.benchmark.trim().is_empty() || self.calendar_reference.trim().is_empty() {
            return Err(Error::config("benchmark and calendar reference tickers are required"));
        }
        Ok(())
    }
}

/// Tear sheet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Rolling Sharpe window in trading days.
    pub sharpe_window: usize,
    /// Annual risk-free rate (e.g., 0.0012 for 0.12%).
    pub annual_risk_free_rate: f64,
    /// Trading periods per year used for annualization.
    pub periods_per_year: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sharpe_window: 180,
            annual_risk_free_rate: 0.0012,
            periods_per_year: 252,
        }
    }
}

impl MetricsConfig {
    /// Risk-free rate compounded down to one trading period.
    pub fn daily_risk_free_rate(&self) -> f64 {
        (1.0 + self.annual_risk_free_rate).powf(1.0 / self.periods_per_year as f64) - 1.0
    }

    fn validate(&self) -> Result<()> {
        if self.sharpe_window < 2 {
            return Err(Error::config("sharpe window must hold at least two returns"));
        }
        if self.periods_per_year == 0 {
            return Err(Error::config("periods per year must be positive"));
        }
        Ok(())
    }
}

/// Symbols traded by the strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Ticker symbols.
    pub symbols: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            symbols: ["AAPL", "AMZN", "BRK-B", "FB", "GOOGL", "MSFT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
