//! Reference strategies for the open/close backtester.
//!
//! This crate provides:
//! - Buy-and-hold and sell-and-hold over an equal-weight universe
//! - A running-average momentum strategy
//! - Percentage-return helpers shared by strategies
//! - [`BuiltinStrategy`], a closed set of the above selectable by name

pub mod hold;
pub mod running_avg;
pub mod util;

use std::fmt;
use std::str::FromStr;

use openclose_backtest::{Broker, Strategy};
use openclose_core::{Error, Result};
use openclose_data::DataSource;
use serde::{Deserialize, Serialize};

pub use hold::{BuyAndHold, SellAndHold};
pub use running_avg::RunningAvg;
pub use util::{pct_returns, ReturnTable};

/// Name of a built-in strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    BuyAndHold,
    SellAndHold,
    RunningAvg,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::BuyAndHold,
        StrategyKind::SellAndHold,
        StrategyKind::RunningAvg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::BuyAndHold => "buy-and-hold",
            StrategyKind::SellAndHold => "sell-and-hold",
            StrategyKind::RunningAvg => "running-avg",
        }
    }

    /// Instantiate over `tickers`.
    pub fn build<I, T>(self, tickers: I) -> BuiltinStrategy
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        match self {
            StrategyKind::BuyAndHold => BuiltinStrategy::BuyAndHold(BuyAndHold::new(tickers)),
            StrategyKind::SellAndHold => BuiltinStrategy::SellAndHold(SellAndHold::new(tickers)),
            StrategyKind::RunningAvg => BuiltinStrategy::RunningAvg(RunningAvg::new(tickers)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                Error::config(format!(
                    "unknown strategy '{s}', expected one of buy-and-hold, sell-and-hold, running-avg"
                ))
            })
    }
}

/// Any built-in strategy, dispatched statically.
#[derive(Debug, Clone)]
pub enum BuiltinStrategy {
    BuyAndHold(BuyAndHold),
    SellAndHold(SellAndHold),
    RunningAvg(RunningAvg),
}

impl Strategy for BuiltinStrategy {
    fn name(&self) -> &str {
        match self {
            BuiltinStrategy::BuyAndHold(s) => s.name(),
            BuiltinStrategy::SellAndHold(s) => s.name(),
            BuiltinStrategy::RunningAvg(s) => s.name(),
        }
    }

    fn on_open<B: Broker, D: DataSource>(&mut self, broker: &mut B, data_source: &D) -> Result<()> {
        match self {
            BuiltinStrategy::BuyAndHold(s) => s.on_open(broker, data_source),
            BuiltinStrategy::SellAndHold(s) => s.on_open(broker, data_source),
            BuiltinStrategy::RunningAvg(s) => s.on_open(broker, data_source),
        }
    }

    fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, data_source: &D) -> Result<()> {
        match self {
            BuiltinStrategy::BuyAndHold(s) => s.before_close(broker, data_source),
            BuiltinStrategy::SellAndHold(s) => s.before_close(broker, data_source),
            BuiltinStrategy::RunningAvg(s) => s.before_close(broker, data_source),
        }
    }
}
