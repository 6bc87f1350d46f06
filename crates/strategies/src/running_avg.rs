//! Running-average momentum.
//!
//! Weights each security by its mean return over the last few bars,
//! normalized by the sum of all means.

use openclose_backtest::{Broker, Strategy};
use openclose_core::{Error, Result, Security};
use openclose_data::DataSource;
use tracing::debug;

use crate::util::pct_returns;

/// Bars of history behind each mean.
pub const LOOKBACK_BARS: usize = 10;

/// Keeps the weight denominator away from zero.
const WEIGHT_DAMPING: f64 = 0.0001;

#[derive(Debug, Clone)]
pub struct RunningAvg {
    securities: Vec<Security>,
}

impl RunningAvg {
    pub fn new<I, T>(tickers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            securities: tickers.into_iter().map(Security::equity).collect(),
        }
    }

    pub fn securities(&self) -> &[Security] {
        &self.securities
    }

    /// Target weight per security for the current instant.
    ///
    /// Fails with [`Error::ComputationDegenerate`] when any weight is not
    /// finite: too little history, or means cancelling the damping term.
    pub fn weights<D: DataSource>(&self, data_source: &D) -> Result<Vec<f64>> {
        let returns = pct_returns(&self.securities, LOOKBACK_BARS, data_source)?;
        normalize(&self.securities, &returns.column_means(self.securities.len()))
    }
}

fn normalize(securities: &[Security], means: &[f64]) -> Result<Vec<f64>> {
    let denominator = means.iter().sum::<f64>() + WEIGHT_DAMPING;
    securities
        .iter()
        .zip(means)
        .map(|(security, mean)| {
            let weight = mean / denominator;
            if weight.is_finite() {
                Ok(weight)
            } else {
                Err(Error::degenerate(format!("{weight} weight for {security}")))
            }
        })
        .collect()
}

impl Strategy for RunningAvg {
    fn name(&self) -> &str {
        "Running Avg"
    }

    fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, data_source: &D) -> Result<()> {
        let weights = self.weights(data_source)?;
        debug!(?weights, "Running average weights");

        for (security, weight) in self.securities.iter().zip(weights) {
            broker.place_order_proportion(security, weight)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Local;
    use openclose_backtest::BacktestEngine;
    use openclose_core::config::{BacktestConfig, MetricsConfig};
    use openclose_core::{PriceBar, TradeDate};
    use openclose_data::{CachedHistoryProvider, PriceCache};
    use std::sync::Arc;

    fn provider(series: &[(&str, Vec<f64>)]) -> CachedHistoryProvider {
        let start = TradeDate::from_ymd_opt(2021, 3, 1).unwrap();
        let mut cache = PriceCache::new();
        for (ticker, closes) in series {
            let bars = closes
                .iter()
                .enumerate()
                .map(|(n, c)| PriceBar::new(start + chrono::Days::new(n as u64), *c, *c, *c, *c, 1.0))
                .collect();
            cache.insert(ticker, bars, Local::now());
        }
        CachedHistoryProvider::new(Arc::new(cache))
    }

    fn geometric(start: f64, growth: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start * growth.powi(i as i32)).collect()
    }

    #[test]
    fn test_weights_follow_mean_returns() {
        let provider = provider(&[("AAA", geometric(100.0, 1.02, 12)), ("BBB", geometric(50.0, 1.01, 12))]);
        let strategy = RunningAvg::new(["AAA", "BBB"]);

        let weights = strategy.weights(&provider).unwrap();
        let denominator = 0.02 + 0.01 + WEIGHT_DAMPING;
        assert_relative_eq!(weights[0], 0.02 / denominator, epsilon = 1e-9);
        assert_relative_eq!(weights[1], 0.01 / denominator, epsilon = 1e-9);
    }

    #[test]
    fn test_cancelled_denominator_is_degenerate() {
        let securities = [Security::equity("AAA"), Security::equity("BBB")];
        let err = normalize(&securities, &[-WEIGHT_DAMPING, 0.0]).unwrap_err();
        assert!(err.is_degenerate());

        let weights = normalize(&securities, &[0.02, 0.01]).unwrap();
        assert_relative_eq!(weights[0] + weights[1], 0.03 / (0.03 + WEIGHT_DAMPING));
    }

    #[test]
    fn test_first_day_is_degenerate() {
        // A single visible bar leaves no returns to average.
        let provider = provider(&[("SPY", geometric(100.0, 1.01, 20)), ("AAA", geometric(10.0, 1.01, 20))]);
        let engine = BacktestEngine::new(
            BacktestConfig {
                initial_capital: 1_000.0,
                ..Default::default()
            },
            MetricsConfig::default(),
        );

        let err = engine.simulate(&mut RunningAvg::new(["AAA"]), &provider).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_runs_once_history_exists() {
        let provider = provider(&[
            ("SPY", geometric(100.0, 1.01, 30)),
            ("AAA", geometric(10.0, 1.01, 30)),
            ("BBB", geometric(20.0, 0.995, 30)),
        ]);
        let engine = BacktestEngine::new(
            BacktestConfig {
                initial_capital: 10_000.0,
                start_date: TradeDate::from_ymd_opt(2021, 3, 5),
                ..Default::default()
            },
            MetricsConfig::default(),
        );

        let record = engine.simulate(&mut RunningAvg::new(["AAA", "BBB"]), &provider).unwrap();
        assert!(record.final_positions.quantity(&Security::equity("AAA")) > 0);
        assert!(record.final_positions.quantity(&Security::equity("BBB")) < 0);
    }
}
