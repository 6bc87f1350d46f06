//! Target positions for today.
//!
//! Runs a strategy's before-close decision once against an empty account and
//! reports what it would hold. Meant for a data source that serves today's
//! bars, such as a freshly preloaded price cache.

use std::collections::BTreeMap;

use openclose_core::Result;
use openclose_data::DataSource;
use serde::Serialize;
use tracing::info;

use crate::broker::{Broker, LedgerBroker};
use crate::position::Execution;
use crate::strategy::Strategy;

/// Positions a strategy would hold after one decision.
#[derive(Debug, Clone, Serialize)]
pub struct LivePositions {
    pub strategy_name: String,
    /// Shares per ticker. Flat positions are omitted.
    pub positions: BTreeMap<String, i64>,
    /// Cash left over.
    pub liquid_value: f64,
    pub executions: Vec<Execution>,
}

/// Invoke `before_close` once with `capital` in cash.
pub fn target_positions<S, D>(strategy: &mut S, data_source: &D, capital: f64) -> Result<LivePositions>
where
    S: Strategy,
    D: DataSource,
{
    let mut broker = LedgerBroker::new(capital, data_source);
    strategy.before_close(&mut broker, data_source)?;

    let liquid_value = broker.liquid_value();
    let (_, positions, executions) = broker.into_parts();
    let positions = positions.to_ticker_map();

    info!(
        strategy = strategy.name(),
        capital,
        liquid_value,
        holdings = positions.len(),
        "Computed target positions"
    );

    Ok(LivePositions {
        strategy_name: strategy.name().to_string(),
        positions,
        liquid_value,
        executions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Local;
    use openclose_core::{PriceBar, Security, TradeDate};
    use openclose_data::{CachedHistoryProvider, PriceCache};
    use std::sync::Arc;

    struct Split;

    impl Strategy for Split {
        fn name(&self) -> &str {
            "Split"
        }

        fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, _data_source: &D) -> Result<()> {
            broker.place_order_proportion(&Security::equity("AAPL"), 0.5)?;
            broker.place_order_proportion(&Security::equity("BRK.B"), 0.5)
        }
    }

    #[test]
    fn test_target_positions_from_latest_close() {
        let date = TradeDate::from_ymd_opt(2022, 6, 1).unwrap();
        let mut cache = PriceCache::new();
        cache.insert("AAPL", vec![PriceBar::new(date, 99.0, 101.0, 98.0, 100.0, 5.0)], Local::now());
        cache.insert("BRK-B", vec![PriceBar::new(date, 49.0, 51.0, 48.0, 50.0, 5.0)], Local::now());
        let provider = CachedHistoryProvider::new(Arc::new(cache));

        let live = target_positions(&mut Split, &provider, 1_000.0).unwrap();
        assert_eq!(live.strategy_name, "Split");
        assert_eq!(live.positions.get("AAPL"), Some(&5));
        assert_eq!(live.positions.get("BRK.B"), Some(&10));
        assert_relative_eq!(live.liquid_value, 0.0);
        assert_eq!(live.executions.len(), 2);
    }
}
