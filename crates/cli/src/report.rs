//! JSON run reports.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use openclose_backtest::{BacktestOutcome, Execution, TearSheet, TearSheetSummary};
use openclose_core::config::MetricsConfig;
use serde::Serialize;

/// Everything the `backtest` command reports for one strategy.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub strategy: String,
    pub final_value: f64,
    pub liquid_value: f64,
    pub positions: BTreeMap<String, i64>,
    pub summary: TearSheetSummary,
    pub tear_sheet: TearSheet,
    pub executions: Vec<Execution>,
}

impl RunReport {
    pub fn new(outcome: BacktestOutcome, metrics: &MetricsConfig) -> Self {
        let summary = outcome.tear_sheet.summary(metrics);
        let record = outcome.record;
        Self {
            strategy: record.strategy_name.clone(),
            final_value: record.final_value(),
            liquid_value: record.liquid_value,
            positions: record.final_positions.to_ticker_map(),
            summary,
            tear_sheet: outcome.tear_sheet,
            executions: record.executions,
        }
    }
}

/// Write `value` as pretty JSON to `path`, or to stdout when `path` is `None`.
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, Local, NaiveDate};
    use openclose_backtest::BacktestEngine;
    use openclose_core::config::BacktestConfig;
    use openclose_core::PriceBar;
    use openclose_data::{CachedHistoryProvider, PriceCache};
    use openclose_strategies::StrategyKind;
    use std::sync::Arc;

    #[test]
    fn test_report_serializes_nan_as_null() {
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let bars: Vec<PriceBar> = (0..5u64)
            .map(|n| PriceBar::new(start + Days::new(n), 100.0, 100.0, 100.0, 100.0, 1.0))
            .collect();
        let mut cache = PriceCache::new();
        cache.insert("SPY", bars, Local::now());
        let provider = CachedHistoryProvider::new(Arc::new(cache));

        let engine = BacktestEngine::new(
            BacktestConfig {
                initial_capital: 1_000.0,
                ..Default::default()
            },
            MetricsConfig::default(),
        );
        let outcome = engine.run(&mut StrategyKind::BuyAndHold.build(["SPY"]), &provider).unwrap();
        let report = RunReport::new(outcome, engine.metrics_config());

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "Buy and Hold");
        assert_eq!(json["positions"]["SPY"], 10);
        assert_eq!(json["tear_sheet"]["rows"].as_array().unwrap().len(), 5);
        assert!(json["tear_sheet"]["rows"][0]["portfolio_daily_return"].is_null());
    }

    #[test]
    fn test_write_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&BTreeMap::from([("AAPL", 3)]), Some(&path)).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"AAPL\": 3"));
    }
}
