//! End-to-end backtest scenarios over an in-memory price cache.
//!
//! Tests cover:
//! - Buy-and-hold on a constant price
//! - Sequential proportional orders across two securities
//! - Abort on a degenerate strategy computation
//! - Point-in-time visibility in both hooks
//! - Cash conservation over a trading run

use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::{Days, Local, NaiveDate};
use openclose_backtest::{BacktestEngine, Broker, Strategy};
use openclose_core::config::{BacktestConfig, MetricsConfig};
use openclose_core::{Error, PriceBar, Result, Security, TradeDate};
use openclose_data::{CachedHistoryProvider, DataSource, PriceCache};

fn date(n: u64) -> TradeDate {
    NaiveDate::from_ymd_opt(2021, 1, 4).unwrap() + Days::new(n)
}

fn make_bar(n: u64, open: f64, close: f64) -> PriceBar {
    PriceBar::new(date(n), open, open.max(close) + 1.0, open.min(close) - 1.0, close, 1_000.0)
}

fn flat_series(days: u64, price: f64) -> Vec<PriceBar> {
    (0..days).map(|n| make_bar(n, price, price)).collect()
}

fn trending_series(days: u64, start: f64, step: f64) -> Vec<PriceBar> {
    (0..days)
        .map(|n| {
            let close = start + step * n as f64;
            make_bar(n, close - step / 2.0, close)
        })
        .collect()
}

fn provider(series: Vec<(&str, Vec<PriceBar>)>) -> CachedHistoryProvider {
    let mut cache = PriceCache::new();
    for (ticker, bars) in series {
        cache.insert(ticker, bars, Local::now());
    }
    CachedHistoryProvider::new(Arc::new(cache))
}

fn engine(initial_capital: f64) -> BacktestEngine {
    BacktestEngine::new(
        BacktestConfig {
            initial_capital,
            ..Default::default()
        },
        MetricsConfig::default(),
    )
}

/// Rebalances each ticker to an equal share of the portfolio before the close.
struct EqualWeight {
    tickers: Vec<Security>,
}

impl EqualWeight {
    fn new(tickers: &[&str]) -> Self {
        Self {
            tickers: tickers.iter().map(|t| Security::equity(*t)).collect(),
        }
    }
}

impl Strategy for EqualWeight {
    fn name(&self) -> &str {
        "EqualWeight"
    }

    fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, _data_source: &D) -> Result<()> {
        let proportion = 1.0 / self.tickers.len() as f64;
        for security in &self.tickers {
            broker.place_order_proportion(security, proportion)?;
        }
        Ok(())
    }
}

mod buy_and_hold {
    use super::*;

    #[test]
    fn constant_price_buys_once() {
        let provider = provider(vec![("SPY", flat_series(10, 100.0))]);
        let outcome = engine(1_000.0)
            .run(&mut EqualWeight::new(&["SPY"]), &provider)
            .unwrap();
        let record = &outcome.record;

        assert_eq!(record.dates.len(), 10);
        assert_eq!(record.final_positions.quantity(&Security::equity("SPY")), 10);
        assert_relative_eq!(record.liquid_value, 0.0);
        assert_eq!(record.executions.len(), 1);
        assert_eq!(record.executions[0].date, date(0));
        assert!(record.portfolio_values.iter().all(|value| *value == 1_000.0));

        let cum = outcome.tear_sheet.column(|row| row.portfolio_cum_return);
        assert!(cum.iter().all(|r| *r == 0.0));
    }

    #[test]
    fn two_securities_split_evenly() {
        let provider = provider(vec![
            ("SPY", flat_series(3, 100.0)),
            ("AAPL", flat_series(3, 100.0)),
            ("MSFT", flat_series(3, 50.0)),
        ]);
        let record = engine(1_000.0)
            .simulate(&mut EqualWeight::new(&["AAPL", "MSFT"]), &provider)
            .unwrap();

        assert_eq!(record.final_positions.quantity(&Security::equity("AAPL")), 5);
        assert_eq!(record.final_positions.quantity(&Security::equity("MSFT")), 10);
        assert_relative_eq!(record.liquid_value, 0.0);
        assert_eq!(record.executions.len(), 2);
    }

    #[test]
    fn late_listing_waits_for_its_first_bar() {
        // NEW only trades from day 3 on; until then its order is skipped.
        let late: Vec<PriceBar> = flat_series(6, 50.0).into_iter().skip(3).collect();
        let provider = provider(vec![
            ("SPY", flat_series(6, 100.0)),
            ("AAPL", flat_series(6, 100.0)),
            ("NEW", late),
        ]);
        let record = engine(1_000.0)
            .simulate(&mut EqualWeight::new(&["AAPL", "NEW"]), &provider)
            .unwrap();

        assert_eq!(record.dates.len(), 6);
        assert_eq!(record.final_positions.quantity(&Security::equity("AAPL")), 5);
        assert_eq!(record.final_positions.quantity(&Security::equity("NEW")), 10);
        assert_eq!(record.executions[0].date, date(0));
        assert_eq!(record.executions[1].date, date(3));
        assert_relative_eq!(record.liquid_value, 0.0);
        assert!(record.portfolio_values.iter().all(|value| *value == 1_000.0));
    }

    #[test]
    fn tracks_benchmark_when_fully_invested_in_it() {
        let provider = provider(vec![("SPY", trending_series(40, 100.0, 1.0))]);
        let outcome = engine(100_000.0)
            .run(&mut EqualWeight::new(&["SPY"]), &provider)
            .unwrap();

        let rows = outcome.tear_sheet.rows();
        let last = rows.last().unwrap();
        assert_relative_eq!(last.portfolio_cum_return, last.benchmark_cum_return, epsilon = 1e-3);
    }
}

mod aborts {
    use super::*;

    /// Fails on the given before-close call, counting from one.
    struct FailsOnDay {
        fail_on: usize,
        days_seen: usize,
    }

    impl Strategy for FailsOnDay {
        fn name(&self) -> &str {
            "FailsOnDay"
        }

        fn before_close<B: Broker, D: DataSource>(&mut self, _broker: &mut B, _data_source: &D) -> Result<()> {
            self.days_seen += 1;
            if self.days_seen == self.fail_on {
                return Err(Error::degenerate("weights are undefined"));
            }
            Ok(())
        }
    }

    #[test]
    fn degenerate_error_stops_the_run() {
        let provider = provider(vec![("SPY", flat_series(20, 100.0))]);
        let mut strategy = FailsOnDay {
            fail_on: 5,
            days_seen: 0,
        };

        let err = engine(1_000.0).run(&mut strategy, &provider).unwrap_err();
        assert!(err.is_degenerate());
        assert_eq!(strategy.days_seen, 5);
    }

    /// Buys one share of a security before every close.
    struct BuyAtOpen(&'static str);

    impl Strategy for BuyAtOpen {
        fn name(&self) -> &str {
            "BuyAtOpen"
        }

        fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, _data_source: &D) -> Result<()> {
            broker.place_order(&Security::equity(self.0), 1)
        }
    }

    #[test]
    fn explicit_order_before_first_bar_fails() {
        let late: Vec<PriceBar> = flat_series(6, 50.0).into_iter().skip(3).collect();
        let provider = provider(vec![("SPY", flat_series(6, 100.0)), ("NEW", late)]);

        let err = engine(1_000.0).simulate(&mut BuyAtOpen("NEW"), &provider).unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn unknown_security_is_data_unavailable() {
        let provider = provider(vec![("SPY", flat_series(5, 100.0))]);
        let err = engine(1_000.0)
            .simulate(&mut EqualWeight::new(&["XYZ"]), &provider)
            .unwrap_err();
        assert!(err.is_data_unavailable());
    }
}

mod visibility {
    use super::*;

    /// Asserts point-in-time visibility for every security on every hook.
    struct Auditor {
        tickers: Vec<Security>,
        current: u64,
        checks: usize,
    }

    impl Auditor {
        fn audit<D: DataSource>(&mut self, data_source: &D, market_open: bool) -> Result<()> {
            let today = date(self.current);
            for security in &self.tickers {
                let settled = data_source.daily_history(security, None, false)?;
                assert!(settled.iter().all(|bar| bar.date < today));

                let approx = data_source.daily_history(security, None, true)?;
                assert!(approx.iter().all(|bar| bar.date <= today));

                let last = approx.last().copied();
                if let Some(bar) = last.filter(|bar| bar.date == today) {
                    assert_eq!(bar.is_open_only(), market_open);
                }
                self.checks += 1;
            }
            Ok(())
        }
    }

    impl Strategy for Auditor {
        fn name(&self) -> &str {
            "Auditor"
        }

        fn on_open<B: Broker, D: DataSource>(&mut self, _broker: &mut B, data_source: &D) -> Result<()> {
            self.audit(data_source, true)
        }

        fn before_close<B: Broker, D: DataSource>(&mut self, _broker: &mut B, data_source: &D) -> Result<()> {
            self.audit(data_source, false)?;
            self.current += 1;
            Ok(())
        }
    }

    #[test]
    fn hooks_never_see_the_future() {
        // MSFT starts later than the calendar reference.
        let msft: Vec<PriceBar> = trending_series(15, 20.0, 0.5).into_iter().skip(5).collect();
        let provider = provider(vec![("SPY", trending_series(15, 100.0, 1.0)), ("MSFT", msft)]);
        let mut auditor = Auditor {
            tickers: vec![Security::equity("SPY"), Security::equity("MSFT")],
            current: 0,
            checks: 0,
        };

        engine(1_000.0).simulate(&mut auditor, &provider).unwrap();
        assert_eq!(auditor.current, 15);
        assert_eq!(auditor.checks, 15 * 2 * 2);
    }
}

mod conservation {
    use super::*;

    /// Rotates between two securities and trades at both hooks.
    struct Rotator {
        day: usize,
    }

    impl Strategy for Rotator {
        fn name(&self) -> &str {
            "Rotator"
        }

        fn on_open<B: Broker, D: DataSource>(&mut self, broker: &mut B, _data_source: &D) -> Result<()> {
            broker.place_order(&Security::equity("AAPL"), (self.day % 3) as i64 - 1)
        }

        fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, _data_source: &D) -> Result<()> {
            let (long, short) = if self.day % 2 == 0 { ("AAPL", "MSFT") } else { ("MSFT", "AAPL") };
            broker.place_order_proportion(&Security::equity(long), 0.8)?;
            broker.place_limit_order_proportion(&Security::equity(short), -0.3, 1.0)?;
            self.day += 1;
            Ok(())
        }
    }

    #[test]
    fn cash_moves_only_by_fills() {
        let provider = provider(vec![
            ("SPY", trending_series(30, 100.0, 1.0)),
            ("AAPL", trending_series(30, 130.0, -0.75)),
            ("MSFT", trending_series(30, 45.0, 0.4)),
        ]);
        let record = engine(25_000.0).simulate(&mut Rotator { day: 0 }, &provider).unwrap();

        let traded: f64 = record.executions.iter().map(|e| e.price * e.quantity as f64).sum();
        assert_relative_eq!(record.liquid_value - 25_000.0, -traded, epsilon = 1e-6);

        for (security, quantity) in record.final_positions.iter() {
            let net: i64 = record
                .executions
                .iter()
                .filter(|e| &e.security == security)
                .map(|e| e.quantity)
                .sum();
            assert_eq!(net, quantity);
        }
        assert!(record.portfolio_values.iter().all(|value| value.is_finite()));
    }
}
