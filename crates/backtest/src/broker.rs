//! Broker ledger.
//!
//! Executes orders at the latest price visible through a data source and
//! values the portfolio. Fills are frictionless: no fees, no slippage.

use openclose_core::{Error, PriceBar, Quantity, Result, Security};
use openclose_data::DataSource;
use tracing::debug;

use crate::position::{Execution, PositionLedger};

/// Order entry and account valuation.
pub trait Broker {
    /// Market order for `quantity` shares (negative = sell or short).
    fn place_order(&mut self, security: &Security, quantity: Quantity) -> Result<()>;

    /// Limit order for `quantity` shares.
    fn place_limit_order(&mut self, security: &Security, quantity: Quantity, limit_price: f64) -> Result<()>;

    /// Market order that rebalances `security` to `proportion` of total value.
    /// A proportion of 1 puts the whole portfolio into `security`, values
    /// above 1 use margin and negative values short.
    fn place_order_proportion(&mut self, security: &Security, proportion: f64) -> Result<()>;

    /// Limit order sized like [`Broker::place_order_proportion`].
    fn place_limit_order_proportion(&mut self, security: &Security, proportion: f64, limit_price: f64) -> Result<()>;

    /// Cash in the account.
    fn liquid_value(&self) -> f64;

    /// Cash plus the market value of every position.
    fn total_value(&self) -> Result<f64>;
}

/// Simulated broker that keeps its own cash and position ledger.
///
/// Cash may go negative (implicit margin). Limit prices are journaled but
/// never constrain a fill.
pub struct LedgerBroker<'a, D: DataSource> {
    cash: f64,
    positions: PositionLedger,
    executions: Vec<Execution>,
    data_source: &'a D,
}

impl<'a, D: DataSource> LedgerBroker<'a, D> {
    /// Create a broker holding `initial_capital` in cash.
    pub fn new(initial_capital: f64, data_source: &'a D) -> Self {
        Self {
            cash: initial_capital,
            positions: PositionLedger::new(),
            executions: Vec::new(),
            data_source,
        }
    }

    /// Current positions.
    pub fn positions(&self) -> &PositionLedger {
        &self.positions
    }

    /// Every fill, in order.
    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    /// Consume the broker, returning cash, positions and the journal.
    pub fn into_parts(self) -> (f64, PositionLedger, Vec<Execution>) {
        (self.cash, self.positions, self.executions)
    }

    fn latest_bar(&self, security: &Security) -> Result<PriceBar> {
        self.data_source
            .daily_history(security, Some(1), true)?
            .pop()
            .ok_or_else(|| Error::data_unavailable(format!("no price available for {security}")))
    }

    fn execute(&mut self, security: &Security, quantity: Quantity, limit_price: Option<f64>) -> Result<()> {
        if quantity == 0 {
            return Ok(());
        }

        let bar = self.latest_bar(security)?;
        let execution = Execution {
            date: bar.date,
            security: security.clone(),
            quantity,
            price: bar.close,
            limit_price,
        };
        self.cash += execution.cash_delta();
        let position = self.positions.apply(security, quantity);

        debug!(
            date = %bar.date,
            security = %security,
            quantity,
            price = bar.close,
            position,
            cash = self.cash,
            "Order filled"
        );
        self.executions.push(execution);
        Ok(())
    }

    /// Shares to trade so that `security` ends up at `proportion` of total
    /// value. Zero when the price or the portfolio value is indeterminate,
    /// including a security with no visible bars yet.
    fn rebalance_quantity(&self, security: &Security, proportion: f64) -> Result<Quantity> {
        let price = self
            .data_source
            .daily_history(security, Some(1), true)?
            .last()
            .map_or(f64::NAN, |bar| bar.close);
        let total_value = self.total_value()?;
        let target = (proportion * total_value / price).round_ties_even();

        if price.is_nan() || total_value.is_nan() || !target.is_finite() {
            debug!(
                security = %security,
                price,
                total_value,
                proportion,
                "Valuation indeterminate, skipping proportional order"
            );
            return Ok(0);
        }
        Ok(target as Quantity - self.positions.quantity(security))
    }
}

impl<D: DataSource> Broker for LedgerBroker<'_, D> {
    fn place_order(&mut self, security: &Security, quantity: Quantity) -> Result<()> {
        self.execute(security, quantity, None)
    }

    fn place_limit_order(&mut self, security: &Security, quantity: Quantity, limit_price: f64) -> Result<()> {
        self.execute(security, quantity, Some(limit_price))
    }

    fn place_order_proportion(&mut self, security: &Security, proportion: f64) -> Result<()> {
        let quantity = self.rebalance_quantity(security, proportion)?;
        self.execute(security, quantity, None)
    }

    fn place_limit_order_proportion(&mut self, security: &Security, proportion: f64, limit_price: f64) -> Result<()> {
        let quantity = self.rebalance_quantity(security, proportion)?;
        self.execute(security, quantity, Some(limit_price))
    }

    fn liquid_value(&self) -> f64 {
        self.cash
    }

    fn total_value(&self) -> Result<f64> {
        let mut total = self.cash;
        for (security, quantity) in self.positions.iter() {
            total += self.data_source.current_price(security)? * quantity as f64;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use openclose_core::{Frequency, Quote, TradeDate};
    use std::collections::HashMap;

    /// Data source with one fixed price per ticker.
    struct StaticPrices {
        prices: HashMap<String, f64>,
    }

    impl StaticPrices {
        fn new(prices: &[(&str, f64)]) -> Self {
            Self {
                prices: prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
            }
        }
    }

    impl DataSource for StaticPrices {
        fn price_history(
            &self,
            security: &Security,
            _frequency: Frequency,
            _bar_count: Option<usize>,
            _approx_eod_close: bool,
        ) -> Result<Vec<PriceBar>> {
            let price = self
                .prices
                .get(security.ticker())
                .ok_or_else(|| Error::data_unavailable(security.ticker()))?;
            let date = TradeDate::from_ymd_opt(2020, 1, 2).unwrap();
            Ok(vec![PriceBar::new(date, *price, *price, *price, *price, 0.0)])
        }

        fn quote(&self, security: &Security) -> Result<Quote> {
            Err(Error::data_unavailable(security.ticker()))
        }
    }

    #[test]
    fn test_place_order_debits_cash() {
        let prices = StaticPrices::new(&[("AAPL", 100.0)]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);
        let aapl = Security::equity("AAPL");

        broker.place_order(&aapl, 3).unwrap();
        assert_relative_eq!(broker.liquid_value(), 700.0);
        assert_eq!(broker.positions().quantity(&aapl), 3);
        assert_relative_eq!(broker.total_value().unwrap(), 1_000.0);

        broker.place_order(&aapl, -5).unwrap();
        assert_relative_eq!(broker.liquid_value(), 1_200.0);
        assert_eq!(broker.positions().quantity(&aapl), -2);
    }

    #[test]
    fn test_cash_conservation() {
        let prices = StaticPrices::new(&[("AAPL", 101.25), ("MSFT", 47.5)]);
        let mut broker = LedgerBroker::new(10_000.0, &prices);
        let aapl = Security::equity("AAPL");
        let msft = Security::equity("MSFT");

        broker.place_order(&aapl, 7).unwrap();
        broker.place_limit_order(&msft, -12, 40.0).unwrap();
        broker.place_order_proportion(&aapl, 0.4).unwrap();
        broker.place_limit_order_proportion(&msft, 0.25, 60.0).unwrap();
        broker.place_order(&aapl, -3).unwrap();

        let applied: f64 = broker
            .executions()
            .iter()
            .map(|e| e.price * e.quantity as f64)
            .sum();
        assert_relative_eq!(broker.liquid_value() - 10_000.0, -applied, epsilon = 1e-9);
    }

    #[test]
    fn test_limit_price_is_recorded_only() {
        let prices = StaticPrices::new(&[("AAPL", 100.0)]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);
        let aapl = Security::equity("AAPL");

        broker.place_limit_order(&aapl, 2, 50.0).unwrap();
        let fill = &broker.executions()[0];
        assert_eq!(fill.price, 100.0);
        assert_eq!(fill.limit_price, Some(50.0));
        assert_relative_eq!(broker.liquid_value(), 800.0);
    }

    #[test]
    fn test_proportional_order_converges() {
        let prices = StaticPrices::new(&[("AAPL", 33.0)]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);
        let aapl = Security::equity("AAPL");

        broker.place_order_proportion(&aapl, 1.0).unwrap();
        let market_value = broker.positions().quantity(&aapl) as f64 * 33.0;
        assert!((market_value - 1_000.0).abs() <= 33.0);

        // Already on target: no further fills.
        broker.place_order_proportion(&aapl, 1.0).unwrap();
        assert_eq!(broker.executions().len(), 1);
    }

    #[test]
    fn test_sequential_proportions_see_each_other() {
        let prices = StaticPrices::new(&[("AAPL", 100.0), ("MSFT", 50.0)]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);
        let aapl = Security::equity("AAPL");
        let msft = Security::equity("MSFT");

        broker.place_order_proportion(&aapl, 0.5).unwrap();
        broker.place_order_proportion(&msft, 0.5).unwrap();
        assert_eq!(broker.positions().quantity(&aapl), 5);
        assert_eq!(broker.positions().quantity(&msft), 10);
        assert_relative_eq!(broker.liquid_value(), 0.0);
    }

    #[test]
    fn test_nan_price_skips_trade() {
        let prices = StaticPrices::new(&[("AAPL", f64::NAN)]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);
        let aapl = Security::equity("AAPL");

        broker.place_order_proportion(&aapl, 1.0).unwrap();
        assert!(broker.executions().is_empty());
        assert_eq!(broker.positions().quantity(&aapl), 0);
        assert_relative_eq!(broker.liquid_value(), 1_000.0);
    }

    #[test]
    fn test_nan_proportion_skips_trade() {
        let prices = StaticPrices::new(&[("AAPL", 10.0)]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);

        broker.place_order_proportion(&Security::equity("AAPL"), f64::NAN).unwrap();
        assert!(broker.executions().is_empty());
    }

    #[test]
    fn test_unknown_security_fails() {
        let prices = StaticPrices::new(&[]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);
        let err = broker.place_order(&Security::equity("XYZ"), 1).unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_round_half_to_even() {
        // 2.5 shares rounds to 2, 3.5 shares rounds to 4.
        let prices = StaticPrices::new(&[("AAPL", 100.0)]);
        let mut broker = LedgerBroker::new(1_000.0, &prices);
        let aapl = Security::equity("AAPL");

        broker.place_order_proportion(&aapl, 0.25).unwrap();
        assert_eq!(broker.positions().quantity(&aapl), 2);

        let mut broker = LedgerBroker::new(1_400.0, &prices);
        broker.place_order_proportion(&aapl, 0.25).unwrap();
        assert_eq!(broker.positions().quantity(&aapl), 4);
    }
}
