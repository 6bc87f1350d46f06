//! Equal-weight hold strategies.

use openclose_backtest::{Broker, Strategy};
use openclose_core::{Result, Security};
use openclose_data::DataSource;

/// Keeps an equal long position in every security, rebalanced before each
/// close.
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    securities: Vec<Security>,
}

impl BuyAndHold {
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
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "Buy and Hold"
    }

    fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, _data_source: &D) -> Result<()> {
        rebalance_equal(broker, &self.securities, 1.0)
    }
}

/// Mirror of [`BuyAndHold`]: an equal short position in every security.
#[derive(Debug, Clone)]
pub struct SellAndHold {
    securities: Vec<Security>,
}

impl SellAndHold {
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
}

impl Strategy for SellAndHold {
    fn name(&self) -> &str {
        "Sell and Hold"
    }

    fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, _data_source: &D) -> Result<()> {
        rebalance_equal(broker, &self.securities, -1.0)
    }
}

fn rebalance_equal<B: Broker>(broker: &mut B, securities: &[Security], sign: f64) -> Result<()> {
    if securities.is_empty() {
        return Ok(());
    }
    let proportion = sign / securities.len() as f64;
    for security in securities {
        broker.place_order_proportion(security, proportion)?;
    }
    Ok(())
}
