//! Strategy interface.

use openclose_core::Result;
use openclose_data::DataSource;

use crate::broker::Broker;

/// A decision unit invoked twice per trading day.
///
/// The driver calls [`Strategy::on_open`] while the market is open and
/// [`Strategy::before_close`] right before the close of the same date. During
/// `on_open` the current day's bar only reveals its open; a strategy must not
/// assume it can see the day's close there.
///
/// Any error aborts the run.
pub trait Strategy {
    /// Display name.
    fn name(&self) -> &str;

    /// Called on market open to place trades.
    fn on_open<B: Broker, D: DataSource>(&mut self, _broker: &mut B, _data_source: &D) -> Result<()> {
        Ok(())
    }

    /// Called right before market close to place trades. `approx_eod_close`
    /// requests can be used here to approximate the day's closing price.
    fn before_close<B: Broker, D: DataSource>(&mut self, broker: &mut B, data_source: &D) -> Result<()>;
}
