//! Data source contracts.
//!
//! A [`HistoryProvider`] hands out the complete bar history of a security. A
//! [`DataSource`] answers the questions a strategy or broker asks at a given
//! moment: recent bars and, where supported, a live quote.

use std::sync::Arc;

use openclose_core::{AssetClass, Error, Frequency, PriceBar, Quote, Result, Security};

/// Full-history access, ordered by date with no duplicate dates.
pub trait HistoryProvider {
    /// Every known bar of `security` at `frequency`.
    fn full_history(&self, security: &Security, frequency: Frequency) -> Result<Arc<[PriceBar]>>;
}

impl<T: HistoryProvider + ?Sized> HistoryProvider for &T {
    fn full_history(&self, security: &Security, frequency: Frequency) -> Result<Arc<[PriceBar]>> {
        (**self).full_history(security, frequency)
    }
}

/// Price and quote access as seen by strategies and brokers.
pub trait DataSource {
    /// Price history of `security`, oldest bar first.
    ///
    /// `bar_count` limits the result to the trailing bars; `None` returns the
    /// whole visible history. With `approx_eod_close` the current trading day
    /// is included as if it had already closed, using the best price known at
    /// the moment of the call.
    fn price_history(
        &self,
        security: &Security,
        frequency: Frequency,
        bar_count: Option<usize>,
        approx_eod_close: bool,
    ) -> Result<Vec<PriceBar>>;

    /// Current bid/ask quote.
    fn quote(&self, security: &Security) -> Result<Quote>;

    /// Daily price history.
    fn daily_history(
        &self,
        security: &Security,
        bar_count: Option<usize>,
        approx_eod_close: bool,
    ) -> Result<Vec<PriceBar>> {
        self.price_history(security, Frequency::Day, bar_count, approx_eod_close)
    }

    /// Latest known price, taken as the close of the most recent daily bar
    /// with the current day approximated.
    fn current_price(&self, security: &Security) -> Result<f64> {
        self.daily_history(security, Some(1), true)?
            .last()
            .map(|bar| bar.close)
            .ok_or_else(|| Error::data_unavailable(format!("no price available for {security}")))
    }
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn price_history(
        &self,
        security: &Security,
        frequency: Frequency,
        bar_count: Option<usize>,
        approx_eod_close: bool,
    ) -> Result<Vec<PriceBar>> {
        (**self).price_history(security, frequency, bar_count, approx_eod_close)
    }

    fn quote(&self, security: &Security) -> Result<Quote> {
        (**self).quote(security)
    }
}

/// Reject requests the daily equity sources cannot serve.
pub fn validate_request(
    security: &Security,
    frequency: Frequency,
    bar_count: Option<usize>,
) -> Result<()> {
    match security.asset_class() {
        AssetClass::Equity => {}
    }
    if frequency != Frequency::Day {
        return Err(Error::data_unavailable(format!(
            "only daily bars are available, {frequency:?} requested for {security}"
        )));
    }
    if bar_count == Some(0) {
        return Err(Error::data_unavailable(format!(
            "bar count must be positive when requesting {security}"
        )));
    }
    Ok(())
}

/// Start index of the trailing `bar_count` bars of a series ending at `end`.
#[inline]
pub fn trailing_start(end: usize, bar_count: Option<usize>) -> usize {
    bar_count.map_or(0, |n| end.saturating_sub(n))
}
