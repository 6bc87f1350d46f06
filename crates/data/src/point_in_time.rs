//! Point-in-time view over a full price history.
//!
//! The view owns the simulation clock. Bars dated after the clock's current
//! date are never returned, and while the market is open the current day's bar
//! only reveals its open.
//!
//! Before the close (`is_market_open == false`) a request with
//! `approx_eod_close` sees the current day's true close. The backtest is
//! retrospective, so that close is already known data; running the same
//! strategy live at that decision point needs a quote feed instead.

use std::cell::Cell;

use openclose_core::{Error, Frequency, PriceBar, Quote, Result, Security, TradeDate};

use crate::source::{trailing_start, validate_request, DataSource, HistoryProvider};

/// Simulated instant: a trading date and whether the market is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationClock {
    /// Current trading date.
    pub current_date: TradeDate,
    /// True between the open and the before-close decision point.
    pub is_market_open: bool,
}

/// Data source that only exposes data visible at the simulated instant.
pub struct PointInTimeDataSource<'a, P: HistoryProvider> {
    provider: &'a P,
    clock: Cell<SimulationClock>,
}

impl<'a, P: HistoryProvider> PointInTimeDataSource<'a, P> {
    /// Create a view positioned at `start_date` with the market closed.
    pub fn new(provider: &'a P, start_date: TradeDate) -> Self {
        Self {
            provider,
            clock: Cell::new(SimulationClock {
                current_date: start_date,
                is_market_open: false,
            }),
        }
    }

    /// Current clock.
    pub fn clock(&self) -> SimulationClock {
        self.clock.get()
    }

    /// Move the clock to `date`. Only the backtest driver calls this, between
    /// strategy hooks.
    pub fn set_date(&self, date: TradeDate) {
        let mut clock = self.clock.get();
        clock.current_date = date;
        self.clock.set(clock);
    }

    /// Toggle market-open visibility. Only the backtest driver calls this,
    /// between strategy hooks.
    pub fn set_market_open(&self, is_open: bool) {
        let mut clock = self.clock.get();
        clock.is_market_open = is_open;
        self.clock.set(clock);
    }

    /// The wrapped full-history provider.
    pub fn provider(&self) -> &'a P {
        self.provider
    }
}

impl<P: HistoryProvider> DataSource for PointInTimeDataSource<'_, P> {
    fn price_history(
        &self,
        security: &Security,
        frequency: Frequency,
        bar_count: Option<usize>,
        approx_eod_close: bool,
    ) -> Result<Vec<PriceBar>> {
        validate_request(security, frequency, bar_count)?;
        let bars = self.provider.full_history(security, frequency)?;
        let clock = self.clock.get();

        // Bars are sorted by date, so the visible prefix ends at a partition point.
        let end = if approx_eod_close {
            bars.partition_point(|bar| bar.date <= clock.current_date)
        } else {
            bars.partition_point(|bar| bar.date < clock.current_date)
        };
        let start = trailing_start(end, bar_count);
        let mut visible = bars[start..end].to_vec();

        if approx_eod_close && clock.is_market_open {
            if let Some(last) = visible.last_mut() {
                if last.date == clock.current_date {
                    *last = last.masked_at_open();
                }
            }
        }

        Ok(visible)
    }

    fn quote(&self, security: &Security) -> Result<Quote> {
        Err(Error::data_unavailable(format!(
            "quotes are not available in a backtest ({security})"
        )))
    }
}
