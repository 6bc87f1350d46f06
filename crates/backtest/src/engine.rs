//! Backtest driver.
//!
//! Replays the trading calendar one day at a time: the strategy trades at the
//! open and again right before the close, then the portfolio value is
//! recorded. The recorded series feeds the tear sheet.

use openclose_core::config::{BacktestConfig, Config, MetricsConfig};
use openclose_core::{Error, Frequency, Result, Security, TradeDate};
use openclose_data::{HistoryProvider, PointInTimeDataSource};
use tracing::{debug, error, info};

use crate::broker::{Broker, LedgerBroker};
use crate::metrics::{closes_on, TearSheet};
use crate::position::{Execution, PositionLedger};
use crate::strategy::Strategy;

/// What a completed simulation recorded.
#[derive(Debug, Clone)]
pub struct SimulationRecord {
    /// Name of the strategy that ran.
    pub strategy_name: String,
    /// Simulated trading days, in order.
    pub dates: Vec<TradeDate>,
    /// Portfolio total value at the end of each simulated day.
    pub portfolio_values: Vec<f64>,
    /// Positions after the last day.
    pub final_positions: PositionLedger,
    /// Cash after the last day.
    pub liquid_value: f64,
    /// Every fill of the run.
    pub executions: Vec<Execution>,
}

impl SimulationRecord {
    /// Portfolio value after the last day.
    pub fn final_value(&self) -> f64 {
        self.portfolio_values.last().copied().unwrap_or(f64::NAN)
    }
}

/// A finished backtest.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub record: SimulationRecord,
    pub tear_sheet: TearSheet,
}

/// Day-by-day backtest driver.
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    config: BacktestConfig,
    metrics: MetricsConfig,
}

impl BacktestEngine {
    /// Create a new engine.
    pub fn new(config: BacktestConfig, metrics: MetricsConfig) -> Self {
        Self { config, metrics }
    }

    /// Create an engine from the backtest and metrics sections of a config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backtest.clone(), config.metrics.clone())
    }

    /// Driver configuration.
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Tear sheet configuration.
    pub fn metrics_config(&self) -> &MetricsConfig {
        &self.metrics
    }

    /// Trading days of the calendar reference within the configured range:
    /// from the first date on or after the start date, up to and including
    /// the end date.
    pub fn trading_calendar<P: HistoryProvider>(&self, provider: &P) -> Result<Vec<TradeDate>> {
        let reference = Security::equity(self.config.calendar_reference.as_str());
        let bars = provider.full_history(&reference, Frequency::Day)?;
        let start = self.config.start_date;
        let end = self.config.end_date;

        Ok(bars
            .iter()
            .map(|bar| bar.date)
            .skip_while(|date| start.is_some_and(|start| *date < start))
            .take_while(|date| end.map_or(true, |end| *date <= end))
            .collect())
    }

    /// Run the strategy over the calendar and record the portfolio value of
    /// each day. The first strategy error aborts the run and is returned as is.
    pub fn simulate<P, S>(&self, strategy: &mut S, provider: &P) -> Result<SimulationRecord>
    where
        P: HistoryProvider,
        S: Strategy,
    {
        let calendar = self.trading_calendar(provider)?;
        let (first, last) = match (calendar.first(), calendar.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(Error::insufficient_data(format!(
                    "no trading days for {} between {:?} and {:?}",
                    self.config.calendar_reference, self.config.start_date, self.config.end_date
                )))
            }
        };

        let data_source = PointInTimeDataSource::new(provider, first);
        let mut broker = LedgerBroker::new(self.config.initial_capital, &data_source);
        let mut portfolio_values = Vec::with_capacity(calendar.len());

        info!(
            strategy = strategy.name(),
            days = calendar.len(),
            first = %first,
            last = %last,
            initial_capital = self.config.initial_capital,
            "Starting trades"
        );

        for (index, &day) in calendar.iter().enumerate() {
            if self.config.log_every > 0 && index % self.config.log_every == 0 {
                info!(date = %day, "Trading on day");
            }

            data_source.set_date(day);

            data_source.set_market_open(true);
            strategy
                .on_open(&mut broker, &data_source)
                .map_err(|err| abort(day, "on_open", err))?;

            data_source.set_market_open(false);
            strategy
                .before_close(&mut broker, &data_source)
                .map_err(|err| abort(day, "before_close", err))?;

            let value = broker.total_value().map_err(|err| abort(day, "valuation", err))?;
            debug!(date = %day, value, cash = broker.liquid_value(), "Recorded portfolio value");
            portfolio_values.push(value);
        }

        let final_value = portfolio_values.last().copied().unwrap_or(f64::NAN);
        let (liquid_value, final_positions, executions) = broker.into_parts();

        info!(strategy = strategy.name(), fills = executions.len(), "Done trading");
        for (security, quantity) in final_positions.iter() {
            info!(security = %security, quantity, "Final position");
        }
        info!(final_value, liquid_value, "Final portfolio value");

        Ok(SimulationRecord {
            strategy_name: strategy.name().to_string(),
            dates: calendar,
            portfolio_values,
            final_positions,
            liquid_value,
            executions,
        })
    }

    /// Simulate and build the tear sheet against the configured benchmark.
    pub fn run<P, S>(&self, strategy: &mut S, provider: &P) -> Result<BacktestOutcome>
    where
        P: HistoryProvider,
        S: Strategy,
    {
        let record = self.simulate(strategy, provider)?;

        debug!(benchmark = %self.config.benchmark, "Calculating tear sheet");
        let benchmark = Security::equity(self.config.benchmark.as_str());
        let benchmark_bars = provider.full_history(&benchmark, Frequency::Day)?;
        let benchmark_values = closes_on(&benchmark_bars, &record.dates);
        let tear_sheet = TearSheet::build(&record.dates, &record.portfolio_values, &benchmark_values, &self.metrics)?;

        Ok(BacktestOutcome { record, tear_sheet })
    }
}

fn abort(day: TradeDate, stage: &str, err: Error) -> Error {
    error!(date = %day, stage, error = %err, "Run aborted");
    err
}
