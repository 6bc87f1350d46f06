//! Tear sheet metrics.
//!
//! Turns the recorded portfolio value series and the benchmark close series
//! into per-day returns, rolling Sharpe ratios and drawdowns. Every metric is
//! computed the same way for both series.

use openclose_core::config::MetricsConfig;
use openclose_core::{Error, PriceBar, Result, TradeDate};
use serde::Serialize;
use statrs::statistics::Statistics;

/// One tear sheet row per simulated trading day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TearSheetRow {
    pub date: TradeDate,
    pub portfolio_value: f64,
    pub benchmark_value: f64,
    pub portfolio_cum_return: f64,
    pub benchmark_cum_return: f64,
    pub portfolio_daily_return: f64,
    pub benchmark_daily_return: f64,
    pub portfolio_sharpe: f64,
    pub benchmark_sharpe: f64,
}

/// Per-day performance report, ordered by date.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TearSheet {
    rows: Vec<TearSheetRow>,
}

impl TearSheet {
    /// Build the tear sheet from aligned series (same dates, same length).
    pub fn build(
        dates: &[TradeDate],
        portfolio_values: &[f64],
        benchmark_values: &[f64],
        config: &MetricsConfig,
    ) -> Result<Self> {
        if portfolio_values.len() != dates.len() || benchmark_values.len() != dates.len() {
            return Err(Error::Other(format!(
                "misaligned series: {} dates, {} portfolio values, {} benchmark values",
                dates.len(),
                portfolio_values.len(),
                benchmark_values.len()
            )));
        }

        let daily_rf = config.daily_risk_free_rate();
        let portfolio_cum = cumulative_returns(portfolio_values);
        let benchmark_cum = cumulative_returns(benchmark_values);
        let portfolio_daily = daily_returns(portfolio_values);
        let benchmark_daily = daily_returns(benchmark_values);
        let portfolio_sharpe =
            rolling_sharpe(&portfolio_daily, config.sharpe_window, daily_rf, config.periods_per_year);
        let benchmark_sharpe =
            rolling_sharpe(&benchmark_daily, config.sharpe_window, daily_rf, config.periods_per_year);

        let rows = (0..dates.len())
            .map(|t| TearSheetRow {
                date: dates[t],
                portfolio_value: portfolio_values[t],
                benchmark_value: benchmark_values[t],
                portfolio_cum_return: portfolio_cum[t],
                benchmark_cum_return: benchmark_cum[t],
                portfolio_daily_return: portfolio_daily[t],
                benchmark_daily_return: benchmark_daily[t],
                portfolio_sharpe: portfolio_sharpe[t],
                benchmark_sharpe: benchmark_sharpe[t],
            })
            .collect();

        Ok(Self { rows })
    }

    /// All rows.
    pub fn rows(&self) -> &[TearSheetRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the tear sheet has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Extract one column.
    pub fn column(&self, field: impl Fn(&TearSheetRow) -> f64) -> Vec<f64> {
        self.rows.iter().map(field).collect()
    }

    /// Portfolio drawdown per day.
    pub fn portfolio_drawdown(&self) -> Vec<f64> {
        drawdown(&self.column(|row| row.portfolio_cum_return))
    }

    /// Benchmark drawdown per day.
    pub fn benchmark_drawdown(&self) -> Vec<f64> {
        drawdown(&self.column(|row| row.benchmark_cum_return))
    }

    /// Headline numbers for both series plus the portfolio-on-benchmark
    /// regression of daily returns.
    pub fn summary(&self, config: &MetricsConfig) -> TearSheetSummary {
        let portfolio_daily = self.column(|row| row.portfolio_daily_return);
        let benchmark_daily = self.column(|row| row.benchmark_daily_return);

        TearSheetSummary {
            portfolio: PerformanceSummary::from_columns(
                &self.column(|row| row.portfolio_cum_return),
                &portfolio_daily,
                &self.column(|row| row.portfolio_sharpe),
                config.periods_per_year,
            ),
            benchmark: PerformanceSummary::from_columns(
                &self.column(|row| row.benchmark_cum_return),
                &benchmark_daily,
                &self.column(|row| row.benchmark_sharpe),
                config.periods_per_year,
            ),
            regression: Regression::fit(&benchmark_daily, &portfolio_daily),
        }
    }
}

/// Headline numbers of one value series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    /// Cumulative return on the last day.
    pub cumulative_return: f64,
    /// Mean of the defined rolling Sharpe ratios.
    pub average_sharpe: f64,
    /// Rolling Sharpe ratio on the last day.
    pub final_sharpe: f64,
    /// Deepest drawdown (a non-positive fraction).
    pub max_drawdown: f64,
    /// `(1 + mean daily return)^periods - 1`.
    pub estimated_annual_return: f64,
    /// Sample standard deviation of daily returns.
    pub daily_volatility: f64,
}

impl PerformanceSummary {
    fn from_columns(cum_returns: &[f64], daily: &[f64], sharpe: &[f64], periods_per_year: u32) -> Self {
        let mean_daily = nan_mean(daily);
        Self {
            cumulative_return: cum_returns.last().copied().unwrap_or(f64::NAN),
            average_sharpe: nan_mean(sharpe),
            final_sharpe: sharpe.last().copied().unwrap_or(f64::NAN),
            max_drawdown: max_drawdown(cum_returns),
            estimated_annual_return: (1.0 + mean_daily).powi(periods_per_year as i32) - 1.0,
            daily_volatility: daily.iter().copied().filter(|r| !r.is_nan()).std_dev(),
        }
    }
}

/// Ordinary least squares fit of `y = alpha + beta * x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    pub beta: f64,
    pub alpha: f64,
    pub r_squared: f64,
    /// Pairs where both values were defined.
    pub observations: usize,
}

impl Regression {
    /// Fit over the index pairs where both series are finite.
    pub fn fit(x: &[f64], y: &[f64]) -> Self {
        let (xs, ys): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .unzip();

        let observations = xs.len();
        if observations < 2 {
            return Self {
                beta: f64::NAN,
                alpha: f64::NAN,
                r_squared: f64::NAN,
                observations,
            };
        }

        let var_x = xs.as_slice().variance();
        let var_y = ys.as_slice().variance();
        let cov = xs.as_slice().covariance(ys.as_slice());
        let beta = cov / var_x;

        Self {
            beta,
            alpha: ys.as_slice().mean() - beta * xs.as_slice().mean(),
            r_squared: cov * cov / (var_x * var_y),
            observations,
        }
    }
}

/// Summary of a whole tear sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TearSheetSummary {
    pub portfolio: PerformanceSummary,
    pub benchmark: PerformanceSummary,
    /// Portfolio daily returns regressed on benchmark daily returns.
    pub regression: Regression,
}

/// `value[t] / value[0] - 1`.
pub fn cumulative_returns(values: &[f64]) -> Vec<f64> {
    match values.first() {
        Some(&base) => values.iter().map(|v| v / base - 1.0).collect(),
        None => Vec::new(),
    }
}

/// `value[t] / value[t-1] - 1`, NaN on the first day.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(values.len());
    if !values.is_empty() {
        returns.push(f64::NAN);
    }
    returns.extend(values.windows(2).map(|w| w[1] / w[0] - 1.0));
    returns
}

/// Largest standard deviation, relative to the window mean, treated as zero.
const FLAT_WINDOW_TOLERANCE: f64 = 1e-12;

/// Annualized rolling Sharpe ratio over `window` daily returns.
///
/// NaN until `window` returns are available, whenever the window contains a
/// NaN return, and when the window is flat (its standard deviation is
/// rounding noise relative to the mean).
pub fn rolling_sharpe(daily_returns: &[f64], window: usize, daily_risk_free: f64, periods_per_year: u32) -> Vec<f64> {
    let annualization = (periods_per_year as f64).sqrt();

    (0..daily_returns.len())
        .map(|t| {
            if window < 2 || t + 1 < window {
                return f64::NAN;
            }
            let slice = &daily_returns[t + 1 - window..=t];
            let mean = slice.mean();
            let std_dev = slice.std_dev();
            if std_dev <= FLAT_WINDOW_TOLERANCE * mean.abs().max(1.0) {
                return f64::NAN;
            }
            (mean - daily_risk_free) / std_dev * annualization
        })
        .collect()
}

/// Relative decline of cumulative value from its running peak.
///
/// `cum = cum_return + 1`, `peak = running max(cum)`,
/// `drawdown = (cum - peak) / peak`, with `-inf` (a zero peak) clamped to 0.
pub fn drawdown(cum_returns: &[f64]) -> Vec<f64> {
    let mut peak = f64::NAN;
    cum_returns
        .iter()
        .map(|r| {
            let cum = r + 1.0;
            if !cum.is_nan() {
                peak = if peak.is_nan() { cum } else { peak.max(cum) };
            }
            let value = (cum - peak) / peak;
            if value == f64::NEG_INFINITY {
                0.0
            } else {
                value
            }
        })
        .collect()
}

/// Deepest drawdown, ignoring undefined days. NaN if no day is defined.
pub fn max_drawdown(cum_returns: &[f64]) -> f64 {
    drawdown(cum_returns).into_iter().fold(f64::NAN, f64::min)
}

/// Closes of `bars` on each of `dates`; NaN where a date has no bar.
pub fn closes_on(bars: &[PriceBar], dates: &[TradeDate]) -> Vec<f64> {
    dates
        .iter()
        .map(|date| {
            bars.binary_search_by_key(date, |bar| bar.date)
                .map_or(f64::NAN, |i| bars[i].close)
        })
        .collect()
}

fn nan_mean(values: &[f64]) -> f64 {
    values.iter().copied().filter(|v| !v.is_nan()).mean()
}
