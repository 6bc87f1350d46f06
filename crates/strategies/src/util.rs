//! Shared helpers for strategies.

use std::collections::BTreeMap;

use openclose_core::{Result, Security, TradeDate};
use openclose_data::DataSource;
use statrs::statistics::Statistics;

/// Percentage close-to-close returns, one row per date and one column per
/// security.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTable {
    pub dates: Vec<TradeDate>,
    /// `rows[i][j]` is the return of security `j` on `dates[i]`.
    pub rows: Vec<Vec<f64>>,
}

impl ReturnTable {
    /// Number of dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Mean return per security. NaN for every column when the table is empty.
    pub fn column_means(&self, columns: usize) -> Vec<f64> {
        (0..columns).map(|j| self.rows.iter().map(|row| row[j]).mean()).collect()
    }
}

/// Returns over the trailing `bar_count` bars of each security, computed
/// per security and then aligned by date. Only dates on which every
/// security has a finite return are kept.
///
/// Bars are read with `approx_eod_close`, so before the close the current
/// day's close is included.
pub fn pct_returns<D: DataSource>(securities: &[Security], bar_count: usize, data_source: &D) -> Result<ReturnTable> {
    let mut by_date: BTreeMap<TradeDate, Vec<Option<f64>>> = BTreeMap::new();

    for (j, security) in securities.iter().enumerate() {
        let bars = data_source.daily_history(security, Some(bar_count), true)?;
        for pair in bars.windows(2) {
            let ret = pair[1].close / pair[0].close - 1.0;
            by_date.entry(pair[1].date).or_insert_with(|| vec![None; securities.len()])[j] = Some(ret);
        }
    }

    let mut table = ReturnTable {
        dates: Vec::new(),
        rows: Vec::new(),
    };
    for (date, row) in by_date {
        let row: Option<Vec<f64>> = row.into_iter().map(|ret| ret.filter(|r| r.is_finite())).collect();
        if let Some(row) = row {
            table.dates.push(date);
            table.rows.push(row);
        }
    }
    Ok(table)
}
