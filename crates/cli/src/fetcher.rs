//! Daily bar histories from a directory of CSV files.
//!
//! One file per ticker, named `<TICKER>.csv` with class-share dots replaced by
//! dashes (`BRK-B.csv`), and a `date,open,high,low,close,volume` header.
//! Empty price fields are gaps in the source data and load as NaN.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use openclose_core::{Error, PriceBar, Result};
use openclose_data::{HistoryFetcher, PriceCache};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct BarRecord {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl From<BarRecord> for PriceBar {
    fn from(record: BarRecord) -> Self {
        let gap = f64::NAN;
        PriceBar::new(
            record.date,
            record.open.unwrap_or(gap),
            record.high.unwrap_or(gap),
            record.low.unwrap_or(gap),
            record.close.unwrap_or(gap),
            record.volume.unwrap_or(0.0),
        )
    }
}

/// [`HistoryFetcher`] reading `<dir>/<TICKER>.csv`.
#[derive(Debug, Clone)]
pub struct CsvFetcher {
    dir: PathBuf,
}

impl CsvFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the history of `ticker`.
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", PriceCache::normalize_ticker(ticker)))
    }

    /// Parse bars from CSV text with a header row.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<PriceBar>> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        reader
            .deserialize::<BarRecord>()
            .map(|record| {
                record
                    .map(PriceBar::from)
                    .map_err(|err| Error::Other(format!("bad bar record: {err}")))
            })
            .collect()
    }

    fn read_file(path: &Path) -> Result<Vec<PriceBar>> {
        let file = std::fs::File::open(path)
            .map_err(|err| Error::data_unavailable(format!("cannot open {}: {err}", path.display())))?;
        Self::parse(file)
    }
}

impl HistoryFetcher for CsvFetcher {
    fn fetch(&self, ticker: &str) -> Result<Vec<PriceBar>> {
        let path = self.path_for(ticker);
        let bars = Self::read_file(&path)?;
        debug!(ticker, path = %path.display(), bars = bars.len(), "Loaded bar file");
        Ok(bars)
    }
}
