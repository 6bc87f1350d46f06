//! Open/close backtester CLI.
//!
//! # Usage
//!
//! ```bash
//! # Backtest buy-and-hold over the configured universe, tear sheet to stdout
//! openclose backtest --data-dir data/
//!
//! # Several strategies in parallel, report written to a file
//! openclose backtest --data-dir data/ --config openclose.json \
//!     --strategy buy-and-hold,running-avg --output report.json
//!
//! # Positions the running-average strategy would hold today
//! openclose positions --data-dir data/ --strategy running-avg --capital 100000
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use openclose_backtest::{run_batch, target_positions, BacktestEngine};
use openclose_core::Config;
use openclose_data::{CachedHistoryProvider, PriceCache};
use openclose_strategies::{BuiltinStrategy, StrategyKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod fetcher;
mod report;

use fetcher::CsvFetcher;
use report::{write_json, RunReport};

#[derive(Parser)]
#[command(name = "openclose")]
#[command(about = "Daily open/close strategy backtester", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay strategies over the bar files and report tear sheets
    Backtest {
        /// Directory with one `<TICKER>.csv` per security
        #[arg(short, long)]
        data_dir: PathBuf,

        /// JSON configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Strategies to run (buy-and-hold, sell-and-hold, running-avg)
        #[arg(short, long, value_delimiter = ',', default_value = "buy-and-hold")]
        strategy: Vec<StrategyKind>,

        /// Report file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the positions a strategy would hold given today's data
    Positions {
        /// Directory with one `<TICKER>.csv` per security
        #[arg(short, long)]
        data_dir: PathBuf,

        /// JSON configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Strategy to evaluate
        #[arg(short, long, default_value = "buy-and-hold")]
        strategy: StrategyKind,

        /// Capital to allocate (defaults to the configured initial capital)
        #[arg(long)]
        capital: Option<f64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Backtest {
            data_dir,
            config,
            strategy,
            output,
        } => run_backtest(&data_dir, config.as_deref(), &strategy, output.as_deref()),
        Commands::Positions {
            data_dir,
            config,
            strategy,
            capital,
        } => run_positions(&data_dir, config.as_deref(), strategy, capital),
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Universe, benchmark and calendar reference, without duplicates.
fn required_tickers(config: &Config) -> Vec<String> {
    let mut tickers: Vec<String> = config
        .universe
        .symbols
        .iter()
        .chain([&config.backtest.benchmark, &config.backtest.calendar_reference])
        .map(|t| PriceCache::normalize_ticker(t))
        .collect();
    tickers.sort();
    tickers.dedup();
    tickers
}

fn load_provider(data_dir: &Path, config: &Config) -> Result<CachedHistoryProvider> {
    let fetcher = CsvFetcher::new(data_dir);
    let mut cache = PriceCache::new();
    let loaded = cache
        .preload(&fetcher, &required_tickers(config), Local::now())
        .with_context(|| format!("loading bar files from {}", data_dir.display()))?;
    info!(tickers = loaded, "Price cache ready");
    Ok(CachedHistoryProvider::new(Arc::new(cache)))
}

fn run_backtest(data_dir: &Path, config: Option<&Path>, kinds: &[StrategyKind], output: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let provider = load_provider(data_dir, &config)?;
    let engine = BacktestEngine::from_config(&config);

    let strategies: Vec<BuiltinStrategy> = kinds
        .iter()
        .map(|kind| kind.build(config.universe.symbols.iter().cloned()))
        .collect();

    let mut reports = Vec::with_capacity(strategies.len());
    for (kind, outcome) in kinds.iter().zip(run_batch(&engine, &provider, strategies)) {
        let outcome = outcome.with_context(|| format!("{kind} backtest failed"))?;
        let report = RunReport::new(outcome, engine.metrics_config());
        info!(
            strategy = %report.strategy,
            final_value = report.final_value,
            cumulative_return = report.summary.portfolio.cumulative_return,
            max_drawdown = report.summary.portfolio.max_drawdown,
            beta = report.summary.regression.beta,
            "Backtest finished"
        );
        reports.push(report);
    }

    match reports.len() {
        0 => bail!("no strategy selected"),
        1 => write_json(&reports[0], output),
        _ => write_json(&reports, output),
    }
}

fn run_positions(data_dir: &Path, config: Option<&Path>, kind: StrategyKind, capital: Option<f64>) -> Result<()> {
    let config = load_config(config)?;
    let provider = load_provider(data_dir, &config)?;
    let capital = capital.unwrap_or(config.backtest.initial_capital);

    let mut strategy = kind.build(config.universe.symbols.iter().cloned());
    let positions = target_positions(&mut strategy, &provider, capital)
        .with_context(|| format!("{kind} position snapshot failed"))?;
    write_json(&positions, None)
}
