//! Independent backtests in parallel.
//!
//! Every run gets its own point-in-time view and broker; the only thing the
//! runs share is the read-only history provider.

use openclose_core::Result;
use openclose_data::HistoryProvider;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::engine::{BacktestEngine, BacktestOutcome};
use crate::strategy::Strategy;

/// Run each strategy over the same history. Results come back in input
/// order; one failed run does not affect the others.
pub fn run_batch<P, S>(engine: &BacktestEngine, provider: &P, strategies: Vec<S>) -> Vec<Result<BacktestOutcome>>
where
    P: HistoryProvider + Sync,
    S: Strategy + Send,
{
    info!(runs = strategies.len(), "Starting batch");

    strategies
        .into_par_iter()
        .map(|mut strategy| {
            let outcome = engine.run(&mut strategy, provider);
            if let Err(err) = &outcome {
                warn!(strategy = strategy.name(), error = %err, "Batch run failed");
            }
            outcome
        })
        .collect()
}
