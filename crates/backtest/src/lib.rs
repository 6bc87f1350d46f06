//! Backtest engine for open/close equity strategies.
//!
//! This crate provides:
//! - The strategy and broker interfaces
//! - A frictionless broker ledger with an execution journal
//! - The day-by-day backtest driver and parallel batch runs
//! - Tear sheet metrics (returns, rolling Sharpe, drawdown, regression)
//! - One-shot target positions for live use

pub mod batch;
pub mod broker;
pub mod engine;
pub mod live;
pub mod metrics;
pub mod position;
pub mod strategy;

pub use batch::run_batch;
pub use broker::{Broker, LedgerBroker};
pub use engine::{BacktestEngine, BacktestOutcome, SimulationRecord};
pub use live::{target_positions, LivePositions};
pub use metrics::{PerformanceSummary, Regression, TearSheet, TearSheetRow, TearSheetSummary};
pub use position::{Execution, PositionLedger};
pub use strategy::Strategy;
