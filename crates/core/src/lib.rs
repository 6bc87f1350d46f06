//! Core types and configuration for the openclose backtester.
//!
//! This crate provides shared types used across all other crates:
//! - Securities and daily price bars
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
