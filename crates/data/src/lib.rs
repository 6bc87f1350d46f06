//! Price data access for the openclose backtester.
//!
//! This crate handles:
//! - The data source contract shared by historical and point-in-time views
//! - The process-wide price cache and its freshness rule
//! - The point-in-time view that hides future and unsettled prices

pub mod source;
pub mod cache;
pub mod point_in_time;

pub use source::{DataSource, HistoryProvider};
pub use cache::{CachedHistory, CachedHistoryProvider, HistoryFetcher, PriceCache};
pub use point_in_time::{PointInTimeDataSource, SimulationClock};
