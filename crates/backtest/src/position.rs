//! Position ledger and execution journal.
//!
//! Tracks signed share counts per security and records every fill.

use std::collections::BTreeMap;

use openclose_core::{Quantity, Security, TradeDate};
use serde::Serialize;

/// Signed share count per security. Absent securities hold zero shares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionLedger {
    positions: BTreeMap<Security, Quantity>,
}

impl PositionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares held in `security` (zero when never traded or flat).
    pub fn quantity(&self, security: &Security) -> Quantity {
        self.positions.get(security).copied().unwrap_or(0)
    }

    /// Add `delta` shares to the position, returning the new quantity.
    /// Flat positions are removed from the ledger.
    pub fn apply(&mut self, security: &Security, delta: Quantity) -> Quantity {
        let quantity = self.quantity(security) + delta;
        if quantity == 0 {
            self.positions.remove(security);
        } else {
            self.positions.insert(security.clone(), quantity);
        }
        quantity
    }

    /// Non-zero positions ordered by ticker.
    pub fn iter(&self) -> impl Iterator<Item = (&Security, Quantity)> {
        self.positions.iter().map(|(security, quantity)| (security, *quantity))
    }

    /// Number of non-zero positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether every position is flat.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions keyed by ticker, for reporting.
    pub fn to_ticker_map(&self) -> BTreeMap<String, Quantity> {
        self.iter()
            .map(|(security, quantity)| (security.ticker().to_string(), quantity))
            .collect()
    }
}

/// A filled order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    /// Date of the bar that priced the fill.
    pub date: TradeDate,
    /// Security traded.
    pub security: Security,
    /// Signed shares (positive = buy).
    pub quantity: Quantity,
    /// Fill price.
    pub price: f64,
    /// Limit attached to the order. Recorded only; fills always happen at
    /// the quoted price.
    pub limit_price: Option<f64>,
}

impl Execution {
    /// Change in cash caused by this fill.
    #[inline]
    pub fn cash_delta(&self) -> f64 {
        -self.price * self.quantity as f64
    }
}
