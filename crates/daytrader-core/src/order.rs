//! Order-related types.
//!
//! Provides order side, the transient order intent produced by the decision
//! step, and the batch that carries intents into submission.

use crate::Instrument;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Lowercase label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decided, not yet submitted, order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub instrument: Instrument,
    pub quantity: u64,
    pub side: OrderSide,
}

impl OrderIntent {
    pub fn buy(instrument: Instrument, quantity: u64) -> Self {
        Self {
            instrument,
            quantity,
            side: OrderSide::Buy,
        }
    }

    pub fn sell(instrument: Instrument, quantity: u64) -> Self {
        Self {
            instrument,
            quantity,
            side: OrderSide::Sell,
        }
    }
}

/// Intents produced by one decision cycle, split by side.
///
/// Intents are kept in enqueue order. Submission walks each side in reverse
/// and always drains sells before buys (see [`OrderBatch::submission_order`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBatch {
    sells: Vec<OrderIntent>,
    buys: Vec<OrderIntent>,
}

impl OrderBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an intent on its side.
    pub fn push(&mut self, intent: OrderIntent) {
        match intent.side {
            OrderSide::Buy => self.buys.push(intent),
            OrderSide::Sell => self.sells.push(intent),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sells.is_empty() && self.buys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sells.len() + self.buys.len()
    }

    pub fn sells(&self) -> &[OrderIntent] {
        &self.sells
    }

    pub fn buys(&self) -> &[OrderIntent] {
        &self.buys
    }

    /// Consume the batch, yielding intents in submission order:
    /// sells newest-first, then buys newest-first.
    pub fn submission_order(self) -> impl Iterator<Item = OrderIntent> {
        self.sells.into_iter().rev().chain(self.buys.into_iter().rev())
    }
}
