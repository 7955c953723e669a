//! Time-of-day buy/sell rule.

use chrono::{NaiveDateTime, Timelike};
use daytrader_core::{Instrument, OrderBatch, OrderIntent};
use serde::{Deserialize, Serialize};

/// Local time from which the strategy wants to hold the target.
///
/// The predicate compares hour and minute independently
/// (`hour >= self.hour && minute >= self.minute`), so with the default
/// 13:30 the window is open for minutes 30..59 of every hour from 13:00 on,
/// and closed at 14:05.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyWindow {
    pub hour: u32,
    pub minute: u32,
}

impl Default for BuyWindow {
    fn default() -> Self {
        Self {
            hour: 13,
            minute: 30,
        }
    }
}

impl BuyWindow {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn contains(&self, now: NaiveDateTime) -> bool {
        now.hour() >= self.hour && now.minute() >= self.minute
    }
}

/// Decide what to trade for the target instrument.
///
/// Inside the buy window with nothing held, buy `quantity`. Outside the
/// window with something held, sell all of it. Otherwise do nothing.
pub fn decide(
    now: NaiveDateTime,
    window: &BuyWindow,
    target: &Instrument,
    held: u64,
    quantity: u64,
) -> OrderBatch {
    let mut batch = OrderBatch::new();
    let buy_time = window.contains(now);

    if buy_time && held == 0 {
        batch.push(OrderIntent::buy(target.clone(), quantity));
    } else if !buy_time && held > 0 {
        batch.push(OrderIntent::sell(target.clone(), held));
    }

    batch
}
