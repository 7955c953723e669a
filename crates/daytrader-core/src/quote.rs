//! Depth quotes.
//!
//! A quote is a snapshot of bid and ask levels stamped with the broker's
//! local wall-clock time. Freshness is judged against the same local clock.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One depth level: a price and the quantity available at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: i64,
    pub quantity: u64,
}

impl Level {
    pub fn new(price: i64, quantity: u64) -> Self {
        Self { price, quantity }
    }
}

/// Timestamped depth snapshot for one instrument.
///
/// Both sides are ordered best-price-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: NaiveDateTime,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl Quote {
    pub fn new(timestamp: NaiveDateTime, bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self {
            timestamp,
            bids,
            asks,
        }
    }

    /// Signed distance from the quote timestamp to `now`.
    pub fn skew(&self, now: NaiveDateTime) -> Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// Check if the quote is within `window` of `now`, in either direction.
    ///
    /// A quote stamped in the future (broker clock ahead) is judged the same
    /// way as one in the past.
    pub fn is_fresh(&self, now: NaiveDateTime, window: Duration) -> bool {
        let skew = self.skew(now);
        skew <= window && skew >= -window
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn test_fresh_within_one_second() {
        let quote = Quote::new(at(10, 0, 0, 0), vec![], vec![]);
        let window = Duration::seconds(1);

        assert!(quote.is_fresh(at(10, 0, 0, 500), window));
        assert!(quote.is_fresh(at(10, 0, 1, 0), window));
        assert!(!quote.is_fresh(at(10, 0, 1, 1), window));
    }

    #[test]
    fn test_future_stamp_uses_absolute_skew() {
        let quote = Quote::new(at(10, 0, 2, 0), vec![], vec![]);
        let window = Duration::seconds(1);

        assert!(quote.is_fresh(at(10, 0, 1, 500), window));
        assert!(!quote.is_fresh(at(10, 0, 0, 900), window));
    }

    #[test]
    fn test_best_levels() {
        let quote = Quote::new(
            at(10, 0, 0, 0),
            vec![Level::new(99, 5), Level::new(98, 7)],
            vec![Level::new(100, 3)],
        );
        assert_eq!(quote.best_bid(), Some(Level::new(99, 5)));
        assert_eq!(quote.best_ask(), Some(Level::new(100, 3)));

        let empty = Quote::new(at(10, 0, 0, 0), vec![], vec![]);
        assert!(empty.best_bid().is_none());
    }
}
