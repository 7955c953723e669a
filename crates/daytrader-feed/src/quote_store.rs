//! Tracked position storage.
//!
//! One `TrackedPosition` per monitored instrument holds the latest quote and
//! the held quantity last reported by the brokerage. The same code may be
//! registered more than once; quote updates reach every matching entry.
//!
//! The store is owned by a single trader and accessed from one logical
//! thread, so it carries no locking.

use crate::error::{FeedError, FeedResult};
use chrono::{Duration, NaiveDateTime};
use daytrader_core::{Instrument, Quote};
use tracing::{debug, trace};

/// An instrument whose quote and held quantity are monitored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPosition {
    pub instrument: Instrument,
    pub held_quantity: u64,
    pub quote: Option<Quote>,
}

impl TrackedPosition {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            held_quantity: 0,
            quote: None,
        }
    }

    /// Check if a quote exists and is within `window` of `now`.
    pub fn has_fresh_quote(&self, now: NaiveDateTime, window: Duration) -> bool {
        self.quote
            .as_ref()
            .is_some_and(|quote| quote.is_fresh(now, window))
    }
}

/// Latest quote and holding per tracked instrument.
#[derive(Debug, Default)]
pub struct QuoteStore {
    positions: Vec<TrackedPosition>,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an instrument. Returns the entry index.
    pub fn register(&mut self, instrument: Instrument) -> usize {
        debug!(code = %instrument.code(), name = %instrument.name(), "Tracking instrument");
        self.positions.push(TrackedPosition::new(instrument));
        self.positions.len() - 1
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[TrackedPosition] {
        &self.positions
    }

    /// Store `quote` on every entry whose instrument code is `code`.
    /// Returns the number of entries updated.
    pub fn update(&mut self, code: &str, quote: Quote) -> usize {
        let mut matched = 0usize;
        for position in self
            .positions
            .iter_mut()
            .filter(|p| p.instrument.code() == code)
        {
            position.quote = Some(quote.clone());
            matched += 1;
        }

        if matched == 0 {
            trace!(code, "Quote for untracked instrument ignored");
        }
        matched
    }

    /// Index of the first entry whose display name is `name`.
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.positions
            .iter()
            .position(|p| p.instrument.name() == name)
    }

    /// Set the held quantity of the first entry whose display name is
    /// `name`. Returns the index of the updated entry.
    pub fn apply_holding(&mut self, name: &str, quantity: u64) -> Option<usize> {
        let index = self.position_by_name(name)?;
        self.positions[index].held_quantity = quantity;
        Some(index)
    }

    /// Held quantity of the first entry for `instrument`.
    pub fn held_quantity(&self, instrument: &Instrument) -> FeedResult<u64> {
        self.find(instrument)
            .map(|p| p.held_quantity)
            .ok_or_else(|| FeedError::NotTracked(instrument.code().to_string()))
    }

    /// Latest quote of the first entry for `instrument`.
    pub fn quote(&self, instrument: &Instrument) -> Option<&Quote> {
        self.find(instrument).and_then(|p| p.quote.as_ref())
    }

    /// First entry whose quote is missing or outside `window` of `now`.
    pub fn first_stale(&self, now: NaiveDateTime, window: Duration) -> Option<&TrackedPosition> {
        self.positions
            .iter()
            .find(|p| !p.has_fresh_quote(now, window))
    }

    /// Check if every tracked entry has a fresh quote.
    pub fn all_fresh(&self, now: NaiveDateTime, window: Duration) -> bool {
        self.first_stale(now, window).is_none()
    }

    fn find(&self, instrument: &Instrument) -> Option<&TrackedPosition> {
        self.positions.iter().find(|p| &p.instrument == instrument)
    }
}
