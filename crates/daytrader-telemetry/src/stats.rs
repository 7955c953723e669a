//! Periodic statistics summary.
//!
//! Reads the Prometheus counters back and logs a compact summary, so a run
//! can be judged from its log without a scrape endpoint.

use crate::metrics::{
    DECISIONS_TOTAL, ORDERS_SUBMITTED_TOTAL, PHASE_TRANSITIONS_TOTAL, QUERY_OUTCOMES_TOTAL,
    QUOTES_RECEIVED_TOTAL, STICKY_ERRORS_TOTAL,
};
use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::CounterVec;
use tracing::info;

/// Counter totals at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub phase_transitions: u64,
    pub queries_completed: u64,
    pub queries_expired: u64,
    pub buy_decisions: u64,
    pub sell_decisions: u64,
    pub orders_accepted: u64,
    pub orders_rejected: u64,
    pub quotes_received: u64,
    pub sticky_errors: u64,
}

/// Statistics reporter.
pub struct StatsReporter {
    start_time: DateTime<Utc>,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsReporter {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
        }
    }

    /// Collect current totals.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            phase_transitions: sum_where(&PHASE_TRANSITIONS_TOTAL, &[]),
            queries_completed: sum_where(&QUERY_OUTCOMES_TOTAL, &[("outcome", "completed")]),
            queries_expired: sum_where(&QUERY_OUTCOMES_TOTAL, &[("outcome", "expired")]),
            buy_decisions: sum_where(&DECISIONS_TOTAL, &[("side", "buy")]),
            sell_decisions: sum_where(&DECISIONS_TOTAL, &[("side", "sell")]),
            orders_accepted: sum_where(&ORDERS_SUBMITTED_TOTAL, &[("outcome", "accepted")]),
            orders_rejected: sum_where(&ORDERS_SUBMITTED_TOTAL, &[("outcome", "rejected")]),
            quotes_received: sum_where(&QUOTES_RECEIVED_TOTAL, &[]),
            sticky_errors: STICKY_ERRORS_TOTAL.get(),
        }
    }

    /// Log the current totals.
    pub fn output_summary(&self) {
        let s = self.snapshot();
        let uptime_secs = (Utc::now() - self.start_time).num_seconds();
        info!(
            uptime_secs,
            phase_transitions = s.phase_transitions,
            queries_completed = s.queries_completed,
            queries_expired = s.queries_expired,
            buy_decisions = s.buy_decisions,
            sell_decisions = s.sell_decisions,
            orders_accepted = s.orders_accepted,
            orders_rejected = s.orders_rejected,
            quotes_received = s.quotes_received,
            sticky_errors = s.sticky_errors,
            "Trading statistics summary"
        );
    }
}

/// Sum every series of `counter` whose labels include all of `filters`.
fn sum_where(counter: &CounterVec, filters: &[(&str, &str)]) -> u64 {
    let mut total = 0.0;
    for family in counter.collect() {
        for metric in family.get_metric() {
            let labels = metric.get_label();
            let matches = filters.iter().all(|(name, value)| {
                labels
                    .iter()
                    .any(|l| l.get_name() == *name && l.get_value() == *value)
            });
            if matches {
                total += metric.get_counter().get_value();
            }
        }
    }
    total as u64
}
