//! Prometheus metrics for daytrader.
//!
//! Covers the trading cycle:
//! - Phase transitions and the currently active phase
//! - Gateway queries and how they ended
//! - Order submissions by side and broker outcome
//! - Quote pushes and sticky errors
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that should
//! crash at first use rather than fail silently.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_counter,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntCounter, TextEncoder,
};

/// Phase labels, in cycle order.
pub const PHASE_LABELS: [&str; 5] = ["begin", "order_confirm", "balance", "price", "order"];

/// Total phase transitions.
/// Labels: from, to
pub static PHASE_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "daytrader_phase_transitions_total",
        "Total trader phase transitions",
        &["from", "to"]
    )
    .unwrap()
});

/// Currently active phase (1=active, 0=inactive).
pub static PHASE_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "daytrader_phase_active",
        "Trader phase state machine current phase (1=active, 0=inactive)",
        &["phase"]
    )
    .unwrap()
});

/// Gateway queries issued.
/// Labels: kind (unfilled_orders/holdings)
pub static QUERIES_ISSUED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "daytrader_queries_issued_total",
        "Total gateway queries issued",
        &["kind"]
    )
    .unwrap()
});

/// Gateway query outcomes.
/// Labels: kind, outcome (completed/stalled/expired/issue_failed/discarded)
pub static QUERY_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "daytrader_query_outcomes_total",
        "Total gateway query outcomes",
        &["kind", "outcome"]
    )
    .unwrap()
});

/// Gateway query round-trip time in milliseconds.
pub static QUERY_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "daytrader_query_latency_ms",
        "Gateway query round-trip time in milliseconds",
        &["kind"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Order intents produced by the decision rule.
/// Labels: side
pub static DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "daytrader_decisions_total",
        "Total order intents produced by the decision rule",
        &["side"]
    )
    .unwrap()
});

/// Orders submitted to the brokerage.
/// Labels: side, outcome (accepted/rejected)
pub static ORDERS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "daytrader_orders_submitted_total",
        "Total orders submitted to the brokerage",
        &["side", "outcome"]
    )
    .unwrap()
});

/// Quote pushes received.
/// Labels: code
pub static QUOTES_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "daytrader_quotes_received_total",
        "Total quote pushes received",
        &["code"]
    )
    .unwrap()
});

/// Sticky errors recorded.
pub static STICKY_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "daytrader_sticky_errors_total",
        "Total sticky errors recorded by the trader"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a phase transition and mark `to` as the active phase.
    pub fn phase_transition(from: &str, to: &str) {
        PHASE_TRANSITIONS_TOTAL.with_label_values(&[from, to]).inc();
        Self::phase_set(to);
    }

    /// Set the active phase. Only `phase` is 1, all others 0.
    pub fn phase_set(phase: &str) {
        for p in PHASE_LABELS {
            PHASE_ACTIVE.with_label_values(&[p]).set(0.0);
        }
        PHASE_ACTIVE.with_label_values(&[phase]).set(1.0);
    }

    /// Record a gateway query issued.
    pub fn query_issued(kind: &str) {
        QUERIES_ISSUED_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record how a gateway query ended.
    pub fn query_outcome(kind: &str, outcome: &str) {
        QUERY_OUTCOMES_TOTAL
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Record gateway query round-trip time.
    pub fn query_latency(kind: &str, latency_ms: f64) {
        QUERY_LATENCY_MS
            .with_label_values(&[kind])
            .observe(latency_ms);
    }

    /// Record an order intent produced by the decision rule.
    pub fn decision(side: &str) {
        DECISIONS_TOTAL.with_label_values(&[side]).inc();
    }

    /// Record an order submission.
    pub fn order_submitted(side: &str, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        ORDERS_SUBMITTED_TOTAL
            .with_label_values(&[side, outcome])
            .inc();
    }

    /// Record a quote push.
    pub fn quote_received(code: &str) {
        QUOTES_RECEIVED_TOTAL.with_label_values(&[code]).inc();
    }

    /// Record a sticky error.
    pub fn sticky_error() {
        STICKY_ERRORS_TOTAL.inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
