//! Prometheus metrics and structured logging for daytrader.
//!
//! - Prometheus metrics for phase transitions, gateway queries and orders
//! - Structured logging with tracing (JSON in production)
//! - Periodic statistics summary

pub mod error;
pub mod logging;
pub mod metrics;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use stats::{StatsReporter, StatsSnapshot};
