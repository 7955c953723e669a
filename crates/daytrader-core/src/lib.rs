//! Core domain types for the daytrader strategy runner.
//!
//! This crate provides the fundamental types shared by the feed, executor and
//! application crates:
//! - `Instrument`: Immutable (code, display name) pair
//! - `Quote`, `Level`: Timestamped depth snapshots
//! - `OrderSide`, `OrderIntent`, `OrderBatch`: Transient order decisions
//! - `price`: Depth-walking fill cost estimation
//! - `Clock`: Injectable wall-clock source

pub mod clock;
pub mod error;
pub mod instrument;
pub mod order;
pub mod pricing;
pub mod quote;

pub use clock::{Clock, DynClock, FixedClock, SystemClock};
pub use error::{CoreError, Result};
pub use instrument::Instrument;
pub use order::{OrderBatch, OrderIntent, OrderSide};
pub use pricing::{price, try_price, INSUFFICIENT_DEPTH};
pub use quote::{Level, Quote};
