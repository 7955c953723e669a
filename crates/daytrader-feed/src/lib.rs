//! Tracked positions and quote storage for daytrader.
//!
//! Holds the latest quote and held quantity per monitored instrument, and
//! parses the numeric fields of brokerage table rows.

pub mod error;
pub mod parser;
pub mod quote_store;

pub use error::{FeedError, FeedResult};
pub use parser::parse_quantity;
pub use quote_store::{QuoteStore, TrackedPosition};
