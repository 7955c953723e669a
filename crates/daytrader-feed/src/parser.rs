//! Brokerage row field parsing.
//!
//! Broker tables deliver every field as a string, often space or zero
//! padded. Quantities are non-negative integers; anything else is a parse
//! failure reported with the field name and the raw value.

use crate::error::{FeedError, FeedResult};

/// Parse a quantity field from a brokerage row.
///
/// Surrounding whitespace and leading zeros are accepted. Negative values,
/// decimals and empty strings are rejected.
pub fn parse_quantity(field: &str, raw: &str) -> FeedResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| FeedError::InvalidQuantity {
            field: field.to_string(),
            raw: raw.to_string(),
        })
}
