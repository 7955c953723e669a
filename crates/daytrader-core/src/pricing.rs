//! Depth-walking fill cost estimation.

use crate::Level;

/// Sentinel returned by [`price`] when the levels cannot fill the quantity.
pub const INSUFFICIENT_DEPTH: i64 = -1;

/// Total cost of filling `quantity` against `levels`, or `None` when the
/// levels hold less than `quantity` in aggregate or the cost overflows `i64`.
///
/// Levels are consumed greedily in the order given (best price first).
/// A zero quantity costs nothing.
pub fn try_price(quantity: u64, levels: &[Level]) -> Option<i64> {
    let mut remaining = quantity;
    let mut sum: i64 = 0;

    if remaining == 0 {
        return Some(0);
    }

    for level in levels {
        let consumed = remaining.min(level.quantity);
        remaining -= consumed;
        let cost = i64::try_from(consumed)
            .ok()
            .and_then(|qty| level.price.checked_mul(qty))?;
        sum = sum.checked_add(cost)?;
        if remaining == 0 {
            return Some(sum);
        }
    }

    None
}

/// Total cost of filling `quantity` against `levels`.
///
/// Returns [`INSUFFICIENT_DEPTH`] instead of a partial sum when depth runs
/// out before the quantity is filled.
pub fn price(quantity: u64, levels: &[Level]) -> i64 {
    try_price(quantity, levels).unwrap_or(INSUFFICIENT_DEPTH)
}
