//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// A numeric row field could not be parsed. The message doubles as the
    /// trader's sticky error text.
    #[error("{field} error: {raw}")]
    InvalidQuantity { field: String, raw: String },

    #[error("Instrument not tracked: {0}")]
    NotTracked(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
