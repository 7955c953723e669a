//! Executor error types.

use daytrader_feed::FeedError;
use thiserror::Error;

/// Failures reported synchronously by a brokerage gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gateway not connected")]
    NotConnected,

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
