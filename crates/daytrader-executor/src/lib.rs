//! Phase-sequenced trade execution for daytrader.
//!
//! # Key Components
//!
//! - [`Trader`]: Begin/OrderConfirm/Balance/Price/Order state machine
//! - [`BrokerageGateway`]: Queries and orders against the broker
//! - [`PendingSlot`]: Single outstanding request with id correlation
//! - [`decide`]: Time-of-day buy/sell rule
//!
//! # Gate Check (before every phase action)
//!
//! 1. Pending request -> wait
//! 2. Market not tradeable -> wait
//! 3. (passed) -> run the phase action

pub mod decision;
pub mod error;
pub mod gateway;
pub mod pending;
pub mod trader;

pub use decision::{decide, BuyWindow};
pub use error::{ExecutorError, ExecutorResult, GatewayError, GatewayResult};
pub use gateway::{
    BrokerageGateway, DynGateway, GatewayEvent, MockGateway, OrderReply, QueryKind, QueryRequest,
    QueryResponse, RequestId, Rows, SubmittedOrder, FIELD_HELD_QTY, FIELD_NAME,
    FIELD_UNFILLED_QTY, PARAM_ACCOUNT,
};
pub use pending::{PendingQuery, PendingSlot};
pub use trader::{Phase, Trader, TraderConfig, TraderState};
