//! Brokerage gateway abstraction.
//!
//! The trader never talks to the broker wire protocol directly. It issues
//! tabular queries and market orders through [`BrokerageGateway`], and query
//! completions come back later as [`GatewayEvent`]s carrying the
//! [`RequestId`] the trader allocated.

use crate::error::{GatewayError, GatewayResult};
use daytrader_core::{OrderSide, Quote};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Row field holding the instrument display name.
pub const FIELD_NAME: &str = "name";
/// Row field holding the unfilled remainder of an open order.
pub const FIELD_UNFILLED_QTY: &str = "unfilled_qty";
/// Row field holding the held quantity of a position.
pub const FIELD_HELD_QTY: &str = "held_qty";

/// Query parameter carrying the account identifier.
pub const PARAM_ACCOUNT: &str = "account";

/// Identifier correlating a query with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tabular query kinds the trader issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Open orders with an unfilled remainder for the account.
    UnfilledOrders,
    /// Held positions for the account.
    Holdings,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnfilledOrders => "unfilled_orders",
            Self::Holdings => "holdings",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tabular query with string parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub id: RequestId,
    pub kind: QueryKind,
    pub params: Vec<(String, String)>,
}

impl QueryRequest {
    pub fn new(id: RequestId, kind: QueryKind) -> Self {
        Self {
            id,
            kind,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Rows of a query result with named string fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rows {
    rows: Vec<HashMap<String, String>>,
}

impl Rows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row built from `(field, value)` pairs.
    pub fn push<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.rows.push(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw value of `name` in row `row`.
    pub fn field(&self, row: usize, name: &str) -> Option<&str> {
        self.rows.get(row)?.get(name).map(String::as_str)
    }
}

/// Completion of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub request_id: RequestId,
    pub rows: Rows,
}

impl QueryResponse {
    pub fn new(request_id: RequestId, rows: Rows) -> Self {
        Self { request_id, rows }
    }
}

/// Broker-defined order result. Code 0 means the order was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReply {
    pub code: i32,
    pub message: String,
}

impl OrderReply {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
        }
    }

    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for OrderReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Asynchronous input delivered to the trader.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A query completed.
    Response(QueryResponse),
    /// A depth quote was pushed for `code`.
    Quote { code: String, quote: Quote },
}

/// Brokerage gateway consumed by the trader.
///
/// Queries are fire-and-forget: `query` only reports whether the request
/// could be issued. The completion is delivered separately as
/// [`GatewayEvent::Response`] with the same [`RequestId`]. Orders are
/// synchronous and return the broker's reply directly.
pub trait BrokerageGateway: Send + Sync {
    /// Check if the market currently accepts orders.
    fn is_tradeable(&self) -> bool;

    /// Issue a tabular query.
    fn query(&self, request: QueryRequest) -> GatewayResult<()>;

    /// Issue a holdings query for `account`.
    fn update_balances(&self, account: &str, id: RequestId) -> GatewayResult<()> {
        self.query(QueryRequest::new(id, QueryKind::Holdings).with_param(PARAM_ACCOUNT, account))
    }

    /// Submit a market buy.
    fn buy(&self, account: &str, code: &str, quantity: u64) -> OrderReply;

    /// Submit a market sell.
    fn sell(&self, account: &str, code: &str, quantity: u64) -> OrderReply;
}

/// Arc wrapper for BrokerageGateway trait objects.
pub type DynGateway = Arc<dyn BrokerageGateway>;

/// An order recorded by [`MockGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    pub side: OrderSide,
    pub account: String,
    pub code: String,
    pub quantity: u64,
}

/// Mock gateway for testing.
#[derive(Debug)]
pub struct MockGateway {
    /// Recorded queries for verification.
    queries: Mutex<Vec<QueryRequest>>,
    /// Recorded orders for verification.
    orders: Mutex<Vec<SubmittedOrder>>,
    /// Reply returned for every order.
    next_reply: Mutex<OrderReply>,
    /// Error returned for every query, if set.
    query_error: Mutex<Option<GatewayError>>,
    tradeable: AtomicBool,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a tradeable mock that accepts every order.
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
            next_reply: Mutex::new(OrderReply::accepted("accepted")),
            query_error: Mutex::new(None),
            tradeable: AtomicBool::new(true),
        }
    }

    pub fn set_tradeable(&self, tradeable: bool) {
        self.tradeable.store(tradeable, Ordering::SeqCst);
    }

    pub fn set_next_reply(&self, reply: OrderReply) {
        *self.next_reply.lock() = reply;
    }

    /// Make every subsequent query fail with `error` (or succeed with `None`).
    pub fn set_query_error(&self, error: Option<GatewayError>) {
        *self.query_error.lock() = error;
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().clone()
    }

    pub fn last_query(&self) -> Option<QueryRequest> {
        self.queries.lock().last().cloned()
    }

    pub fn orders(&self) -> Vec<SubmittedOrder> {
        self.orders.lock().clone()
    }

    fn record_order(&self, side: OrderSide, account: &str, code: &str, quantity: u64) -> OrderReply {
        self.orders.lock().push(SubmittedOrder {
            side,
            account: account.to_string(),
            code: code.to_string(),
            quantity,
        });
        self.next_reply.lock().clone()
    }
}

impl BrokerageGateway for MockGateway {
    fn is_tradeable(&self) -> bool {
        self.tradeable.load(Ordering::SeqCst)
    }

    fn query(&self, request: QueryRequest) -> GatewayResult<()> {
        if let Some(error) = self.query_error.lock().clone() {
            return Err(error);
        }
        self.queries.lock().push(request);
        Ok(())
    }

    fn buy(&self, account: &str, code: &str, quantity: u64) -> OrderReply {
        self.record_order(OrderSide::Buy, account, code, quantity)
    }

    fn sell(&self, account: &str, code: &str, quantity: u64) -> OrderReply {
        self.record_order(OrderSide::Sell, account, code, quantity)
    }
}
