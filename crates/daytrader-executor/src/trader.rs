//! Phase-sequenced trader.
//!
//! The trader cycles through five phases:
//!
//! ```text
//! Begin -> OrderConfirm -> Balance -> Price -> Order -> OrderConfirm -> ...
//!              |
//!              +-> Begin (unfilled orders remain)
//! ```
//!
//! Every phase action is gated: nothing happens while a gateway query is
//! outstanding or the market is not tradeable. Entering a phase evaluates it
//! immediately, so one trigger can walk several phases (for example
//! `Price -> Order -> OrderConfirm` issues the next unfilled-orders query in
//! the same call).
//!
//! # Triggers
//!
//! - [`Trader::tick`]: external heartbeat
//! - [`Trader::on_quote`]: depth quote push, re-evaluates `Price`
//! - [`Trader::on_query_response`]: completion of the outstanding query
//!
//! All three run on the caller's thread; the trader has no internal locking.

use crate::decision::{decide, BuyWindow};
use crate::error::ExecutorResult;
use crate::gateway::{
    DynGateway, GatewayEvent, QueryKind, QueryRequest, QueryResponse, RequestId, Rows,
    FIELD_HELD_QTY, FIELD_NAME, FIELD_UNFILLED_QTY, PARAM_ACCOUNT,
};
use crate::pending::{PendingQuery, PendingSlot};
use chrono::Duration;
use daytrader_core::{Clock, DynClock, Instrument, OrderBatch, OrderSide, Quote, SystemClock};
use daytrader_feed::{parse_quantity, QuoteStore};
use daytrader_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Trader phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Begin,
    OrderConfirm,
    Balance,
    Price,
    Order,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::OrderConfirm => "order_confirm",
            Self::Balance => "balance",
            Self::Price => "price",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the trader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraderState {
    pub phase: Phase,
    pub pending_request: bool,
    pub sticky_error: Option<String>,
    pub price_ever_collected: bool,
}

/// Trader tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraderConfig {
    pub buy_window: BuyWindow,
    /// Maximum distance between a quote timestamp and now.
    pub freshness: Duration,
    /// Drop a non-stalled query after this long. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            buy_window: BuyWindow::default(),
            freshness: Duration::seconds(1),
            request_timeout: None,
        }
    }
}

/// Current phase with the data it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    Begin,
    OrderConfirm,
    Balance,
    Price,
    Order(OrderBatch),
}

impl Stage {
    fn phase(&self) -> Phase {
        match self {
            Self::Begin => Phase::Begin,
            Self::OrderConfirm => Phase::OrderConfirm,
            Self::Balance => Phase::Balance,
            Self::Price => Phase::Price,
            Self::Order(_) => Phase::Order,
        }
    }
}

/// Single-instrument trader driving a brokerage gateway.
pub struct Trader {
    account: String,
    quantity: u64,
    target: Instrument,
    gateway: DynGateway,
    clock: DynClock,
    config: TraderConfig,
    store: QuoteStore,
    stage: Stage,
    pending: PendingSlot,
    sticky_error: Option<String>,
    price_ever_collected: bool,
    phase_tx: watch::Sender<Phase>,
}

impl Trader {
    /// Create a trader for `target`, which is registered as a tracked
    /// instrument.
    pub fn new(
        account: impl Into<String>,
        quantity: u64,
        target: Instrument,
        gateway: DynGateway,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Begin);
        let mut store = QuoteStore::new();
        store.register(target.clone());

        Self {
            account: account.into(),
            quantity,
            target,
            gateway,
            clock: Arc::new(SystemClock),
            config: TraderConfig::default(),
            store,
            stage: Stage::Begin,
            pending: PendingSlot::new(),
            sticky_error: None,
            price_ever_collected: false,
            phase_tx,
        }
    }

    pub fn with_clock(mut self, clock: DynClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: TraderConfig) -> Self {
        self.config = config;
        self
    }

    /// Track an additional instrument. Its quote must be fresh before the
    /// `Price` phase decides.
    pub fn register_tracked_instrument(&mut self, instrument: Instrument) -> usize {
        self.store.register(instrument)
    }

    pub fn phase(&self) -> Phase {
        self.stage.phase()
    }

    /// Sticky error, if a holdings row could not be parsed.
    pub fn error(&self) -> Option<&str> {
        self.sticky_error.as_deref()
    }

    pub fn state(&self) -> TraderState {
        TraderState {
            phase: self.phase(),
            pending_request: self.pending.is_busy(),
            sticky_error: self.sticky_error.clone(),
            price_ever_collected: self.price_ever_collected,
        }
    }

    /// Subscribe to the phase published after every tick.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn target(&self) -> &Instrument {
        &self.target
    }

    pub fn quote_store(&self) -> &QuoteStore {
        &self.store
    }

    /// Heartbeat entry point.
    pub fn tick(&mut self) {
        self.expire_pending();

        if self.stage == Stage::Begin {
            self.move_to(Stage::OrderConfirm);
        }
        self.process_phase();

        self.phase_tx.send_replace(self.phase());
    }

    /// Store a quote push and re-evaluate if waiting for prices.
    pub fn on_quote(&mut self, code: &str, quote: Quote) {
        if self.store.update(code, quote) > 0 {
            Metrics::quote_received(code);
        }

        if self.stage == Stage::Price {
            self.process_phase();
        }
    }

    /// Handle the completion of a gateway query.
    pub fn on_query_response(&mut self, response: QueryResponse) {
        let Some(query) = self.pending.take_matching(response.request_id) else {
            warn!(
                request_id = %response.request_id,
                pending = ?self.pending.current().map(|q| q.id),
                "Discarding response with no matching pending request"
            );
            Metrics::query_outcome("unknown", "discarded");
            return;
        };

        let latency_ms = (self.clock.now() - query.issued_at).num_milliseconds() as f64;
        Metrics::query_latency(query.kind.as_str(), latency_ms);
        debug!(
            request_id = %query.id,
            kind = %query.kind,
            rows = response.rows.len(),
            latency_ms,
            "Query completed"
        );

        match query.kind {
            QueryKind::UnfilledOrders => self.complete_unfilled_orders(&response.rows),
            QueryKind::Holdings => self.complete_holdings(query, &response.rows),
        }
    }

    /// Dispatch a gateway event to the matching entry point.
    pub fn handle_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Response(response) => self.on_query_response(response),
            GatewayEvent::Quote { code, quote } => self.on_quote(&code, quote),
        }
    }

    fn admitted(&self) -> bool {
        !self.pending.is_busy() && self.gateway.is_tradeable()
    }

    fn move_to(&mut self, stage: Stage) {
        let from = self.phase();
        let to = stage.phase();
        if from != to {
            info!(from = %from, to = %to, "Phase changed");
            Metrics::phase_transition(from.as_str(), to.as_str());
        }
        self.stage = stage;
    }

    /// Evaluate the current phase, following transitions until one stops.
    fn process_phase(&mut self) {
        while self.admitted() {
            let next = match self.phase() {
                Phase::Begin => None,
                Phase::OrderConfirm => {
                    self.issue_or_warn(QueryKind::UnfilledOrders);
                    None
                }
                Phase::Balance => {
                    self.issue_or_warn(QueryKind::Holdings);
                    None
                }
                Phase::Price => self.evaluate_prices().map(Stage::Order),
                Phase::Order => {
                    self.submit_orders();
                    Some(Stage::OrderConfirm)
                }
            };

            match next {
                Some(stage) => self.move_to(stage),
                None => return,
            }
        }
    }

    fn issue_or_warn(&mut self, kind: QueryKind) {
        match self.issue_query(kind) {
            Ok(id) => {
                Metrics::query_issued(kind.as_str());
                debug!(request_id = %id, kind = %kind, "Query issued");
            }
            Err(e) => {
                Metrics::query_outcome(kind.as_str(), "issue_failed");
                warn!(kind = %kind, error = %e, "Failed to issue query, retrying on next trigger");
            }
        }
    }

    fn issue_query(&mut self, kind: QueryKind) -> ExecutorResult<RequestId> {
        let id = self
            .pending
            .begin(kind, self.clock.now(), self.config.request_timeout);

        let result = match kind {
            QueryKind::UnfilledOrders => {
                let request = QueryRequest::new(id, kind)
                    .with_param(PARAM_ACCOUNT, self.account.as_str())
                    .with_param("instrument_filter", "0")
                    .with_param("side_filter", "0")
                    .with_param("fill_filter", "1");
                self.gateway.query(request)
            }
            QueryKind::Holdings => self.gateway.update_balances(&self.account, id),
        };

        if let Err(e) = result {
            self.pending.release(id);
            return Err(e.into());
        }
        Ok(id)
    }

    fn expire_pending(&mut self) {
        let now = self.clock.now();
        if let Some(query) = self.pending.expire(now) {
            warn!(
                request_id = %query.id,
                kind = %query.kind,
                waited_ms = (now - query.issued_at).num_milliseconds(),
                "Query deadline passed, restarting cycle"
            );
            Metrics::query_outcome(query.kind.as_str(), "expired");
            self.move_to(Stage::Begin);
        }
    }

    fn complete_unfilled_orders(&mut self, rows: &Rows) {
        let outstanding = first_outstanding(rows);

        Metrics::query_outcome(QueryKind::UnfilledOrders.as_str(), "completed");

        match outstanding {
            Some((row, raw)) => {
                info!(
                    name = rows.field(row, FIELD_NAME).unwrap_or_default(),
                    remaining = raw.trim(),
                    "Unfilled order outstanding"
                );
                self.move_to(Stage::Begin);
            }
            None => self.move_to(Stage::Balance),
        }
        self.process_phase();
    }

    fn complete_holdings(&mut self, query: PendingQuery, rows: &Rows) {
        for row in 0..rows.len() {
            let name = rows.field(row, FIELD_NAME).unwrap_or_default();
            if self.store.position_by_name(name).is_none() {
                trace!(name, "Holding not tracked");
                continue;
            }

            let raw = rows.field(row, FIELD_HELD_QTY).unwrap_or_default();
            match parse_quantity(FIELD_HELD_QTY, raw) {
                Ok(quantity) => {
                    if self.store.apply_holding(name, quantity).is_some() {
                        debug!(name, quantity, "Holding synced");
                    }
                }
                Err(e) => {
                    error!(
                        request_id = %query.id,
                        name,
                        error = %e,
                        "Unparsable holding, trader stalled"
                    );
                    self.sticky_error = Some(e.to_string());
                    Metrics::sticky_error();
                    Metrics::query_outcome(query.kind.as_str(), "stalled");
                    self.pending.stall(query);
                    return;
                }
            }
        }

        Metrics::query_outcome(query.kind.as_str(), "completed");
        self.move_to(Stage::Price);
        self.process_phase();
    }

    /// Check freshness and run the decision rule. Returns a non-empty batch.
    fn evaluate_prices(&mut self) -> Option<OrderBatch> {
        let now = self.clock.now();
        if let Some(stale) = self.store.first_stale(now, self.config.freshness) {
            trace!(
                instrument = %stale.instrument,
                has_quote = stale.quote.is_some(),
                "Waiting for fresh quote"
            );
            return None;
        }

        if !self.price_ever_collected {
            warn!("Price collected");
            self.price_ever_collected = true;
        }

        let held = match self.target_held() {
            Ok(held) => held,
            Err(e) => {
                warn!(error = %e, "Target holding unavailable");
                return None;
            }
        };

        let batch = decide(
            now,
            &self.config.buy_window,
            &self.target,
            held,
            self.quantity,
        );
        for intent in batch.sells().iter().chain(batch.buys()) {
            Metrics::decision(intent.side.as_str());
            info!(
                side = %intent.side,
                instrument = %intent.instrument,
                quantity = intent.quantity,
                held,
                "Order decided"
            );
        }

        (!batch.is_empty()).then_some(batch)
    }

    fn target_held(&self) -> ExecutorResult<u64> {
        Ok(self.store.held_quantity(&self.target)?)
    }

    /// Submit the batch carried by the `Order` stage, sells first.
    fn submit_orders(&mut self) {
        let batch = match &mut self.stage {
            Stage::Order(batch) => std::mem::take(batch),
            _ => OrderBatch::new(),
        };

        for intent in batch.submission_order() {
            let code = intent.instrument.code();
            let reply = match intent.side {
                OrderSide::Sell => self.gateway.sell(&self.account, code, intent.quantity),
                OrderSide::Buy => self.gateway.buy(&self.account, code, intent.quantity),
            };

            Metrics::order_submitted(intent.side.as_str(), reply.is_accepted());
            info!(
                side = %intent.side,
                instrument = %intent.instrument,
                quantity = intent.quantity,
                result = %reply,
                "Order submitted"
            );
        }
    }
}

/// First row with a non-zero or unreadable unfilled quantity, with its raw
/// value.
fn first_outstanding(rows: &Rows) -> Option<(usize, &str)> {
    (0..rows.len()).find_map(|row| {
        let raw = rows.field(row, FIELD_UNFILLED_QTY).unwrap_or_default();
        match parse_quantity(FIELD_UNFILLED_QTY, raw) {
            Ok(0) => None,
            Ok(_) => Some((row, raw)),
            Err(e) => {
                warn!(row, error = %e, "Unreadable unfilled quantity, treating as outstanding");
                Some((row, raw))
            }
        }
    })
}

impl fmt::Debug for Trader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trader")
            .field("account", &self.account)
            .field("target", &self.target)
            .field("phase", &self.phase())
            .field("pending", &self.pending.current())
            .field("sticky_error", &self.sticky_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MockGateway, OrderReply, SubmittedOrder};
    use crate::GatewayError;
    use chrono::{NaiveDate, NaiveDateTime};
    use daytrader_core::{FixedClock, Level};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn target() -> Instrument {
        Instrument::new("005930", "Samsung Electronics")
    }

    fn quote(ts: NaiveDateTime) -> Quote {
        Quote::new(ts, vec![Level::new(70_000, 100)], vec![Level::new(70_100, 100)])
    }

    struct Harness {
        trader: Trader,
        gateway: Arc<MockGateway>,
        clock: Arc<FixedClock>,
    }

    fn harness(now: NaiveDateTime, config: TraderConfig) -> Harness {
        let gateway = Arc::new(MockGateway::new());
        let clock = Arc::new(FixedClock::new(now));
        let trader = Trader::new("8000-01", 10, target(), gateway.clone())
            .with_clock(clock.clone())
            .with_config(config);
        Harness {
            trader,
            gateway,
            clock,
        }
    }

    impl Harness {
        fn last_id(&self) -> RequestId {
            self.gateway.last_query().unwrap().id
        }

        fn respond(&mut self, rows: Rows) {
            let id = self.last_id();
            self.trader.on_query_response(QueryResponse::new(id, rows));
        }

        fn unfilled(&mut self, remaining: &[&str]) {
            let mut rows = Rows::new();
            for r in remaining {
                rows.push([(FIELD_NAME, "Samsung Electronics"), (FIELD_UNFILLED_QTY, *r)]);
            }
            self.respond(rows);
        }

        fn holdings(&mut self, held: &[(&str, &str)]) {
            let mut rows = Rows::new();
            for (name, qty) in held {
                rows.push([(FIELD_NAME, *name), (FIELD_HELD_QTY, *qty)]);
            }
            self.respond(rows);
        }

        /// Drive a fresh trader into `Price` with `held` of the target.
        fn into_price(&mut self, held: &str) {
            self.trader.tick();
            self.unfilled(&[]);
            self.holdings(&[("Samsung Electronics", held)]);
            assert_eq!(self.trader.phase(), Phase::Price);
        }
    }

    #[test]
    fn test_first_tick_issues_unfilled_query() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        assert_eq!(h.trader.phase(), Phase::Begin);

        h.trader.tick();

        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        let query = h.gateway.last_query().unwrap();
        assert_eq!(query.kind, QueryKind::UnfilledOrders);
        assert_eq!(query.param(PARAM_ACCOUNT), Some("8000-01"));
        assert!(h.trader.state().pending_request);
    }

    #[test]
    fn test_ticks_while_pending_change_nothing() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();
        let before = h.trader.state();

        for _ in 0..5 {
            h.trader.tick();
        }

        assert_eq!(h.trader.state(), before);
        assert_eq!(h.gateway.queries().len(), 1);
    }

    #[test]
    fn test_ticks_while_untradeable_change_nothing() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();
        h.unfilled(&[]);
        h.holdings(&[("Samsung Electronics", "0")]);
        h.gateway.set_tradeable(false);
        h.trader.on_quote("005930", quote(at(10, 0, 0)));
        let before = h.trader.state();

        for _ in 0..5 {
            h.trader.tick();
        }

        assert_eq!(h.trader.state(), before);
        assert_eq!(h.trader.phase(), Phase::Price);
    }

    #[test]
    fn test_untradeable_market_defers_query() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.gateway.set_tradeable(false);

        h.trader.tick();

        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert!(h.gateway.queries().is_empty());
        assert!(!h.trader.state().pending_request);

        h.gateway.set_tradeable(true);
        h.trader.tick();
        assert_eq!(h.gateway.queries().len(), 1);
    }

    #[test]
    fn test_zero_remainder_moves_to_balance() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();

        h.unfilled(&["0", "  0"]);

        assert_eq!(h.trader.phase(), Phase::Balance);
        assert_eq!(h.gateway.last_query().unwrap().kind, QueryKind::Holdings);
    }

    #[test]
    fn test_any_remainder_moves_to_begin() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();

        h.unfilled(&["0", "3", "0"]);

        assert_eq!(h.trader.phase(), Phase::Begin);
        assert!(!h.trader.state().pending_request);

        h.trader.tick();
        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert_eq!(h.gateway.queries().len(), 2);
    }

    #[test]
    fn test_unreadable_remainder_treated_as_outstanding() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();

        h.unfilled(&["n/a"]);

        assert_eq!(h.trader.phase(), Phase::Begin);
        assert!(h.trader.error().is_none());
    }

    #[test]
    fn test_first_outstanding_reports_raw_remainder() {
        let mut rows = Rows::new();
        rows.push([(FIELD_NAME, "A"), (FIELD_UNFILLED_QTY, "0")]);
        rows.push([(FIELD_NAME, "B"), (FIELD_UNFILLED_QTY, "n/a")]);
        rows.push([(FIELD_NAME, "C"), (FIELD_UNFILLED_QTY, "3")]);
        assert_eq!(first_outstanding(&rows), Some((1, "n/a")));

        let mut rows = Rows::new();
        rows.push([(FIELD_NAME, "A"), (FIELD_UNFILLED_QTY, "0000000005")]);
        assert_eq!(first_outstanding(&rows), Some((0, "0000000005")));

        let mut rows = Rows::new();
        rows.push([(FIELD_NAME, "A"), (FIELD_UNFILLED_QTY, "0")]);
        assert_eq!(first_outstanding(&rows), None);
    }

    #[test]
    fn test_holdings_sync_moves_to_price() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();
        h.unfilled(&[]);

        h.holdings(&[("Other Corp", "99"), ("Samsung Electronics", "000000000004")]);

        assert_eq!(h.trader.phase(), Phase::Price);
        assert_eq!(h.trader.quote_store().held_quantity(&target()), Ok(4));
        assert!(!h.trader.state().pending_request);
    }

    #[test]
    fn test_unparsable_holding_is_sticky_and_stalls() {
        let mut h = harness(
            at(10, 0, 0),
            TraderConfig {
                request_timeout: Some(Duration::seconds(5)),
                ..TraderConfig::default()
            },
        );
        h.trader.tick();
        h.unfilled(&[]);

        h.holdings(&[("Samsung Electronics", "12a")]);

        assert_eq!(h.trader.phase(), Phase::Balance);
        assert_eq!(h.trader.error(), Some("held_qty error: 12a"));
        assert!(h.trader.state().pending_request);

        let queries = h.gateway.queries().len();
        for _ in 0..3 {
            h.clock.advance(Duration::seconds(10));
            h.trader.tick();
        }
        // Duplicate response for the stalled request is ignored.
        h.holdings(&[("Samsung Electronics", "1")]);

        assert_eq!(h.trader.phase(), Phase::Balance);
        assert_eq!(h.trader.error(), Some("held_qty error: 12a"));
        assert_eq!(h.gateway.queries().len(), queries);
    }

    #[test]
    fn test_unparsable_untracked_holding_is_ignored() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();
        h.unfilled(&[]);

        h.holdings(&[("Other Corp", "garbage"), ("Samsung Electronics", "2")]);

        assert_eq!(h.trader.phase(), Phase::Price);
        assert!(h.trader.error().is_none());
    }

    #[test]
    fn test_absent_holding_keeps_previous_quantity() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.into_price("5");

        // Outside the buy window with 5 held: sell, then back to confirm.
        h.trader.on_quote("005930", quote(at(10, 0, 0)));
        assert_eq!(h.trader.phase(), Phase::OrderConfirm);

        h.clock.set(at(13, 45, 0));
        h.unfilled(&[]);
        h.holdings(&[("Other Corp", "3")]);

        assert_eq!(h.trader.phase(), Phase::Price);
        assert_eq!(h.trader.quote_store().held_quantity(&target()), Ok(5));

        // Still 5 held inside the window: no buy.
        h.trader.on_quote("005930", quote(at(13, 45, 0)));
        assert_eq!(h.trader.phase(), Phase::Price);
        assert_eq!(
            h.gateway.orders(),
            vec![SubmittedOrder {
                side: OrderSide::Sell,
                account: "8000-01".to_string(),
                code: "005930".to_string(),
                quantity: 5,
            }]
        );
    }

    #[test]
    fn test_price_waits_for_every_fresh_quote() {
        let mut h = harness(at(13, 45, 0), TraderConfig::default());
        h.trader
            .register_tracked_instrument(Instrument::new("000660", "SK hynix"));
        h.into_price("0");

        h.trader.on_quote("005930", quote(at(13, 45, 0)));
        assert_eq!(h.trader.phase(), Phase::Price);

        // Two seconds old.
        h.trader.on_quote("000660", quote(at(13, 44, 58)));
        h.trader.tick();
        assert_eq!(h.trader.phase(), Phase::Price);
        assert!(h.gateway.orders().is_empty());
        assert!(!h.trader.state().price_ever_collected);

        h.trader.on_quote("000660", quote(at(13, 44, 59)));
        assert!(h.trader.state().price_ever_collected);
        assert_eq!(h.gateway.orders().len(), 1);
    }

    #[test]
    fn test_quote_older_than_one_second_blocks_decision() {
        let mut h = harness(at(13, 45, 0), TraderConfig::default());
        h.into_price("0");

        h.gateway.set_tradeable(false);
        h.trader.on_quote("005930", quote(at(13, 45, 0)));
        h.clock.advance(Duration::milliseconds(1_001));
        h.gateway.set_tradeable(true);
        h.trader.tick();

        assert_eq!(h.trader.phase(), Phase::Price);
        assert!(h.gateway.orders().is_empty());
    }

    #[test]
    fn test_price_no_decision_stays() {
        let mut h = harness(at(13, 45, 0), TraderConfig::default());
        h.into_price("10");

        h.trader.on_quote("005930", quote(at(13, 45, 0)));

        assert_eq!(h.trader.phase(), Phase::Price);
        assert!(h.gateway.orders().is_empty());
        assert!(h.trader.state().price_ever_collected);
    }

    #[test]
    fn test_sell_outside_window_then_confirm() {
        let mut h = harness(at(9, 30, 0), TraderConfig::default());
        h.into_price("7");
        h.gateway.set_next_reply(OrderReply::rejected(-1, "rejected"));
        let queries = h.gateway.queries().len();

        h.trader.on_quote("005930", quote(at(9, 30, 0)));

        assert_eq!(
            h.gateway.orders(),
            vec![SubmittedOrder {
                side: OrderSide::Sell,
                account: "8000-01".to_string(),
                code: "005930".to_string(),
                quantity: 7,
            }]
        );
        // Rejection does not change the flow.
        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert_eq!(h.gateway.queries().len(), queries + 1);
        assert_eq!(
            h.gateway.last_query().unwrap().kind,
            QueryKind::UnfilledOrders
        );
    }

    #[test]
    fn test_query_issue_failure_releases_slot() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.gateway.set_query_error(Some(GatewayError::NotConnected));

        h.trader.tick();

        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert!(!h.trader.state().pending_request);

        h.gateway.set_query_error(None);
        h.trader.tick();
        assert!(h.trader.state().pending_request);
        assert_eq!(h.gateway.queries().len(), 1);
    }

    #[test]
    fn test_foreign_response_is_discarded() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();
        let id = h.last_id();

        h.trader
            .on_query_response(QueryResponse::new(RequestId(id.0 + 42), Rows::new()));

        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert!(h.trader.state().pending_request);
    }

    #[test]
    fn test_deadline_restarts_cycle_and_discards_late_response() {
        let mut h = harness(
            at(10, 0, 0),
            TraderConfig {
                request_timeout: Some(Duration::seconds(5)),
                ..TraderConfig::default()
            },
        );
        h.trader.tick();
        h.unfilled(&[]);
        let stale_id = h.last_id();
        assert_eq!(h.trader.phase(), Phase::Balance);

        h.clock.advance(Duration::seconds(6));
        h.trader.tick();

        // Expired, back through Begin into a new unfilled-orders query.
        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert_ne!(h.last_id(), stale_id);

        let mut rows = Rows::new();
        rows.push([(FIELD_NAME, "Samsung Electronics"), (FIELD_HELD_QTY, "1")]);
        h.trader
            .on_query_response(QueryResponse::new(stale_id, rows));
        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert_eq!(h.trader.quote_store().held_quantity(&target()), Ok(0));
    }

    #[test]
    fn test_without_deadline_pending_waits_forever() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();

        h.clock.advance(Duration::hours(2));
        h.trader.tick();

        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert_eq!(h.gateway.queries().len(), 1);
    }

    #[test]
    fn test_unrepresentable_deadline_is_ignored() {
        let mut h = harness(
            at(10, 0, 0),
            TraderConfig {
                request_timeout: Some(Duration::milliseconds(9_000_000_000_000_000)),
                ..TraderConfig::default()
            },
        );

        h.trader.tick();
        assert_eq!(h.trader.phase(), Phase::OrderConfirm);
        assert!(h.trader.state().pending_request);

        h.clock.advance(Duration::days(365));
        h.trader.tick();
        assert!(h.trader.state().pending_request);
        assert_eq!(h.gateway.queries().len(), 1);
    }

    #[test]
    fn test_tick_publishes_phase() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        let mut rx = h.trader.subscribe();
        assert_eq!(*rx.borrow(), Phase::Begin);

        h.trader.tick();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Phase::OrderConfirm);
    }

    #[test]
    fn test_subscriber_wakes_on_tick() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        let mut rx = h.trader.subscribe();

        {
            let mut changed = tokio_test::task::spawn(rx.changed());
            tokio_test::assert_pending!(changed.poll());

            h.trader.tick();

            assert!(changed.is_woken());
            tokio_test::assert_ready_ok!(changed.poll());
        }
        assert_eq!(*rx.borrow(), Phase::OrderConfirm);
    }

    #[test]
    fn test_handle_event_dispatches() {
        let mut h = harness(at(10, 0, 0), TraderConfig::default());
        h.trader.tick();
        let id = h.last_id();

        h.trader
            .handle_event(GatewayEvent::Response(QueryResponse::new(id, Rows::new())));
        assert_eq!(h.trader.phase(), Phase::Balance);

        h.trader.handle_event(GatewayEvent::Quote {
            code: "005930".to_string(),
            quote: quote(at(10, 0, 0)),
        });
        assert!(h.trader.quote_store().quote(&target()).is_some());
    }

    #[test]
    fn test_state_serializes() {
        let h = harness(at(10, 0, 0), TraderConfig::default());
        let json = serde_json::to_string(&h.trader.state()).unwrap();
        assert_eq!(
            json,
            r#"{"phase":"begin","pending_request":false,"sticky_error":null,"price_ever_collected":false}"#
        );
    }
}
