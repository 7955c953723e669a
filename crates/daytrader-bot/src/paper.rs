//! Paper brokerage.
//!
//! [`PaperGateway`] stands in for a broker adapter. Orders fill instantly
//! against the last published quote, priced level by level, so there are
//! never unfilled remainders. Query completions are posted to the event
//! channel the same way a real adapter would deliver them.
//!
//! [`PaperQuoteFeed`] publishes synthetic depth quotes for every instrument
//! on a fixed interval, stamped with the local clock.

use crate::config::PaperConfig;
use crate::error::{AppError, AppResult};
use chrono::{NaiveTime, Timelike};
use daytrader_core::{price, Clock, DynClock, Instrument, Level, Quote, INSUFFICIENT_DEPTH};
use daytrader_executor::{
    BrokerageGateway, GatewayError, GatewayEvent, GatewayResult, OrderReply, QueryKind,
    QueryRequest, QueryResponse, Rows, FIELD_HELD_QTY, FIELD_NAME, FIELD_UNFILLED_QTY,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Reply code: depth could not fill the quantity.
pub const REPLY_INSUFFICIENT_DEPTH: i32 = -1;
/// Reply code: market closed.
pub const REPLY_MARKET_CLOSED: i32 = -2;
/// Reply code: no quote for the instrument yet.
pub const REPLY_NO_QUOTE: i32 = -3;
/// Reply code: selling more than held.
pub const REPLY_INSUFFICIENT_HOLDINGS: i32 = -4;
/// Reply code: unknown account or instrument.
pub const REPLY_UNKNOWN: i32 = -5;

/// Parse a local "HH:MM" session time.
pub fn parse_session_time(raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| AppError::Config(format!("Invalid session time {raw:?}: {e}")))
}

#[derive(Debug, Default)]
struct PaperBook {
    held: HashMap<String, u64>,
    quotes: HashMap<String, Quote>,
}

/// Simulated brokerage filling against synthetic quotes.
pub struct PaperGateway {
    account: String,
    instruments: Vec<Instrument>,
    session_open: NaiveTime,
    session_close: NaiveTime,
    clock: DynClock,
    events: mpsc::UnboundedSender<GatewayEvent>,
    book: Mutex<PaperBook>,
}

impl PaperGateway {
    /// Create a paper gateway. `instruments[0]` starts with
    /// `config.initial_held`.
    pub fn new(
        config: &PaperConfig,
        account: impl Into<String>,
        instruments: Vec<Instrument>,
        clock: DynClock,
        events: mpsc::UnboundedSender<GatewayEvent>,
    ) -> AppResult<Self> {
        let mut book = PaperBook::default();
        if let Some(first) = instruments.first() {
            if config.initial_held > 0 {
                book.held.insert(first.code().to_string(), config.initial_held);
            }
        }

        Ok(Self {
            account: account.into(),
            instruments,
            session_open: parse_session_time(&config.session_open)?,
            session_close: parse_session_time(&config.session_close)?,
            clock,
            events,
            book: Mutex::new(book),
        })
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn held(&self, code: &str) -> u64 {
        self.book.lock().held.get(code).copied().unwrap_or(0)
    }

    /// Record a quote for fills and push it to the trader.
    pub fn publish_quote(&self, code: &str, quote: Quote) -> GatewayResult<()> {
        self.book.lock().quotes.insert(code.to_string(), quote.clone());
        self.events
            .send(GatewayEvent::Quote {
                code: code.to_string(),
                quote,
            })
            .map_err(|_| GatewayError::ChannelClosed)
    }

    fn instrument(&self, code: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.code() == code)
    }

    /// One row per instrument, flat positions included.
    fn holdings_rows(&self) -> Rows {
        let book = self.book.lock();
        let mut rows = Rows::new();
        for instrument in &self.instruments {
            let held = book.held.get(instrument.code()).copied().unwrap_or(0);
            rows.push([
                (FIELD_NAME, instrument.name().to_string()),
                (FIELD_HELD_QTY, format!("{held:012}")),
            ]);
        }
        rows
    }

    /// Common order checks. Returns the quote to fill against.
    fn precheck(&self, account: &str, code: &str) -> Result<Quote, OrderReply> {
        if account != self.account {
            return Err(OrderReply::rejected(REPLY_UNKNOWN, "unknown account"));
        }
        if self.instrument(code).is_none() {
            return Err(OrderReply::rejected(REPLY_UNKNOWN, "unknown instrument"));
        }
        if !self.is_tradeable() {
            return Err(OrderReply::rejected(REPLY_MARKET_CLOSED, "market closed"));
        }
        self.book
            .lock()
            .quotes
            .get(code)
            .cloned()
            .ok_or_else(|| OrderReply::rejected(REPLY_NO_QUOTE, "no quote"))
    }
}

impl BrokerageGateway for PaperGateway {
    fn is_tradeable(&self) -> bool {
        let now = self.clock.now().time();
        now >= self.session_open && now < self.session_close
    }

    fn query(&self, request: QueryRequest) -> GatewayResult<()> {
        let rows = match request.kind {
            // Fills are instant, so every order row is fully filled.
            QueryKind::UnfilledOrders => {
                let mut rows = Rows::new();
                for instrument in &self.instruments {
                    rows.push([
                        (FIELD_NAME, instrument.name().to_string()),
                        (FIELD_UNFILLED_QTY, "0".to_string()),
                    ]);
                }
                rows
            }
            QueryKind::Holdings => self.holdings_rows(),
        };

        debug!(
            request_id = %request.id,
            kind = %request.kind,
            rows = rows.len(),
            "Paper query answered"
        );
        self.events
            .send(GatewayEvent::Response(QueryResponse::new(request.id, rows)))
            .map_err(|_| GatewayError::ChannelClosed)
    }

    fn buy(&self, account: &str, code: &str, quantity: u64) -> OrderReply {
        let quote = match self.precheck(account, code) {
            Ok(quote) => quote,
            Err(reply) => return reply,
        };

        let cost = price(quantity, &quote.asks);
        if cost == INSUFFICIENT_DEPTH {
            return OrderReply::rejected(REPLY_INSUFFICIENT_DEPTH, "insufficient depth");
        }

        *self.book.lock().held.entry(code.to_string()).or_insert(0) += quantity;
        info!(code, quantity, cost, "Paper buy filled");
        OrderReply::accepted(format!("bought {quantity} for {cost}"))
    }

    fn sell(&self, account: &str, code: &str, quantity: u64) -> OrderReply {
        let quote = match self.precheck(account, code) {
            Ok(quote) => quote,
            Err(reply) => return reply,
        };

        if self.held(code) < quantity {
            return OrderReply::rejected(REPLY_INSUFFICIENT_HOLDINGS, "insufficient holdings");
        }

        let proceeds = price(quantity, &quote.bids);
        if proceeds == INSUFFICIENT_DEPTH {
            return OrderReply::rejected(REPLY_INSUFFICIENT_DEPTH, "insufficient depth");
        }

        if let Some(held) = self.book.lock().held.get_mut(code) {
            *held -= quantity;
        }
        info!(code, quantity, proceeds, "Paper sell filled");
        OrderReply::accepted(format!("sold {quantity} for {proceeds}"))
    }
}

/// Synthetic depth quote publisher.
pub struct PaperQuoteFeed {
    gateway: Arc<PaperGateway>,
    clock: DynClock,
    interval: std::time::Duration,
    base_price: i64,
    tick_size: i64,
    depth_levels: usize,
    level_quantity: u64,
}

impl PaperQuoteFeed {
    pub fn new(gateway: Arc<PaperGateway>, clock: DynClock, config: &PaperConfig) -> Self {
        Self {
            gateway,
            clock,
            interval: std::time::Duration::from_millis(config.quote_interval_ms),
            base_price: config.base_price,
            tick_size: config.tick_size,
            depth_levels: config.depth_levels,
            level_quantity: config.level_quantity,
        }
    }

    /// Build the quote for `instrument_index`.
    ///
    /// The mid price walks a triangle wave of 20 ticks over the minute so
    /// fills move without needing randomness.
    pub fn synthesize(&self, instrument_index: usize) -> Quote {
        let now = self.clock.now();
        let phase = (now.second() as i64 + instrument_index as i64 * 7) % 20;
        let offset = if phase < 10 { phase } else { 20 - phase } - 5;
        let mid = self.base_price + offset * self.tick_size;

        let bids = (0..self.depth_levels)
            .map(|i| Level::new(mid - self.tick_size * (i as i64 + 1), self.level_quantity))
            .collect();
        let asks = (0..self.depth_levels)
            .map(|i| Level::new(mid + self.tick_size * (i as i64 + 1), self.level_quantity))
            .collect();

        Quote::new(now, bids, asks)
    }

    /// Publish quotes until the event channel closes.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if let Err(e) = self.publish_once() {
                warn!(error = %e, "Quote feed stopped");
                return;
            }
        }
    }

    /// Publish one quote for every instrument.
    pub fn publish_once(&self) -> GatewayResult<()> {
        for (index, instrument) in self.gateway.instruments().iter().enumerate() {
            self.gateway
                .publish_quote(instrument.code(), self.synthesize(index))?;
        }
        Ok(())
    }
}
