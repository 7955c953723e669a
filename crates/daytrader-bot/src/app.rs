//! Main application.
//!
//! Owns the trader and drives it from a single select loop, so every
//! trader entry point runs on one task.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::paper::{PaperGateway, PaperQuoteFeed};
use daytrader_core::{DynClock, SystemClock};
use daytrader_executor::{GatewayEvent, Phase, Trader};
use daytrader_telemetry::{Metrics, StatsReporter};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    trader: Trader,
    feed: Option<PaperQuoteFeed>,
    events_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    phase_rx: watch::Receiver<Phase>,
    stats: StatsReporter,
    sticky_reported: bool,
}

impl Application {
    /// Create the application with the system clock.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create the application with an explicit clock.
    pub fn with_clock(config: AppConfig, clock: DynClock) -> AppResult<Self> {
        config.validate()?;

        let target = config.target_instrument()?;
        let tracked = config.tracked_instruments()?;

        let mut instruments = vec![target.clone()];
        instruments.extend(tracked.iter().cloned());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let gateway = Arc::new(PaperGateway::new(
            &config.paper,
            config.account.clone(),
            instruments,
            clock.clone(),
            events_tx,
        )?);
        let feed = PaperQuoteFeed::new(gateway.clone(), clock.clone(), &config.paper);

        let mut trader = Trader::new(config.account.clone(), config.quantity, target, gateway)
            .with_clock(clock)
            .with_config(config.trader_config());
        for instrument in tracked {
            trader.register_tracked_instrument(instrument);
        }
        let phase_rx = trader.subscribe();

        info!(
            account = %config.account,
            target = %trader.target(),
            tracked = config.tracked.len(),
            quantity = config.quantity,
            "Trader created"
        );

        Ok(Self {
            config,
            trader,
            feed: Some(feed),
            events_rx,
            phase_rx,
            stats: StatsReporter::new(),
            sticky_reported: false,
        })
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }

    /// Run until ctrl-c.
    pub async fn run(mut self) -> AppResult<()> {
        info!("Starting application");
        Metrics::phase_set(self.trader.phase().as_str());

        let feed_handle = self.feed.take().map(|feed| tokio::spawn(feed.run()));

        let mut heartbeat = tokio::time::interval(self.config.heartbeat());
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut stats_interval = tokio::time::interval(self.config.stats_interval());
        // The first tick fires immediately.
        stats_interval.tick().await;

        info!("Entering main event loop");
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    self.trader.tick();
                    self.report_sticky_error();
                }

                Some(event) = self.events_rx.recv() => {
                    self.trader.handle_event(event);
                }

                Ok(()) = self.phase_rx.changed() => {
                    let phase = *self.phase_rx.borrow_and_update();
                    debug!(%phase, "Tick processed");
                }

                _ = stats_interval.tick() => {
                    info!("Outputting periodic statistics summary");
                    self.stats.output_summary();
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Some(handle) = feed_handle {
            handle.abort();
        }

        self.shutdown()
    }

    /// Log a sticky error once. The trader stays stalled until restarted.
    fn report_sticky_error(&mut self) {
        if self.sticky_reported {
            return;
        }
        if let Some(message) = self.trader.error() {
            error!(
                error = message,
                phase = %self.trader.phase(),
                "Trader stalled, restart required"
            );
            self.sticky_reported = true;
        }
    }

    fn shutdown(&self) -> AppResult<()> {
        info!("Final statistics summary:");
        self.stats.output_summary();

        let state = serde_json::to_string(&self.trader.state())?;
        info!(state = %state, "Final trader state");

        match Metrics::encode_text() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to encode metrics"),
        }

        Ok(())
    }
}
