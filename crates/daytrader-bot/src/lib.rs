//! Daytrader strategy runner.
//!
//! Wires the trader to a brokerage gateway and drives it:
//! - Heartbeat ticks
//! - Gateway events (query completions and quote pushes)
//! - Periodic statistics summary
//!
//! The bundled gateway is [`PaperGateway`], which fills orders against
//! synthetic depth quotes.

pub mod app;
pub mod config;
pub mod error;
pub mod paper;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use paper::{PaperGateway, PaperQuoteFeed};
