//! Capabilities the orchestrator consumes from the outside world.
//!
//! - `ExchangeGateway`: market data (best bid/ask)
//! - `LegExecutor`: order legs with their own update/cancel policy
//!
//! Live and paper implementations plug in behind these traits.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{LegHandle, LegRequest, LegSnapshot, Ticker};

/// Errors surfaced by exchange-side collaborators.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Network or decoding failure; safe to retry on the next tick.
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("no market for {currency} on {symbol}")]
    UnknownMarket { symbol: String, currency: String },
    #[error("no ticker available for {0}")]
    NoTicker(String),
    /// An offline ticker replay has no rows left.
    #[error("ticker feed exhausted")]
    FeedExhausted,
    #[error("unknown leg {0}")]
    UnknownLeg(LegHandle),
}

impl ExchangeError {
    /// Whether the caller should simply try again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExchangeError::Transport(_) | ExchangeError::NoTicker(_))
    }
}

/// Source of best bid/ask prices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Fetch the current best bid/ask for `symbol` ("BASE/QUOTE").
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError>;
}

/// Executes single-direction order legs.
///
/// Leg state only changes inside `progress_all_open_legs`, so every read
/// between two progress calls observes the same snapshot.
#[async_trait]
pub trait LegExecutor: Send + Sync {
    /// Create and submit a leg. The returned handle is valid for the life of
    /// the executor.
    async fn create_leg(&self, request: LegRequest) -> Result<LegHandle, ExchangeError>;

    /// Current view of a leg.
    async fn leg(&self, handle: LegHandle) -> Result<LegSnapshot, ExchangeError>;

    /// Advance every open leg exactly once.
    async fn progress_all_open_legs(&self) -> Result<(), ExchangeError>;

    /// Number of legs still open.
    async fn open_leg_count(&self) -> usize;
}
