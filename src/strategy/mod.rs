//! Scalping strategy implementation.
//!
//! Contains the core logic for:
//! - Fee-compounded profit targets and leg pricing
//! - The moving-average admission gate
//! - The per-scalp state machine
//! - The depth ladder of concurrently active scalps
//! - The control loop tying them to the exchange

mod ladder;
mod orchestrator;
mod profit;
mod scalp;
mod signal;

pub use ladder::DepthLadder;
pub use orchestrator::{Orchestrator, OrchestratorContext, TickOutcome};
pub use profit::{depth_entry_price, fee_adjusted_target, leg2_price, leg2_target_amount};
pub use scalp::{leg1_side, Scalp, ScalpState};
pub use signal::{SignalGate, SignalSnapshot};

use crate::exchange::ExchangeError;
use thiserror::Error;

/// Errors raised by the strategy layer.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The start currency is neither side of the symbol.
    #[error("cannot trade {currency} on {symbol}")]
    UnknownDirection { symbol: String, currency: String },
    #[error("depth ladder is full ({max} scalps)")]
    LadderFull { max: usize },
    #[error("scalp {0}: leg 1 has no fill to recover")]
    Leg1NotFilled(String),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}
