//! # Scalp Ladder
//!
//! Orchestrates many concurrent two-leg scalps on one trading pair, each
//! converting the start currency into the destination currency and back at
//! a fee-adjusted profit.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Market data clients, ticker replay and paper leg execution
//! - `strategy`: Profit model, signal gate, scalp state machine, depth ladder
//!   and the control loop
//! - `reporting`: Closed-scalp reports and their sinks
//! - `persistence`: SQLite history of closed scalps
//! - `utils`: Shared decimal arithmetic

pub mod config;
pub mod exchange;
pub mod persistence;
pub mod reporting;
pub mod strategy;
pub mod utils;

pub use config::Config;
