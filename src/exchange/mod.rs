//! Exchange-side collaborators of the orchestrator.
//!
//! ## Market data
//! - `BinanceClient`: live best bid/ask from the Binance spot REST API
//! - `CsvTickerFeed`: offline replay of recorded tickers
//!
//! ## Order legs
//! - `LegExecutor`: the contract the orchestrator relies on
//! - `MockLegExecutor`: paper execution against the last seen tickers

mod client;
pub mod mock;
mod replay;
mod traits;
mod types;

pub use client::BinanceClient;
pub use mock::{MockLegExecutor, PaperBook, PaperGateway};
pub use replay::CsvTickerFeed;
pub use traits::*;
pub use types::*;
