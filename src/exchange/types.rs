//! Type definitions shared by the exchange gateway and the leg executor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Best bid/ask for a trading pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Ticker {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self { bid, ask }
    }
}

/// Best bid/ask as returned by the Binance spot REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTicker {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_qty: Decimal,
}

impl From<BookTicker> for Ticker {
    fn from(book: BookTicker) -> Self {
        Ticker::new(book.bid_price, book.ask_price)
    }
}

/// Order side relative to the base currency of the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Split a "BASE/QUOTE" symbol into its currencies.
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    let (base, quote) = symbol.split_once('/')?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

/// Side of an order that spends `source_currency` on `symbol`.
///
/// Spending the quote currency buys the base; spending the base sells it.
pub fn side_for_source(symbol: &str, source_currency: &str) -> Option<OrderSide> {
    let (base, quote) = split_symbol(symbol)?;
    if source_currency == quote {
        Some(OrderSide::Buy)
    } else if source_currency == base {
        Some(OrderSide::Sell)
    } else {
        None
    }
}

/// Opaque reference to a leg owned by the leg executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LegHandle(pub u64);

impl fmt::Display for LegHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leg-{}", self.0)
    }
}

/// Externally visible status of a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegStatus {
    Open,
    Closed,
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegStatus::Open => write!(f, "open"),
            LegStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Internal stage of a leg, reported for history only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStage {
    /// Requoting at a fixed price until the update budget runs out
    FillOrKill,
    /// Requoting at the profit target price
    ForProfit,
    /// Chasing the best price to exit the position
    Market,
    Filled,
    Cancelled,
}

impl fmt::Display for LegStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LegStage::FillOrKill => "fok",
            LegStage::ForProfit => "for_profit",
            LegStage::Market => "market",
            LegStage::Filled => "filled",
            LegStage::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Update/cancel policy handed to the leg executor with each leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegPolicy {
    /// Requote at most `max_updates` times, then cancel if the unfilled
    /// remainder exceeds `cancel_threshold`.
    FillOrKill {
        max_updates: u32,
        cancel_threshold: Decimal,
    },
    /// Requote at the target price, then fall back to market-clearing
    /// prices for at most `max_updates_market` further updates.
    Recovery {
        max_updates_for_profit: u32,
        max_updates_market: u32,
        cancel_threshold: Decimal,
    },
}

impl LegPolicy {
    /// Total update attempts this policy permits.
    pub fn max_update_attempts(&self) -> u32 {
        match self {
            LegPolicy::FillOrKill { max_updates, .. } => *max_updates,
            LegPolicy::Recovery {
                max_updates_for_profit,
                max_updates_market,
                ..
            } => max_updates_for_profit + max_updates_market,
        }
    }

    pub fn cancel_threshold(&self) -> Decimal {
        match self {
            LegPolicy::FillOrKill {
                cancel_threshold, ..
            }
            | LegPolicy::Recovery {
                cancel_threshold, ..
            } => *cancel_threshold,
        }
    }
}

/// Request to convert `source_amount` of `source_currency` into `dest_currency`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegRequest {
    pub symbol: String,
    pub source_currency: String,
    pub source_amount: Decimal,
    pub dest_currency: String,
    /// Limit price in quote per base
    pub price: Decimal,
    pub policy: LegPolicy,
}

/// Point-in-time view of a leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegSnapshot {
    pub handle: LegHandle,
    pub symbol: String,
    pub side: OrderSide,
    pub source_currency: String,
    pub dest_currency: String,
    pub status: LegStatus,
    pub stage: LegStage,
    pub price: Decimal,
    /// Nominal order amount in base currency
    pub amount: Decimal,
    /// Filled amount in base currency
    pub filled: Decimal,
    /// Source currency spent so far
    pub filled_start_amount: Decimal,
    /// Destination currency received so far, net of commission
    pub filled_dest_amount: Decimal,
    /// Update requests issued for the most recent sub-order
    pub update_requests_count: u32,
    pub max_update_attempts: u32,
    /// Exchange id of the most recent sub-order
    pub last_order_id: Option<String>,
}

impl LegSnapshot {
    pub fn is_open(&self) -> bool {
        self.status == LegStatus::Open
    }

    /// Filled / nominal amount; `None` when the nominal amount is zero.
    pub fn fill_ratio(&self) -> Option<Decimal> {
        crate::utils::checked_div(self.filled, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_for_source() {
        assert_eq!(side_for_source("ETH/BTC", "BTC"), Some(OrderSide::Buy));
        assert_eq!(side_for_source("ETH/BTC", "ETH"), Some(OrderSide::Sell));
        assert_eq!(side_for_source("ETH/BTC", "USDT"), None);
        assert_eq!(side_for_source("ETHBTC", "BTC"), None);
    }

    #[test]
    fn test_book_ticker_parse() {
        let json = r#"{"symbol":"ETHBTC","bidPrice":"0.05100000","bidQty":"3.1","askPrice":"0.05101000","askQty":"7"}"#;
        let book: BookTicker = serde_json::from_str(json).unwrap();
        let ticker: Ticker = book.into();
        assert_eq!(ticker.bid, dec!(0.051));
        assert_eq!(ticker.ask, dec!(0.05101));
    }

    #[test]
    fn test_recovery_policy_budget() {
        let policy = LegPolicy::Recovery {
            max_updates_for_profit: 10,
            max_updates_market: 5,
            cancel_threshold: dec!(0.01),
        };
        assert_eq!(policy.max_update_attempts(), 15);
        assert_eq!(policy.cancel_threshold(), dec!(0.01));
    }
}
