//! Fee-compounded profit targets and leg pricing.

use crate::exchange::{OrderSide, Ticker};
use crate::utils::{checked_div, offset_price};
use rust_decimal::Decimal;

/// Nominal per-scalp profit needed so that, after two legs each losing
/// `commission`, the realised profit equals `profit`.
///
/// `(1 + profit) / (1 - commission)^2 - 1`
pub fn fee_adjusted_target(profit: Decimal, commission: Decimal) -> Decimal {
    let retained = Decimal::ONE - commission;
    (Decimal::ONE + profit) / (retained * retained) - Decimal::ONE
}

/// Amount of start currency leg 2 has to bring back.
pub fn leg2_target_amount(leg1_filled_start: Decimal, profit: Decimal) -> Decimal {
    leg1_filled_start * (Decimal::ONE + profit)
}

/// Limit price for leg 2, which spends `leg1_filled_dest` to receive `target`.
///
/// A buy of the start currency pays `leg1_filled_dest` quote for `target`
/// base; a sell receives `target` quote for `leg1_filled_dest` base.
/// `None` if the divisor is zero.
pub fn leg2_price(side: OrderSide, leg1_filled_dest: Decimal, target: Decimal) -> Option<Decimal> {
    match side {
        OrderSide::Buy => checked_div(leg1_filled_dest, target),
        OrderSide::Sell => checked_div(target, leg1_filled_dest),
    }
}

/// Leg 1 limit price for a depth slot.
///
/// Depth 1 quotes at the touch (bid for buys, ask for sells); every further
/// depth moves `depth_step * profit` further away from the market.
pub fn depth_entry_price(
    side: OrderSide,
    ticker: &Ticker,
    depth: u32,
    depth_step: Decimal,
    profit: Decimal,
) -> Decimal {
    let levels = Decimal::from(depth.saturating_sub(1));
    let fraction = depth_step * profit * levels;
    match side {
        OrderSide::Buy => offset_price(ticker.bid, fraction, true),
        OrderSide::Sell => offset_price(ticker.ask, fraction, false),
    }
}
