//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;

/// Division that yields `None` instead of failing on a zero divisor.
pub fn checked_div(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator == Decimal::ZERO {
        None
    } else {
        numerator.checked_div(denominator)
    }
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean<'a, I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = &'a Decimal>,
{
    let (sum, count) = values
        .into_iter()
        .fold((Decimal::ZERO, 0u32), |(sum, count), v| (sum + *v, count + 1));

    checked_div(sum, Decimal::from(count))
}

/// Move `price` away from the market by `fraction`: down for bids, up for asks.
pub fn offset_price(price: Decimal, fraction: Decimal, below: bool) -> Decimal {
    if below {
        price * (Decimal::ONE - fraction)
    } else {
        price * (Decimal::ONE + fraction)
    }
}
