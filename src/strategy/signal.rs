//! Moving-average admission gate.
//!
//! Keeps rolling bid/ask histories of `long_window + lookback` prices and
//! compares a short and a long simple moving average on the side a first
//! leg would trade against: asks for buys, bids for sells.

use crate::config::SignalConfig;
use crate::exchange::{OrderSide, Ticker};
use crate::utils::{checked_div, mean};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// Moving averages at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalSnapshot {
    pub short: Decimal,
    pub long: Decimal,
    /// `(short - long) / short`, `None` when `short` is zero
    pub delta: Option<Decimal>,
    /// `delta` as it was `lookback` prices ago
    pub delta_lookback: Option<Decimal>,
}

/// Rolling price history and threshold comparator.
#[derive(Debug, Clone)]
pub struct SignalGate {
    side: OrderSide,
    short_window: usize,
    long_window: usize,
    lookback: usize,
    threshold: Decimal,
    bids: VecDeque<Decimal>,
    asks: VecDeque<Decimal>,
}

impl SignalGate {
    /// Create a gate for first legs trading on `side`.
    pub fn new(config: &SignalConfig, side: OrderSide) -> Self {
        let capacity = config.long_window + config.lookback;
        Self {
            side,
            short_window: config.short_window,
            long_window: config.long_window,
            lookback: config.lookback,
            threshold: config.threshold,
            bids: VecDeque::with_capacity(capacity),
            asks: VecDeque::with_capacity(capacity),
        }
    }

    /// Number of prices kept per side.
    pub fn window_len(&self) -> usize {
        self.long_window + self.lookback
    }

    pub fn len(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty()
    }

    /// Whether the history is long enough to produce a signal.
    pub fn is_ready(&self) -> bool {
        self.len() >= self.window_len()
    }

    /// Append a ticker and trim both histories to the window.
    pub fn push(&mut self, ticker: &Ticker) {
        let window = self.window_len();
        for (series, price) in [(&mut self.bids, ticker.bid), (&mut self.asks, ticker.ask)] {
            series.push_back(price);
            while series.len() > window {
                series.pop_front();
            }
        }
    }

    fn series(&self) -> &VecDeque<Decimal> {
        match self.side {
            OrderSide::Buy => &self.asks,
            OrderSide::Sell => &self.bids,
        }
    }

    /// Short/long averages ending `offset` prices before the latest one.
    fn averages_at(&self, offset: usize) -> Option<(Decimal, Decimal)> {
        let series = self.series();
        let end = series.len().checked_sub(offset)?;
        if end < self.long_window {
            return None;
        }
        let short = mean(series.range(end - self.short_window..end))?;
        let long = mean(series.range(end - self.long_window..end))?;
        Some((short, long))
    }

    fn relative_delta(short: Decimal, long: Decimal) -> Option<Decimal> {
        checked_div(short - long, short)
    }

    /// Current averages; `None` until the history is full.
    pub fn snapshot(&self) -> Option<SignalSnapshot> {
        if !self.is_ready() {
            return None;
        }
        let (short, long) = self.averages_at(0)?;
        let delta_lookback = self
            .averages_at(self.lookback)
            .and_then(|(s, l)| Self::relative_delta(s, l));

        Some(SignalSnapshot {
            short,
            long,
            delta: Self::relative_delta(short, long),
            delta_lookback,
        })
    }

    /// Whether a new first leg may be admitted now.
    ///
    /// Buys need the short average above the long one by more than the
    /// threshold; sells need it below by more than the threshold. Flat
    /// averages never admit.
    ///
    /// The threshold's sign is effectively clamped: a negative buy threshold
    /// acts as zero, as does a positive sell threshold.
    pub fn admits(&self) -> bool {
        let Some(snapshot) = self.snapshot() else {
            return false;
        };
        let Some(delta) = snapshot.delta else {
            return false;
        };

        let admitted = match self.side {
            OrderSide::Buy => delta > Decimal::ZERO && delta > self.threshold,
            OrderSide::Sell => delta < Decimal::ZERO && delta < self.threshold,
        };

        debug!(
            side = %self.side,
            short = %snapshot.short,
            long = %snapshot.long,
            %delta,
            threshold = %self.threshold,
            admitted,
            "Signal gate evaluated"
        );
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(short: usize, long: usize, lookback: usize, threshold: Decimal) -> SignalConfig {
        SignalConfig {
            short_window: short,
            long_window: long,
            lookback,
            threshold,
        }
    }

    fn feed(gate: &mut SignalGate, prices: &[Decimal]) {
        for price in prices {
            gate.push(&Ticker::new(*price, *price));
        }
    }

    #[test]
    fn test_history_trimmed_to_window() {
        let mut gate = SignalGate::new(&config(2, 4, 2, dec!(0)), OrderSide::Buy);
        assert!(gate.is_empty());

        feed(&mut gate, &[dec!(1); 10]);
        assert_eq!(gate.len(), 6);
        assert_eq!(gate.window_len(), 6);
    }

    #[test]
    fn test_refuses_until_ready() {
        let mut gate = SignalGate::new(&config(2, 4, 1, dec!(-1)), OrderSide::Buy);
        feed(&mut gate, &[dec!(1), dec!(2), dec!(3), dec!(4)]);

        assert!(!gate.is_ready());
        assert!(gate.snapshot().is_none());
        assert!(!gate.admits());

        feed(&mut gate, &[dec!(5)]);
        assert!(gate.is_ready());
        assert!(gate.admits());
    }

    #[test]
    fn test_constant_series_never_admits() {
        for threshold in [dec!(-0.01), dec!(0), dec!(0.01)] {
            for side in [OrderSide::Buy, OrderSide::Sell] {
                let mut gate = SignalGate::new(&config(3, 5, 2, threshold), side);
                feed(&mut gate, &[dec!(100); 7]);

                let snapshot = gate.snapshot().unwrap();
                assert_eq!(snapshot.short, snapshot.long);
                assert_eq!(snapshot.delta, Some(Decimal::ZERO));
                assert!(!gate.admits());
            }
        }
    }

    #[test]
    fn test_rising_prices_admit_buys_only() {
        let prices: Vec<Decimal> = (1..=6).map(Decimal::from).collect();

        let mut buy = SignalGate::new(&config(2, 4, 2, dec!(0.01)), OrderSide::Buy);
        feed(&mut buy, &prices);
        let snapshot = buy.snapshot().unwrap();
        // short = (5+6)/2, long = (3+4+5+6)/4
        assert_eq!(snapshot.short, dec!(5.5));
        assert_eq!(snapshot.long, dec!(4.5));
        assert_eq!(snapshot.delta.unwrap().round_dp(6), dec!(0.181818));
        // two prices earlier: short = 3.5, long = 2.5
        assert_eq!(snapshot.delta_lookback.unwrap().round_dp(6), dec!(0.285714));
        assert!(buy.admits());

        let mut sell = SignalGate::new(&config(2, 4, 2, dec!(-0.01)), OrderSide::Sell);
        feed(&mut sell, &prices);
        assert!(!sell.admits());
    }

    #[test]
    fn test_falling_prices_admit_sells() {
        let prices: Vec<Decimal> = (1..=6).rev().map(Decimal::from).collect();

        let mut sell = SignalGate::new(&config(2, 4, 2, dec!(-0.01)), OrderSide::Sell);
        feed(&mut sell, &prices);
        assert!(sell.admits());

        let mut strict = SignalGate::new(&config(2, 4, 2, dec!(-0.9)), OrderSide::Sell);
        feed(&mut strict, &prices);
        assert!(!strict.admits());
    }

    #[test]
    fn test_threshold_beyond_zero_is_clamped() {
        // falling asks: delta is negative but above a -0.5 buy threshold
        let mut buy = SignalGate::new(&config(1, 2, 0, dec!(-0.5)), OrderSide::Buy);
        feed(&mut buy, &[dec!(10), dec!(9)]);
        assert!(buy.snapshot().unwrap().delta.unwrap() > dec!(-0.5));
        assert!(!buy.admits());

        let mut sell = SignalGate::new(&config(1, 2, 0, dec!(0.5)), OrderSide::Sell);
        feed(&mut sell, &[dec!(9), dec!(10)]);
        assert!(!sell.admits());
    }

    #[test]
    fn test_buy_gate_reads_asks() {
        let mut gate = SignalGate::new(&config(1, 2, 0, dec!(0)), OrderSide::Buy);
        gate.push(&Ticker::new(dec!(10), dec!(10)));
        gate.push(&Ticker::new(dec!(5), dec!(12)));

        // asks went up even though bids fell
        assert!(gate.admits());
    }

    #[test]
    fn test_zero_short_average_has_no_delta() {
        let mut gate = SignalGate::new(&config(1, 2, 0, dec!(0)), OrderSide::Sell);
        gate.push(&Ticker::new(dec!(4), dec!(4)));
        gate.push(&Ticker::new(Decimal::ZERO, Decimal::ZERO));

        assert_eq!(gate.snapshot().unwrap().delta, None);
        assert!(!gate.admits());
    }
}
