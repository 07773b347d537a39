//! Paper execution for dry runs and tests.
//!
//! `PaperGateway` wraps a real ticker source and mirrors every ticker it
//! returns into a shared `PaperBook`; `MockLegExecutor` fills legs against
//! that book.

use super::traits::{ExchangeError, ExchangeGateway, LegExecutor};
use super::types::*;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Last known ticker per symbol.
#[derive(Debug, Default)]
pub struct PaperBook {
    tickers: RwLock<HashMap<String, Ticker>>,
}

impl PaperBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, symbol: &str, ticker: Ticker) {
        self.tickers.write().await.insert(symbol.to_string(), ticker);
    }

    pub async fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.tickers.read().await.get(symbol).copied()
    }
}

/// Ticker source that records what it serves into a `PaperBook`.
pub struct PaperGateway<G> {
    inner: G,
    book: Arc<PaperBook>,
}

impl<G: ExchangeGateway> PaperGateway<G> {
    pub fn new(inner: G, book: Arc<PaperBook>) -> Self {
        Self { inner, book }
    }
}

#[async_trait]
impl<G: ExchangeGateway> ExchangeGateway for PaperGateway<G> {
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let ticker = self.inner.get_ticker(symbol).await?;
        self.book.update(symbol, ticker).await;
        Ok(ticker)
    }
}

/// Simulated leg.
#[derive(Debug, Clone)]
struct PaperLeg {
    request: LegRequest,
    side: OrderSide,
    stage: LegStage,
    status: LegStatus,
    price: Decimal,
    amount: Decimal,
    filled: Decimal,
    filled_start_amount: Decimal,
    filled_dest_amount: Decimal,
    /// Updates issued over the life of the leg
    update_requests_count: u32,
    /// Updates issued in the current stage
    stage_updates: u32,
    sub_orders: u32,
}

impl PaperLeg {
    fn remaining_source(&self) -> Decimal {
        (self.request.source_amount - self.filled_start_amount).max(Decimal::ZERO)
    }

    /// Unfilled remainder in base currency at `price`.
    fn remaining_base(&self, price: Decimal) -> Decimal {
        match self.side {
            OrderSide::Buy if price > Decimal::ZERO => self.remaining_source() / price,
            OrderSide::Buy => Decimal::ZERO,
            OrderSide::Sell => self.remaining_source(),
        }
    }

    fn is_marketable(&self, ticker: &Ticker) -> bool {
        match self.side {
            OrderSide::Buy => ticker.ask <= self.price,
            OrderSide::Sell => ticker.bid >= self.price,
        }
    }

    fn best_price(&self, ticker: &Ticker) -> Decimal {
        match self.side {
            OrderSide::Buy => ticker.ask,
            OrderSide::Sell => ticker.bid,
        }
    }

    /// Fill the whole remainder at the leg price, net of `fee_rate`.
    fn fill_remaining(&mut self, fee_rate: Decimal) {
        let base = self.remaining_base(self.price);
        let source = self.remaining_source();
        let gross_dest = match self.side {
            OrderSide::Buy => base,
            OrderSide::Sell => base * self.price,
        };

        self.filled += base;
        self.filled_start_amount += source;
        self.filled_dest_amount += gross_dest * (Decimal::ONE - fee_rate);
        self.stage = LegStage::Filled;
        self.status = LegStatus::Closed;
    }

    fn close(&mut self, stage: LegStage) {
        self.stage = stage;
        self.status = LegStatus::Closed;
    }

    fn requote(&mut self, price: Decimal) {
        self.price = price;
        self.sub_orders += 1;
    }

    fn enter_stage(&mut self, stage: LegStage) {
        self.stage = stage;
        self.stage_updates = 0;
    }

    fn snapshot(&self, handle: LegHandle) -> LegSnapshot {
        LegSnapshot {
            handle,
            symbol: self.request.symbol.clone(),
            side: self.side,
            source_currency: self.request.source_currency.clone(),
            dest_currency: self.request.dest_currency.clone(),
            status: self.status,
            stage: self.stage,
            price: self.price,
            amount: self.amount,
            filled: self.filled,
            filled_start_amount: self.filled_start_amount,
            filled_dest_amount: self.filled_dest_amount,
            update_requests_count: self.update_requests_count,
            max_update_attempts: self.request.policy.max_update_attempts(),
            last_order_id: Some(format!("paper-{}-{}", handle.0, self.sub_orders)),
        }
    }
}

/// Leg executor that simulates fills against a `PaperBook`.
pub struct MockLegExecutor {
    book: Arc<PaperBook>,
    legs: RwLock<BTreeMap<LegHandle, PaperLeg>>,
    leg_id_counter: AtomicU64,
    /// Commission charged on the received amount
    fee_rate: Decimal,
}

impl MockLegExecutor {
    pub fn new(book: Arc<PaperBook>, fee_rate: Decimal) -> Self {
        Self {
            book,
            legs: RwLock::new(BTreeMap::new()),
            leg_id_counter: AtomicU64::new(1),
            fee_rate,
        }
    }

    /// Default paper taker fee (0.075%).
    pub fn with_default_fee(book: Arc<PaperBook>) -> Self {
        Self::new(book, dec!(0.00075))
    }

    fn next_leg_id(&self) -> LegHandle {
        LegHandle(self.leg_id_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Advance one leg against the current ticker.
    fn progress_leg(&self, handle: LegHandle, leg: &mut PaperLeg, ticker: &Ticker) {
        if leg.is_marketable(ticker) {
            leg.fill_remaining(self.fee_rate);
            debug!(
                leg = %handle,
                filled = %leg.filled,
                dest = %leg.filled_dest_amount,
                "Paper leg filled"
            );
            return;
        }

        leg.update_requests_count += 1;
        leg.stage_updates += 1;
        let threshold = leg.request.policy.cancel_threshold();
        let remaining = leg.remaining_base(leg.price);

        match (leg.request.policy, leg.stage) {
            (LegPolicy::FillOrKill { max_updates, .. }, _) => {
                if leg.stage_updates < max_updates {
                    return;
                }
                // An immaterial remainder is held open rather than cancelled.
                if remaining > threshold {
                    leg.close(LegStage::Cancelled);
                    info!(leg = %handle, %remaining, "Paper leg cancelled");
                } else {
                    debug!(leg = %handle, %remaining, "Paper leg held below cancel threshold");
                }
            }
            (
                LegPolicy::Recovery {
                    max_updates_for_profit,
                    ..
                },
                LegStage::ForProfit,
            ) => {
                if leg.stage_updates >= max_updates_for_profit {
                    leg.enter_stage(LegStage::Market);
                    leg.requote(leg.best_price(ticker));
                    info!(leg = %handle, price = %leg.price, "Paper leg falling back to market");
                }
            }
            (
                LegPolicy::Recovery {
                    max_updates_market, ..
                },
                _,
            ) => {
                if leg.stage_updates >= max_updates_market && remaining > threshold {
                    leg.close(LegStage::Cancelled);
                    info!(leg = %handle, %remaining, "Paper leg cancelled at market stage");
                } else {
                    leg.requote(leg.best_price(ticker));
                }
            }
        }
    }
}

#[async_trait]
impl LegExecutor for MockLegExecutor {
    async fn create_leg(&self, request: LegRequest) -> Result<LegHandle, ExchangeError> {
        let side = side_for_source(&request.symbol, &request.source_currency).ok_or_else(|| {
            ExchangeError::UnknownMarket {
                symbol: request.symbol.clone(),
                currency: request.source_currency.clone(),
            }
        })?;

        let amount = match side {
            OrderSide::Buy => crate::utils::checked_div(request.source_amount, request.price)
                .unwrap_or(Decimal::ZERO),
            OrderSide::Sell => request.source_amount,
        };
        let stage = match request.policy {
            LegPolicy::FillOrKill { .. } => LegStage::FillOrKill,
            LegPolicy::Recovery { .. } => LegStage::ForProfit,
        };

        let handle = self.next_leg_id();
        let leg = PaperLeg {
            price: request.price,
            request,
            side,
            stage,
            status: LegStatus::Open,
            amount,
            filled: Decimal::ZERO,
            filled_start_amount: Decimal::ZERO,
            filled_dest_amount: Decimal::ZERO,
            update_requests_count: 0,
            stage_updates: 0,
            sub_orders: 1,
        };

        info!(
            leg = %handle,
            symbol = %leg.request.symbol,
            %side,
            price = %leg.price,
            %amount,
            "Paper leg created"
        );

        self.legs.write().await.insert(handle, leg);
        Ok(handle)
    }

    async fn leg(&self, handle: LegHandle) -> Result<LegSnapshot, ExchangeError> {
        self.legs
            .read()
            .await
            .get(&handle)
            .map(|leg| leg.snapshot(handle))
            .ok_or(ExchangeError::UnknownLeg(handle))
    }

    async fn progress_all_open_legs(&self) -> Result<(), ExchangeError> {
        let mut legs = self.legs.write().await;

        for (handle, leg) in legs.iter_mut() {
            if leg.status != LegStatus::Open {
                continue;
            }
            // No price yet for this symbol: leave the leg untouched.
            let Some(ticker) = self.book.ticker(&leg.request.symbol).await else {
                continue;
            };
            self.progress_leg(*handle, leg, &ticker);
        }

        Ok(())
    }

    async fn open_leg_count(&self) -> usize {
        self.legs
            .read()
            .await
            .values()
            .filter(|leg| leg.status == LegStatus::Open)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOL: &str = "ETH/BTC";

    fn buy_request(price: Decimal, policy: LegPolicy) -> LegRequest {
        LegRequest {
            symbol: SYMBOL.to_string(),
            source_currency: "BTC".to_string(),
            source_amount: dec!(0.01),
            dest_currency: "ETH".to_string(),
            price,
            policy,
        }
    }

    fn fok(max_updates: u32) -> LegPolicy {
        LegPolicy::FillOrKill {
            max_updates,
            cancel_threshold: dec!(0.01),
        }
    }

    async fn setup(ticker: Ticker) -> (Arc<PaperBook>, MockLegExecutor) {
        let book = Arc::new(PaperBook::new());
        book.update(SYMBOL, ticker).await;
        let executor = MockLegExecutor::new(book.clone(), dec!(0.001));
        (book, executor)
    }

    #[tokio::test]
    async fn test_buy_leg_fills_when_marketable() {
        let (_book, executor) = setup(Ticker::new(dec!(0.049), dec!(0.05))).await;
        let handle = executor
            .create_leg(buy_request(dec!(0.05), fok(3)))
            .await
            .unwrap();

        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Open);
        assert_eq!(leg.side, OrderSide::Buy);
        assert_eq!(leg.amount, dec!(0.2));
        assert_eq!(executor.open_leg_count().await, 1);

        executor.progress_all_open_legs().await.unwrap();

        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Closed);
        assert_eq!(leg.stage, LegStage::Filled);
        assert_eq!(leg.filled, dec!(0.2));
        assert_eq!(leg.filled_start_amount, dec!(0.01));
        assert_eq!(leg.filled_dest_amount, dec!(0.1998));
        assert_eq!(leg.fill_ratio(), Some(Decimal::ONE));
        assert_eq!(executor.open_leg_count().await, 0);
    }

    #[tokio::test]
    async fn test_fill_or_kill_cancels_after_budget() {
        let (_book, executor) = setup(Ticker::new(dec!(0.051), dec!(0.052))).await;
        let handle = executor
            .create_leg(buy_request(dec!(0.05), fok(2)))
            .await
            .unwrap();

        executor.progress_all_open_legs().await.unwrap();
        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Open);
        assert_eq!(leg.update_requests_count, 1);

        executor.progress_all_open_legs().await.unwrap();
        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Closed);
        assert_eq!(leg.stage, LegStage::Cancelled);
        assert_eq!(leg.filled, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_recovery_leg_falls_back_to_market() {
        let (book, executor) = setup(Ticker::new(dec!(0.05), dec!(0.0501))).await;
        let request = LegRequest {
            symbol: SYMBOL.to_string(),
            source_currency: "ETH".to_string(),
            source_amount: dec!(0.2),
            dest_currency: "BTC".to_string(),
            price: dec!(0.06),
            policy: LegPolicy::Recovery {
                max_updates_for_profit: 1,
                max_updates_market: 5,
                cancel_threshold: dec!(0.01),
            },
        };
        let handle = executor.create_leg(request).await.unwrap();

        executor.progress_all_open_legs().await.unwrap();
        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.stage, LegStage::Market);
        assert_eq!(leg.price, dec!(0.05));
        assert_eq!(leg.last_order_id.as_deref(), Some("paper-1-2"));

        book.update(SYMBOL, Ticker::new(dec!(0.05), dec!(0.0501))).await;
        executor.progress_all_open_legs().await.unwrap();
        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Closed);
        assert_eq!(leg.filled_start_amount, dec!(0.2));
        assert_eq!(leg.filled_dest_amount, dec!(0.00999));
    }

    #[tokio::test]
    async fn test_fill_or_kill_holds_immaterial_remainder() {
        let (book, executor) = setup(Ticker::new(dec!(0.051), dec!(0.052))).await;
        let mut request = buy_request(dec!(0.05), fok(1));
        // 0.002 ETH, below the 0.01 cancel threshold
        request.source_amount = dec!(0.0001);
        let handle = executor.create_leg(request).await.unwrap();

        for _ in 0..3 {
            executor.progress_all_open_legs().await.unwrap();
        }
        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Open);
        assert_eq!(leg.stage, LegStage::FillOrKill);
        assert_eq!(leg.filled, Decimal::ZERO);
        assert_eq!(leg.update_requests_count, 3);

        book.update(SYMBOL, Ticker::new(dec!(0.049), dec!(0.05))).await;
        executor.progress_all_open_legs().await.unwrap();
        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Closed);
        assert_eq!(leg.stage, LegStage::Filled);
        assert_eq!(leg.filled, dec!(0.002));
    }

    #[tokio::test]
    async fn test_market_stage_budget_runs_out_in_falling_market() {
        let (book, executor) = setup(Ticker::new(dec!(0.05), dec!(0.0501))).await;
        let request = LegRequest {
            symbol: SYMBOL.to_string(),
            source_currency: "ETH".to_string(),
            source_amount: dec!(0.2),
            dest_currency: "BTC".to_string(),
            price: dec!(0.06),
            policy: LegPolicy::Recovery {
                max_updates_for_profit: 1,
                max_updates_market: 3,
                cancel_threshold: dec!(0.01),
            },
        };
        let handle = executor.create_leg(request).await.unwrap();

        for step in 0..50u32 {
            let bid = dec!(0.05) - dec!(0.0001) * Decimal::from(step);
            book.update(SYMBOL, Ticker::new(bid, bid + dec!(0.0001))).await;
            executor.progress_all_open_legs().await.unwrap();
        }

        let leg = executor.leg(handle).await.unwrap();
        assert_eq!(leg.status, LegStatus::Closed);
        assert_eq!(leg.stage, LegStage::Cancelled);
        assert_eq!(leg.filled, Decimal::ZERO);
        // one for-profit update, then three at market
        assert_eq!(leg.update_requests_count, 4);
        assert_eq!(leg.update_requests_count, leg.max_update_attempts);
        assert_eq!(leg.last_order_id.as_deref(), Some("paper-1-4"));
    }

    #[tokio::test]
    async fn test_unknown_market_rejected() {
        let (_book, executor) = setup(Ticker::new(dec!(1), dec!(1))).await;
        let mut request = buy_request(dec!(0.05), fok(1));
        request.source_currency = "USDT".to_string();

        let err = executor.create_leg(request).await.unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownMarket { .. }));
    }

    #[tokio::test]
    async fn test_paper_gateway_records_ticker() {
        struct Fixed;

        #[async_trait]
        impl ExchangeGateway for Fixed {
            async fn get_ticker(&self, _symbol: &str) -> Result<Ticker, ExchangeError> {
                Ok(Ticker::new(dec!(10), dec!(11)))
            }
        }

        let book = Arc::new(PaperBook::new());
        let gateway = PaperGateway::new(Fixed, book.clone());
        gateway.get_ticker(SYMBOL).await.unwrap();

        assert_eq!(book.ticker(SYMBOL).await, Some(Ticker::new(dec!(10), dec!(11))));
    }
}
