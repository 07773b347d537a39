//! A single two-leg scalp and its lifecycle.
//!
//! ```text
//! new -> order1 -> order1_complete -> order2 -> closed
//!          \___________________________________/
//!                  (leg 1 closed unfilled)
//! ```

use super::profit::{leg2_price, leg2_target_amount};
use super::StrategyError;
use crate::config::ScalpConfig;
use crate::exchange::{
    side_for_source, LegExecutor, LegHandle, LegPolicy, LegRequest, LegSnapshot, LegStatus,
    OrderSide,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Lifecycle state of a scalp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalpState {
    New,
    Order1,
    Order1Complete,
    Order2,
    Closed,
}

impl fmt::Display for ScalpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalpState::New => "new",
            ScalpState::Order1 => "order1",
            ScalpState::Order1Complete => "order1_complete",
            ScalpState::Order2 => "order2",
            ScalpState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Side of the first leg for `start_currency` on `symbol`.
pub fn leg1_side(symbol: &str, start_currency: &str) -> Result<OrderSide, StrategyError> {
    side_for_source(symbol, start_currency).ok_or_else(|| StrategyError::UnknownDirection {
        symbol: symbol.to_string(),
        currency: start_currency.to_string(),
    })
}

/// One attempted round trip: start -> dest (leg 1), dest -> start (leg 2).
#[derive(Debug, Clone)]
pub struct Scalp {
    pub id: String,
    pub symbol: String,
    pub start_currency: String,
    pub dest_currency: String,
    pub start_amount: Decimal,
    pub start_price: Decimal,
    /// Ladder slot; fixed for the life of the scalp
    pub depth: u32,
    /// Fee-adjusted profit target for leg 2
    pub profit: Decimal,
    pub commission: Decimal,
    pub leg1_policy: LegPolicy,
    pub leg2_policy: LegPolicy,
    pub leg1: Option<LegHandle>,
    pub leg2: Option<LegHandle>,
    state: ScalpState,
    result: Option<Decimal>,
    /// Net start-currency flow
    pub cur1_diff: Decimal,
    /// Net destination-currency flow
    pub cur2_diff: Decimal,
    /// Free-form stats carried into reports
    pub supplementary: HashMap<String, Decimal>,
}

impl Scalp {
    /// Create a scalp with default commission and leg policies.
    pub fn new(
        symbol: &str,
        start_currency: &str,
        start_amount: Decimal,
        depth: u32,
        start_price: Decimal,
        dest_currency: &str,
        profit: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            start_currency: start_currency.to_string(),
            dest_currency: dest_currency.to_string(),
            start_amount,
            start_price,
            depth,
            profit,
            commission: dec!(0.0007),
            leg1_policy: LegPolicy::FillOrKill {
                max_updates: 10,
                cancel_threshold: dec!(0.01),
            },
            leg2_policy: LegPolicy::Recovery {
                max_updates_for_profit: 10,
                max_updates_market: 5,
                cancel_threshold: dec!(0.01),
            },
            leg1: None,
            leg2: None,
            state: ScalpState::New,
            result: None,
            cur1_diff: Decimal::ZERO,
            cur2_diff: Decimal::ZERO,
            supplementary: HashMap::new(),
        }
    }

    /// Create a scalp with commission and leg policies taken from configuration.
    pub fn from_config(
        config: &ScalpConfig,
        depth: u32,
        start_price: Decimal,
        profit: Decimal,
    ) -> Self {
        let mut scalp = Self::new(
            &config.symbol,
            &config.start_currency,
            config.start_amount,
            depth,
            start_price,
            &config.dest_currency,
            profit,
        );
        scalp.commission = config.commission;
        scalp.leg1_policy = LegPolicy::FillOrKill {
            max_updates: config.order1_max_updates,
            cancel_threshold: config.cancel_threshold,
        };
        scalp.leg2_policy = LegPolicy::Recovery {
            max_updates_for_profit: config.order2_max_updates_for_profit,
            max_updates_market: config.order2_max_updates_market,
            cancel_threshold: config.cancel_threshold,
        };
        scalp
    }

    pub fn state(&self) -> ScalpState {
        self.state
    }

    /// Realised result in start currency; set once the scalp is closed.
    pub fn result(&self) -> Option<Decimal> {
        self.result
    }

    pub fn is_closed(&self) -> bool {
        self.state == ScalpState::Closed
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: ScalpState) {
        self.state = state;
    }

    /// Apply at most one transition from the current leg snapshots.
    ///
    /// Returns the new state if a transition fired. Re-evaluating with
    /// unchanged legs is a no-op.
    pub fn update_state(
        &mut self,
        leg1: Option<&LegSnapshot>,
        leg2: Option<&LegSnapshot>,
    ) -> Option<ScalpState> {
        let leg1_status = leg1.map(|l| l.status);
        let leg2_status = leg2.map(|l| l.status);

        let next = match (self.state, leg1_status, leg2_status) {
            (ScalpState::New, Some(LegStatus::Open), _) => ScalpState::Order1,
            (ScalpState::Order1, Some(LegStatus::Closed), _) => {
                let leg1 = leg1?;
                if leg1.filled > Decimal::ZERO {
                    self.cur1_diff = -leg1.filled_start_amount;
                    self.cur2_diff = leg1.filled_dest_amount;
                    ScalpState::Order1Complete
                } else {
                    self.result = Some(Decimal::ZERO);
                    ScalpState::Closed
                }
            }
            (ScalpState::Order1Complete, _, Some(LegStatus::Open)) => ScalpState::Order2,
            (ScalpState::Order2, _, Some(LegStatus::Closed)) => {
                let (leg1, leg2) = (leg1?, leg2?);
                self.result = Some(leg2.filled_dest_amount - leg1.filled_start_amount);
                self.cur1_diff += leg2.filled_dest_amount;
                self.cur2_diff -= leg2.filled_start_amount;
                ScalpState::Closed
            }
            _ => return None,
        };

        self.state = next;
        Some(next)
    }

    /// Leg 1 request: spend `start_amount` at `start_price`, fill-or-kill.
    pub fn leg1_request(&self) -> LegRequest {
        LegRequest {
            symbol: self.symbol.clone(),
            source_currency: self.start_currency.clone(),
            source_amount: self.start_amount,
            dest_currency: self.dest_currency.clone(),
            price: self.start_price,
            policy: self.leg1_policy,
        }
    }

    /// Leg 2 request: bring back leg 1's spent amount plus `profit`.
    pub fn leg2_request(&self, leg1: &LegSnapshot) -> Result<LegRequest, StrategyError> {
        if leg1.filled <= Decimal::ZERO {
            return Err(StrategyError::Leg1NotFilled(self.id.clone()));
        }

        let side = side_for_source(&self.symbol, &self.dest_currency).ok_or_else(|| {
            StrategyError::UnknownDirection {
                symbol: self.symbol.clone(),
                currency: self.dest_currency.clone(),
            }
        })?;
        let target = leg2_target_amount(leg1.filled_start_amount, self.profit);
        let price = leg2_price(side, leg1.filled_dest_amount, target)
            .ok_or_else(|| StrategyError::Leg1NotFilled(self.id.clone()))?;

        Ok(LegRequest {
            symbol: self.symbol.clone(),
            source_currency: self.dest_currency.clone(),
            source_amount: leg1.filled_dest_amount,
            dest_currency: self.start_currency.clone(),
            price,
            policy: self.leg2_policy,
        })
    }

    /// Submit leg 1 and move to `order1`.
    pub async fn create_leg1<L>(&mut self, executor: &L) -> Result<LegHandle, StrategyError>
    where
        L: LegExecutor + ?Sized,
    {
        let request = self.leg1_request();
        let handle = executor.create_leg(request).await?;

        self.leg1 = Some(handle);
        self.state = ScalpState::Order1;
        info!(
            scalp_id = %self.id,
            depth = self.depth,
            leg = %handle,
            price = %self.start_price,
            "Leg 1 created"
        );
        Ok(handle)
    }

    /// Submit leg 2 against a filled leg 1 and move to `order2`.
    pub async fn create_leg2<L>(
        &mut self,
        executor: &L,
        leg1: &LegSnapshot,
    ) -> Result<LegHandle, StrategyError>
    where
        L: LegExecutor + ?Sized,
    {
        let request = self.leg2_request(leg1)?;
        let price = request.price;
        let handle = executor.create_leg(request).await?;

        self.leg2 = Some(handle);
        self.state = ScalpState::Order2;
        info!(
            scalp_id = %self.id,
            depth = self.depth,
            leg = %handle,
            %price,
            "Leg 2 created"
        );
        Ok(handle)
    }
}
