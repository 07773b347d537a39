//! Control loop driving the depth ladder.
//!
//! Each tick:
//! 1. Fetch the ticker (a failure skips straight to leg progression)
//! 2. Feed the signal gate
//! 3. Decide admission: signal, ladder room, run budget
//! 4. Fill missing depth slots with new scalps
//! 5. Advance every scalp that was active when the tick started
//! 6. Progress all open legs once
//!
//! The loop ends once the run budget is spent and no scalp is left active.

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{Config, LadderConfig, ScalpConfig};
use crate::exchange::{
    side_for_source, ExchangeError, ExchangeGateway, LegExecutor, LegHandle, LegSnapshot,
    OrderSide, Ticker,
};
use crate::reporting::{Reporter, ScalpReport};

use super::{
    depth_entry_price, fee_adjusted_target, leg1_side, DepthLadder, Scalp, ScalpState,
    SignalGate, StrategyError,
};

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished,
}

/// All mutable loop state, owned by the orchestrator.
#[derive(Debug)]
pub struct OrchestratorContext {
    pub scalp_config: ScalpConfig,
    pub ladder_config: LadderConfig,
    pub tick_delay: Duration,
    /// Side of every first leg
    pub leg1_side: OrderSide,
    /// Fee-adjusted profit each scalp aims for
    pub profit_target: Decimal,
    pub ladder: DepthLadder,
    pub signal: SignalGate,
    /// Sum of realised results in start currency
    pub total_result: Decimal,
    /// Completed admission batches
    pub run: u32,
    pub ticks: u64,
    pub scalps_opened: u64,
    pub scalps_closed: u64,
    pub ticker_failures: u64,
    /// No new admissions; finish once the ladder is empty
    pub draining: bool,
}

impl OrchestratorContext {
    /// Build the context, rejecting a currency that is not part of the symbol.
    pub fn new(config: &Config) -> Result<Self, StrategyError> {
        let scalp = &config.scalp;
        let side = leg1_side(&scalp.symbol, &scalp.start_currency)?;
        if side_for_source(&scalp.symbol, &scalp.dest_currency).is_none() {
            return Err(StrategyError::UnknownDirection {
                symbol: scalp.symbol.clone(),
                currency: scalp.dest_currency.clone(),
            });
        }

        Ok(Self {
            scalp_config: scalp.clone(),
            ladder_config: config.ladder.clone(),
            tick_delay: Duration::from_millis(config.runtime.tick_delay_ms),
            leg1_side: side,
            profit_target: fee_adjusted_target(scalp.profit, scalp.commission),
            ladder: DepthLadder::new(config.ladder.max_depth as usize),
            signal: SignalGate::new(&config.signal, side),
            total_result: Decimal::ZERO,
            run: 0,
            ticks: 0,
            scalps_opened: 0,
            scalps_closed: 0,
            ticker_failures: 0,
            draining: false,
        })
    }

    pub fn run_budget_exhausted(&self) -> bool {
        self.run >= self.ladder_config.max_runs
    }

    pub fn is_finished(&self) -> bool {
        (self.run_budget_exhausted() || self.draining) && self.ladder.is_empty()
    }

    /// Count a completed leg 1, closing the run once the per-run cap is hit.
    fn record_leg1_completed(&mut self) {
        let completed = self.ladder.record_leg1_completed();
        if completed >= self.ladder_config.max_leg1_per_run {
            self.run += 1;
            self.ladder.reset_run();
            info!(
                run = self.run,
                max_runs = self.ladder_config.max_runs,
                "Run completed"
            );
        }
    }
}

/// Drives scalps through their lifecycle against a gateway and leg executor.
pub struct Orchestrator<G, L> {
    ctx: OrchestratorContext,
    gateway: G,
    executor: L,
    reporter: Reporter,
}

impl<G, L> Orchestrator<G, L>
where
    G: ExchangeGateway,
    L: LegExecutor,
{
    pub fn new(ctx: OrchestratorContext, gateway: G, executor: L, reporter: Reporter) -> Self {
        Self {
            ctx,
            gateway,
            executor,
            reporter,
        }
    }

    pub fn context(&self) -> &OrchestratorContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut OrchestratorContext {
        &mut self.ctx
    }

    pub fn executor(&self) -> &L {
        &self.executor
    }

    pub fn is_finished(&self) -> bool {
        self.ctx.is_finished()
    }

    /// Stop admitting scalps and wind down once the active ones have closed.
    pub fn start_draining(&mut self) {
        if !self.ctx.draining {
            info!(active = self.ctx.ladder.len(), "Draining: no new scalps will be admitted");
            self.ctx.draining = true;
        }
    }

    /// Run ticks until the loop finishes. Setting `shutdown` switches to
    /// draining mode rather than abandoning open legs.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<(), StrategyError> {
        info!(
            symbol = %self.ctx.scalp_config.symbol,
            side = %self.ctx.leg1_side,
            profit_target = %self.ctx.profit_target,
            max_depth = self.ctx.ladder_config.max_depth,
            max_runs = self.ctx.ladder_config.max_runs,
            "Starting scalp loop"
        );

        loop {
            if shutdown.load(Ordering::SeqCst) {
                self.start_draining();
            }

            if self.tick().await? == TickOutcome::Finished {
                break;
            }
            tokio::time::sleep(self.ctx.tick_delay).await;
        }

        self.log_in_flight().await;
        info!(
            ticks = self.ctx.ticks,
            runs = self.ctx.run,
            opened = self.ctx.scalps_opened,
            closed = self.ctx.scalps_closed,
            ticker_failures = self.ctx.ticker_failures,
            total_result = %self.ctx.total_result,
            "Scalp loop finished"
        );
        Ok(())
    }

    /// One pass of the control loop, without the inter-tick delay.
    pub async fn tick(&mut self) -> Result<TickOutcome, StrategyError> {
        self.ctx.ticks += 1;
        let symbol = self.ctx.scalp_config.symbol.clone();

        match self.gateway.get_ticker(&symbol).await {
            Ok(ticker) => {
                // Scalps admitted below wait for the next tick.
                let active = self.ctx.ladder.ids();

                self.ctx.signal.push(&ticker);
                if self.admission_open() {
                    self.admit(&ticker);
                }

                for id in active {
                    self.advance_scalp(&id).await?;
                }
            }
            Err(ExchangeError::FeedExhausted) => {
                self.start_draining();
                for id in self.ctx.ladder.ids() {
                    self.advance_scalp(&id).await?;
                }
            }
            Err(e) => {
                self.ctx.ticker_failures += 1;
                warn!(
                    %symbol,
                    error = %e,
                    transient = e.is_transient(),
                    failures = self.ctx.ticker_failures,
                    "Ticker fetch failed, skipping tick"
                );
            }
        }

        if let Err(e) = self.executor.progress_all_open_legs().await {
            warn!(error = %e, "Failed to progress open legs");
        }

        if self.ctx.is_finished() {
            Ok(TickOutcome::Finished)
        } else {
            Ok(TickOutcome::Continue)
        }
    }

    fn admission_open(&self) -> bool {
        !self.ctx.draining
            && !self.ctx.run_budget_exhausted()
            && self.ctx.ladder.has_room()
            && self.ctx.signal.admits()
    }

    /// Create one scalp per missing depth slot.
    fn admit(&mut self, ticker: &Ticker) {
        let ctx = &mut self.ctx;
        let depths = ctx
            .ladder
            .missed_scalps_depth(ScalpState::Order1, ctx.ladder_config.max_depth);
        let snapshot = ctx.signal.snapshot();

        for depth in depths {
            let price = depth_entry_price(
                ctx.leg1_side,
                ticker,
                depth,
                ctx.ladder_config.depth_step,
                ctx.profit_target,
            );
            let mut scalp = Scalp::from_config(&ctx.scalp_config, depth, price, ctx.profit_target);

            if let Some(snapshot) = snapshot {
                scalp.supplementary.insert("ma-short".to_string(), snapshot.short);
                scalp.supplementary.insert("ma-long".to_string(), snapshot.long);
                if let Some(delta) = snapshot.delta {
                    scalp.supplementary.insert("ma-delta".to_string(), delta);
                }
                if let Some(delta) = snapshot.delta_lookback {
                    scalp.supplementary.insert("ma-delta-lookback".to_string(), delta);
                }
            }

            let id = scalp.id.clone();
            if let Err(e) = ctx.ladder.add_scalp(scalp) {
                warn!(error = %e, depth, "Could not admit scalp");
                break;
            }
            ctx.scalps_opened += 1;
            info!(scalp_id = %id, depth, %price, active = ctx.ladder.len(), "Scalp admitted");
        }
    }

    async fn leg_snapshot(&self, handle: Option<LegHandle>) -> Option<LegSnapshot> {
        let handle = handle?;
        match self.executor.leg(handle).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(leg = %handle, error = %e, "Failed to read leg");
                None
            }
        }
    }

    /// Apply one state transition to a scalp and fire the action for the
    /// state it ends up in.
    async fn advance_scalp(&mut self, id: &str) -> Result<(), StrategyError> {
        let Some((h1, h2)) = self.ctx.ladder.get(id).map(|s| (s.leg1, s.leg2)) else {
            return Ok(());
        };
        let leg1 = self.leg_snapshot(h1).await;
        let leg2 = self.leg_snapshot(h2).await;

        let Some(scalp) = self.ctx.ladder.get_mut(id) else {
            return Ok(());
        };
        let transition = scalp.update_state(leg1.as_ref(), leg2.as_ref());
        if let Some(state) = transition {
            debug!(scalp_id = %id, %state, depth = scalp.depth, "Scalp state changed");
        }

        match scalp.state() {
            ScalpState::New => {
                if scalp.leg1.is_none() {
                    absorb_leg_error(scalp.create_leg1(&self.executor).await, id)?;
                }
            }
            ScalpState::Order1 | ScalpState::Order2 => {
                let leg = if scalp.state() == ScalpState::Order1 { &leg1 } else { &leg2 };
                if let Some(leg) = leg {
                    debug!(
                        scalp_id = %id,
                        leg = %leg.handle,
                        stage = %leg.stage,
                        filled = %leg.filled,
                        updates = leg.update_requests_count,
                        "Leg in progress"
                    );
                }
            }
            ScalpState::Order1Complete => {
                if transition == Some(ScalpState::Order1Complete) {
                    self.ctx.record_leg1_completed();
                }
                let (Some(scalp), Some(leg1)) = (self.ctx.ladder.get_mut(id), leg1.as_ref()) else {
                    return Ok(());
                };
                if scalp.leg2.is_none() {
                    absorb_leg_error(scalp.create_leg2(&self.executor, leg1).await, id)?;
                }
            }
            ScalpState::Closed => self.finalize(id, leg1.as_ref(), leg2.as_ref()).await,
        }
        Ok(())
    }

    /// Report a closed scalp, book its result and drop it from the ladder.
    async fn finalize(&mut self, id: &str, leg1: Option<&LegSnapshot>, leg2: Option<&LegSnapshot>) {
        let Some(scalp) = self.ctx.ladder.get(id) else {
            return;
        };
        let report = ScalpReport::from_scalp(scalp, leg1, leg2);
        self.reporter.publish(&report).await;

        self.ctx.total_result += report.result_fact_diff.unwrap_or(Decimal::ZERO);
        self.ctx.scalps_closed += 1;
        self.ctx.ladder.remove_scalp(id);

        info!(
            total_result = %self.ctx.total_result,
            closed = self.ctx.scalps_closed,
            active = self.ctx.ladder.len(),
            "Result booked"
        );
    }

    /// Log the last known status of legs still owned by active scalps.
    async fn log_in_flight(&self) {
        let open = self.executor.open_leg_count().await;
        if self.ctx.ladder.is_empty() && open == 0 {
            return;
        }

        warn!(active = self.ctx.ladder.len(), open_legs = open, "Stopping with legs in flight");
        for scalp in self.ctx.ladder.iter() {
            for handle in [scalp.leg1, scalp.leg2].into_iter().flatten() {
                if let Some(leg) = self.leg_snapshot(Some(handle)).await {
                    warn!(
                        scalp_id = %scalp.id,
                        state = %scalp.state(),
                        leg = %handle,
                        status = %leg.status,
                        stage = %leg.stage,
                        filled = %leg.filled,
                        last_order = ?leg.last_order_id,
                        "In-flight leg"
                    );
                }
            }
        }
    }
}

/// Exchange failures while creating a leg are retried on the next tick;
/// anything else is a configuration problem and stops the loop.
fn absorb_leg_error(result: Result<LegHandle, StrategyError>, id: &str) -> Result<(), StrategyError> {
    match result {
        Ok(_) => Ok(()),
        Err(StrategyError::Exchange(e)) => {
            warn!(scalp_id = %id, error = %e, "Leg creation failed, retrying next tick");
            Ok(())
        }
        Err(e) => {
            error!(scalp_id = %id, error = %e, "Leg creation failed");
            Err(e)
        }
    }
}
