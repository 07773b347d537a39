//! Fixed report row emitted for every closed scalp.

use crate::exchange::LegSnapshot;
use crate::strategy::Scalp;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// Column order of the CSV report.
pub const REPORT_FIELDS: [&str; 19] = [
    "scalp-id",
    "state",
    "result-fact-diff",
    "start-qty",
    "cur1",
    "cur2",
    "symbol",
    "depth",
    "leg1-order-state",
    "leg1-order-status",
    "leg1-order-updates",
    "leg1-filled",
    "leg2-order-state",
    "leg2-order-status",
    "leg2-filled",
    "leg2-order-updates",
    "cur1-diff",
    "cur2-diff",
    "closed-at",
];

/// Terminal report of one scalp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScalpReport {
    pub scalp_id: String,
    pub state: String,
    pub result_fact_diff: Option<Decimal>,
    pub start_qty: Decimal,
    pub cur1: String,
    pub cur2: String,
    pub symbol: String,
    pub depth: u32,
    pub leg1_order_state: Option<String>,
    pub leg1_order_status: Option<String>,
    pub leg1_order_updates: Option<u32>,
    /// Fill ratio of leg 1
    pub leg1_filled: Option<Decimal>,
    pub leg2_order_state: Option<String>,
    pub leg2_order_status: Option<String>,
    /// Fill ratio of leg 2
    pub leg2_filled: Option<Decimal>,
    pub leg2_order_updates: Option<u32>,
    pub cur1_diff: Decimal,
    pub cur2_diff: Decimal,
    pub closed_at: DateTime<Utc>,
    /// Extra stats; forwarded remotely but not part of the CSV schema
    pub supplementary: HashMap<String, Decimal>,
}

impl ScalpReport {
    /// Build a report from a scalp and the last snapshots of its legs.
    pub fn from_scalp(
        scalp: &Scalp,
        leg1: Option<&LegSnapshot>,
        leg2: Option<&LegSnapshot>,
    ) -> Self {
        Self {
            scalp_id: scalp.id.clone(),
            state: scalp.state().to_string(),
            result_fact_diff: scalp.result(),
            start_qty: scalp.start_amount,
            cur1: scalp.start_currency.clone(),
            cur2: scalp.dest_currency.clone(),
            symbol: scalp.symbol.clone(),
            depth: scalp.depth,
            leg1_order_state: leg1.map(|l| l.stage.to_string()),
            leg1_order_status: leg1.map(|l| l.status.to_string()),
            leg1_order_updates: leg1.map(|l| l.update_requests_count),
            leg1_filled: leg1.and_then(LegSnapshot::fill_ratio),
            leg2_order_state: leg2.map(|l| l.stage.to_string()),
            leg2_order_status: leg2.map(|l| l.status.to_string()),
            leg2_filled: leg2.and_then(LegSnapshot::fill_ratio),
            leg2_order_updates: leg2.map(|l| l.update_requests_count),
            cur1_diff: scalp.cur1_diff,
            cur2_diff: scalp.cur2_diff,
            closed_at: Utc::now(),
            supplementary: scalp.supplementary.clone(),
        }
    }

    /// CSV header line.
    pub fn csv_header() -> String {
        REPORT_FIELDS.join(",")
    }

    /// CSV row in `REPORT_FIELDS` order. Missing values are empty cells.
    pub fn to_csv_row(&self) -> String {
        fn opt<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        [
            self.scalp_id.clone(),
            self.state.clone(),
            opt(&self.result_fact_diff),
            self.start_qty.to_string(),
            self.cur1.clone(),
            self.cur2.clone(),
            self.symbol.clone(),
            self.depth.to_string(),
            opt(&self.leg1_order_state),
            opt(&self.leg1_order_status),
            opt(&self.leg1_order_updates),
            opt(&self.leg1_filled),
            opt(&self.leg2_order_state),
            opt(&self.leg2_order_status),
            opt(&self.leg2_filled),
            opt(&self.leg2_order_updates),
            self.cur1_diff.to_string(),
            self.cur2_diff.to_string(),
            self.closed_at.to_rfc3339(),
        ]
        .join(",")
    }

    /// Whether the scalp made money.
    pub fn is_win(&self) -> bool {
        self.result_fact_diff.is_some_and(|r| r > Decimal::ZERO)
    }
}
