//! SQLite history of closed scalps.
//!
//! Every closed scalp is stored as one row in `scalp_reports`, which backs
//! the `status` command:
//! - Number of scalps and how many made money
//! - Cumulative realised result
//! - The most recent reports

use crate::reporting::{ReportSink, ScalpReport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Stored summary of one closed scalp.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredScalp {
    pub scalp_id: String,
    pub symbol: String,
    pub depth: u32,
    pub result: Option<Decimal>,
    pub leg1_status: Option<String>,
    pub leg2_status: Option<String>,
    pub closed_at: DateTime<Utc>,
}

/// Aggregate view over all stored scalps.
#[derive(Debug, Clone, Default)]
pub struct ReportSummary {
    pub scalps: u64,
    pub wins: u64,
    /// Scalps closed without filling leg 1
    pub unfilled: u64,
    pub total_result: Decimal,
    pub recent: Vec<StoredScalp>,
}

impl ReportSummary {
    pub fn win_rate(&self) -> Option<Decimal> {
        crate::utils::checked_div(Decimal::from(self.wins), Decimal::from(self.scalps))
    }
}

/// SQLite-backed report store.
pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    /// Open (or create) the database and its schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Report store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Report store lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS scalp_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scalp_id TEXT NOT NULL UNIQUE,
                state TEXT NOT NULL,
                result TEXT,
                start_qty TEXT NOT NULL,
                cur1 TEXT NOT NULL,
                cur2 TEXT NOT NULL,
                symbol TEXT NOT NULL,
                depth INTEGER NOT NULL,
                leg1_state TEXT,
                leg1_status TEXT,
                leg1_updates INTEGER,
                leg1_filled TEXT,
                leg2_state TEXT,
                leg2_status TEXT,
                leg2_filled TEXT,
                leg2_updates INTEGER,
                cur1_diff TEXT NOT NULL,
                cur2_diff TEXT NOT NULL,
                closed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reports_closed_at ON scalp_reports(closed_at);
            "#,
        )?;
        Ok(())
    }

    /// Insert one report. Decimals are stored as text to keep precision.
    pub fn insert(&self, report: &ScalpReport) -> Result<()> {
        fn text(value: &Option<Decimal>) -> Option<String> {
            value.map(|v| v.to_string())
        }

        self.conn()?.execute(
            r#"
            INSERT INTO scalp_reports (
                scalp_id, state, result, start_qty, cur1, cur2, symbol, depth,
                leg1_state, leg1_status, leg1_updates, leg1_filled,
                leg2_state, leg2_status, leg2_filled, leg2_updates,
                cur1_diff, cur2_diff, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                report.scalp_id,
                report.state,
                text(&report.result_fact_diff),
                report.start_qty.to_string(),
                report.cur1,
                report.cur2,
                report.symbol,
                report.depth,
                report.leg1_order_state,
                report.leg1_order_status,
                report.leg1_order_updates,
                text(&report.leg1_filled),
                report.leg2_order_state,
                report.leg2_order_status,
                text(&report.leg2_filled),
                report.leg2_order_updates,
                report.cur1_diff.to_string(),
                report.cur2_diff.to_string(),
                report.closed_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to store report for scalp {}", report.scalp_id))?;

        debug!(scalp_id = %report.scalp_id, "Report stored");
        Ok(())
    }

    /// Most recent reports, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredScalp>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT scalp_id, symbol, depth, result, leg1_status, leg2_status, closed_at
            FROM scalp_reports
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map([limit], |row| {
                let result: Option<String> = row.get(3)?;
                let closed_at: String = row.get(6)?;
                Ok(StoredScalp {
                    scalp_id: row.get(0)?,
                    symbol: row.get(1)?,
                    depth: row.get(2)?,
                    result: result.and_then(|r| Decimal::from_str(&r).ok()),
                    leg1_status: row.get(4)?,
                    leg2_status: row.get(5)?,
                    closed_at: DateTime::parse_from_rfc3339(&closed_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Totals over every stored report plus the `recent` newest rows.
    pub fn summary(&self, recent: usize) -> Result<ReportSummary> {
        let results: Vec<Option<String>> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare("SELECT result FROM scalp_reports")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        let mut summary = ReportSummary {
            scalps: results.len() as u64,
            ..ReportSummary::default()
        };
        for result in results.iter().flatten() {
            let Ok(value) = Decimal::from_str(result) else {
                continue;
            };
            summary.total_result += value;
            if value > Decimal::ZERO {
                summary.wins += 1;
            } else if value.is_zero() {
                summary.unfilled += 1;
            }
        }
        summary.recent = self.recent(recent)?;
        Ok(summary)
    }
}

#[async_trait]
impl ReportSink for SqliteReportStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record(&self, report: &ScalpReport) -> Result<()> {
        self.insert(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::Reporter;
    use crate::strategy::{Scalp, ScalpState};
    use rust_decimal_macros::dec;

    fn report(result: Option<Decimal>) -> ScalpReport {
        let mut scalp = Scalp::new("ETH/BTC", "BTC", dec!(0.01), 1, dec!(0.05), "ETH", dec!(0.001));
        scalp.force_state(ScalpState::Closed);
        let mut report = ScalpReport::from_scalp(&scalp, None, None);
        report.result_fact_diff = result;
        report
    }

    #[test]
    fn test_summary() {
        let store = SqliteReportStore::new(":memory:").unwrap();

        store.insert(&report(Some(dec!(0.00002)))).unwrap();
        store.insert(&report(Some(dec!(-0.00001)))).unwrap();
        store.insert(&report(Some(Decimal::ZERO))).unwrap();
        store.insert(&report(Some(dec!(0.00003)))).unwrap();

        let summary = store.summary(2).unwrap();
        assert_eq!(summary.scalps, 4);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.unfilled, 1);
        assert_eq!(summary.total_result, dec!(0.00004));
        assert_eq!(summary.win_rate(), Some(dec!(0.5)));
        assert_eq!(summary.recent.len(), 2);
        assert_eq!(summary.recent[0].result, Some(dec!(0.00003)));
    }

    #[test]
    fn test_duplicate_scalp_rejected() {
        let store = SqliteReportStore::new(":memory:").unwrap();
        let r = report(Some(dec!(0.1)));

        store.insert(&r).unwrap();
        assert!(store.insert(&r).is_err());
        assert_eq!(store.summary(10).unwrap().scalps, 1);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalps.db");

        {
            let store = SqliteReportStore::new(&path).unwrap();
            let reporter = Reporter::new().with_sink(store);
            reporter.publish(&report(Some(dec!(0.2)))).await;
        }

        let store = SqliteReportStore::new(&path).unwrap();
        let summary = store.summary(5).unwrap();
        assert_eq!(summary.scalps, 1);
        assert_eq!(summary.total_result, dec!(0.2));
        assert_eq!(summary.recent[0].symbol, "ETH/BTC");
        assert_eq!(summary.recent[0].depth, 1);
    }

    #[test]
    fn test_empty_store() {
        let store = SqliteReportStore::new(":memory:").unwrap();
        let summary = store.summary(5).unwrap();
        assert_eq!(summary.scalps, 0);
        assert_eq!(summary.win_rate(), None);
        assert!(summary.recent.is_empty());
    }
}
