//! Report fan-out.

use super::ScalpReport;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Destination for closed-scalp reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn record(&self, report: &ScalpReport) -> Result<()>;
}

/// Delivers every report to all configured sinks.
#[derive(Default)]
pub struct Reporter {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Log the report and hand it to every sink. A failing sink is logged and
    /// skipped; it never stops the others.
    pub async fn publish(&self, report: &ScalpReport) {
        info!(
            scalp_id = %report.scalp_id,
            state = %report.state,
            result = ?report.result_fact_diff,
            depth = report.depth,
            leg1_status = ?report.leg1_order_status,
            leg1_filled = ?report.leg1_filled,
            leg2_status = ?report.leg2_order_status,
            leg2_filled = ?report.leg2_filled,
            cur1_diff = %report.cur1_diff,
            cur2_diff = %report.cur2_diff,
            "Scalp closed"
        );

        for sink in &self.sinks {
            if let Err(e) = sink.record(report).await {
                error!(sink = sink.name(), scalp_id = %report.scalp_id, error = %e, "Failed to record report");
            }
        }
    }
}

/// In-memory sink, handy for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<ScalpReport>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ScalpReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, report: &ScalpReport) -> Result<()> {
        self.reports
            .lock()
            .map_err(|_| anyhow::anyhow!("Report buffer lock poisoned"))?
            .push(report.clone());
        Ok(())
    }
}
