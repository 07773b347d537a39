//! Optional forwarding of reports to a remote collector.

use super::{ReportSink, ScalpReport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// POSTs each report as JSON to a collector endpoint.
pub struct RemoteCollector {
    http: Client,
    url: String,
}

impl RemoteCollector {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ReportSink for RemoteCollector {
    fn name(&self) -> &str {
        "remote"
    }

    async fn record(&self, report: &ScalpReport) -> Result<()> {
        self.http
            .post(&self.url)
            .json(report)
            .send()
            .await
            .context("Failed to send report")?
            .error_for_status()
            .context("Collector rejected report")?;

        debug!(scalp_id = %report.scalp_id, url = %self.url, "Report forwarded");
        Ok(())
    }
}
