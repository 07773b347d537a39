//! Offline ticker replay from CSV.
//!
//! Expected CSV format:
//! ```csv
//! timestamp,symbol,bid,ask
//! 2024-01-01T00:00:00Z,ETH/BTC,0.05120,0.05122
//! ```

use crate::exchange::traits::{ExchangeError, ExchangeGateway};
use crate::exchange::types::Ticker;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::info;

/// One replayed ticker row.
#[derive(Debug, Clone)]
struct TickerRow {
    timestamp: DateTime<Utc>,
    symbol: String,
    ticker: Ticker,
}

impl TickerRow {
    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            anyhow::bail!("Expected 4 columns, got {}", fields.len());
        }

        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .context("Invalid timestamp")?
            .with_timezone(&Utc);
        let bid = Decimal::from_str(fields[2]).context("Invalid bid")?;
        let ask = Decimal::from_str(fields[3]).context("Invalid ask")?;

        Ok(Self {
            timestamp,
            symbol: fields[1].to_string(),
            ticker: Ticker::new(bid, ask),
        })
    }
}

/// Replays recorded tickers, one row per `get_ticker` call for each symbol.
pub struct CsvTickerFeed {
    rows: Mutex<HashMap<String, VecDeque<TickerRow>>>,
}

impl CsvTickerFeed {
    /// Load tickers from a CSV file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ticker file: {}", path.display()))?;

        let feed = Self::from_csv_content(&content)?;
        info!(file = %path.display(), "Loaded offline tickers");
        Ok(feed)
    }

    /// Load tickers from CSV content.
    pub fn from_csv_content(content: &str) -> Result<Self> {
        let mut rows: Vec<TickerRow> = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            if line_num == 0 && line.starts_with("timestamp") {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            let row = TickerRow::parse(line)
                .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
            rows.push(row);
        }

        if rows.is_empty() {
            anyhow::bail!("Ticker file contains no data rows");
        }

        rows.sort_by_key(|r| r.timestamp);

        let mut by_symbol: HashMap<String, VecDeque<TickerRow>> = HashMap::new();
        for row in rows {
            by_symbol.entry(row.symbol.clone()).or_default().push_back(row);
        }

        Ok(Self {
            rows: Mutex::new(by_symbol),
        })
    }

    /// Rows left for `symbol`.
    pub fn remaining(&self, symbol: &str) -> usize {
        self.rows
            .lock()
            .map(|rows| rows.get(symbol).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl ExchangeGateway for CsvTickerFeed {
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow::anyhow!("Ticker feed lock poisoned"))?;

        let queue = rows
            .get_mut(symbol)
            .ok_or_else(|| ExchangeError::NoTicker(symbol.to_string()))?;

        queue
            .pop_front()
            .map(|row| row.ticker)
            .ok_or(ExchangeError::FeedExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CSV: &str = "timestamp,symbol,bid,ask
2024-01-01T00:00:02Z,ETH/BTC,0.0513,0.0514
2024-01-01T00:00:00Z,ETH/BTC,0.0511,0.0512
2024-01-01T00:00:01Z,BTC/USDT,42000,42001
";

    #[tokio::test]
    async fn test_replay_in_timestamp_order() {
        let feed = CsvTickerFeed::from_csv_content(CSV).unwrap();
        assert_eq!(feed.remaining("ETH/BTC"), 2);

        let first = feed.get_ticker("ETH/BTC").await.unwrap();
        assert_eq!(first, Ticker::new(dec!(0.0511), dec!(0.0512)));

        let second = feed.get_ticker("ETH/BTC").await.unwrap();
        assert_eq!(second.bid, dec!(0.0513));

        assert!(matches!(
            feed.get_ticker("ETH/BTC").await,
            Err(ExchangeError::FeedExhausted)
        ));
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let feed = CsvTickerFeed::from_csv_content(CSV).unwrap();
        let err = feed.get_ticker("LTC/BTC").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_rejects_bad_rows() {
        assert!(CsvTickerFeed::from_csv_content("timestamp,symbol,bid,ask\n").is_err());
        assert!(CsvTickerFeed::from_csv_content("2024-01-01T00:00:00Z,ETH/BTC,abc,1\n").is_err());
    }
}
