//! Binance spot REST client (public market data only).

use crate::config::ExchangeConfig;
use crate::exchange::traits::{ExchangeError, ExchangeGateway};
use crate::exchange::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

const SPOT_BASE_URL: &str = "https://api.binance.com";
const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";

/// Binance spot client used as the live ticker source.
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client from configuration.
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let base_url = if config.testnet {
            SPOT_TESTNET_URL
        } else {
            SPOT_BASE_URL
        };
        Self::with_base_url(base_url, config.request_timeout_secs)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert "ETH/BTC" into the exchange's "ETHBTC".
    pub fn exchange_symbol(symbol: &str) -> String {
        symbol.replace('/', "").to_uppercase()
    }

    /// Get best bid/ask for one symbol.
    #[instrument(skip(self))]
    pub async fn get_book_ticker(&self, symbol: &str) -> Result<BookTicker> {
        let url = format!(
            "{}/api/v3/ticker/bookTicker?symbol={}",
            self.base_url,
            Self::exchange_symbol(symbol)
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch book ticker")?
            .error_for_status()
            .context("Book ticker request rejected")?;

        let book: BookTicker = response
            .json()
            .await
            .context("Failed to parse book ticker response")?;

        debug!(
            symbol = %book.symbol,
            bid = %book.bid_price,
            ask = %book.ask_price,
            "Book ticker"
        );
        Ok(book)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        Ok(self.get_book_ticker(symbol).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_exchange_symbol() {
        assert_eq!(BinanceClient::exchange_symbol("ETH/BTC"), "ETHBTC");
        assert_eq!(BinanceClient::exchange_symbol("btc/usdt"), "BTCUSDT");
    }

    #[tokio::test]
    async fn test_get_ticker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/bookTicker"))
            .and(query_param("symbol", "ETHBTC"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"symbol":"ETHBTC","bidPrice":"0.05120","bidQty":"1.5","askPrice":"0.05122","askQty":"2"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = BinanceClient::with_base_url(&server.uri(), 5).unwrap();
        let ticker = client.get_ticker("ETH/BTC").await.unwrap();

        assert_eq!(ticker.bid, dec!(0.05120));
        assert_eq!(ticker.ask, dec!(0.05122));
    }

    #[tokio::test]
    async fn test_get_ticker_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/bookTicker"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = BinanceClient::with_base_url(&server.uri(), 5).unwrap();
        let err = client.get_ticker("ETH/BTC").await.unwrap_err();

        assert!(err.is_transient());
    }
}
