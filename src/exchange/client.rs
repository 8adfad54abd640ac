//! REST client for the exchange API
//!
//! Public market-data endpoints need no credentials; balance queries and
//! order placement are signed with HMAC-SHA256 over the query string. Every
//! request carries a bounded timeout so a stalled exchange degrades the
//! current cycle instead of hanging the scheduler.

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

use super::types::{
    candle_from_kline_row, AccountResponse, OrderAck, OrderResponse, TickerPrice,
};
use super::{AccountBalances, ExchangeApi, ExchangeError};
use crate::types::{Candle, Side, Symbol};

type HmacSha256 = Hmac<Sha256>;

/// Default REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com/api/v3";

/// Maximum klines the exchange returns per request
const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            api_key: None,
            api_secret: None,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }
}

/// HTTP client implementing the [`ExchangeApi`] contract
#[derive(Debug, Clone)]
pub struct RestExchange {
    http: Client,
    config: ClientConfig,
}

impl RestExchange {
    pub fn new(config: ClientConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to build HTTP client");

        RestExchange { http, config }
    }

    /// Build a client from `EXCHANGE_API_KEY` / `EXCHANGE_API_SECRET`
    pub fn from_env() -> Self {
        let mut config = ClientConfig::default();
        if let (Ok(key), Ok(secret)) = (
            std::env::var("EXCHANGE_API_KEY"),
            std::env::var("EXCHANGE_API_SECRET"),
        ) {
            config = config.with_credentials(key, secret);
        }
        Self::new(config)
    }

    fn sign(&self, payload: &str) -> Result<String, ExchangeError> {
        let secret = self
            .config
            .api_secret
            .as_deref()
            .ok_or_else(|| ExchangeError::Parse("api secret not configured".into()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn api_key(&self) -> Result<&str, ExchangeError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ExchangeError::Parse("api key not configured".into()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ExchangeError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ExchangeError::Api { status, message })
    }
}

impl ExchangeApi for RestExchange {
    async fn fetch_current_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        let url = format!("{}/ticker/price", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        let ticker: TickerPrice = Self::check_status(response).await?.json().await?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|_| ExchangeError::Parse(format!("ticker price '{}'", ticker.price)))
    }

    async fn fetch_recent_candles(
        &self,
        symbol: &Symbol,
        count: usize,
        interval: &str,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!("{}/klines", self.config.base_url);
        let limit = count.min(MAX_KLINES_PER_REQUEST);

        debug!(
            "Fetching klines: symbol={}, interval={}, limit={}",
            symbol, interval, limit
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol.as_str()),
                ("interval", interval),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<Vec<serde_json::Value>> =
            Self::check_status(response).await?.json().await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            candles.push(candle_from_kline_row(row)?);
        }
        candles.sort_by_key(|c| c.timestamp);

        Ok(candles)
    }

    async fn fetch_balances(&self) -> Result<AccountBalances, ExchangeError> {
        let query = format!("timestamp={}", Utc::now().timestamp_millis());
        let signature = self.sign(&query)?;
        let url = format!(
            "{}/account?{}&signature={}",
            self.config.base_url, query, signature
        );

        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", self.api_key()?)
            .send()
            .await?;

        let account: AccountResponse = Self::check_status(response).await?.json().await?;

        let mut balances = AccountBalances::new();
        for entry in account.balances {
            let available = entry.free.parse::<f64>().unwrap_or(0.0);
            let locked = entry.locked.parse::<f64>().unwrap_or(0.0);
            balances.insert(entry.asset, super::Balance { available, locked });
        }

        Ok(balances)
    }

    async fn place_market_order(
        &self,
        side: Side,
        size: f64,
        symbol: &Symbol,
    ) -> Result<OrderAck, ExchangeError> {
        let side_str = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={:.8}&timestamp={}",
            symbol.as_str(),
            side_str,
            size,
            Utc::now().timestamp_millis()
        );
        let signature = self.sign(&query)?;
        let url = format!(
            "{}/order?{}&signature={}",
            self.config.base_url, query, signature
        );

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", self.api_key()?)
            .send()
            .await?;

        // A rejected order is a business outcome, not a transport failure
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Ok(OrderAck::rejected(message));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::Parse(e.to_string()))?;

        match order.status.as_str() {
            "FILLED" | "PARTIALLY_FILLED" | "NEW" => Ok(OrderAck::filled(order.order_id.to_string())),
            other => Ok(OrderAck::rejected(format!("order status {}", other))),
        }
    }
}
