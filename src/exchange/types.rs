//! Wire types for the exchange REST API
//!
//! Only the minimal structural shapes the core relies on: OHLCV kline rows,
//! ticker price, account balances, and the order acknowledgment.

use serde::{Deserialize, Serialize};

use super::ExchangeError;
use crate::types::Candle;

/// Free and locked amounts for one asset
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Balance {
    pub available: f64,
    pub locked: f64,
}

/// Order placement acknowledgment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub success: bool,
    pub order_id: Option<String>,
    pub error_message: Option<String>,
}

impl OrderAck {
    pub fn filled(order_id: impl Into<String>) -> Self {
        OrderAck {
            success: true,
            order_id: Some(order_id.into()),
            error_message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        OrderAck {
            success: false,
            order_id: None,
            error_message: Some(message.into()),
        }
    }
}

/// Ticker price response
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub price: String,
}

/// One asset entry in the account response
#[derive(Debug, Deserialize)]
pub struct AccountAsset {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

/// Authenticated account response
#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub balances: Vec<AccountAsset>,
}

/// Raw order placement response
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: i64,
    pub status: String,
}

/// Parse one kline row from the exchange's array-of-arrays format
///
/// Rows are `[open_time, open, high, low, close, volume, ...]` with prices
/// quoted as strings.
pub fn candle_from_kline_row(row: &[serde_json::Value]) -> Result<Candle, ExchangeError> {
    if row.len() < 6 {
        return Err(ExchangeError::Parse(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let timestamp = row[0]
        .as_i64()
        .ok_or_else(|| ExchangeError::Parse("kline open time is not an integer".into()))?;

    let field = |idx: usize, name: &str| -> Result<f64, ExchangeError> {
        row[idx]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| row[idx].as_f64())
            .ok_or_else(|| ExchangeError::Parse(format!("kline {} is not numeric", name)))
    };

    Ok(Candle {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_row() {
        let row = vec![
            json!(1700000000000i64),
            json!("100.5"),
            json!("101.0"),
            json!("99.5"),
            json!("100.8"),
            json!("1234.56"),
        ];
        let candle = candle_from_kline_row(&row).unwrap();

        assert_eq!(candle.timestamp, 1700000000000);
        assert_eq!(candle.open, 100.5);
        assert_eq!(candle.high, 101.0);
        assert_eq!(candle.low, 99.5);
        assert_eq!(candle.close, 100.8);
        assert_eq!(candle.volume, 1234.56);
    }

    #[test]
    fn test_parse_short_row_is_error() {
        let row = vec![json!(1700000000000i64), json!("100.5")];
        assert!(candle_from_kline_row(&row).is_err());
    }
}
