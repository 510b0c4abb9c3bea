//! Binance kline REST source (spot and USD-M futures)
//!
//! Kline rows arrive as JSON arrays:
//! `[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms, ...]`

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::MarketDataSource;
use crate::{
    candle::{Candle, Timeframe},
    Result, SignalError,
};

/// Which Binance market to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinanceMarket {
    #[default]
    Spot,
    UsdFutures,
}

impl BinanceMarket {
    pub fn default_base_url(self) -> &'static str {
        match self {
            BinanceMarket::Spot => "https://api.binance.com",
            BinanceMarket::UsdFutures => "https://fapi.binance.com",
        }
    }

    fn klines_path(self) -> &'static str {
        match self {
            BinanceMarket::Spot => "/api/v3/klines",
            BinanceMarket::UsdFutures => "/fapi/v1/klines",
        }
    }

    fn name(self) -> &'static str {
        match self {
            BinanceMarket::Spot => "binance",
            BinanceMarket::UsdFutures => "binance-futures",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BinanceSource {
    client: Client,
    base_url: String,
    market: BinanceMarket,
}

impl BinanceSource {
    /// Source with its own HTTP client and the given request timeout
    pub fn new(market: BinanceMarket, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, market))
    }

    /// Source sharing an existing HTTP client
    pub fn with_client(client: Client, market: BinanceMarket) -> Self {
        Self {
            client,
            base_url: market.default_base_url().to_string(),
            market,
        }
    }

    /// Point at another host (testnet, proxy)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn market(&self) -> BinanceMarket {
        self.market
    }

    fn klines_url(&self) -> String {
        format!("{}{}", self.base_url, self.market.klines_path())
    }
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    fn name(&self) -> &str {
        self.market.name()
    }

    async fn fetch(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let limit_param = limit.to_string();
        let response = self
            .client
            .get(self.klines_url())
            .query(&[
                ("symbol", instrument),
                ("interval", timeframe.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Value> = response.json().await?;
        let mut candles = parse_klines(&rows)?;
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }

        debug!(
            source = self.name(),
            instrument,
            timeframe = %timeframe,
            count = candles.len(),
            "Fetched klines"
        );
        Ok(candles)
    }
}

/// Convert raw kline rows into candles, in row order
pub fn parse_klines(rows: &[Value]) -> Result<Vec<Candle>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| parse_kline(index, row))
        .collect()
}

fn parse_kline(index: usize, row: &Value) -> Result<Candle> {
    let fields = row
        .as_array()
        .ok_or_else(|| malformed(index, "row is not an array"))?;
    if fields.len() < 6 {
        return Err(malformed(index, "row has fewer than 6 fields"));
    }

    let open_ms = fields[0]
        .as_i64()
        .ok_or_else(|| malformed(index, "open time is not an integer"))?;
    let open_time = Utc
        .timestamp_millis_opt(open_ms)
        .single()
        .ok_or_else(|| malformed(index, "open time out of range"))?;

    Ok(Candle::new(
        open_time,
        number(index, &fields[1], "open")?,
        number(index, &fields[2], "high")?,
        number(index, &fields[3], "low")?,
        number(index, &fields[4], "close")?,
        number(index, &fields[5], "volume")?,
    ))
}

/// Binance quotes prices as decimal strings; plain JSON numbers are accepted too
fn number(index: usize, value: &Value, field: &str) -> Result<f64> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| malformed(index, &format!("{field} is not numeric")))
}

fn malformed(index: usize, reason: &str) -> SignalError {
    SignalError::Malformed(format!("kline {index}: {reason}"))
}
