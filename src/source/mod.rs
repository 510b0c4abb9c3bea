//! Market data sources
//!
//! The scheduler only sees [`MarketDataSource`]; every provider lives behind
//! its own implementation.

pub mod binance;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    candle::{Candle, Timeframe},
    Result,
};

pub use binance::{BinanceMarket, BinanceSource};

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Up to `limit` candles, oldest first. The newest candle may still be
    /// forming. Gaps between candles are passed through as-is.
    async fn fetch(&self, instrument: &str, timeframe: Timeframe, limit: usize)
        -> Result<Vec<Candle>>;
}

/// An instrument and the source that serves it
#[derive(Clone)]
pub struct Watch {
    pub instrument: String,
    pub source: Arc<dyn MarketDataSource>,
}

impl Watch {
    pub fn new(instrument: impl Into<String>, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            instrument: instrument.into(),
            source,
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("instrument", &self.instrument)
            .field("source", &self.source.name())
            .finish()
    }
}
