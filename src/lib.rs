//! # engulf-alert - EMA pullback + engulfing candle alerts
//!
//! Polls exchange klines for a set of instruments and timeframes, computes
//! exponential moving averages on closing prices, looks for an engulfing
//! pair on the most recently closed candle and, when that candle touches an
//! EMA, sends a de-duplicated alert through a [`notifier::Notifier`].
//!
//! ## Quick Start
//!
//! ```rust
//! use engulf_alert::prelude::*;
//!
//! // Bearish candle followed by a bullish candle whose body covers it
//! assert_eq!(
//!     classify_engulfing(101.0, 100.0, 100.0, 101.0),
//!     Some(Direction::Bullish)
//! );
//!
//! let values = ema(&[10.0, 11.0, 12.0], Period::new(2).unwrap());
//! assert_eq!(values[0], 10.0);
//!
//! let touch = TouchEvaluator::default();
//! assert!(touch.is_near(1001.5, 1000.0));
//! ```

pub mod analysis;
pub mod candle;
pub mod config;
pub mod dedup;
pub mod detectors;
pub mod indicators;
pub mod logging;
pub mod notifier;
pub mod scheduler;
pub mod signal;
pub mod source;

pub mod prelude {
    pub use crate::{
        // Pipeline
        analysis::{analyze, AnalysisSettings, MIN_CANDLES},
        // Candles
        candle::{Candle, CandleSeries, Timeframe},
        // Detectors
        detectors::{classify_engulfing, EngulfingDetector, PatternDetector, PatternMatch, TouchEvaluator},
        // Dedup
        dedup::SignalDeduplicator,
        // Indicators
        indicators::{ema, IndicatorSeries},
        // Collaborators
        notifier::Notifier,
        scheduler::{Clock, LoopState, PassReport, Scheduler, SchedulerSettings, SystemClock},
        signal::{AlertTemplate, DedupKey, Signal},
        source::{MarketDataSource, Watch},
        // Types
        Direction,
        OHLCVExt,
        Period,
        Ratio,
        Result,
        SignalError,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors raised while fetching, normalising or analysing market data
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} candles, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },
}

impl SignalError {
    /// Transport and data errors only cost the current instrument/timeframe
    /// its turn; everything else is a setup problem.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            SignalError::InsufficientData { .. }
                | SignalError::InvalidCandle { .. }
                | SignalError::Malformed(_)
                | SignalError::Http(_)
                | SignalError::Status { .. }
        )
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(SignalError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SignalError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// EMA period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(SignalError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }

    /// Smoothing factor of the recursive EMA: `2 / (period + 1)`
    #[inline]
    pub fn alpha(self) -> f64 {
        2.0 / (self.0 as f64 + 1.0)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait for OHLCV data
pub trait OHLCVExt: OHLCV {
    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// DIRECTION
// ============================================================

/// Direction of an engulfing reversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// TESTS
// ============================================================
