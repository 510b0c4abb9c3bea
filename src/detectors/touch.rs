//! EMA touch evaluation
//!
//! A candle touches an EMA value when either the EMA lies inside the candle's
//! `[low, high]` range, or the close is within `threshold` (relative) of it.

use super::helpers::{relative_distance, within_range, DEFAULT_TOUCH_THRESHOLD};
use crate::{Ratio, OHLCV};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TouchEvaluator {
    /// Max relative distance between close and EMA
    pub threshold: Ratio,
    /// Also accept range containment on the candle before the evaluated one
    pub include_prior_candle: bool,
}

impl Default for TouchEvaluator {
    fn default() -> Self {
        Self {
            threshold: Ratio::new_const(DEFAULT_TOUCH_THRESHOLD),
            include_prior_candle: false,
        }
    }
}

impl TouchEvaluator {
    pub fn new(threshold: Ratio) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn include_prior_candle(mut self, enable: bool) -> Self {
        self.include_prior_candle = enable;
        self
    }

    /// `low <= ema <= high`
    #[inline]
    pub fn range_contains<T: OHLCV>(&self, candle: &T, ema_value: f64) -> bool {
        within_range(ema_value, candle.low(), candle.high())
    }

    /// Close within the relative threshold of a non-zero EMA. The threshold
    /// itself is inclusive; nothing beyond it is.
    #[inline]
    pub fn is_near(&self, close: f64, ema_value: f64) -> bool {
        relative_distance(close, ema_value).is_some_and(|d| d <= self.threshold.get())
    }

    /// Range-or-proximity test on a single candle
    pub fn touches<T: OHLCV>(&self, candle: &T, ema_value: f64) -> bool {
        self.range_contains(candle, ema_value) || self.is_near(candle.close(), ema_value)
    }

    /// Touch test for `bars[index]`, widened to the prior candle's range when
    /// `include_prior_candle` is set
    pub fn touches_at<T: OHLCV>(&self, bars: &[T], index: usize, ema_value: f64) -> bool {
        let Some(candle) = bars.get(index) else {
            return false;
        };
        if self.touches(candle, ema_value) {
            return true;
        }
        self.include_prior_candle
            && index
                .checked_sub(1)
                .and_then(|i| bars.get(i))
                .is_some_and(|prior| self.range_contains(prior, ema_value))
    }
}
