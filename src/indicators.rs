//! Exponential moving averages over closing prices
//!
//! Uses the recursive ("unadjusted") form seeded with the first close:
//! `EMA[0] = close[0]`, `EMA[i] = a * close[i] + (1 - a) * EMA[i-1]` with
//! `a = 2 / (period + 1)`. No warm-up window, so short series are defined
//! from the first bar.

use crate::{Period, OHLCV};

/// EMA of `values`, same length as the input
pub fn ema(values: &[f64], period: Period) -> Vec<f64> {
    let alpha = period.alpha();
    let mut out = Vec::with_capacity(values.len());

    let mut iter = values.iter();
    let Some(&first) = iter.next() else {
        return out;
    };

    let mut prev = first;
    out.push(prev);
    for &value in iter {
        prev = alpha * value + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// EMA values aligned one-to-one with a candle slice
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub period: Period,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    /// EMA of the closes in `bars`
    pub fn compute<T: OHLCV>(bars: &[T], period: Period) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        Self {
            period,
            values: ema(&closes, period),
        }
    }

    /// One series per period, in the given order
    pub fn compute_all<T: OHLCV>(bars: &[T], periods: &[Period]) -> Vec<Self> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        periods
            .iter()
            .map(|&period| Self {
                period,
                values: ema(&closes, period),
            })
            .collect()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
