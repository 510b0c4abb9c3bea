//! Engulfing pattern (bullish and bearish)
//!
//! Boundaries are inclusive: an open equal to the prior close, or a close
//! equal to the prior open, still engulfs.

use super::{
    helpers::{BODY_EPSILON, BOUNDARY_EPSILON},
    PatternDetector, PatternMatch,
};
use crate::{Direction, OHLCV};

/// Engulfing detector with configurable tolerances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngulfingDetector {
    /// Current bodies at or below this are doji and never match
    pub min_body: f64,
    /// Slack on the containment comparisons
    pub tolerance: f64,
}

impl Default for EngulfingDetector {
    fn default() -> Self {
        Self {
            min_body: BODY_EPSILON,
            tolerance: BOUNDARY_EPSILON,
        }
    }
}

impl EngulfingDetector {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Classify a candle pair from its four body prices
    pub fn classify(
        &self,
        prev_open: f64,
        prev_close: f64,
        curr_open: f64,
        curr_close: f64,
    ) -> Option<Direction> {
        let curr_body = (curr_close - curr_open).abs();
        if curr_body <= self.min_body {
            return None;
        }

        // Bullish: bearish bar fully covered by a bullish bar
        if prev_close < prev_open
            && curr_close > curr_open
            && curr_open <= prev_close + self.tolerance
            && curr_close >= prev_open - self.tolerance
        {
            return Some(Direction::Bullish);
        }

        // Bearish: mirror image
        if prev_close > prev_open
            && curr_close < curr_open
            && curr_open >= prev_close - self.tolerance
            && curr_close <= prev_open + self.tolerance
        {
            return Some(Direction::Bearish);
        }

        None
    }
}

/// [`EngulfingDetector::classify`] with default tolerances
pub fn classify_engulfing(
    prev_open: f64,
    prev_close: f64,
    curr_open: f64,
    curr_close: f64,
) -> Option<Direction> {
    EngulfingDetector::default().classify(prev_open, prev_close, curr_open, curr_close)
}

impl PatternDetector for EngulfingDetector {
    fn name(&self) -> &'static str {
        "ENGULFING"
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index + 1 < self.min_bars() {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        let direction = self.classify(prev.open(), prev.close(), curr.open(), curr.close())?;
        Some(PatternMatch {
            direction,
            start_index: index - 1,
            end_index: index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullish_strict() {
        assert_eq!(
            classify_engulfing(60.0, 59.5, 59.0, 61.5),
            Some(Direction::Bullish)
        );
    }

    #[test]
    fn test_bearish_strict() {
        assert_eq!(
            classify_engulfing(59.5, 60.0, 61.0, 58.0),
            Some(Direction::Bearish)
        );
    }

    #[test]
    fn test_tight_boundary_counts() {
        // open == prev close, close == prev open
        assert_eq!(
            classify_engulfing(101.0, 100.0, 100.0, 101.0),
            Some(Direction::Bullish)
        );
        assert_eq!(
            classify_engulfing(100.0, 101.0, 101.0, 100.0),
            Some(Direction::Bearish)
        );
    }

    #[test]
    fn test_partial_cover_is_rejected() {
        // Bullish bar that does not reach the prior open
        assert_eq!(classify_engulfing(101.0, 100.0, 100.0, 100.9), None);
        // Bullish bar opening above the prior close
        assert_eq!(classify_engulfing(101.0, 100.0, 100.1, 101.5), None);
    }

    #[test]
    fn test_same_direction_is_rejected() {
        assert_eq!(classify_engulfing(100.0, 101.0, 99.0, 102.0), None);
        assert_eq!(classify_engulfing(101.0, 100.0, 102.0, 99.0), None);
    }

    #[test]
    fn test_doji_current_is_rejected() {
        // Prior bar is a doji too, so any current body "contains" it
        assert_eq!(classify_engulfing(100.0, 100.0, 100.0, 100.0), None);
        assert_eq!(classify_engulfing(101.0, 100.0, 100.0, 100.0 + 5e-9), None);
    }

    #[test]
    fn test_detect_at_index() {
        #[derive(Clone, Copy)]
        struct Body(f64, f64);
        impl OHLCV for Body {
            fn open(&self) -> f64 {
                self.0
            }
            fn high(&self) -> f64 {
                self.0.max(self.1)
            }
            fn low(&self) -> f64 {
                self.0.min(self.1)
            }
            fn close(&self) -> f64 {
                self.1
            }
            fn volume(&self) -> f64 {
                0.0
            }
        }

        let bars = [Body(60.0, 59.5), Body(59.0, 61.5), Body(61.5, 61.6)];
        let detector = EngulfingDetector::with_defaults();

        assert_eq!(detector.detect(&bars, 0), None);
        let m = detector.detect(&bars, 1).unwrap();
        assert_eq!(m.direction, Direction::Bullish);
        assert_eq!((m.start_index, m.end_index), (0, 1));
        assert_eq!(detector.detect(&bars, 2), None);
        assert_eq!(detector.detect(&bars, 3), None);
    }
}
