//! Candle pattern and EMA touch detectors
//!
//! - **Engulfing**: two-bar reversal where the current body covers the prior
//!   body in the opposite direction.
//! - **Touch**: the evaluated candle's range or close is at an EMA value.

pub mod helpers;

pub mod engulfing;
pub mod touch;

pub use engulfing::*;
pub use helpers::*;
pub use touch::*;

use crate::{Direction, OHLCV};

/// Result of pattern detection - Copy, no allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    pub direction: Direction,
    pub start_index: usize,
    pub end_index: usize,
}

/// Candle pattern detector evaluated at a single bar index
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch>;
}
