//! Signal pipeline for one instrument/timeframe
//!
//! ```text
//! CandleSeries -> EMA per period -> engulfing on last closed candle
//!              -> touch per period -> Signal
//! ```

use crate::{
    candle::{CandleSeries, Timeframe},
    detectors::{EngulfingDetector, PatternDetector, TouchEvaluator},
    indicators::IndicatorSeries,
    signal::{AlertTemplate, Signal},
    Period, Result, SignalError,
};

/// Prior candle, evaluated (closed) candle, forming candle
pub const MIN_CANDLES: usize = 3;

/// Default EMA periods
pub const DEFAULT_PERIODS: [Period; 2] = [Period::new_const(100), Period::new_const(200)];

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub periods: Vec<Period>,
    pub detector: EngulfingDetector,
    pub touch: TouchEvaluator,
    pub template: AlertTemplate,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::new(DEFAULT_PERIODS.to_vec())
    }
}

impl AnalysisSettings {
    pub fn new(periods: Vec<Period>) -> Self {
        let template = AlertTemplate::for_periods(&periods);
        Self {
            periods,
            detector: EngulfingDetector::default(),
            touch: TouchEvaluator::default(),
            template,
        }
    }

    pub fn with_touch(mut self, touch: TouchEvaluator) -> Self {
        self.touch = touch;
        self
    }
}

/// Signals for the most recently closed candle of `series`.
///
/// One signal per period whose EMA the candle touches, provided the candle
/// and its predecessor form an engulfing pair.
pub fn analyze(
    instrument: &str,
    timeframe: Timeframe,
    series: &CandleSeries,
    settings: &AnalysisSettings,
) -> Result<Vec<Signal>> {
    if series.len() < MIN_CANDLES {
        return Err(SignalError::InsufficientData {
            need: MIN_CANDLES,
            got: series.len(),
        });
    }

    let bars = series.candles();
    let Some(closed_index) = series.last_closed_index() else {
        return Ok(Vec::new());
    };
    let Some(pattern) = settings.detector.detect(bars, closed_index) else {
        return Ok(Vec::new());
    };
    let closed = &bars[closed_index];

    let mut signals = Vec::new();
    for ema in IndicatorSeries::compute_all(bars, &settings.periods) {
        let Some(ema_value) = ema.get(closed_index) else {
            continue;
        };
        if !settings.touch.touches_at(bars, closed_index, ema_value) {
            continue;
        }

        let message = settings.template.render(
            instrument,
            timeframe,
            ema.period,
            pattern.direction,
            closed,
            ema_value,
        );
        signals.push(Signal {
            instrument: instrument.to_string(),
            timeframe,
            period: ema.period,
            direction: pattern.direction,
            price: closed.close,
            candle_open: closed.open,
            ema_value,
            candle_open_time: closed.open_time,
            message,
        });
    }

    Ok(signals)
}
