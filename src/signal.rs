//! Signals and the alert text sent for them
//!
//! The alert body is parsed downstream, so the field order of
//! [`AlertTemplate::render`] is fixed.

use chrono::{DateTime, Utc};

use crate::{candle::Candle, candle::Timeframe, Direction, Period};

/// Identity of a recurring signal for cooldown purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub period: Period,
    pub direction: Direction,
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, EMA{}, {})",
            self.instrument, self.timeframe, self.period, self.direction
        )
    }
}

/// Engulfing + EMA touch on one closed candle
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub period: Period,
    pub direction: Direction,
    /// Close of the evaluated candle
    pub price: f64,
    /// Open of the evaluated candle
    pub candle_open: f64,
    pub ema_value: f64,
    pub candle_open_time: DateTime<Utc>,
    pub message: String,
}

impl Signal {
    pub fn key(&self) -> DedupKey {
        DedupKey {
            instrument: self.instrument.clone(),
            timeframe: self.timeframe,
            period: self.period,
            direction: self.direction,
        }
    }
}

/// Fixed-layout HTML alert (Telegram `parse_mode=HTML`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTemplate {
    pub note: String,
}

impl Default for AlertTemplate {
    fn default() -> Self {
        Self::for_periods(&[Period::new_const(100), Period::new_const(200)])
    }
}

impl AlertTemplate {
    /// Advisory note naming the watched EMAs, e.g. `EMA100/200`
    pub fn for_periods(periods: &[Period]) -> Self {
        let list = periods
            .iter()
            .map(Period::to_string)
            .collect::<Vec<_>>()
            .join("/");
        Self {
            note: format!("Engulfing + pullback to EMA{list}."),
        }
    }

    /// Prices use 8 decimals; time is the candle open in UTC.
    pub fn render(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        period: Period,
        direction: Direction,
        candle: &Candle,
        ema_value: f64,
    ) -> String {
        format!(
            "📡 <b>SIGNAL</b>\n\
             Market: <b>{instrument}</b>\n\
             TF: <b>{timeframe}</b>\n\
             EMA: <b>{period}</b>\n\
             Type: <b>{direction} engulfing</b>\n\
             Price: {close:.8}\n\
             Candle Open/Close: {open:.8}/{close:.8}\n\
             EMA{period}: {ema_value:.8}\n\
             Time: {time}\n\
             Note: {note}",
            direction = direction.as_str().to_uppercase(),
            close = candle.close,
            open = candle.open,
            time = candle.open_time.format("%Y-%m-%d %H:%M:%S"),
            note = self.note,
        )
    }
}
