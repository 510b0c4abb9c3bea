//! Integration tests for the analysis pipeline.
//!
//! Candle series are built the way a source would deliver them and run
//! through `analyze` end to end.

use chrono::{Duration, TimeZone, Utc};
use engulf_alert::{prelude::*, source::binance::parse_klines};
use serde_json::json;

/// `n` flat bars (open == close) at `level`, one per five minutes
fn flat_bars(start_index: usize, n: usize, level: f64) -> Vec<Candle> {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    (start_index..start_index + n)
        .map(|i| {
            Candle::new(
                start + Duration::minutes(5 * i as i64),
                level,
                level + 0.5,
                level - 0.5,
                level,
                10.0,
            )
        })
        .collect()
}

fn append(candles: &mut Vec<Candle>, o: f64, h: f64, l: f64, c: f64) {
    let t = candles.last().unwrap().open_time + Duration::minutes(5);
    candles.push(Candle::new(t, o, h, l, c, 10.0));
}

/// 500 candles: long base at 100, a step to 110, then a bearish prior bar,
/// a bullish engulfing bar and a forming bar.
///
/// At the closed bar EMA100 sits near 109.8, inside the closed bar's range.
/// EMA200 lags near 108.6, below the range and far from the close.
fn step_up_series() -> CandleSeries {
    let mut candles = flat_bars(0, 300, 100.0);
    candles.extend(flat_bars(300, 197, 110.0));
    append(&mut candles, 110.2, 110.3, 109.8, 109.9);
    append(&mut candles, 109.7, 110.5, 109.5, 110.4);
    append(&mut candles, 110.4, 110.6, 110.3, 110.5);
    assert_eq!(candles.len(), 500);
    CandleSeries::new(candles).unwrap()
}

#[test]
fn test_single_period_signal() {
    let series = step_up_series();
    let signals = analyze("BTCUSDT", Timeframe::M5, &series, &AnalysisSettings::default()).unwrap();

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.direction, Direction::Bullish);
    assert_eq!(signal.period, Period::new(100).unwrap());
    assert_eq!(signal.instrument, "BTCUSDT");
    assert_eq!(signal.timeframe, Timeframe::M5);
    assert_eq!(signal.price, 110.4);
    assert_eq!(signal.candle_open, 109.7);
    assert!(signal.ema_value > 109.5 && signal.ema_value < 110.5);
    assert_eq!(signal.candle_open_time, series.get(498).unwrap().open_time);

    assert!(signal.message.contains("Market: <b>BTCUSDT</b>"));
    assert!(signal.message.contains("EMA100"));
    assert!(signal.message.contains("110.40000000"));
}

#[test]
fn test_emas_computed_on_full_series() {
    let series = step_up_series();
    let closes = series.closes();

    let ema100 = ema(&closes, Period::new(100).unwrap());
    let ema200 = ema(&closes, Period::new(200).unwrap());
    assert_eq!(ema100.len(), 500);
    assert!(ema100[498] > 109.5);
    assert!(ema200[498] < 109.0);
}

#[test]
fn test_prior_candle_option_widens_touch() {
    let mut candles = flat_bars(0, 300, 100.0);
    candles.extend(flat_bars(300, 197, 110.0));
    // Prior bar reaches down through EMA200; the engulfing bar does not
    append(&mut candles, 110.2, 110.3, 108.0, 109.9);
    append(&mut candles, 109.7, 110.5, 109.5, 110.4);
    append(&mut candles, 110.4, 110.6, 110.3, 110.5);
    let series = CandleSeries::new(candles).unwrap();

    let strict = analyze("X", Timeframe::M5, &series, &AnalysisSettings::default()).unwrap();
    assert_eq!(strict.len(), 1);

    let settings = AnalysisSettings::default().with_touch(TouchEvaluator::default().include_prior_candle(true));
    let wide = analyze("X", Timeframe::M5, &series, &settings).unwrap();
    assert_eq!(wide.len(), 2);
    assert_eq!(wide[1].period, Period::new(200).unwrap());
}

#[test]
fn test_bearish_engulfing_signal() {
    let mut candles = flat_bars(0, 60, 100.0);
    append(&mut candles, 99.8, 100.3, 99.7, 100.2);
    append(&mut candles, 100.4, 100.5, 99.4, 99.6);
    append(&mut candles, 99.6, 99.7, 99.5, 99.55);
    let series = CandleSeries::new(candles).unwrap();

    let signals = analyze("ETHUSDT", Timeframe::H1, &series, &AnalysisSettings::default()).unwrap();
    assert_eq!(signals.len(), 2);
    assert!(signals.iter().all(|s| s.direction == Direction::Bearish));
    assert!(signals[0].message.contains("BEARISH engulfing"));
    assert_ne!(signals[0].key(), signals[1].key());
}

#[test]
fn test_source_rows_out_of_order() {
    // Rows shuffled and duplicated; the series builder restores time order
    let rows: Vec<_> = vec![
        json!([1_700_000_600_000i64, "99.7", "100.6", "99.5", "100.4", "1"]),
        json!([1_700_000_000_000i64, "100", "100.5", "99.5", "100", "1"]),
        json!([1_700_000_900_000i64, "100.4", "100.5", "100.3", "100.45", "1"]),
        json!([1_700_000_300_000i64, "100.1", "100.3", "99.6", "100.0", "1"]),
        json!([1_700_000_300_000i64, "100.2", "100.3", "99.6", "99.8", "1"]),
    ];
    let series = CandleSeries::new(parse_klines(&rows).unwrap()).unwrap();

    assert_eq!(series.len(), 4);
    assert_eq!(series.get(1).unwrap().close, 99.8);
    assert_eq!(series.last_closed_index(), Some(2));

    let signals = analyze("BTCUSDT", Timeframe::M5, &series, &AnalysisSettings::default()).unwrap();
    assert_eq!(signals.len(), 2);
    assert!(signals.iter().all(|s| s.direction == Direction::Bullish));
}

#[test]
fn test_invalid_candle_rejected() {
    let mut candles = flat_bars(0, 5, 100.0);
    candles[3].high = 90.0;
    let err = CandleSeries::new(candles).unwrap_err();
    assert!(matches!(err, SignalError::InvalidCandle { index: 3, .. }));
    assert!(err.is_data_error());
}

#[test]
fn test_short_series_is_an_error() {
    for n in 0..MIN_CANDLES {
        let series = CandleSeries::new(flat_bars(0, n, 100.0)).unwrap();
        let err = analyze("X", Timeframe::M5, &series, &AnalysisSettings::default()).unwrap_err();
        assert!(matches!(err, SignalError::InsufficientData { need: 3, .. }));
    }
}
