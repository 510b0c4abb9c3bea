//! Tolerances shared by the detectors

/// Bodies at or below this size are treated as doji and never engulf
pub const BODY_EPSILON: f64 = 1e-8;

/// Slack on price boundary comparisons, so equal prices that went through
/// float arithmetic still compare as equal
pub const BOUNDARY_EPSILON: f64 = 1e-12;

/// Default relative distance between close and EMA that counts as a touch (0.15%)
pub const DEFAULT_TOUCH_THRESHOLD: f64 = 0.0015;

/// `low <= value <= high`
#[inline]
pub fn within_range(value: f64, low: f64, high: f64) -> bool {
    low <= value && value <= high
}

/// `|price - reference| / |reference|`, or `None` for a zero reference
#[inline]
pub fn relative_distance(price: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 {
        return None;
    }
    Some((price - reference).abs() / reference.abs())
}
