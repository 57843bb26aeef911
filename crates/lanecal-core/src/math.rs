//! Small numeric helpers.

/// Round `value` to `decimals` places after the decimal point.
///
/// Rounding is decided on the exact binary value, and an exact half goes to
/// the even digit: `85.125` becomes `85.12`, while `2.675` (stored just below
/// the half) becomes `2.67`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let precision = decimals as usize;
    format!("{value:.precision$}").parse().unwrap_or(value)
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
