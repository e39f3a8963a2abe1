//! Shared moment estimator used by both the trace generator's diagnostics
//! and the attack's per-subset statistics.

/// The population (biased) `d`-th central moment of `values`, divisor
/// `values.len()`: `E[(T - E[T])^d]`.
///
/// For `d == 1` this reduces to the plain mean, matching the attack's
/// step-0 special case (`d = 1` compares means, not first central moments,
/// which would trivially be zero).
///
/// Returns `NAN` when `values` is empty, or when `d >= 2` and
/// `values.len() < 2` — an undefined estimate that the attack's sign test
/// is built to tolerate (see [`crate::attack`]).
pub fn central_moment(values: &[f64], d: u32) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if d <= 1 {
        return mean;
    }
    if values.len() < 2 {
        return f64::NAN;
    }
    values
        .iter()
        .map(|&v| (v - mean).powi(d as i32))
        .sum::<f64>()
        / n
}
