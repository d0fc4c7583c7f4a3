//! Log-space probability primitives.
//!
//! Probabilities are carried as natural logarithms; zero probability is
//! `f64::NEG_INFINITY`. The helpers here never feed an infinite subtrahend to
//! `exp`, so an all-zero vector collapses to `-inf` instead of `NaN`.

use ndarray::Array2;

use crate::error::{HmmError, Result};

pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// `max_value + ln(sum(exp(v - max_value)))`, failing when the shifted sum is
/// exactly zero for a finite `max_value`.
///
/// `max_value` must equal or upper-bound the true maximum of `values`.
pub fn checked_log_sum_exp(values: &[f64], max_value: f64) -> Result<f64> {
    if max_value == LOG_ZERO {
        return Ok(LOG_ZERO);
    }

    let mut sum = 0.0;
    for &v in values {
        if v != LOG_ZERO {
            sum += (v - max_value).exp();
        }
    }

    if sum == 0.0 {
        return Err(HmmError::DegenerateDistribution);
    }
    Ok(max_value + sum.ln())
}

/// Same as [`checked_log_sum_exp`], but a degenerate sum is reported through
/// `tracing` and `-inf` is returned.
pub fn log_sum_exp(values: &[f64], max_value: f64) -> f64 {
    match checked_log_sum_exp(values, max_value) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(max_value, len = values.len(), "{}", err);
            LOG_ZERO
        }
    }
}

/// Largest entry, or `-inf` for an empty slice.
pub fn max_value(values: &[f64]) -> f64 {
    values.iter().copied().fold(LOG_ZERO, f64::max)
}

pub fn log_sum_exp_all(values: &[f64]) -> f64 {
    log_sum_exp(values, max_value(values))
}

/// Turns each row of non-negative counts into log-probabilities.
///
/// Rows with no mass become all `-inf`; the returned vector lists them.
pub fn ln_normalize_rows(counts: &Array2<f64>) -> (Array2<f64>, Vec<usize>) {
    let mut out = Array2::from_elem(counts.raw_dim(), LOG_ZERO);
    let mut empty_rows = Vec::new();

    for (i, row) in counts.outer_iter().enumerate() {
        let total: f64 = row.sum();
        if total <= 0.0 {
            empty_rows.push(i);
            continue;
        }
        let ln_total = total.ln();
        for (j, &c) in row.iter().enumerate() {
            if c > 0.0 {
                out[[i, j]] = c.ln() - ln_total;
            }
        }
    }

    (out, empty_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn matches_reference_sum_of_first_hundred_integers() {
        let values: Vec<f64> = (1..=100).map(|k| (k as f64).ln()).collect();
        let out = log_sum_exp(&values, 100f64.ln());
        assert_abs_diff_eq!(out, 8.5271435222694052, epsilon = 1e-12);
    }

    #[test]
    fn all_zero_probabilities_short_circuit() {
        let values = [LOG_ZERO, LOG_ZERO, LOG_ZERO];
        assert_eq!(log_sum_exp(&values, LOG_ZERO), LOG_ZERO);
        assert_eq!(log_sum_exp_all(&[]), LOG_ZERO);
    }

    #[test]
    fn zero_entries_are_skipped_without_nan() {
        let values = [LOG_ZERO, 0.5f64.ln(), 0.25f64.ln()];
        let out = log_sum_exp_all(&values);
        assert!(out.is_finite());
        assert_abs_diff_eq!(out, 0.75f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_sum_is_reported_but_not_raised() {
        // An upper bound so loose that every term underflows.
        let values = [-2000.0, -2001.0];
        assert!(matches!(
            checked_log_sum_exp(&values, 0.0),
            Err(HmmError::DegenerateDistribution)
        ));
        assert_eq!(log_sum_exp(&values, 0.0), LOG_ZERO);
    }

    #[test]
    fn normalizes_counts_per_row() {
        let counts = array![[1.0, 3.0, 0.0], [0.0, 0.0, 0.0]];
        let (ln, empty) = ln_normalize_rows(&counts);
        assert_abs_diff_eq!(ln[[0, 0]].exp(), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(ln[[0, 1]].exp(), 0.75, epsilon = 1e-12);
        assert_eq!(ln[[0, 2]], LOG_ZERO);
        assert!(ln.row(1).iter().all(|v| *v == LOG_ZERO));
        assert_eq!(empty, vec![1]);
    }
}
