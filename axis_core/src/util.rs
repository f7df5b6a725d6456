//! Small numeric helpers shared by the harness and the report.

/// Number of distinct values in `xs`, comparing by exact bit pattern
/// (`-0.0` and `0.0` count separately, every NaN payload counts once).
pub fn count_unique(xs: &[f64]) -> usize {
    let mut bits: Vec<u64> = xs.iter().map(|x| x.to_bits()).collect();
    bits.sort_unstable();
    bits.dedup();
    bits.len()
}

/// `|a - b| < tol`; false when either side is NaN.
#[inline]
pub fn within(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

/// Saturating milliseconds of a duration, for error payloads and logs.
#[inline]
pub fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_counts_distinct_samples() {
        assert_eq!(count_unique(&[]), 0);
        assert_eq!(count_unique(&[1.0, 1.0, 2.0, 3.0, 2.0]), 3);
    }

    #[test]
    fn within_is_strict_and_nan_safe() {
        assert!(within(1.0, 1.02, 0.03));
        assert!(!within(1.0, 1.03 + 1e-9, 0.03));
        assert!(!within(f64::NAN, 1.0, 10.0));
    }
}
