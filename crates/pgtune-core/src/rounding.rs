//! Binary rounding of raw megabyte quantities.
//!
//! Computed sizes are fractional (`memory * 0.15`, `per_connection * 0.85`).
//! Written into a configuration file they should look like something a human
//! would pick, so values are rounded to four significant binary digits:
//! 135 → 128, 768 → 768, 1000 → 1024, 17 → 18.
//!
//! The mapping is monotonic: a larger input never produces a smaller output.

/// Values below this are rounded to whole megabytes.
const EXACT_BELOW_MB: f64 = 16.0;

/// Significant binary digits kept above [`EXACT_BELOW_MB`].
const SIGNIFICANT_BITS: i32 = 4;

/// Rounds a raw megabyte quantity to a conventional size.
///
/// - non-positive (and NaN) input → 0
/// - below 16 MB → nearest whole MB, at least 1
/// - otherwise → nearest multiple of `2^(floor(log2 v) - 3)`
pub fn binary_round(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    if value < EXACT_BELOW_MB {
        return round_half_up(value).max(1);
    }

    let exponent = value.log2().floor() as i32 - (SIGNIFICANT_BITS - 1);
    let step = 2f64.powi(exponent);
    round_half_up(value / step) * step as u64
}

fn round_half_up(value: f64) -> u64 {
    (value + 0.5).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values() {
        assert_eq!(binary_round(0.0), 0);
        assert_eq!(binary_round(-5.0), 0);
        assert_eq!(binary_round(f64::NAN), 0);
        assert_eq!(binary_round(0.2), 1);
        assert_eq!(binary_round(3.0), 3);
        assert_eq!(binary_round(3.5), 4);
        assert_eq!(binary_round(10.0), 10);
        assert_eq!(binary_round(15.4), 15);
    }

    #[test]
    fn test_binary_magnitudes() {
        assert_eq!(binary_round(16.0), 16);
        assert_eq!(binary_round(17.0), 18);
        assert_eq!(binary_round(135.0), 128);
        assert_eq!(binary_round(142.5), 144);
        assert_eq!(binary_round(256.0), 256);
        assert_eq!(binary_round(768.0), 768);
        assert_eq!(binary_round(1000.0), 1024);
        assert_eq!(binary_round(2048.0), 2048);
        assert_eq!(binary_round(8192.0), 8192);
        assert_eq!(binary_round(12288.0), 12288);
    }

    #[test]
    fn test_powers_of_two_are_fixed_points() {
        for exp in 4..30 {
            let v = 1u64 << exp;
            assert_eq!(binary_round(v as f64), v);
        }
    }

    #[test]
    fn test_monotonic() {
        let mut prev = 0;
        let mut v = 0.0;
        while v < 70_000.0 {
            let r = binary_round(v);
            assert!(r >= prev, "binary_round({}) = {} < {}", v, r, prev);
            prev = r;
            v += 0.25;
        }
    }
}
