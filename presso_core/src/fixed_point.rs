//! Float-to-integer quantization helpers.
//!
//! Every integer the device receives (steps, velocity, acceleration, start
//! second) passes through one of these so that rounding is uniform and no
//! input, however degenerate, can panic.

/// Round to nearest with ties to even, saturating to the `i64` range.
/// NaN maps to 0.
#[inline]
pub fn round_half_even_i64(x: f64) -> i64 {
    // `as` saturates at the bounds and maps NaN to 0.
    x.round_ties_even() as i64
}

/// Round a non-negative magnitude to nearest with ties to even, saturating
/// to the `u64` range. Negative inputs and NaN map to 0.
#[inline]
pub fn round_half_even_u64(x: f64) -> u64 {
    x.round_ties_even() as u64
}

/// Truncate a time in seconds toward zero to whole seconds.
#[inline]
pub fn truncate_seconds(t: f64) -> i64 {
    t.trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_go_to_even() {
        assert_eq!(round_half_even_i64(0.5), 0);
        assert_eq!(round_half_even_i64(1.5), 2);
        assert_eq!(round_half_even_i64(2.5), 2);
        assert_eq!(round_half_even_i64(-0.5), 0);
        assert_eq!(round_half_even_i64(-1.5), -2);
        assert_eq!(round_half_even_i64(-2.5), -2);
    }

    #[test]
    fn non_ties_round_to_nearest() {
        assert_eq!(round_half_even_i64(2.4999), 2);
        assert_eq!(round_half_even_i64(-149.6), -150);
        assert_eq!(round_half_even_u64(29.51), 30);
    }

    #[test]
    fn degenerate_inputs_saturate() {
        assert_eq!(round_half_even_i64(f64::NAN), 0);
        assert_eq!(round_half_even_i64(f64::INFINITY), i64::MAX);
        assert_eq!(round_half_even_i64(f64::NEG_INFINITY), i64::MIN);
        assert_eq!(round_half_even_u64(-3.0), 0);
        assert_eq!(round_half_even_u64(f64::NAN), 0);
    }

    #[test]
    fn truncation_is_toward_zero() {
        assert_eq!(truncate_seconds(4.9), 4);
        assert_eq!(truncate_seconds(-0.9), 0);
        assert_eq!(truncate_seconds(-1.2), -1);
        assert_eq!(truncate_seconds(f64::NAN), 0);
    }
}
