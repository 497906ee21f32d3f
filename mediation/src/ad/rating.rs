//! Star rating normalization.
//!
//! Providers report ratings on their own scales (`4.2` of `5`, `"7/10"`).
//! Everything is normalized to a five-star scale using floating-point
//! division, so fractional ratings survive (`3/5` is `3.0`, not `0`).

/// Maximum normalized rating.
pub const MAX_STARS: f32 = 5.0;

/// Normalize `value` on a `scale` to the 0..=5 range.
///
/// A non-positive or non-finite scale yields `0.0`.
pub fn normalize(value: f64, scale: f64) -> f32 {
    if !scale.is_finite() || scale <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    let stars = (value / scale) * f64::from(MAX_STARS);
    stars.clamp(0.0, f64::from(MAX_STARS)) as f32
}

/// Parse a `"value/scale"` string, e.g. `"7/10"` or `"4.5/5"`.
pub fn parse_fraction(raw: &str) -> Option<f32> {
    let (value, scale) = raw.trim().split_once('/')?;
    let value: f64 = value.trim().parse().ok()?;
    let scale: f64 = scale.trim().parse().ok()?;
    if scale == 0.0 {
        return None;
    }
    Some(normalize(value, scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_fraction_below_scale_is_not_truncated() {
        assert!(approx(parse_fraction("3/5").unwrap(), 3.0));
        assert!(approx(parse_fraction("1/3").unwrap(), 5.0 / 3.0));
        assert!(approx(parse_fraction("7/10").unwrap(), 3.5));
        assert!(approx(parse_fraction("99/100").unwrap(), 4.95));
    }

    #[test]
    fn test_boundaries() {
        assert!(approx(parse_fraction("0/5").unwrap(), 0.0));
        assert!(approx(parse_fraction("5/5").unwrap(), 5.0));
        assert!(approx(parse_fraction("12/10").unwrap(), 5.0));
        assert!(approx(normalize(-1.0, 5.0), 0.0));
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(parse_fraction("4/0"), None);
        assert_eq!(parse_fraction("four/5"), None);
        assert_eq!(parse_fraction("4.5"), None);
        assert_eq!(normalize(3.0, 0.0), 0.0);
        assert_eq!(normalize(3.0, f64::NAN), 0.0);
    }

    #[test]
    fn test_decimal_fraction() {
        assert!(approx(parse_fraction(" 4.5 / 5 ").unwrap(), 4.5));
    }
}
