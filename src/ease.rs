/// Linear interpolation between `a` and `b`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Cubic ease-in-out on a clamped [0,1] input.
///
/// This is the one easing curve the card uses: it drives the breathing of
/// the background overlays so the loop accelerates out of its extremes and
/// settles into them smoothly.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_pins_endpoints_and_clamps_outside() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert_eq!(ease_in_out_cubic(-3.0), 0.0);
        assert_eq!(ease_in_out_cubic(42.0), 1.0);
    }

    #[test]
    fn curve_is_symmetric_around_the_midpoint() {
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-12);
        for i in 0..=20 {
            let t = f64::from(i) / 20.0;
            let mirrored = ease_in_out_cubic(t) + ease_in_out_cubic(1.0 - t);
            assert!((mirrored - 1.0).abs() < 1e-12, "asymmetric at t={t}");
        }
    }

    #[test]
    fn curve_is_slow_at_the_ends_and_fast_in_the_middle() {
        assert!(ease_in_out_cubic(0.1) < 0.1);
        assert!(ease_in_out_cubic(0.9) > 0.9);

        let mut prev = 0.0;
        for i in 1..=40 {
            let v = ease_in_out_cubic(f64::from(i) / 40.0);
            assert!(v > prev);
            prev = v;
        }
    }

    #[test]
    fn lerp_spans_the_interval() {
        assert_eq!(lerp(260.0, 320.0, 0.0), 260.0);
        assert_eq!(lerp(260.0, 320.0, 0.5), 290.0);
        assert_eq!(lerp(260.0, 320.0, 1.0), 320.0);
        assert_eq!(lerp(-120.0, 120.0, 0.75), 60.0);
    }
}
