//! Fast polynomial/rational approximations for `atan2`, `sin`, and `cos`.
//!
//! Ported from `hvylya::core::approx_trigonometry`: a quadrant-selecting
//! rational approximation of `atan2` (max error 0.162 degrees) and minimax
//! polynomial approximations of `sin`/`cos` over `x^2`. These run in the
//! FM discriminator and PLL/Costas carrier generators, where a handful of
//! ULPs of phase error are irrelevant but a `atan2`/`sin`/`cos` call per
//! sample at 1 Msps is not free.

const ATAN2_SIGN_MASK: u32 = 0x8000_0000;

/// Rational coefficient from the reference implementation; tuned for a
/// 0.162 degree worst-case error over the full plane.
const ATAN2_B: f32 = 0.596227;

/// `atan2(y, x)` normalized to the `[-2, 2)` range (i.e. divided by `pi/2`).
///
/// Matches `hvylya::core::approx_normalized_atan2`: the quadrant is
/// recovered from the sign bits of `x` and `y` via integer bit tricks, and
/// the first-quadrant angle is approximated by a single rational term.
pub fn approx_normalized_atan2(y: f32, x: f32) -> f32 {
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }
    let result = normalized_atan2_q(y, x);
    if result > 2.0 {
        result - 4.0
    } else {
        result
    }
}

/// `atan2(y, x)` in radians, via [`approx_normalized_atan2`].
pub fn approx_atan2(y: f32, x: f32) -> f32 {
    (std::f32::consts::FRAC_PI_2) * approx_normalized_atan2(y, x)
}

fn normalized_atan2_q(y: f32, x: f32) -> f32 {
    let ux_s = ATAN2_SIGN_MASK & x.to_bits();
    let uy_s = ATAN2_SIGN_MASK & y.to_bits();

    // Quadrant offset: 0, 1, 2 or 3 depending on the sign combination.
    let q = f32::from_bits(0) + (((!ux_s & uy_s) >> 29) | (ux_s >> 30)) as f32;

    let bxy_a = (ATAN2_B * x * y).abs();
    let num = bxy_a + y * y;
    let atan_1q = num / (x * x + bxy_a + num);

    // Recombine the sign of the first-quadrant angle with x^y's sign bit.
    let uatan_1q = atan_1q.to_bits();
    let uatan_2q = (ux_s ^ uy_s) | uatan_1q;

    q + f32::from_bits(uatan_2q)
}

/// `cos(x)` via a degree-10 (in `x^2`) minimax polynomial. Valid over the
/// range produced by the PLL/Costas phase accumulators (`[-pi, pi]`).
pub fn approx_cos(x: f32) -> f32 {
    let x2 = x * x;
    ((((1.90652668840074246305e-05_f32 * x2 - 1.34410769349285321733e-03_f32) * x2
        + 4.15223086250910767516e-02_f32)
        * x2
        - 4.99837602272995734437e-01_f32)
        * x2
        + 9.99971094606182687341e-01_f32)
}

/// `sin(x)` via the companion degree-11 minimax polynomial.
pub fn approx_sin(x: f32) -> f32 {
    let x2 = x * x;
    ((((2.17326217498596729611e-06_f32 * x2 - 1.93162796407356830500e-04_f32) * x2
        + 8.31238887417884598346e-03_f32)
        * x2
        - 1.66632595072086745320e-01_f32)
        * x2
        + 9.99984594193494365437e-01_f32)
        * x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atan2_matches_std_within_tolerance() {
        let tol = 0.162_f32.to_radians();
        for &(y, x) in &[
            (1.0, 1.0),
            (1.0, -1.0),
            (-1.0, 1.0),
            (-1.0, -1.0),
            (0.3, 2.0),
            (5.0, 0.01),
            (0.0, 1.0),
            (1.0, 0.0),
        ] {
            let expected = y.atan2(x);
            let actual = approx_atan2(y, x);
            assert!(
                (expected - actual).abs() < tol,
                "atan2({y}, {x}): expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn atan2_zero_is_zero() {
        assert_eq!(approx_atan2(0.0, 0.0), 0.0);
    }

    #[test]
    fn sin_cos_match_std_within_tolerance() {
        let tol = 1e-4_f32;
        let mut x = -std::f32::consts::PI;
        while x <= std::f32::consts::PI {
            assert!((approx_sin(x) - x.sin()).abs() < tol, "sin({x})");
            assert!((approx_cos(x) - x.cos()).abs() < tol, "cos({x})");
            x += 0.1;
        }
    }

    #[test]
    fn sin_cos_identity_holds() {
        let x = 0.77_f32;
        let s = approx_sin(x);
        let c = approx_cos(x);
        assert!((s * s + c * c - 1.0).abs() < 1e-3);
    }
}
