//! Dense vector/matrix kernel and attitude-representation conversions.
//!
//! Ported in meaning (not translated literally) from the function
//! declarations in `fsnav.h`: dot/norm/cross products, 3x3 matrix
//! multiply variants, and the Rodrigues-formula Euler-vector <-> matrix
//! conversion with a Taylor-safe small-angle branch.

pub mod kalman;
pub mod triangular;

pub use triangular::{u_ij2k, u_k2ij};

/// Below this rotation magnitude, `eul2mat` switches to a Taylor series
/// for `sin(x)/x` and `(1-cos(x))/x^2` to avoid cancellation.
pub const SMALL_ANGLE: f64 = 1.0 / 256.0; // 2^-8

pub fn dot3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm3(a: &[f64; 3]) -> f64 {
    dot3(a, a).sqrt()
}

pub fn cross3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn dotn(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// 3x3 matrix multiply, row-major flat storage: `c = a*b`.
pub fn mmul3(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut c = [0.0; 9];
    for r in 0..3 {
        for col in 0..3 {
            let mut s = 0.0;
            for k in 0..3 {
                s += a[r * 3 + k] * b[k * 3 + col];
            }
            c[r * 3 + col] = s;
        }
    }
    c
}

/// `c = a^T * b`
pub fn mmul3_1t(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut c = [0.0; 9];
    for r in 0..3 {
        for col in 0..3 {
            let mut s = 0.0;
            for k in 0..3 {
                s += a[k * 3 + r] * b[k * 3 + col];
            }
            c[r * 3 + col] = s;
        }
    }
    c
}

/// `c = a * b^T`
pub fn mmul3_2t(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut c = [0.0; 9];
    for r in 0..3 {
        for col in 0..3 {
            let mut s = 0.0;
            for k in 0..3 {
                s += a[r * 3 + k] * b[col * 3 + k];
            }
            c[r * 3 + col] = s;
        }
    }
    c
}

pub fn mat3_vmul(m: &[f64; 9], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

/// `v^T * m`, i.e. multiply by the transpose of `m`.
pub fn mat3_vmul_t(m: &[f64; 9], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[3] * v[1] + m[6] * v[2],
        m[1] * v[0] + m[4] * v[1] + m[7] * v[2],
        m[2] * v[0] + m[5] * v[1] + m[8] * v[2],
    ]
}

/// Rodrigues' rotation formula: builds the rotation matrix corresponding
/// to Euler rotation vector `e` (`|e|` is the rotation angle, `e/|e|`
/// the axis):
///
/// `C = I + [e x] * sin(|e|)/|e| + [e x]^2 * (1-cos(|e|))/|e|^2`
///
/// Uses Taylor expansions of the two scalar coefficients for
/// `|e| < SMALL_ANGLE` so the formula stays well-defined as `e -> 0`.
pub fn eul2mat(e: &[f64; 3]) -> [f64; 9] {
    let angle = norm3(e);
    let (s_over_a, c_over_a2) = if angle < SMALL_ANGLE {
        let a2 = angle * angle;
        (
            1.0 - a2 / 6.0 + a2 * a2 / 120.0,
            0.5 - a2 / 24.0 + a2 * a2 / 720.0,
        )
    } else {
        (angle.sin() / angle, (1.0 - angle.cos()) / (angle * angle))
    };

    let skew = [
        0.0, -e[2], e[1], //
        e[2], 0.0, -e[0], //
        -e[1], e[0], 0.0,
    ];
    let skew2 = mmul3(&skew, &skew);

    let mut c = [0.0; 9];
    for i in 0..9 {
        c[i] = (if i % 4 == 0 { 1.0 } else { 0.0 }) + s_over_a * skew[i] + c_over_a2 * skew2[i];
    }
    c
}

/// Direction cosine matrix -> attitude quaternion (w, x, y, z), via the
/// standard trace-based (Shepperd) branch selection for numerical
/// stability away from the trace's sign changes.
pub fn mat2quat(l: &[f64; 9]) -> [f64; 4] {
    let trace = l[0] + l[4] + l[8];
    if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        [
            0.25 * s,
            (l[7] - l[5]) / s,
            (l[2] - l[6]) / s,
            (l[3] - l[1]) / s,
        ]
    } else if l[0] > l[4] && l[0] > l[8] {
        let s = (1.0 + l[0] - l[4] - l[8]).sqrt() * 2.0;
        [(l[7] - l[5]) / s, 0.25 * s, (l[1] + l[3]) / s, (l[2] + l[6]) / s]
    } else if l[4] > l[8] {
        let s = (1.0 + l[4] - l[0] - l[8]).sqrt() * 2.0;
        [(l[2] - l[6]) / s, (l[1] + l[3]) / s, 0.25 * s, (l[5] + l[7]) / s]
    } else {
        let s = (1.0 + l[8] - l[0] - l[4]).sqrt() * 2.0;
        [(l[3] - l[1]) / s, (l[2] + l[6]) / s, (l[5] + l[7]) / s, 0.25 * s]
    }
}

/// Attitude quaternion -> roll/pitch/heading, rad. `L = I` (identity
/// attitude) corresponds to `q = (1,0,0,0)` and yields
/// `rpy = (-pi/2, 0, +pi/2)`, matching the bus's initial solution.
pub fn quat2rpy(q: &[f64; 4]) -> [f64; 3] {
    let (q0, q1, q2, q3) = (q[0], q[1], q[2], q[3]);
    let pitch = (2.0 * (q0 * q2 - q3 * q1)).clamp(-1.0, 1.0).asin();
    let roll = (2.0 * (q0 * q1 + q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2))
        - std::f64::consts::FRAC_PI_2;
    let heading = (2.0 * (q0 * q3 + q1 * q2)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3))
        + std::f64::consts::FRAC_PI_2;
    [roll, pitch, heading]
}

pub fn mat2rpy(l: &[f64; 9]) -> [f64; 3] {
    quat2rpy(&mat2quat(l))
}

/// Attitude quaternion -> direction cosine matrix (inverse of `mat2quat`).
pub fn quat2mat(q: &[f64; 4]) -> [f64; 9] {
    let (q0, q1, q2, q3) = (q[0], q[1], q[2], q[3]);
    [
        1.0 - 2.0 * (q2 * q2 + q3 * q3),
        2.0 * (q1 * q2 - q0 * q3),
        2.0 * (q1 * q3 + q0 * q2),
        2.0 * (q1 * q2 + q0 * q3),
        1.0 - 2.0 * (q1 * q1 + q3 * q3),
        2.0 * (q2 * q3 - q0 * q1),
        2.0 * (q1 * q3 - q0 * q2),
        2.0 * (q2 * q3 + q0 * q1),
        1.0 - 2.0 * (q1 * q1 + q2 * q2),
    ]
}

/// Hamilton product `a ⊗ b` for quaternions `(w, x, y, z)`.
pub fn quat_mul(a: &[f64; 4], b: &[f64; 4]) -> [f64; 4] {
    [
        a[0] * b[0] - a[1] * b[1] - a[2] * b[2] - a[3] * b[3],
        a[0] * b[1] + a[1] * b[0] + a[2] * b[3] - a[3] * b[2],
        a[0] * b[2] - a[1] * b[3] + a[2] * b[0] + a[3] * b[1],
        a[0] * b[3] + a[1] * b[2] - a[2] * b[1] + a[3] * b[0],
    ]
}

/// Inverse of `quat2rpy`: builds the attitude quaternion whose roll,
/// pitch, heading (rad) match `rpy`. `rpy2quat(&[-pi/2, 0, pi/2])`
/// returns the identity quaternion, matching the bus's initial
/// solution.
pub fn rpy2quat(rpy: &[f64; 3]) -> [f64; 4] {
    let roll = rpy[0] + std::f64::consts::FRAC_PI_2;
    let pitch = rpy[1];
    let heading = rpy[2] - std::f64::consts::FRAC_PI_2;

    let (sr, cr) = (roll / 2.0).sin_cos();
    let (sp, cp) = (pitch / 2.0).sin_cos();
    let (sy, cy) = (heading / 2.0).sin_cos();

    [
        cr * cp * cy + sr * sp * sy,
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
    ]
}

pub fn quat_normalize(q: &mut [f64; 4]) {
    let n = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if n > 0.0 {
        for v in q.iter_mut() {
            *v /= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn eul2mat_identity_at_zero() {
        let c = eul2mat(&[0.0, 0.0, 0.0]);
        assert_eq!(c, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn eul2mat_small_angle_matches_exact() {
        let e = [1e-4, -2e-4, 3e-5];
        let small = eul2mat(&e);
        let angle = norm3(&e);
        assert!(angle < SMALL_ANGLE);
        // direct non-Taylor evaluation for comparison
        let s_over_a = angle.sin() / angle;
        let c_over_a2 = (1.0 - angle.cos()) / (angle * angle);
        let skew = [0.0, -e[2], e[1], e[2], 0.0, -e[0], -e[1], e[0], 0.0];
        let skew2 = mmul3(&skew, &skew);
        let mut exact = [0.0; 9];
        for i in 0..9 {
            exact[i] =
                (if i % 4 == 0 { 1.0 } else { 0.0 }) + s_over_a * skew[i] + c_over_a2 * skew2[i];
        }
        for i in 0..9 {
            assert_relative_eq!(small[i], exact[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn identity_matrix_round_trips_to_documented_rpy() {
        let l = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let q = mat2quat(&l);
        assert_relative_eq!(q[0], 1.0, epsilon = 1e-12);
        let rpy = mat2rpy(&l);
        assert_relative_eq!(rpy[0], -std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(rpy[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(rpy[2], std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn mmul3_1t_matches_manual_transpose_multiply() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let b = [9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let got = mmul3_1t(&a, &b);
        // a^T row r, col c = a[c*3+r]... validate one entry by hand
        let mut at = [0.0; 9];
        for r in 0..3 {
            for c in 0..3 {
                at[r * 3 + c] = a[c * 3 + r];
            }
        }
        let want = mmul3(&at, &b);
        assert_eq!(got, want);
    }
}
