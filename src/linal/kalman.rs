//! Square-root Kalman filter primitives operating on the packed
//! upper-triangular factor `s` (`p = s * s^T`) from `triangular.rs`.
//!
//! `scalar_update` is Carlson's triangular square-root update for a
//! single scalar observation — the primitive the vertical damping stage
//! uses repeatedly (zero-velocity pseudo-measurement, altitude
//! differencing, air-data vertical velocity). `predict` is a time
//! update that injects additive process noise by re-triangularizing an
//! augmented array via Givens rotations, the standard way to keep a
//! square-root filter numerically in factor form rather than forming
//! and refactoring the full covariance every step.

use super::triangular::u_ij2k;

/// Sequential scalar measurement update.
///
/// `y`: state vector, updated in place.
/// `s`: packed upper-triangular square-root factor, updated in place.
/// `h`: measurement row vector (same length as `y`).
/// `z`: observed scalar.
/// `sigma`: measurement noise standard deviation.
///
/// Returns the innovation (`z - h^T y`) used for this update.
pub fn scalar_update(y: &mut [f64], s: &mut [f64], h: &[f64], z: f64, sigma: f64) -> f64 {
    let n = y.len();
    let mut b = vec![0.0; n];
    let mut alpha = sigma * sigma;

    for j in 0..n {
        let mut f_j = 0.0;
        for i in 0..=j {
            f_j += s[u_ij2k(i, j)] * h[i];
        }
        let alpha_prev = alpha;
        alpha += f_j * f_j;
        let gamma = (alpha_prev * alpha).sqrt();
        let (eta, zeta) = if gamma > 0.0 {
            (f_j / gamma, alpha_prev / gamma)
        } else {
            (0.0, 1.0)
        };
        for i in 0..=j {
            let idx = u_ij2k(i, j);
            let s_old = s[idx];
            s[idx] = zeta * s_old - eta * b[i];
            b[i] += f_j * s_old;
        }
    }

    let k: Vec<f64> = b.iter().map(|bi| bi / alpha).collect();
    let residual = z - super::dotn(h, y);
    for i in 0..n {
        y[i] += k[i] * residual;
    }
    residual
}

/// Residual gate: accepts a scalar measurement iff its innovation falls
/// within `k` standard deviations of the predicted innovation variance
/// `h^T P h + sigma^2`. `s` is the prior packed upper-triangular factor
/// (`p = s^T s`), never mutated — this is a read-only test, distinct
/// from `scalar_update` which commits the correction.
pub fn residual_gate(x: &[f64], s: &[f64], z: f64, h: &[f64], sigma: f64, k: f64) -> bool {
    let n = x.len();
    let innovation = z - super::dotn(h, x);
    let mut f = vec![0.0; n];
    for j in 0..n {
        for i in 0..=j {
            f[j] += s[u_ij2k(i, j)] * h[i];
        }
    }
    let h_p_h: f64 = f.iter().map(|v| v * v).sum();
    innovation * innovation <= k * k * (h_p_h + sigma * sigma)
}

/// Re-triangularizes `dense` (an `n x n` factor, upper part populated)
/// against an independent noise factor `noise` (same shape) via
/// successive Givens rotations, leaving `dense` holding the combined
/// upper-triangular square root with `noise` driven to zero. Shared
/// core of every `predict_*` flavor below.
fn retriangularize(dense: &mut [f64], noise: &mut [f64], n: usize) {
    for col in 0..n {
        for row in 0..n {
            let a = dense[row * n + col];
            let b = noise[row * n + col];
            if b == 0.0 {
                continue;
            }
            let r = a.hypot(b);
            if r == 0.0 {
                continue;
            }
            let (c, sgn) = (a / r, b / r);
            for k in col..n {
                let d = dense[row * n + k];
                let nn = noise[row * n + k];
                dense[row * n + k] = c * d + sgn * nn;
                noise[row * n + k] = -sgn * d + c * nn;
            }
        }
    }
}

fn dense_from_packed(s: &[f64], n: usize) -> Vec<f64> {
    super::triangular::unpack_upper(s, n)
}

fn packed_from_dense(dense: &[f64], s: &mut [f64], n: usize) {
    for j in 0..n {
        for i in 0..=j {
            s[u_ij2k(i, j)] = dense[i * n + j];
        }
    }
}

/// Identity state transition (`x` unchanged), scalar process noise
/// applied uniformly to every state — the cheapest predict flavor, used
/// when every component of the state drifts at the same rate.
pub fn predict_identity_scalar(s: &mut [f64], n: usize, q_scalar: f64) {
    predict_identity_diagonal(s, &vec![q_scalar; n]);
}

/// Identity state transition, scalar process noise applied to a reduced
/// rank of the state (the leading `rank` components) — for filters
/// where only a subset of the state is driven by white process noise
/// each tick (e.g. velocity but not position).
pub fn predict_identity_reduced_rank(s: &mut [f64], n: usize, q_scalar: f64, rank: usize) {
    let mut q = vec![0.0; n];
    for v in q.iter_mut().take(rank.min(n)) {
        *v = q_scalar;
    }
    predict_identity_diagonal(s, &q);
}

/// Identity state transition, independent (diagonal) process noise:
/// `s <- triangularize([s; diag(q_sqrt)])`.
pub fn predict_identity_diagonal(s: &mut [f64], q_sqrt: &[f64]) {
    let n = q_sqrt.len();
    let mut dense = dense_from_packed(s, n);
    let mut noise = vec![0.0; n * n];
    for i in 0..n {
        noise[i * n + i] = q_sqrt[i];
    }
    retriangularize(&mut dense, &mut noise, n);
    packed_from_dense(&dense, s, n);
}

/// Upper-triangular state transition `Phi`, diagonal process noise:
/// `s <- triangularize([Phi*S; diag(q_sqrt)])`.
pub fn predict_transition_diagonal(s: &mut [f64], n: usize, phi_upper: &[f64], q_sqrt: &[f64]) {
    let phi_dense = dense_from_packed(phi_upper, n);
    let s_dense = dense_from_packed(s, n);
    let mut transitioned = vec![0.0; n * n];
    for r in 0..n {
        for c in 0..n {
            let mut acc = 0.0;
            for k in 0..n {
                acc += phi_dense[r * n + k] * s_dense[k * n + c];
            }
            transitioned[r * n + c] = acc;
        }
    }
    let mut noise = vec![0.0; n * n];
    for i in 0..n {
        noise[i * n + i] = q_sqrt[i];
    }
    retriangularize(&mut transitioned, &mut noise, n);
    packed_from_dense(&transitioned, s, n);
}

/// Upper-triangular state transition `Phi`, full upper-triangular
/// square-root process noise `q_sqrt` (packed): the most general
/// flavor, used when process noise is correlated across states.
pub fn predict_transition_full(s: &mut [f64], n: usize, phi_upper: &[f64], q_sqrt_upper: &[f64]) {
    let phi_dense = dense_from_packed(phi_upper, n);
    let s_dense = dense_from_packed(s, n);
    let mut transitioned = vec![0.0; n * n];
    for r in 0..n {
        for c in 0..n {
            let mut acc = 0.0;
            for k in 0..n {
                acc += phi_dense[r * n + k] * s_dense[k * n + c];
            }
            transitioned[r * n + c] = acc;
        }
    }
    let mut noise = dense_from_packed(q_sqrt_upper, n);
    retriangularize(&mut transitioned, &mut noise, n);
    packed_from_dense(&transitioned, s, n);
}
