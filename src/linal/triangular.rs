//! Upper-triangular flat-array storage for square-root covariance
//! factors, plus Cholesky factorization and triangular solve/inverse.
//!
//! Index mapping (from `fsnav.h`'s comment on `fsnav_linal_u_ij2k`):
//! for `i <= j`, element `(i, j)` of an `n x n` upper-triangular matrix
//! lives at flat index `k = j*(j+1)/2 + i`. A flat array of this kind
//! has `n*(n+1)/2` elements.

/// `(i, j)` with `i <= j` -> flat index.
pub fn u_ij2k(i: usize, j: usize) -> usize {
    debug_assert!(i <= j);
    j * (j + 1) / 2 + i
}

/// flat index -> `(i, j)` with `i <= j`.
pub fn u_k2ij(k: usize) -> (usize, usize) {
    // j is the largest integer with j*(j+1)/2 <= k
    let mut j = 0usize;
    while (j + 1) * (j + 2) / 2 <= k {
        j += 1;
    }
    let i = k - j * (j + 1) / 2;
    (i, j)
}

pub fn packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Upper-triangular Cholesky factor of a symmetric positive
/// (semi-)definite dense matrix `p` (row-major `n x n`), returned in
/// packed upper-triangular form such that `p = s * s^T`. Processes
/// diagonal entries from the last row/column down to the first — the
/// mirror image of textbook Cholesky, which is what turns an
/// upper-triangular factor into one that multiplies on the right of its
/// own transpose instead of the left. Returns `None` if `p` is not
/// positive definite to working precision — callers treat this the same
/// way the original treats any other numeric degeneracy: skip the
/// update, keep the previous factor.
pub fn cholesky_upper(p: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut s = vec![0.0; packed_len(n)];
    for j in (0..n).rev() {
        let mut d = p[j * n + j];
        for k in (j + 1)..n {
            let sjk = s[u_ij2k(j, k)];
            d -= sjk * sjk;
        }
        if d <= 0.0 {
            return None;
        }
        let sjj = d.sqrt();
        s[u_ij2k(j, j)] = sjj;
        for i in (0..j).rev() {
            let mut v = p[i * n + j];
            for k in (j + 1)..n {
                v -= s[u_ij2k(i, k)] * s[u_ij2k(j, k)];
            }
            s[u_ij2k(i, j)] = v / sjj;
        }
    }
    Some(s)
}

/// `U * v` for packed upper-triangular `u` (`n x n`) and vector `v`.
pub fn u_mul_vec(u: &[f64], v: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for i in 0..n {
        let mut acc = 0.0;
        for j in i..n {
            acc += u[u_ij2k(i, j)] * v[j];
        }
        out[i] = acc;
    }
    out
}

/// `U^T * v` for packed upper-triangular `u` (`n x n`) and vector `v`.
pub fn ut_mul_vec(u: &[f64], v: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for i in 0..n {
        let mut acc = 0.0;
        for j in 0..=i {
            acc += u[u_ij2k(j, i)] * v[j];
        }
        out[i] = acc;
    }
    out
}

/// Inverts a packed upper-triangular `n x n` matrix by back-substitution.
/// Fails (returns `None`) if any diagonal element is non-positive, the
/// same degeneracy Cholesky reports — callers treat it as a skip, not a
/// panic.
pub fn invert_upper(u: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut inv = vec![0.0; packed_len(n)];
    for j in 0..n {
        let ujj = u[u_ij2k(j, j)];
        if ujj <= 0.0 {
            return None;
        }
        inv[u_ij2k(j, j)] = 1.0 / ujj;
        for i in (0..j).rev() {
            let mut acc = 0.0;
            for k in (i + 1)..=j {
                acc += u[u_ij2k(i, k)] * inv[u_ij2k(k, j)];
            }
            inv[u_ij2k(i, j)] = -acc / u[u_ij2k(i, i)];
        }
    }
    Some(inv)
}

/// Expands a packed upper-triangular factor back into a dense row-major
/// `n x n` matrix (zeros below the diagonal).
pub fn unpack_upper(s: &[f64], n: usize) -> Vec<f64> {
    let mut m = vec![0.0; n * n];
    for j in 0..n {
        for i in 0..=j {
            m[i * n + j] = s[u_ij2k(i, j)];
        }
    }
    m
}

/// Reconstructs the dense covariance `p = s * s^T` from its packed
/// upper-triangular square-root factor.
pub fn reconstruct_covariance(s: &[f64], n: usize) -> Vec<f64> {
    let dense = unpack_upper(s, n);
    let mut p = vec![0.0; n * n];
    for r in 0..n {
        for c in 0..n {
            let mut acc = 0.0;
            for k in 0..n {
                acc += dense[r * n + k] * dense[c * n + k];
            }
            p[r * n + c] = acc;
        }
    }
    p
}
