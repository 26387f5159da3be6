//! Dense linear-algebra helpers for small statistics matrices
//!
//! Learners in this workspace manipulate matrices whose side is the number
//! of function-approximation parameters, typically a few dozen. Everything
//! here is a straightforward dense routine on `ndarray` types; there is no
//! BLAS/LAPACK dependency.

use ndarray::{Array1, Array2, ArrayView1};

use crate::{Result, RlError};

/// Pivots below this magnitude are treated as exactly singular.
const PIVOT_FLOOR: f64 = 1e-12;

/// Denominator floor below which a rank-one inverse update is refused.
const DEGENERACY_FLOOR: f64 = 1e-12;

/// Outcome of a rank-one inverse update.
///
/// Numerical degeneracy is an expected, recoverable event: the caller skips
/// the update for the offending sample and continues with the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOneUpdate {
    /// The inverse was updated in place
    Applied,
    /// The update denominator vanished; the inverse is untouched
    Degenerate,
}

impl RankOneUpdate {
    /// Whether the update was applied
    #[must_use]
    pub fn applied(self) -> bool {
        matches!(self, RankOneUpdate::Applied)
    }
}

/// Outer product `u * v^T`
#[must_use]
pub fn outer(u: ArrayView1<f64>, v: ArrayView1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((u.len(), v.len()), |(i, j)| u[i] * v[j])
}

/// Sherman-Morrison update of a matrix inverse under the rank-one
/// perturbation `A + u*v^T`:
///
/// `Ainv <- Ainv - (Ainv*u)(v^T*Ainv) / (1 + v^T*Ainv*u)`
///
/// Returns [`RankOneUpdate::Degenerate`] and leaves `ainv` unmodified when
/// the denominator `1 + v^T*Ainv*u` is numerically zero.
pub fn sherman_morrison(
    ainv: &mut Array2<f64>,
    u: ArrayView1<f64>,
    v: ArrayView1<f64>,
) -> RankOneUpdate {
    debug_assert_eq!(ainv.nrows(), ainv.ncols());
    debug_assert_eq!(u.len(), ainv.nrows());
    debug_assert_eq!(v.len(), ainv.nrows());

    let ainv_u = ainv.dot(&u);
    let vt_ainv = ainv.t().dot(&v);
    let denom = 1.0 + v.dot(&ainv_u);
    if denom.abs() < DEGENERACY_FLOOR {
        tracing::debug!(denom, "rank-one inverse update denominator vanished");
        return RankOneUpdate::Degenerate;
    }
    let n = ainv.nrows();
    for i in 0..n {
        for j in 0..n {
            ainv[[i, j]] -= ainv_u[i] * vt_ainv[j] / denom;
        }
    }
    RankOneUpdate::Applied
}

/// LU factorization with partial pivoting. Returns the packed LU matrix and
/// the row permutation.
fn lu_factor(a: &Array2<f64>) -> Result<(Array2<f64>, Vec<usize>)> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(RlError::DimensionMismatch {
            expected: n,
            actual: a.ncols(),
        });
    }
    let mut lu = a.clone();
    let mut perm: Vec<usize> = (0..n).collect();
    for k in 0..n {
        // Pick the largest pivot in the remaining column
        let mut p = k;
        let mut best = lu[[k, k]].abs();
        for i in (k + 1)..n {
            let cand = lu[[i, k]].abs();
            if cand > best {
                best = cand;
                p = i;
            }
        }
        if best < PIVOT_FLOOR {
            return Err(RlError::Singular(format!(
                "zero pivot at column {k} of a {n}x{n} system"
            )));
        }
        if p != k {
            perm.swap(k, p);
            for j in 0..n {
                let tmp = lu[[k, j]];
                lu[[k, j]] = lu[[p, j]];
                lu[[p, j]] = tmp;
            }
        }
        for i in (k + 1)..n {
            let factor = lu[[i, k]] / lu[[k, k]];
            lu[[i, k]] = factor;
            for j in (k + 1)..n {
                lu[[i, j]] -= factor * lu[[k, j]];
            }
        }
    }
    Ok((lu, perm))
}

/// Back/forward substitution against a packed LU factorization.
fn lu_solve(lu: &Array2<f64>, perm: &[usize], b: ArrayView1<f64>) -> Array1<f64> {
    let n = lu.nrows();
    let mut x = Array1::zeros(n);
    // Forward: L*y = P*b
    for i in 0..n {
        let mut sum = b[perm[i]];
        for j in 0..i {
            sum -= lu[[i, j]] * x[j];
        }
        x[i] = sum;
    }
    // Backward: U*x = y
    for i in (0..n).rev() {
        let mut sum = x[i];
        for j in (i + 1)..n {
            sum -= lu[[i, j]] * x[j];
        }
        x[i] = sum / lu[[i, i]];
    }
    x
}

/// Solve the square linear system `A*x = b` by LU with partial pivoting
pub fn solve(a: &Array2<f64>, b: ArrayView1<f64>) -> Result<Array1<f64>> {
    if b.len() != a.nrows() {
        return Err(RlError::DimensionMismatch {
            expected: a.nrows(),
            actual: b.len(),
        });
    }
    let (lu, perm) = lu_factor(a)?;
    Ok(lu_solve(&lu, &perm, b))
}

/// Invert a square matrix by LU with partial pivoting
pub fn inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let (lu, perm) = lu_factor(a)?;
    let mut inv = Array2::zeros((n, n));
    let mut e = Array1::zeros(n);
    for j in 0..n {
        e.fill(0.0);
        e[j] = 1.0;
        let col = lu_solve(&lu, &perm, e.view());
        for i in 0..n {
            inv[[i, j]] = col[i];
        }
    }
    Ok(inv)
}

/// Least-squares pseudo-inverse through the normal equations.
///
/// For a full-column-rank `m x n` matrix (`m >= n`) this is
/// `(A^T A)^-1 A^T`; for `m < n` the transposed identity
/// `A^T (A A^T)^-1` is used. Rank deficiency surfaces as
/// [`RlError::Singular`].
pub fn pinv(a: &Array2<f64>) -> Result<Array2<f64>> {
    if a.nrows() >= a.ncols() {
        let gram = a.t().dot(a);
        Ok(inverse(&gram)?.dot(&a.t()))
    } else {
        let gram = a.dot(&a.t());
        Ok(a.t().dot(&inverse(&gram)?))
    }
}

/// Cholesky decomposition of a symmetric positive-definite matrix.
///
/// Returns the lower-triangular factor `L` with `L*L^T = A`.
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(RlError::DimensionMismatch {
            expected: n,
            actual: a.ncols(),
        });
    }
    let mut l: Array2<f64> = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(RlError::Singular(format!(
                        "matrix is not positive definite at row {i}"
                    )));
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array1, Array2};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn solves_known_system() {
        let a = arr2(&[[2.0, 1.0], [1.0, 3.0]]);
        let b = arr1(&[5.0, 10.0]);
        let x = solve(&a, b.view()).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn solve_requires_pivoting() {
        // Zero leading pivot forces a row swap
        let a = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        let b = arr1(&[2.0, 3.0]);
        let x = solve(&a, b.view()).unwrap();
        assert_abs_diff_eq!(x[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_system_is_an_error() {
        let a = arr2(&[[1.0, 2.0], [2.0, 4.0]]);
        assert!(solve(&a, arr1(&[1.0, 2.0]).view()).is_err());
        assert!(inverse(&a).is_err());
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let a = arr2(&[[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]]);
        let inv = inverse(&a).unwrap();
        let id = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(id[[i, j]], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn pinv_is_left_inverse_of_tall_matrix() {
        let a = arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let p = pinv(&a).unwrap();
        let id = p.dot(&a);
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(id[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn cholesky_factor_reconstructs_input() {
        let a = arr2(&[[4.0, 2.0, 0.0], [2.0, 5.0, 1.0], [0.0, 1.0, 3.0]]);
        let l = cholesky(&a).unwrap();
        let back = l.dot(&l.t());
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(back[[i, j]], a[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn cholesky_rejects_indefinite_input() {
        let a = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(cholesky(&a).is_err());
    }

    #[test]
    fn sherman_morrison_matches_direct_inverse() {
        let a = arr2(&[[5.0, 1.0], [2.0, 4.0]]);
        let u = arr1(&[0.3, -0.7]);
        let v = arr1(&[0.5, 0.2]);
        let mut ainv = inverse(&a).unwrap();
        assert!(sherman_morrison(&mut ainv, u.view(), v.view()).applied());
        let direct = inverse(&(&a + &outer(u.view(), v.view()))).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(ainv[[i, j]], direct[[i, j]], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn degenerate_update_leaves_inverse_untouched() {
        // u*v^T = -I makes A + u*v^T singular for A = I
        let mut ainv: Array2<f64> = Array2::eye(1);
        let u = arr1(&[1.0]);
        let v = arr1(&[-1.0]);
        let before = ainv.clone();
        assert_eq!(
            sherman_morrison(&mut ainv, u.view(), v.view()),
            RankOneUpdate::Degenerate
        );
        assert_eq!(ainv, before);
    }

    proptest! {
        #[test]
        fn incremental_inverse_tracks_rank_one_perturbations(
            n in 2usize..5,
            seed in any::<u64>(),
        ) {
            use rand::{Rng, SeedableRng};
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            // Diagonally dominant seed matrices stay well conditioned under
            // small rank-one perturbations.
            let mut a = Array2::from_shape_fn((n, n), |_| rng.gen_range(-1.0..1.0));
            for i in 0..n {
                a[[i, i]] += 10.0 * n as f64;
            }
            let u = Array1::from_shape_fn(n, |_| rng.gen_range(-1.0..1.0));
            let v = Array1::from_shape_fn(n, |_| rng.gen_range(-1.0..1.0));

            let mut ainv = inverse(&a).unwrap();
            prop_assert!(sherman_morrison(&mut ainv, u.view(), v.view()).applied());
            let direct = inverse(&(&a + &outer(u.view(), v.view()))).unwrap();
            for i in 0..n {
                for j in 0..n {
                    prop_assert!((ainv[[i, j]] - direct[[i, j]]).abs() < 1e-10);
                }
            }
        }
    }
}
