//! Small dense symmetric solvers used by the per-feature fits
//!
//! Designs here are a handful of columns wide. A non-positive pivot is
//! reported as singular, never patched with a diagonal epsilon.

use ndarray::{Array1, Array2};

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix.
///
/// Returns `None` when any pivot falls to or below `rel_tol` times the
/// corresponding original diagonal entry (numerical rank deficiency).
pub fn cholesky(a: &Array2<f64>, rel_tol: f64) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let scale = a[[i, i]].abs().max(f64::MIN_POSITIVE);
                if !sum.is_finite() || sum <= rel_tol * scale {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Whether `values` are constant up to rounding: the centred sum of squares
/// is at most `rel_tol` times the uncentred one. All zeros (or no values)
/// count as constant.
pub fn negligible_spread(values: &[f64], rel_tol: f64) -> bool {
    if values.is_empty() {
        return true;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let centered: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    let raw: f64 = values.iter().map(|v| v * v).sum();
    raw == 0.0 || centered <= rel_tol * raw
}

/// Solve `L L' x = b` given the Cholesky factor `L`.
pub fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * y[j];
        }
        y[i] = sum / l[[i, i]];
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[[j, i]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Inverse of `L L'` given the Cholesky factor `L`.
pub fn cholesky_inverse(l: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut inv = Array2::<f64>::zeros((n, n));
    for col in 0..n {
        let mut e = Array1::<f64>::zeros(n);
        e[col] = 1.0;
        let x = cholesky_solve(l, &e);
        inv.column_mut(col).assign(&x);
    }
    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_and_inverse() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky(&a, 1e-12).unwrap();

        let x = cholesky_solve(&l, &array![2.0, 1.0]);
        // 4x + 2y = 2, 2x + 3y = 1 -> x = 0.5, y = 0
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);

        let inv = cholesky_inverse(&l);
        let eye = a.dot(&inv);
        assert!((eye[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(eye[[0, 1]].abs() < 1e-12);
        assert!((eye[[1, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_detected() {
        // second column is twice the first
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(cholesky(&a, 1e-10).is_none());

        let zero = array![[0.0]];
        assert!(cholesky(&zero, 1e-10).is_none());
    }

    #[test]
    fn test_negligible_spread() {
        assert!(negligible_spread(&[3.0, 3.0, 3.0], 1e-10));
        assert!(negligible_spread(&[0.0, 0.0], 1e-10));
        assert!(negligible_spread(&[], 1e-10));
        // 0.1 + 0.2 differs from 0.3 in the last bit only
        assert!(negligible_spread(&[0.3, 0.1 + 0.2, 0.3, 0.1 + 0.2], 1e-10));
        assert!(!negligible_spread(&[1.0, 2.0, 3.0], 1e-10));
        assert!(!negligible_spread(&[1000.0, 1000.5, 999.5], 1e-10));
    }
}
