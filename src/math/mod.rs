//! Numeric leaf utilities shared by the kernel implementations
//!
//! Small, dependency-light routines: a zero-safe norm, symmetric matrix
//! square root, positive-definite repair, a stable softmax, a central
//! finite-difference Hessian and a Gaussian log-density through a
//! precomputed Cholesky factor.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use crate::core::error::{Result, SteinError};

/// L2 norm that returns exactly 0.0 for the zero vector.
pub fn safe_norm(v: &DVector<f64>) -> f64 {
    let norm_sq = v.norm_squared();
    if norm_sq == 0.0 {
        0.0
    } else {
        norm_sq.sqrt()
    }
}

/// Symmetric matrix square root via eigendecomposition. Eigenvalues are
/// clamped at zero before the square root, so mildly indefinite inputs
/// (curvature estimates near a saddle) produce a valid PSD root.
pub fn sqrth(m: &DMatrix<f64>) -> DMatrix<f64> {
    let eigen = m.clone().symmetric_eigen();
    let sqrt_vals = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
    &eigen.eigenvectors
        * DMatrix::from_diagonal(&sqrt_vals)
        * eigen.eigenvectors.transpose()
}

/// Positive-definite repair: floor the eigenvalues at `1e-5` and
/// recompose. Used before Cholesky-based Gaussian densities to guard
/// against numerical indefiniteness.
pub fn posdef(m: &DMatrix<f64>) -> DMatrix<f64> {
    let eigen = m.clone().symmetric_eigen();
    let vals = eigen.eigenvalues.map(|l| l.max(1e-5));
    &eigen.eigenvectors * DMatrix::from_diagonal(&vals) * eigen.eigenvectors.transpose()
}

/// Numerically stable softmax (max-shifted).
pub fn softmax(v: &DVector<f64>) -> DVector<f64> {
    let max = v.max();
    let exps = v.map(|x| (x - max).exp());
    let total: f64 = exps.sum();
    exps / total
}

/// Hessian of a scalar function by central finite differences,
/// symmetrized. `step` trades truncation against rounding error; 1e-4
/// works well for loss functions of order unity.
pub fn hessian(f: &dyn Fn(&DVector<f64>) -> f64, x: &DVector<f64>, step: f64) -> DMatrix<f64> {
    let d = x.len();
    let mut h = DMatrix::zeros(d, d);
    let f0 = f(x);
    for i in 0..d {
        let mut xp = x.clone();
        let mut xm = x.clone();
        xp[i] += step;
        xm[i] -= step;
        h[(i, i)] = (f(&xp) - 2.0 * f0 + f(&xm)) / (step * step);
        for j in (i + 1)..d {
            let mut xpp = x.clone();
            let mut xpm = x.clone();
            let mut xmp = x.clone();
            let mut xmm = x.clone();
            xpp[i] += step;
            xpp[j] += step;
            xpm[i] += step;
            xpm[j] -= step;
            xmp[i] -= step;
            xmp[j] += step;
            xmm[i] -= step;
            xmm[j] -= step;
            let v = (f(&xpp) - f(&xpm) - f(&xmp) + f(&xmm)) / (4.0 * step * step);
            h[(i, j)] = v;
            h[(j, i)] = v;
        }
    }
    h
}

/// Cholesky-factor a covariance matrix, surfacing failure as a named
/// error instead of an opaque numeric one.
pub fn try_cholesky(cov: DMatrix<f64>, index: usize) -> Result<Cholesky<f64, Dyn>> {
    Cholesky::new(cov).ok_or(SteinError::FactorizationFailed { index })
}

/// Multivariate normal log-density through a precomputed Cholesky factor
/// of the covariance.
pub fn gaussian_log_density(
    x: &DVector<f64>,
    mean: &DVector<f64>,
    chol: &Cholesky<f64, Dyn>,
) -> f64 {
    let d = x.len() as f64;
    let diff = x - mean;
    let solved = chol.solve(&diff);
    let maha = diff.dot(&solved);
    let log_det: f64 = chol.l().diagonal().iter().map(|v| v.ln()).sum::<f64>() * 2.0;
    -0.5 * (maha + log_det + d * (2.0 * std::f64::consts::PI).ln())
}

/// Write `values` into the columns `[start, end)` of a copy of
/// `template`, leaving all other entries fixed. The pure form of the
/// graphical kernel's partial application over one parameter block.
pub fn splice_block(
    template: &DVector<f64>,
    start: usize,
    end: usize,
    values: &DVector<f64>,
) -> DVector<f64> {
    let mut out = template.clone();
    out.rows_mut(start, end - start).copy_from(values);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_safe_norm_zero_vector() {
        let v = DVector::zeros(3);
        assert_eq!(safe_norm(&v), 0.0);
    }

    #[test]
    fn test_safe_norm_regular() {
        let v = DVector::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(safe_norm(&v), 5.0);
    }

    #[test]
    fn test_sqrth_recovers_root() {
        // m = [[4, 0], [0, 9]] has root [[2, 0], [0, 3]]
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![4.0, 9.0]));
        let root = sqrth(&m);
        assert_relative_eq!(root[(0, 0)], 2.0, epsilon = 1e-10);
        assert_relative_eq!(root[(1, 1)], 3.0, epsilon = 1e-10);
        assert_relative_eq!(root[(0, 1)], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_sqrth_squares_back() {
        let m = DMatrix::from_vec(2, 2, vec![2.0, 0.5, 0.5, 1.0]);
        let root = sqrth(&m);
        let back = &root * &root;
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(back[(i, j)], m[(i, j)], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_sqrth_clamps_negative_eigenvalues() {
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![-1.0, 4.0]));
        let root = sqrth(&m);
        assert_relative_eq!(root[(0, 0)], 0.0, epsilon = 1e-10);
        assert_relative_eq!(root[(1, 1)], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_posdef_floors_eigenvalues() {
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![-3.0, 2.0]));
        let repaired = posdef(&m);
        assert_relative_eq!(repaired[(0, 0)], 1e-5, epsilon = 1e-12);
        assert_relative_eq!(repaired[(1, 1)], 2.0, epsilon = 1e-10);
        assert!(Cholesky::new(repaired).is_some());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let s = softmax(&v);
        assert_relative_eq!(s.sum(), 1.0, epsilon = 1e-12);
        assert!(s[2] > s[1] && s[1] > s[0]);
    }

    #[test]
    fn test_softmax_large_values_stable() {
        let v = DVector::from_vec(vec![1000.0, 1001.0]);
        let s = softmax(&v);
        assert!(s.iter().all(|x| x.is_finite()));
        assert_relative_eq!(s.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hessian_of_quadratic() {
        // f(x) = x0^2 + 3*x0*x1 + 2*x1^2 has Hessian [[2, 3], [3, 4]]
        let f = |x: &DVector<f64>| x[0] * x[0] + 3.0 * x[0] * x[1] + 2.0 * x[1] * x[1];
        let x = DVector::from_vec(vec![0.7, -1.3]);
        let h = hessian(&f, &x, 1e-4);
        assert_relative_eq!(h[(0, 0)], 2.0, epsilon = 1e-4);
        assert_relative_eq!(h[(0, 1)], 3.0, epsilon = 1e-4);
        assert_relative_eq!(h[(1, 0)], 3.0, epsilon = 1e-4);
        assert_relative_eq!(h[(1, 1)], 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_gaussian_log_density_standard_normal() {
        let chol = Cholesky::new(DMatrix::identity(2, 2)).unwrap();
        let mean = DVector::zeros(2);
        let x = DVector::zeros(2);
        let expected = -(2.0 * std::f64::consts::PI).ln();
        assert_relative_eq!(
            gaussian_log_density(&x, &mean, &chol),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_splice_block() {
        let template = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let block = DVector::from_vec(vec![9.0, 8.0]);
        let out = splice_block(&template, 1, 3, &block);
        assert_eq!(out, DVector::from_vec(vec![1.0, 9.0, 8.0, 4.0]));
    }
}
