//! Gaussian RBF kernel with median bandwidth
//!
//! The kernel used in the original "Stein Variational Gradient Descent"
//! paper by Liu and Wang: k(x, y) = exp(-||x - y||^2 / h) with h chosen by
//! the median heuristic each `compute` call.

use nalgebra::{DMatrix, DVector};

use crate::core::error::Result;
use crate::core::types::{
    default_bandwidth_factor, BandwidthFactor, KernelMode, KernelValue, LossFn, MatrixMode,
    ParticleInfo,
};
use crate::kernel::bandwidth::median_bandwidth;
use crate::kernel::traits::{KernelEval, SteinKernel};
use crate::math::safe_norm;

/// Gaussian RBF kernel.
///
/// Supports all three output modes. In matrix mode the result is always a
/// diagonal D x D matrix: either the scalar norm kernel times the identity
/// ([`MatrixMode::NormDiag`]) or the component-wise kernel vector on the
/// diagonal ([`MatrixMode::VectorDiag`]).
pub struct RBFKernel {
    mode: KernelMode,
    matrix_mode: MatrixMode,
    bandwidth_factor: BandwidthFactor,
}

impl RBFKernel {
    /// Create an RBF kernel with the given output mode, the default
    /// diagonal style and the default 1/ln(n) bandwidth factor.
    pub fn new(mode: KernelMode) -> Self {
        Self {
            mode,
            matrix_mode: MatrixMode::default(),
            bandwidth_factor: default_bandwidth_factor(),
        }
    }

    /// Set the diagonal style used in matrix mode.
    pub fn with_matrix_mode(mut self, matrix_mode: MatrixMode) -> Self {
        self.matrix_mode = matrix_mode;
        self
    }

    /// Replace the bandwidth factor, a multiplier on the squared median
    /// distance as a function of the ensemble size.
    pub fn with_bandwidth_factor<F>(mut self, factor: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.bandwidth_factor = Box::new(factor);
        self
    }

    /// The effective pairwise statistic is a scalar norm in norm mode and
    /// in the norm-diagonal matrix variant.
    fn normed(&self) -> bool {
        self.mode == KernelMode::Norm
            || (self.mode == KernelMode::Matrix && self.matrix_mode == MatrixMode::NormDiag)
    }
}

impl Default for RBFKernel {
    fn default() -> Self {
        Self::new(KernelMode::Norm)
    }
}

impl SteinKernel for RBFKernel {
    fn mode(&self) -> KernelMode {
        self.mode
    }

    fn compute(
        &self,
        particles: &DMatrix<f64>,
        _particle_info: &ParticleInfo,
        _loss_fn: &LossFn,
    ) -> Result<Box<dyn KernelEval>> {
        let bandwidth = median_bandwidth(particles, self.normed(), &self.bandwidth_factor)?;
        Ok(Box::new(RBFEval {
            mode: self.mode,
            normed: self.normed(),
            bandwidth,
        }))
    }
}

struct RBFEval {
    mode: KernelMode,
    normed: bool,
    bandwidth: DVector<f64>,
}

impl KernelEval for RBFEval {
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue {
        if self.normed {
            let dist = safe_norm(&(x - y));
            let k = (-dist * dist / self.bandwidth[0]).exp();
            match self.mode {
                KernelMode::Norm => KernelValue::Scalar(k),
                KernelMode::Matrix => KernelValue::Matrix(DMatrix::identity(x.len(), x.len()) * k),
                KernelMode::Vector => unreachable!("vector mode is never normed"),
            }
        } else {
            let diff = x - y;
            let k = diff.zip_map(&self.bandwidth, |d, h| (-d * d / h).exp());
            match self.mode {
                KernelMode::Vector => KernelValue::Vector(k),
                KernelMode::Matrix => KernelValue::Matrix(DMatrix::from_diagonal(&k)),
                KernelMode::Norm => unreachable!("norm mode is always normed"),
            }
        }
    }
}
