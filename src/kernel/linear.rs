//! Linear kernel
//!
//! From "Stein Variational Gradient Descent as Moment Matching" by Liu and
//! Wang: k(x, y) = x . y + 1. Always norm mode.

use nalgebra::{DMatrix, DVector};

use crate::core::error::Result;
use crate::core::types::{KernelMode, KernelValue, LossFn, ParticleInfo};
use crate::kernel::traits::{ensure_ensemble, KernelEval, SteinKernel};

/// Linear kernel: k(x, y) = x . y + 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    pub fn new() -> Self {
        Self
    }
}

impl SteinKernel for LinearKernel {
    fn mode(&self) -> KernelMode {
        KernelMode::Norm
    }

    fn compute(
        &self,
        particles: &DMatrix<f64>,
        _particle_info: &ParticleInfo,
        _loss_fn: &LossFn,
    ) -> Result<Box<dyn KernelEval>> {
        ensure_ensemble(particles)?;
        Ok(Box::new(LinearEval))
    }
}

struct LinearEval;

impl KernelEval for LinearEval {
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue {
        // Zero-dimensional particles degenerate to the empty dot product.
        KernelValue::Scalar(x.dot(y) + 1.0)
    }
}
