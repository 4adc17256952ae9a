//! Preconditioning matrices for matrix-valued Stein kernels
//!
//! A preconditioning matrix is a per-particle positive-semidefinite
//! curvature estimate that locally rescales kernel geometry, from "Stein
//! Variational Gradient Descent with Matrix-Valued Kernels" by Wang, Tang,
//! Bajaj and Liu.

use nalgebra::{DMatrix, DVector};

use crate::core::error::{Result, SteinError};
use crate::core::types::LossFn;
use crate::math;

/// Produces one D x D preconditioning matrix per particle from the
/// current ensemble and loss function.
pub trait PrecondMatrix: Send + Sync {
    fn compute(&self, particles: &DMatrix<f64>, loss_fn: &LossFn) -> Result<Vec<DMatrix<f64>>>;
}

/// Negated Hessian of the loss at each particle, interpreted as a local
/// curvature metric. The Hessian is taken by central finite differences.
pub struct HessianPrecondMatrix {
    step: f64,
}

impl HessianPrecondMatrix {
    pub fn new() -> Self {
        Self { step: 1e-4 }
    }

    /// Override the finite-difference step. Must be positive.
    pub fn with_step(mut self, step: f64) -> Result<Self> {
        if step <= 0.0 {
            return Err(SteinError::InvalidParameter(format!(
                "finite-difference step must be positive, got {}",
                step
            )));
        }
        self.step = step;
        Ok(self)
    }
}

impl Default for HessianPrecondMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl PrecondMatrix for HessianPrecondMatrix {
    fn compute(&self, particles: &DMatrix<f64>, loss_fn: &LossFn) -> Result<Vec<DMatrix<f64>>> {
        let matrices = (0..particles.nrows())
            .map(|i| {
                let x: DVector<f64> = particles.row(i).transpose();
                -math::hessian(loss_fn, &x, self.step)
            })
            .collect();
        Ok(matrices)
    }
}
