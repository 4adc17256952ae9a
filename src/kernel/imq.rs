//! Inverse multiquadric (IMQ) kernel
//!
//! From "Measuring Sample Quality with Kernels" by Gorham and Mackey:
//! k(x, y) = (c^2 + ||x - y||^2)^beta with c > 0 and beta in (-1, 0).
//! The value is strictly positive for all real inputs.

use nalgebra::{DMatrix, DVector};

use crate::core::error::{Result, SteinError};
use crate::core::types::{KernelMode, KernelValue, LossFn, ParticleInfo};
use crate::kernel::traits::{ensure_ensemble, KernelEval, SteinKernel};
use crate::math::safe_norm;

/// IMQ kernel with multiquadric constant `const_` and inverse exponent
/// `exponent`.
pub struct IMQKernel {
    mode: KernelMode,
    const_: f64,
    exponent: f64,
}

impl IMQKernel {
    /// Create an IMQ kernel. `const_` must be positive and `exponent`
    /// strictly inside (-1, 0); matrix mode is not supported.
    pub fn new(mode: KernelMode, const_: f64, exponent: f64) -> Result<Self> {
        if mode == KernelMode::Matrix {
            return Err(SteinError::InvalidParameter(
                "IMQ kernel supports only norm and vector modes".to_string(),
            ));
        }
        if const_ <= 0.0 {
            return Err(SteinError::InvalidParameter(format!(
                "IMQ constant must be positive, got {}",
                const_
            )));
        }
        if exponent <= -1.0 || exponent >= 0.0 {
            return Err(SteinError::InvalidParameter(format!(
                "IMQ exponent must lie strictly in (-1, 0), got {}",
                exponent
            )));
        }
        Ok(Self {
            mode,
            const_,
            exponent,
        })
    }
}

impl Default for IMQKernel {
    /// Norm mode with c = 1 and beta = -1/2.
    fn default() -> Self {
        Self {
            mode: KernelMode::Norm,
            const_: 1.0,
            exponent: -0.5,
        }
    }
}

impl SteinKernel for IMQKernel {
    fn mode(&self) -> KernelMode {
        self.mode
    }

    fn compute(
        &self,
        particles: &DMatrix<f64>,
        _particle_info: &ParticleInfo,
        _loss_fn: &LossFn,
    ) -> Result<Box<dyn KernelEval>> {
        ensure_ensemble(particles)?;
        Ok(Box::new(IMQEval {
            mode: self.mode,
            const_sq: self.const_ * self.const_,
            exponent: self.exponent,
        }))
    }
}

struct IMQEval {
    mode: KernelMode,
    const_sq: f64,
    exponent: f64,
}

impl KernelEval for IMQEval {
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue {
        match self.mode {
            KernelMode::Norm => {
                let dist = safe_norm(&(x - y));
                KernelValue::Scalar((self.const_sq + dist * dist).powf(self.exponent))
            }
            KernelMode::Vector => {
                let k = (x - y).map(|d| (self.const_sq + d * d).powf(self.exponent));
                KernelValue::Vector(k)
            }
            KernelMode::Matrix => unreachable!("rejected at construction"),
        }
    }
}
