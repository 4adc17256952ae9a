//! Weighted mixture of same-mode kernels
//!
//! From "Stein Variational Gradient Descent as Moment Matching" by Liu and
//! Wang: k(x, y) = sum_i w_i * k_i(x, y). Weights are not renormalized.

use nalgebra::{DMatrix, DVector};

use crate::core::error::{Result, SteinError};
use crate::core::types::{KernelMode, KernelValue, LossFn, ParticleInfo};
use crate::kernel::traits::{KernelEval, SteinKernel};

pub struct MixtureKernel {
    ws: Vec<f64>,
    kernels: Vec<Box<dyn SteinKernel>>,
}

impl MixtureKernel {
    /// Create a mixture. Requires one weight per kernel, at least two
    /// kernels, and a single shared mode across all members.
    pub fn new(ws: Vec<f64>, kernels: Vec<Box<dyn SteinKernel>>) -> Result<Self> {
        if ws.len() != kernels.len() {
            return Err(SteinError::InvalidParameter(format!(
                "mixture needs one weight per kernel, got {} weights for {} kernels",
                ws.len(),
                kernels.len()
            )));
        }
        if kernels.len() < 2 {
            return Err(SteinError::InvalidParameter(
                "mixture needs more than one kernel".to_string(),
            ));
        }
        let mode = kernels[0].mode();
        for kernel in &kernels[1..] {
            if kernel.mode() != mode {
                return Err(SteinError::ModeMismatch {
                    expected: mode,
                    actual: kernel.mode(),
                });
            }
        }
        Ok(Self { ws, kernels })
    }
}

impl SteinKernel for MixtureKernel {
    fn mode(&self) -> KernelMode {
        self.kernels[0].mode()
    }

    fn compute(
        &self,
        particles: &DMatrix<f64>,
        particle_info: &ParticleInfo,
        loss_fn: &LossFn,
    ) -> Result<Box<dyn KernelEval>> {
        let evals = self
            .kernels
            .iter()
            .map(|k| k.compute(particles, particle_info, loss_fn))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(MixtureEval {
            ws: self.ws.clone(),
            evals,
        }))
    }
}

struct MixtureEval {
    ws: Vec<f64>,
    evals: Vec<Box<dyn KernelEval>>,
}

impl KernelEval for MixtureEval {
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue {
        let mut acc = self.evals[0].evaluate(x, y).scaled(self.ws[0]);
        for (w, eval) in self.ws[1..].iter().zip(&self.evals[1..]) {
            acc.add_scaled(*w, &eval.evaluate(x, y));
        }
        acc
    }
}
