//! Matrix-preconditioned kernel
//!
//! Wraps a matrix-mode kernel with per-particle preconditioning matrices,
//! from "Stein Variational Gradient Descent with Matrix-Valued Kernels" by
//! Wang, Tang, Bajaj and Liu. In `Const` mode all curvature matrices are
//! averaged into one shared metric; in `AnchorPoints` mode each particle
//! keeps its own matrix and query points are soft-assigned to anchors by
//! Gaussian responsibility weights.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use crate::core::error::{Result, SteinError};
use crate::core::types::{KernelMode, KernelValue, LossFn, ParticleInfo, PrecondMode};
use crate::kernel::traits::{ensure_ensemble, KernelEval, SteinKernel};
use crate::math;
use crate::precond::PrecondMatrix;

pub struct PrecondMatrixKernel {
    precond: Box<dyn PrecondMatrix>,
    inner: Box<dyn SteinKernel>,
    precond_mode: PrecondMode,
}

impl PrecondMatrixKernel {
    /// Create a preconditioned kernel. The inner kernel must be
    /// matrix-mode.
    pub fn new(
        precond: Box<dyn PrecondMatrix>,
        inner: Box<dyn SteinKernel>,
        precond_mode: PrecondMode,
    ) -> Result<Self> {
        if inner.mode() != KernelMode::Matrix {
            return Err(SteinError::ModeMismatch {
                expected: KernelMode::Matrix,
                actual: inner.mode(),
            });
        }
        Ok(Self {
            precond,
            inner,
            precond_mode,
        })
    }
}

impl SteinKernel for PrecondMatrixKernel {
    fn mode(&self) -> KernelMode {
        KernelMode::Matrix
    }

    fn compute(
        &self,
        particles: &DMatrix<f64>,
        particle_info: &ParticleInfo,
        loss_fn: &LossFn,
    ) -> Result<Box<dyn KernelEval>> {
        ensure_ensemble(particles)?;
        let mut qs = self.precond.compute(particles, loss_fn)?;
        if qs.len() != particles.nrows() {
            return Err(SteinError::DimensionMismatch {
                expected: particles.nrows(),
                actual: qs.len(),
            });
        }
        if self.precond_mode == PrecondMode::Const {
            let n = qs.len() as f64;
            let mean = qs
                .iter()
                .skip(1)
                .fold(qs[0].clone(), |acc, q| acc + q)
                / n;
            qs = vec![mean];
        }

        // The inner kernel sees the raw ensemble: its bandwidth statistics
        // come from untransformed particles even though its evaluator is
        // later applied to transformed points.
        let inner_eval = self.inner.compute(particles, particle_info, loss_fn)?;

        let mut anchors = Vec::with_capacity(qs.len());
        for (i, q) in qs.iter().enumerate() {
            let q_inv = q
                .clone()
                .try_inverse()
                .ok_or(SteinError::SingularPrecondMatrix { index: i })?;
            let gaussian = match self.precond_mode {
                PrecondMode::Const => None,
                PrecondMode::AnchorPoints => {
                    let chol = math::try_cholesky(math::posdef(&q_inv), i)?;
                    Some((particles.row(i).transpose(), chol))
                }
            };
            anchors.push(Anchor {
                q_sqrt: math::sqrth(q),
                q_inv_sqrt: math::sqrth(&q_inv),
                gaussian,
            });
        }

        Ok(Box::new(PrecondEval {
            anchors,
            inner: inner_eval,
        }))
    }
}

struct Anchor {
    q_sqrt: DMatrix<f64>,
    q_inv_sqrt: DMatrix<f64>,
    /// Anchor mean and Cholesky factor of the repaired inverse matrix;
    /// absent in const mode (uniform weight 1 on the single shared anchor).
    gaussian: Option<(DVector<f64>, Cholesky<f64, Dyn>)>,
}

struct PrecondEval {
    anchors: Vec<Anchor>,
    inner: Box<dyn KernelEval>,
}

impl PrecondEval {
    fn weights(&self, p: &DVector<f64>) -> DVector<f64> {
        if self.anchors.len() == 1 {
            return DVector::from_element(1, 1.0);
        }
        let log_probs = DVector::from_iterator(
            self.anchors.len(),
            self.anchors.iter().map(|a| {
                let (mean, chol) = a
                    .gaussian
                    .as_ref()
                    .expect("anchor-points mode always carries gaussians");
                math::gaussian_log_density(p, mean, chol)
            }),
        );
        math::softmax(&log_probs)
    }
}

impl KernelEval for PrecondEval {
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue {
        let d = x.len();
        let wx = self.weights(x);
        let wy = self.weights(y);
        let mut acc = DMatrix::zeros(d, d);
        for (i, anchor) in self.anchors.iter().enumerate() {
            let inner = self
                .inner
                .evaluate(&(&anchor.q_sqrt * x), &(&anchor.q_sqrt * y))
                .into_matrix(d);
            acc += (&anchor.q_inv_sqrt * inner * anchor.q_inv_sqrt.transpose())
                * (wx[i] * wy[i]);
        }
        KernelValue::Matrix(acc)
    }
}
