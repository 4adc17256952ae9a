//! Stein kernel contracts

use nalgebra::{DMatrix, DVector};

use crate::core::error::{Result, SteinError};
use crate::core::types::{KernelMode, KernelValue, LossFn, ParticleInfo};

/// A kernel-evaluation artifact produced by one [`SteinKernel::compute`]
/// call. It holds that call's captured statistics (bandwidth, square-root
/// matrices, feature bank) and evaluates particle pairs. Semantically tied
/// to the ensemble it was computed from; stale against any other ensemble.
pub trait KernelEval: Send + Sync {
    /// Evaluate the kernel at a pair of (sub-)particle vectors. The shape
    /// of the result matches the producing kernel's mode.
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue;
}

/// A Stein kernel, constructed once with static hyperparameters and reused
/// across SVGD iterations.
pub trait SteinKernel: Send + Sync {
    /// Output shape of this kernel, fixed at construction.
    fn mode(&self) -> KernelMode;

    /// Derive this iteration's evaluation function from the current
    /// particle ensemble. Requires at least two particles.
    fn compute(
        &self,
        particles: &DMatrix<f64>,
        particle_info: &ParticleInfo,
        loss_fn: &LossFn,
    ) -> Result<Box<dyn KernelEval>>;
}

/// Shared `compute` precondition: bandwidth and anchor statistics are
/// meaningless for fewer than two particles.
pub(crate) fn ensure_ensemble(particles: &DMatrix<f64>) -> Result<()> {
    if particles.nrows() < 2 {
        return Err(SteinError::InsufficientParticles {
            required: 2,
            actual: particles.nrows(),
        });
    }
    Ok(())
}
