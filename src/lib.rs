//! Stein kernel functions for particle-based variational inference
//!
//! Implements the kernel family used by Stein Variational Gradient Descent
//! (SVGD): scalar, vector-valued and matrix-valued kernels over particle
//! ensembles, plus curvature-based preconditioning. The outer SVGD update
//! loop is not part of this crate; it holds a configured kernel, calls
//! [`SteinKernel::compute`] once per iteration and evaluates the returned
//! [`KernelEval`] over particle pairs to form inter-particle forces.

pub mod core;
pub mod kernel;
pub mod math;
pub mod precond;

// Re-export main types for convenience
pub use crate::core::error::{Result, SteinError};
pub use crate::core::types::{
    default_bandwidth_factor, BandwidthFactor, KernelMode, KernelValue, LossFn, MatrixMode,
    ParticleInfo, PrecondMode,
};
pub use crate::kernel::{
    GraphicalKernel, IMQKernel, KernelEval, LinearKernel, MixtureKernel,
    PrecondMatrixKernel, RBFKernel, RandomFeatureKernel, SteinKernel,
};
pub use crate::precond::{HessianPrecondMatrix, PrecondMatrix};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
