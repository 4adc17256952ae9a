//! Error types for Stein kernel computation

use thiserror::Error;

use crate::core::types::KernelMode;

#[derive(Error, Debug)]
pub enum SteinError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient particles: need at least {required}, got {actual}")]
    InsufficientParticles { required: usize, actual: usize },

    #[error("Kernel mode mismatch: expected {expected}, got {actual}")]
    ModeMismatch {
        expected: KernelMode,
        actual: KernelMode,
    },

    #[error("Singular preconditioning matrix at particle {index}")]
    SingularPrecondMatrix { index: usize },

    #[error("Cholesky factorization failed for anchor covariance {index}")]
    FactorizationFailed { index: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, SteinError>;
