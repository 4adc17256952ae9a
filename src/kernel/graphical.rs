//! Graphical (block-structured) kernel
//!
//! From "Stein Variational Message Passing for Continuous Graphical
//! Models" by Wang, Zheng and Liu. The particle dimensions are partitioned
//! into named parameter blocks; each block gets its own kernel evaluated
//! independently, and the results are assembled into a block-diagonal
//! D x D matrix. Cross-block entries are exactly zero, encoding a
//! conditional-independence assumption between parameter blocks.

use nalgebra::{DMatrix, DVector};

use crate::core::error::{Result, SteinError};
use crate::core::types::{KernelMode, KernelValue, LossFn, ParticleInfo};
use crate::kernel::rbf::RBFKernel;
use crate::kernel::traits::{ensure_ensemble, KernelEval, SteinKernel};
use crate::math::splice_block;

pub struct GraphicalKernel {
    local_kernels: Vec<(String, Box<dyn SteinKernel>)>,
    default_kernel: Box<dyn SteinKernel>,
}

impl GraphicalKernel {
    /// Create a graphical kernel with a norm-mode RBF default for every
    /// block.
    pub fn new() -> Self {
        Self {
            local_kernels: Vec::new(),
            default_kernel: Box::new(RBFKernel::default()),
        }
    }

    /// Override the kernel used for one named parameter block.
    pub fn with_local_kernel(
        mut self,
        name: impl Into<String>,
        kernel: Box<dyn SteinKernel>,
    ) -> Self {
        self.local_kernels.push((name.into(), kernel));
        self
    }

    /// Replace the default kernel applied to blocks without an override.
    pub fn with_default_kernel(mut self, kernel: Box<dyn SteinKernel>) -> Self {
        self.default_kernel = kernel;
        self
    }

    fn kernel_for(&self, name: &str) -> &dyn SteinKernel {
        self.local_kernels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, k)| k.as_ref())
            .unwrap_or(self.default_kernel.as_ref())
    }
}

impl Default for GraphicalKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SteinKernel for GraphicalKernel {
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
        if !particle_info.partitions(particles.ncols()) {
            return Err(SteinError::DimensionMismatch {
                expected: particles.ncols(),
                actual: particle_info.total_dims(),
            });
        }

        let mut blocks = Vec::with_capacity(particle_info.len());
        for (name, (start, end)) in particle_info.iter() {
            let kernel = self.kernel_for(name);
            let width = end - start;
            let block_particles = particles.columns(start, width).into_owned();
            let block_info = ParticleInfo::single(name, 0, width);

            // Block-local loss: splice candidate block values into each
            // ensemble row, holding every other block fixed at the current
            // ensemble's values, and average over rows so block curvature
            // keeps the per-particle scale.
            let block_loss = |values: &DVector<f64>| -> f64 {
                let total: f64 = (0..particles.nrows())
                    .map(|i| {
                        let template = particles.row(i).transpose();
                        loss_fn(&splice_block(&template, start, end, values))
                    })
                    .sum();
                total / particles.nrows() as f64
            };

            let eval = kernel.compute(&block_particles, &block_info, &block_loss)?;
            blocks.push(BlockEval {
                eval,
                start,
                width,
            });
        }

        Ok(Box::new(GraphicalEval {
            blocks,
            dim: particles.ncols(),
        }))
    }
}

struct BlockEval {
    eval: Box<dyn KernelEval>,
    start: usize,
    width: usize,
}

struct GraphicalEval {
    blocks: Vec<BlockEval>,
    dim: usize,
}

impl KernelEval for GraphicalEval {
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue {
        let mut out = DMatrix::zeros(self.dim, self.dim);
        for block in &self.blocks {
            let xs = x.rows(block.start, block.width).into_owned();
            let ys = y.rows(block.start, block.width).into_owned();
            let value = block.eval.evaluate(&xs, &ys).into_matrix(block.width);
            out.view_mut((block.start, block.start), (block.width, block.width))
                .copy_from(&value);
        }
        KernelValue::Matrix(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::imq::IMQKernel;
    use approx::assert_relative_eq;

    fn ensemble() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            3,
            4,
            &[
                0.0, 0.5, -1.0, 2.0, //
                1.0, -0.5, 0.5, 0.0, //
                -1.0, 1.5, 2.0, -2.0,
            ],
        )
    }

    fn two_blocks() -> ParticleInfo {
        let mut info = ParticleInfo::new();
        info.insert("theta", 0, 2);
        info.insert("sigma", 2, 4);
        info
    }

    fn no_loss(_: &DVector<f64>) -> f64 {
        0.0
    }

    fn matrix(v: KernelValue) -> DMatrix<f64> {
        match v {
            KernelValue::Matrix(m) => m,
            other => panic!("expected matrix, got {:?}", other),
        }
    }

    #[test]
    fn test_off_block_entries_are_zero() {
        let kernel = GraphicalKernel::new();
        let eval = kernel.compute(&ensemble(), &two_blocks(), &no_loss).unwrap();
        let x = DVector::from_vec(vec![0.1, -0.7, 1.3, 0.4]);
        let y = DVector::from_vec(vec![-0.9, 0.2, 0.6, -1.1]);
        let m = matrix(eval.evaluate(&x, &y));
        assert_eq!(m.nrows(), 4);
        for i in 0..2 {
            for j in 2..4 {
                assert_eq!(m[(i, j)], 0.0);
                assert_eq!(m[(j, i)], 0.0);
            }
        }
        // Default norm-mode RBF: each block is a scalar times identity.
        assert_relative_eq!(m[(0, 0)], m[(1, 1)]);
        assert_relative_eq!(m[(2, 2)], m[(3, 3)]);
        assert_eq!(m[(0, 1)], 0.0);
    }

    #[test]
    fn test_self_kernel_block_diagonal_is_one() {
        let kernel = GraphicalKernel::new();
        let eval = kernel.compute(&ensemble(), &two_blocks(), &no_loss).unwrap();
        let x = DVector::from_vec(vec![0.1, -0.7, 1.3, 0.4]);
        let m = matrix(eval.evaluate(&x, &x));
        for i in 0..4 {
            assert_relative_eq!(m[(i, i)], 1.0);
        }
    }

    #[test]
    fn test_local_kernel_override() {
        let kernel = GraphicalKernel::new().with_local_kernel(
            "sigma",
            Box::new(IMQKernel::new(KernelMode::Vector, 1.0, -0.5).unwrap()),
        );
        let eval = kernel.compute(&ensemble(), &two_blocks(), &no_loss).unwrap();
        let x = DVector::from_vec(vec![0.0, 0.0, 1.0, 0.0]);
        let y = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0]);
        let m = matrix(eval.evaluate(&x, &y));
        // IMQ vector mode on the second block: (1 + 1)^(-1/2) and 1.
        assert_relative_eq!(m[(2, 2)], 1.0 / 2.0f64.sqrt());
        assert_relative_eq!(m[(3, 3)], 1.0);
    }

    #[test]
    fn test_block_local_loss_feeds_preconditioner() {
        use crate::core::types::PrecondMode;
        use crate::kernel::precond::PrecondMatrixKernel;
        use crate::precond::HessianPrecondMatrix;

        // loss = -0.5 ||v||^2 over the full vector. The block-local loss
        // averages the splice over the ensemble rows, so its Hessian in
        // the block coordinates is -I and the preconditioner is Q = I,
        // the same curvature a per-particle Hessian of the full loss
        // would report. At x = y the inner RBF is the identity, so each
        // block of the assembled matrix is Q^{-1/2} I Q^{-1/2} = I.
        let loss = |v: &DVector<f64>| -0.5 * v.norm_squared();
        let precond_kernel = || {
            Box::new(
                PrecondMatrixKernel::new(
                    Box::new(HessianPrecondMatrix::new()),
                    Box::new(RBFKernel::new(KernelMode::Matrix)),
                    PrecondMode::Const,
                )
                .unwrap(),
            )
        };
        let kernel = GraphicalKernel::new().with_default_kernel(precond_kernel());
        let eval = kernel.compute(&ensemble(), &two_blocks(), &loss).unwrap();
        let x = DVector::from_vec(vec![0.2, -0.1, 0.4, 0.0]);
        let m = matrix(eval.evaluate(&x, &x));
        for i in 0..4 {
            assert_relative_eq!(m[(i, i)], 1.0, epsilon = 1e-6);
        }
        assert_eq!(m[(0, 2)], 0.0);
    }

    #[test]
    fn test_partition_validation() {
        let kernel = GraphicalKernel::new();
        let mut gapped = ParticleInfo::new();
        gapped.insert("a", 0, 2);
        gapped.insert("b", 3, 4);
        let err = kernel.compute(&ensemble(), &gapped, &no_loss);
        assert!(matches!(err, Err(SteinError::DimensionMismatch { .. })));

        let short = ParticleInfo::single("a", 0, 2);
        assert!(kernel.compute(&ensemble(), &short, &no_loss).is_err());
    }

    #[test]
    fn test_mode_is_matrix() {
        assert_eq!(GraphicalKernel::new().mode(), KernelMode::Matrix);
    }
}
