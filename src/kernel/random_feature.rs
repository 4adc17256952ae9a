//! Random Fourier feature approximation of the RBF kernel
//!
//! From "Stein Variational Gradient Descent as Moment Matching" by Liu and
//! Wang. The feature bank (normal weights, uniform [0, 2pi) biases) is drawn
//! once on the first `compute` call and reused for the lifetime of the
//! instance; the estimator is unbiased for the RBF kernel as the feature
//! count grows.

use std::f64::consts::PI;
use std::sync::OnceLock;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::core::error::{Result, SteinError};
use crate::core::types::{
    default_bandwidth_factor, BandwidthFactor, KernelMode, KernelValue, LossFn, ParticleInfo,
};
use crate::kernel::bandwidth::median_bandwidth;
use crate::kernel::traits::{ensure_ensemble, KernelEval, SteinKernel};

struct FeatureBank {
    weights: DMatrix<f64>,
    biases: DMatrix<f64>,
}

/// Random-feature kernel. Norm mode only.
///
/// The random draw is OS-entropy seeded by default; pass [`with_seed`] for
/// reproducible banks (and reproducible bandwidth subsets).
///
/// [`with_seed`]: RandomFeatureKernel::with_seed
pub struct RandomFeatureKernel {
    bandwidth_subset: Option<usize>,
    random_indices: Option<Vec<usize>>,
    bandwidth_factor: BandwidthFactor,
    seed: Option<u64>,
    bank: OnceLock<FeatureBank>,
}

impl RandomFeatureKernel {
    pub fn new() -> Self {
        Self {
            bandwidth_subset: None,
            random_indices: None,
            bandwidth_factor: default_bandwidth_factor(),
            seed: None,
            bank: OnceLock::new(),
        }
    }

    /// Restrict the bandwidth heuristic to `subset` particles, sampled
    /// with replacement each `compute` call. Must be positive.
    pub fn with_bandwidth_subset(mut self, subset: usize) -> Result<Self> {
        if subset == 0 {
            return Err(SteinError::InvalidParameter(
                "bandwidth subset must be positive".to_string(),
            ));
        }
        self.bandwidth_subset = Some(subset);
        Ok(self)
    }

    /// Restrict kernel evaluation to a fixed subset of feature-bank rows.
    pub fn with_random_indices(mut self, indices: Vec<usize>) -> Self {
        self.random_indices = Some(indices);
        self
    }

    /// Seed the feature-bank draw and bandwidth-subset sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_bandwidth_factor<F>(mut self, factor: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.bandwidth_factor = Box::new(factor);
        self
    }

    fn make_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

impl Default for RandomFeatureKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SteinKernel for RandomFeatureKernel {
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
        let (n, d) = (particles.nrows(), particles.ncols());

        // Drawn once per instance; get_or_init makes the lazy fill safe
        // under concurrent compute calls.
        let bank = self.bank.get_or_init(|| {
            log::debug!("drawing random feature bank: {} x {}", n, d);
            let mut rng = self.make_rng();
            let weights = DMatrix::from_fn(n, d, |_, _| rng.sample(StandardNormal));
            let biases = DMatrix::from_fn(n, d, |_, _| rng.random::<f64>() * 2.0 * PI);
            FeatureBank { weights, biases }
        });

        // The bank is shaped by the first ensemble this instance saw; a
        // later ensemble of different dimensionality cannot reuse it.
        if bank.weights.ncols() != d {
            return Err(SteinError::DimensionMismatch {
                expected: bank.weights.ncols(),
                actual: d,
            });
        }

        let bandwidth = match self.bandwidth_subset {
            Some(subset) => {
                // The factor is a function of the full ensemble size; the
                // subset restricts only the distance population.
                let scale = (self.bandwidth_factor)(n as f64);
                let fixed: BandwidthFactor = Box::new(move |_| scale);
                let mut rng = self.make_rng();
                let rows: Vec<usize> =
                    (0..subset).map(|_| rng.random_range(0..n)).collect();
                let restricted =
                    DMatrix::from_fn(subset, d, |i, j| particles[(rows[i], j)]);
                median_bandwidth(&restricted, true, &fixed)?
            }
            None => median_bandwidth(particles, true, &self.bandwidth_factor)?,
        };

        let (weights, biases) = match &self.random_indices {
            Some(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= bank.weights.nrows()) {
                    return Err(SteinError::InvalidParameter(format!(
                        "random index {} out of range for feature bank of {} rows",
                        bad,
                        bank.weights.nrows()
                    )));
                }
                let weights = DMatrix::from_fn(indices.len(), d, |i, j| {
                    bank.weights[(indices[i], j)]
                });
                let biases = DMatrix::from_fn(indices.len(), d, |i, j| {
                    bank.biases[(indices[i], j)]
                });
                (weights, biases)
            }
            None => (bank.weights.clone(), bank.biases.clone()),
        };

        Ok(Box::new(RandomFeatureEval {
            weights,
            biases,
            bandwidth: bandwidth[0],
        }))
    }
}

struct RandomFeatureEval {
    weights: DMatrix<f64>,
    biases: DMatrix<f64>,
    bandwidth: f64,
}

impl RandomFeatureEval {
    /// One bank row contributes D cosine features: sqrt(2) * cos((v.w + b_d) / h).
    fn feature(&self, v: &DVector<f64>, row: usize) -> DVector<f64> {
        let proj = self.weights.row(row).transpose().dot(v);
        self.biases
            .row(row)
            .transpose()
            .map(|b| 2.0f64.sqrt() * ((proj + b) / self.bandwidth).cos())
    }
}

impl KernelEval for RandomFeatureEval {
    fn evaluate(&self, x: &DVector<f64>, y: &DVector<f64>) -> KernelValue {
        let total = (0..self.weights.nrows())
            .map(|i| self.feature(x, i).dot(&self.feature(y, i)))
            .sum();
        KernelValue::Scalar(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensemble() -> DMatrix<f64> {
        DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 1.0, 0.5, -0.5, 1.0, 2.0, -1.0])
    }

    fn no_loss(_: &DVector<f64>) -> f64 {
        0.0
    }

    fn scalar(v: KernelValue) -> f64 {
        match v {
            KernelValue::Scalar(s) => s,
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_bank_persists_across_compute_calls() {
        let kernel = RandomFeatureKernel::new();
        let info = ParticleInfo::new();
        let particles = ensemble();
        let x = DVector::from_vec(vec![0.5, 0.5]);
        let y = DVector::from_vec(vec![-1.0, 2.0]);

        let first = scalar(kernel.compute(&particles, &info, &no_loss).unwrap().evaluate(&x, &y));
        let second = scalar(kernel.compute(&particles, &info, &no_loss).unwrap().evaluate(&x, &y));
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeded_instances_agree() {
        let info = ParticleInfo::new();
        let particles = ensemble();
        let x = DVector::from_vec(vec![0.5, 0.5]);
        let y = DVector::from_vec(vec![-1.0, 2.0]);

        let a = RandomFeatureKernel::new().with_seed(7);
        let b = RandomFeatureKernel::new().with_seed(7);
        let va = scalar(a.compute(&particles, &info, &no_loss).unwrap().evaluate(&x, &y));
        let vb = scalar(b.compute(&particles, &info, &no_loss).unwrap().evaluate(&x, &y));
        assert_eq!(va, vb);
    }

    #[test]
    fn test_symmetry() {
        let kernel = RandomFeatureKernel::new().with_seed(11);
        let eval = kernel
            .compute(&ensemble(), &ParticleInfo::new(), &no_loss)
            .unwrap();
        let x = DVector::from_vec(vec![0.3, -0.2]);
        let y = DVector::from_vec(vec![-1.0, 0.7]);
        assert_eq!(eval.evaluate(&x, &y), eval.evaluate(&y, &x));
    }

    #[test]
    fn test_zero_subset_rejected() {
        assert!(RandomFeatureKernel::new().with_bandwidth_subset(0).is_err());
    }

    #[test]
    fn test_bandwidth_subset_runs() {
        let kernel = RandomFeatureKernel::new()
            .with_bandwidth_subset(3)
            .unwrap()
            .with_seed(5);
        let eval = kernel
            .compute(&ensemble(), &ParticleInfo::new(), &no_loss)
            .unwrap();
        let x = DVector::from_vec(vec![0.0, 0.0]);
        assert!(scalar(eval.evaluate(&x, &x)).is_finite());
    }

    #[test]
    fn test_random_indices_restrict_bank() {
        let particles = ensemble();
        let info = ParticleInfo::new();
        let x = DVector::from_vec(vec![0.1, 0.2]);
        let y = DVector::from_vec(vec![0.3, -0.4]);

        let full = RandomFeatureKernel::new().with_seed(3);
        let restricted = RandomFeatureKernel::new()
            .with_seed(3)
            .with_random_indices(vec![0, 1]);

        let v_full = scalar(full.compute(&particles, &info, &no_loss).unwrap().evaluate(&x, &y));
        let v_restricted =
            scalar(restricted.compute(&particles, &info, &no_loss).unwrap().evaluate(&x, &y));
        // Same seed, fewer feature rows: the sums differ.
        assert_ne!(v_full, v_restricted);
    }

    #[test]
    fn test_subset_factor_sees_full_ensemble_size() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let kernel = RandomFeatureKernel::new()
            .with_bandwidth_subset(2)
            .unwrap()
            .with_seed(9)
            .with_bandwidth_factor(move |n| {
                recorder.lock().unwrap().push(n);
                1.0
            });

        let particles = DMatrix::from_row_slice(5, 1, &[0.0, 1.0, 2.0, 3.0, 4.0]);
        kernel
            .compute(&particles, &ParticleInfo::new(), &no_loss)
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![5.0]);
    }

    #[test]
    fn test_dimension_change_rejected_after_first_compute() {
        let kernel = RandomFeatureKernel::new().with_seed(13);
        let info = ParticleInfo::new();
        let narrow = ensemble();
        kernel.compute(&narrow, &info, &no_loss).unwrap();

        let wide = DMatrix::from_row_slice(3, 3, &[0.0; 9]);
        let err = kernel.compute(&wide, &info, &no_loss);
        assert!(matches!(
            err,
            Err(SteinError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_out_of_range_indices_rejected() {
        let kernel = RandomFeatureKernel::new()
            .with_seed(3)
            .with_random_indices(vec![99]);
        assert!(kernel
            .compute(&ensemble(), &ParticleInfo::new(), &no_loss)
            .is_err());
    }
}
