//! Shared type definitions for Stein kernels

use std::fmt;

use nalgebra::{DMatrix, DVector};

/// Loss function over a single D-dimensional particle, typically the
/// negative log joint density. Borrowed per `compute` call, never stored.
pub type LossFn<'a> = dyn Fn(&DVector<f64>) -> f64 + 'a;

/// Multiplier applied to the squared median pairwise distance, as a
/// function of the ensemble size n. The SVGD default is `1 / ln(n)`.
pub type BandwidthFactor = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// Returns the default bandwidth factor `1 / ln(n)`.
pub fn default_bandwidth_factor() -> BandwidthFactor {
    Box::new(|n| 1.0 / n.ln())
}

/// Output shape of a kernel, fixed per instance at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelMode {
    /// Scalar kernel value per particle pair
    Norm,
    /// Per-dimension vector value
    Vector,
    /// Full D x D matrix value
    Matrix,
}

impl fmt::Display for KernelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelMode::Norm => write!(f, "norm"),
            KernelMode::Vector => write!(f, "vector"),
            KernelMode::Matrix => write!(f, "matrix"),
        }
    }
}

/// How a matrix-mode RBF kernel fills its diagonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixMode {
    /// Scalar norm kernel value times the identity
    #[default]
    NormDiag,
    /// Component-wise kernel vector placed on the diagonal
    VectorDiag,
}

/// How a preconditioned kernel applies its per-particle matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecondMode {
    /// Average all per-particle matrices into one shared matrix
    Const,
    /// Soft-assign query points to per-particle anchor matrices
    #[default]
    AnchorPoints,
}

/// A single kernel evaluation result, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelValue {
    Scalar(f64),
    Vector(DVector<f64>),
    Matrix(DMatrix<f64>),
}

impl KernelValue {
    /// Multiply the value by a scalar weight.
    pub fn scaled(self, w: f64) -> KernelValue {
        match self {
            KernelValue::Scalar(v) => KernelValue::Scalar(w * v),
            KernelValue::Vector(v) => KernelValue::Vector(v * w),
            KernelValue::Matrix(m) => KernelValue::Matrix(m * w),
        }
    }

    /// Accumulate `w * other` into this value. Both values must share a
    /// shape; mixture construction guarantees this for its members.
    pub fn add_scaled(&mut self, w: f64, other: &KernelValue) {
        match (self, other) {
            (KernelValue::Scalar(a), KernelValue::Scalar(b)) => *a += w * b,
            (KernelValue::Vector(a), KernelValue::Vector(b)) => a.axpy(w, b, 1.0),
            (KernelValue::Matrix(a), KernelValue::Matrix(b)) => *a += b * w,
            _ => unreachable!("kernel values of mismatched shape"),
        }
    }

    /// Expand to a full `dim x dim` matrix: scalars become scalar times
    /// identity, vectors become a diagonal matrix, matrices pass through.
    pub fn into_matrix(self, dim: usize) -> DMatrix<f64> {
        match self {
            KernelValue::Scalar(v) => DMatrix::identity(dim, dim) * v,
            KernelValue::Vector(v) => DMatrix::from_diagonal(&v),
            KernelValue::Matrix(m) => m,
        }
    }
}

/// Ordered mapping from parameter name to a half-open column range
/// `[start, end)` within the particle matrix. Insertion order is
/// preserved; the ranges of a well-formed info partition all D columns.
#[derive(Debug, Clone, Default)]
pub struct ParticleInfo {
    entries: Vec<(String, (usize, usize))>,
}

impl ParticleInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an info with a single named block covering `[start, end)`.
    pub fn single(name: impl Into<String>, start: usize, end: usize) -> Self {
        let mut info = Self::new();
        info.insert(name, start, end);
        info
    }

    pub fn insert(&mut self, name: impl Into<String>, start: usize, end: usize) {
        self.entries.push((name.into(), (start, end)));
    }

    pub fn get(&self, name: &str) -> Option<(usize, usize)> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, range)| *range)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, (usize, usize))> {
        self.entries.iter().map(|(n, r)| (n.as_str(), *r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of columns covered by all ranges.
    pub fn total_dims(&self) -> usize {
        self.entries.iter().map(|(_, (s, e))| e - s).sum()
    }

    /// Check that the ranges tile `0..dim` contiguously in order.
    pub fn partitions(&self, dim: usize) -> bool {
        let mut next = 0;
        for (_, (start, end)) in &self.entries {
            if *start != next || end < start {
                return false;
            }
            next = *end;
        }
        next == dim
    }
}
