//! Stein kernel implementations

pub mod bandwidth;
pub mod graphical;
pub mod imq;
pub mod linear;
pub mod mixture;
pub mod precond;
pub mod random_feature;
pub mod rbf;
pub mod traits;

pub use self::graphical::GraphicalKernel;
pub use self::imq::IMQKernel;
pub use self::linear::LinearKernel;
pub use self::mixture::MixtureKernel;
pub use self::precond::PrecondMatrixKernel;
pub use self::random_feature::RandomFeatureKernel;
pub use self::rbf::RBFKernel;
pub use self::traits::{KernelEval, SteinKernel};
