//! Core types shared across the kernel implementations

pub mod error;
pub mod types;

pub use self::error::*;
pub use self::types::*;
