//! Linear algebra support: sparsity patterns, in-place kernels, and a
//! small dense Cholesky used by the reference QP subsolver.

pub mod dense;
pub mod kernels;
pub mod sparsity;

pub use sparsity::Sparsity;
