//! QP subproblem contract.
//!
//! Each SQP iteration delegates
//!
//! ```text
//! minimize    1/2 dx' H dx + g' dx
//! subject to  lbx <=   dx <= ubx
//!             lba <= A dx <= uba
//! ```
//!
//! to an injected subsolver. The slot set is the canonical conic-QP
//! interface — inputs `H, G, A, LBX, UBX, LBA, UBA, X0, LAM_X0, LAM_A0`
//! and outputs `X, LAM_X, LAM_A` — expressed here as two structs:
//! [`QpProblem`] carries the read-only slots, [`QpVars`] carries the
//! warm-start/solution slots, which the subsolver reads and overwrites
//! in place.
//!
//! Subsolvers are constructed once per SQP instance through a factory
//! `FnOnce(&Sparsity, &Sparsity) -> Result<Box<dyn QpSolver>, QpError>`
//! receiving the fixed Hessian and Jacobian patterns. The crate ships a
//! dense-Cholesky ADMM implementation in [`admm`]; external solvers
//! implement the same trait.

pub mod admm;

use thiserror::Error;

pub use admm::{AdmmQp, AdmmSettings};

/// QP subsolver errors.
#[derive(Debug, Error)]
pub enum QpError {
    /// The factory could not build a subsolver for the given patterns.
    #[error("QP subsolver construction failed: {0}")]
    Construction(String),

    /// The subsolver failed on a subproblem.
    #[error("QP solve failed: {0}")]
    Solve(String),
}

/// Read-only QP data for one subproblem.
///
/// `h` and `a` hold values in the pattern order fixed at construction;
/// bound slices use infinities for absent bounds.
#[derive(Debug)]
pub struct QpProblem<'a> {
    /// Hessian values (symmetric, full storage).
    pub h: &'a [f64],

    /// Linear objective term (length nx).
    pub g: &'a [f64],

    /// Constraint matrix values.
    pub a: &'a [f64],

    /// Lower variable bounds (length nx).
    pub lbx: &'a [f64],

    /// Upper variable bounds (length nx).
    pub ubx: &'a [f64],

    /// Lower constraint bounds (length na).
    pub lba: &'a [f64],

    /// Upper constraint bounds (length na).
    pub uba: &'a [f64],
}

/// Warm-start / solution slots, read and overwritten by the subsolver.
#[derive(Debug)]
pub struct QpVars<'a> {
    /// Primal iterate (length nx).
    pub x: &'a mut [f64],

    /// Bound multipliers (length nx; positive at an active upper bound).
    pub lam_x: &'a mut [f64],

    /// Constraint multipliers (length na).
    pub lam_a: &'a mut [f64],
}

/// A QP subsolver bound to fixed sparsity patterns.
pub trait QpSolver {
    /// Solve one subproblem, warm-started from `vars`, writing the
    /// solution back into `vars`.
    fn solve(&mut self, qp: &QpProblem<'_>, vars: &mut QpVars<'_>) -> Result<(), QpError>;
}
