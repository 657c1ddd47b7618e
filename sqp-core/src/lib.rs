//! sqp-core: a sequential quadratic programming solver for constrained
//! nonlinear programs
//!
//! Solves smooth NLPs of the form
//!
//! ```text
//! minimize    f(x)
//! subject to  lbx <= x    <= ubx
//!             lbg <= g(x) <= ubg
//! ```
//!
//! with twice-differentiable `f` and `g`, optionally parameterized by a
//! vector `p`. Derivatives come from a user-supplied [`NlpOracle`]; the
//! step computation is delegated to an injected [`QpSolver`](qp::QpSolver).
//!
//! # Algorithm
//!
//! Each major iteration:
//!
//! - evaluates `f`, `g`, the objective gradient, and the constraint
//!   Jacobian, and forms the Lagrangian gradient,
//! - checks primal/dual convergence, the iteration cap, and step-size
//!   stall,
//! - builds the Lagrangian Hessian, either exactly (with optional
//!   Gershgorin regularization) or by a Powell-damped BFGS update with
//!   periodic identity resets,
//! - solves a box/linearly-constrained QP for the step and multipliers,
//! - runs a **non-monotone L1-merit Armijo line search** (comparison
//!   against the maximum merit over a sliding window of recent
//!   iterations), backtracking by a fixed factor,
//! - applies the accepted fraction to the primal iterate and
//!   interpolates the duals.
//!
//! All per-solve memory is laid out once at construction; the iteration
//! loop allocates nothing.
//!
//! # Example
//!
//! ```ignore
//! use sqp_core::{
//!     AdmmQp, AdmmSettings, NlpOracle, NlpProblem, SolveInputs, Sparsity, Sqp, SqpSettings,
//! };
//!
//! struct Quadratic;
//!
//! impl NlpOracle for Quadratic {
//!     // minimize 1/2 x'x - [1, 2]'x ... (see the oracle docs)
//!     # fn eval_fg(&self, _: &[f64], _: &[f64], _: &mut f64, _: &mut [f64])
//!     #     -> Result<(), sqp_core::EvalError> { unimplemented!() }
//!     # fn eval_jac_fg(&self, _: &[f64], _: &[f64], _: &mut f64, _: &mut [f64],
//!     #     _: &mut [f64], _: &mut [f64]) -> Result<(), sqp_core::EvalError> { unimplemented!() }
//!     # fn eval_hess_l(&self, _: &[f64], _: &[f64], _: f64, _: &[f64], _: &mut [f64])
//!     #     -> Result<(), sqp_core::EvalError> { unimplemented!() }
//! }
//!
//! let prob = NlpProblem {
//!     nx: 2,
//!     ng: 0,
//!     np: 0,
//!     jac_sp: Sparsity::empty(0, 2),
//!     hess_sp: Some(Sparsity::dense(2, 2)),
//! };
//! let mut solver = Sqp::new(
//!     prob,
//!     Quadratic,
//!     SqpSettings::default(),
//!     AdmmQp::factory(AdmmSettings::default()),
//! )?;
//! let result = solver.solve(&SolveInputs::new(&[0.0, 0.0]))?;
//! println!("status: {}", result.status);
//! println!("x = {:?}", result.x);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)] // evaluation callbacks mirror the slot layout

pub mod linalg;
pub mod oracle;
pub mod problem;
pub mod qp;
pub mod serialize;
pub mod sqp;

// Re-export main types
pub use linalg::Sparsity;
pub use oracle::{EvalError, NlpOracle};
pub use problem::{
    ConfigError, HessianApprox, IterationInfo, NlpProblem, SolveInputs, SolveResult, SolveStats,
    SolveStatus, SqpSettings, UnifiedStatus,
};
pub use qp::{AdmmQp, AdmmSettings, QpError, QpProblem, QpSolver, QpVars};
pub use serialize::{SerializeError, SqpConfig};
pub use sqp::{SolveError, Sqp, SqpError};
