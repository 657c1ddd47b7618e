//! Problem descriptor, solver options, and result types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linalg::Sparsity;

/// Configuration or problem-description errors, reported at solver
/// construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An option value is out of its admissible range.
    #[error("invalid option {option}: {msg}")]
    InvalidOption {
        /// Option name
        option: &'static str,
        /// Description of the violation
        msg: String,
    },

    /// Problem dimensions and sparsity patterns are inconsistent.
    #[error("invalid problem: {0}")]
    InvalidProblem(String),
}

/// Immutable description of one NLP:
///
/// ```text
/// minimize    f(x)
/// subject to  lbx <= x    <= ubx
///             lbg <= g(x) <= ubg
/// ```
///
/// with `x` of length `nx`, `g` of length `ng`, and an optional
/// parameter vector `p` of length `np`. Bounds and the start point are
/// per-solve inputs; this descriptor carries only dimensions and
/// derivative sparsity.
#[derive(Debug, Clone)]
pub struct NlpProblem {
    /// Number of decision variables.
    pub nx: usize,

    /// Number of general constraints.
    pub ng: usize,

    /// Number of parameters.
    pub np: usize,

    /// Sparsity of the constraint Jacobian (ng x nx).
    pub jac_sp: Sparsity,

    /// Sparsity of the Lagrangian Hessian (nx x nx, symmetric).
    ///
    /// Required for the exact-Hessian mode. With the limited-memory
    /// approximation the solver substitutes a dense nx x nx pattern and
    /// this field may be `None`.
    pub hess_sp: Option<Sparsity>,
}

impl NlpProblem {
    /// Check dimension consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nx == 0 {
            return Err(ConfigError::InvalidProblem(
                "problem has no decision variables".to_string(),
            ));
        }
        if self.jac_sp.nrow() != self.ng || self.jac_sp.ncol() != self.nx {
            return Err(ConfigError::InvalidProblem(format!(
                "Jacobian pattern is {}x{}, expected {}x{}",
                self.jac_sp.nrow(),
                self.jac_sp.ncol(),
                self.ng,
                self.nx
            )));
        }
        if let Some(ref hsp) = self.hess_sp {
            if hsp.nrow() != self.nx || hsp.ncol() != self.nx {
                return Err(ConfigError::InvalidProblem(format!(
                    "Hessian pattern is {}x{}, expected {}x{}",
                    hsp.nrow(),
                    hsp.ncol(),
                    self.nx,
                    self.nx
                )));
            }
        }
        Ok(())
    }
}

/// Hessian handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HessianApprox {
    /// Evaluate the exact Lagrangian Hessian each iteration.
    #[serde(rename = "exact")]
    Exact,

    /// Damped BFGS approximation on a dense pattern, reset periodically.
    #[serde(rename = "limited-memory")]
    LimitedMemory,
}

/// Solver options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqpSettings {
    /// Descriptive name of the QP subsolver supplied by the factory.
    pub qpsol: String,

    /// Exact Hessian or limited-memory BFGS.
    pub hessian_approximation: HessianApprox,

    /// Maximum number of SQP iterations.
    pub max_iter: usize,

    /// Minimum number of SQP iterations before convergence is accepted.
    pub min_iter: usize,

    /// Maximum number of line-search trials; 0 disables the line search
    /// (full steps, duals replaced wholesale).
    pub max_iter_ls: usize,

    /// Stopping tolerance on primal infeasibility.
    pub tol_pr: f64,

    /// Stopping tolerance on dual infeasibility.
    pub tol_du: f64,

    /// Armijo sufficient-decrease coefficient.
    pub c1: f64,

    /// Line-search backtracking factor.
    pub beta: f64,

    /// Length of the non-monotone merit history window.
    pub merit_memory: usize,

    /// BFGS reset period (iterations between identity resets).
    pub lbfgs_memory: usize,

    /// Gershgorin regularization of the exact Hessian.
    pub regularize: bool,

    /// Print the problem-statistics banner at construction.
    pub print_header: bool,

    /// Print one row per iteration.
    pub print_iteration: bool,

    /// Print a status message at termination.
    pub print_status: bool,

    /// Terminate when the step inf-norm falls below this.
    pub min_step_size: f64,
}

impl Default for SqpSettings {
    fn default() -> Self {
        Self {
            qpsol: "admm".to_string(),
            hessian_approximation: HessianApprox::Exact,
            max_iter: 50,
            min_iter: 0,
            max_iter_ls: 3,
            tol_pr: 1e-6,
            tol_du: 1e-6,
            c1: 1e-4,
            beta: 0.8,
            merit_memory: 4,
            lbfgs_memory: 10,
            regularize: false,
            print_header: true,
            print_iteration: true,
            print_status: true,
            min_step_size: 1e-10,
        }
    }
}

impl SqpSettings {
    /// Validate option ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.qpsol.is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "qpsol",
                msg: "subsolver name must not be empty".to_string(),
            });
        }
        if self.merit_memory == 0 {
            return Err(ConfigError::InvalidOption {
                option: "merit_memory",
                msg: "window must hold at least one entry".to_string(),
            });
        }
        if self.lbfgs_memory == 0 {
            return Err(ConfigError::InvalidOption {
                option: "lbfgs_memory",
                msg: "reset period must be positive".to_string(),
            });
        }
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(ConfigError::InvalidOption {
                option: "beta",
                msg: format!("backtracking factor must be in (0, 1), got {}", self.beta),
            });
        }
        if !(self.c1 > 0.0 && self.c1 < 1.0) {
            return Err(ConfigError::InvalidOption {
                option: "c1",
                msg: format!("Armijo coefficient must be in (0, 1), got {}", self.c1),
            });
        }
        if !(self.tol_pr > 0.0) || !(self.tol_du > 0.0) {
            return Err(ConfigError::InvalidOption {
                option: "tol_pr/tol_du",
                msg: "tolerances must be positive".to_string(),
            });
        }
        if !(self.min_step_size >= 0.0) {
            return Err(ConfigError::InvalidOption {
                option: "min_step_size",
                msg: "stall threshold must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the exact Hessian is used.
    #[inline]
    pub fn exact_hessian(&self) -> bool {
        self.hessian_approximation == HessianApprox::Exact
    }
}

/// Terminal solve status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Primal and dual tolerances met.
    Succeeded,

    /// Iteration cap reached without convergence.
    MaxIterationsExceeded,

    /// Search direction shrank below `min_step_size` before convergence.
    StepTooSmall,

    /// The iteration callback requested a stop.
    UserRequestedStop,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Succeeded => write!(f, "Solve_Succeeded"),
            SolveStatus::MaxIterationsExceeded => write!(f, "Maximum_Iterations_Exceeded"),
            SolveStatus::StepTooSmall => write!(f, "Search_Direction_Becomes_Too_Small"),
            SolveStatus::UserRequestedStop => write!(f, "User_Requested_Stop"),
        }
    }
}

/// Coarse status classification carried alongside the string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifiedStatus {
    /// Converged.
    Success,

    /// Stopped by a resource limit (iteration cap).
    Limited,

    /// Any other terminal state.
    Unknown,
}

/// Per-solve inputs. Bounds default to unbounded, multipliers to zero,
/// the parameter vector to empty.
#[derive(Debug, Clone)]
pub struct SolveInputs<'a> {
    /// Initial primal point (length nx).
    pub x0: &'a [f64],

    /// Parameter values (length np).
    pub p: &'a [f64],

    /// Lower variable bounds (length nx; `None` = -inf).
    pub lbx: Option<&'a [f64]>,

    /// Upper variable bounds (length nx; `None` = +inf).
    pub ubx: Option<&'a [f64]>,

    /// Lower constraint bounds (length ng; `None` = -inf).
    pub lbg: Option<&'a [f64]>,

    /// Upper constraint bounds (length ng; `None` = +inf).
    pub ubg: Option<&'a [f64]>,

    /// Initial bound multipliers (length nx; `None` = zero).
    pub lam_x0: Option<&'a [f64]>,

    /// Initial constraint multipliers (length ng; `None` = zero).
    pub lam_g0: Option<&'a [f64]>,
}

impl<'a> SolveInputs<'a> {
    /// Inputs with only a start point; everything else defaulted.
    pub fn new(x0: &'a [f64]) -> Self {
        Self {
            x0,
            p: &[],
            lbx: None,
            ubx: None,
            lbg: None,
            ubg: None,
            lam_x0: None,
            lam_g0: None,
        }
    }
}

/// End-of-solve statistics.
#[derive(Debug, Clone)]
pub struct SolveStats {
    /// Number of completed SQP iterations.
    pub iter_count: usize,

    /// String tag of the terminal status.
    pub return_status: String,

    /// Whether the solve converged.
    pub success: bool,

    /// Coarse status classification.
    pub unified: UnifiedStatus,
}

/// Solution and diagnostics.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Terminal status.
    pub status: SolveStatus,

    /// Objective value at the final iterate.
    pub f: f64,

    /// Final primal point (length nx).
    pub x: Vec<f64>,

    /// Constraint values at the final point (length ng).
    pub g: Vec<f64>,

    /// Bound multipliers (length nx; positive at an active upper bound).
    pub lam_x: Vec<f64>,

    /// Constraint multipliers (length ng).
    pub lam_g: Vec<f64>,

    /// Parameter sensitivities `-grad_p L` (length np; empty when np = 0).
    pub lam_p: Vec<f64>,

    /// Statistics.
    pub stats: SolveStats,
}

/// Snapshot passed to the iteration callback, after the iteration's
/// diagnostics are computed and before the step is taken.
#[derive(Debug, Clone)]
pub struct IterationInfo {
    /// Iteration number (0-based).
    pub iter: usize,

    /// Current objective value.
    pub obj: f64,

    /// Worst bound/constraint violation.
    pub inf_pr: f64,

    /// Inf-norm of the Lagrangian gradient.
    pub inf_du: f64,

    /// Inf-norm of the previous accepted step.
    pub dx_norm: f64,

    /// Hessian regularization applied this solve.
    pub reg: f64,

    /// Current L1 merit penalty.
    pub sigma: f64,

    /// Line-search trials in the previous iteration.
    pub ls_trials: usize,

    /// Whether the previous line search met the Armijo test.
    pub ls_success: bool,
}
