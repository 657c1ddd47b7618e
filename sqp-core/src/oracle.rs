//! NLP function evaluation contract.
//!
//! The solver owns no derivative machinery: objective, constraints, and
//! their derivatives come from a user-supplied [`NlpOracle`]. Every
//! method writes into caller-owned buffers laid out per the problem's
//! sparsity patterns and reports failure through [`EvalError`]. How a
//! failure is handled depends on the call site: a failing candidate
//! evaluation during the line search is absorbed by backtracking, while
//! Jacobian or Hessian failures abort the solve.

use thiserror::Error;

/// An evaluation callback reported failure (NaN-producing point,
/// domain violation, external solver error).
#[derive(Debug, Clone, Error)]
#[error("evaluation of {func} failed")]
pub struct EvalError {
    /// Name of the failing callback, e.g. `"eval_jac_fg"`.
    pub func: &'static str,
}

impl EvalError {
    /// Tag a failure with the callback it came from.
    pub fn new(func: &'static str) -> Self {
        Self { func }
    }
}

/// User-provided evaluation callbacks for one NLP.
///
/// Implementations must be deterministic in `x` and `p`: the driver
/// re-evaluates points during the line search and assumes consistent
/// results. For concurrent solves the implementation must be `Sync`
/// compatible in the usual way (shared `&self`).
pub trait NlpOracle {
    /// Objective and constraint values: `f = f(x, p)`, `g = g(x, p)`.
    fn eval_fg(&self, x: &[f64], p: &[f64], f: &mut f64, g: &mut [f64]) -> Result<(), EvalError>;

    /// First-order information: objective, its gradient, constraint
    /// values, and the constraint Jacobian in `Asp` pattern order.
    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        jac_g: &mut [f64],
    ) -> Result<(), EvalError>;

    /// Hessian of `sigma_f * f + lam_g' g` in `Hsp` pattern order.
    fn eval_hess_l(
        &self,
        x: &[f64],
        p: &[f64],
        sigma_f: f64,
        lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError>;

    /// Post-solve gradient extraction for the Lagrangian
    /// `L = sigma_f * f + lam_g' g`. Every output is optional; the
    /// driver requests only what it needs (currently `grad_p` for the
    /// parameter sensitivities, plus refreshed `f` and `g`).
    ///
    /// The default implementation reports failure; problems without
    /// parameters never reach it.
    fn eval_grad(
        &self,
        _x: &[f64],
        _p: &[f64],
        _sigma_f: f64,
        _lam_g: &[f64],
        _f: Option<&mut f64>,
        _g: Option<&mut [f64]>,
        _grad_x: Option<&mut [f64]>,
        _grad_p: Option<&mut [f64]>,
    ) -> Result<(), EvalError> {
        Err(EvalError::new("eval_grad"))
    }
}
