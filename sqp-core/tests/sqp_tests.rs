//! End-to-end tests for the SQP driver with the bundled ADMM subsolver.
//!
//! Covers the scenario problems (unconstrained and box-constrained
//! quadratics, Rosenbrock, an infeasible box, iteration caps, disabled
//! line search), constrained problems exercising the Jacobian path, and
//! the solver laws: feasible restart, monotone merit penalty, BFGS
//! identity start, and serialization round-trip.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use sqp_core::{
    AdmmQp, AdmmSettings, EvalError, HessianApprox, NlpOracle, NlpProblem, SolveInputs,
    SolveStatus, Sparsity, Sqp, SqpConfig, SqpSettings, UnifiedStatus,
};

const INF: f64 = f64::INFINITY;

fn quiet() -> SqpSettings {
    SqpSettings {
        print_header: false,
        print_iteration: false,
        print_status: false,
        ..SqpSettings::default()
    }
}

fn admm() -> AdmmSettings {
    AdmmSettings::default()
}

// ---------------------------------------------------------------------------
// Test oracles
// ---------------------------------------------------------------------------

/// f(x) = 1/2 x'x - b'x, unconstrained. Minimizer x = b.
struct Quadratic {
    b: [f64; 2],
}

impl Quadratic {
    fn problem() -> NlpProblem {
        NlpProblem {
            nx: 2,
            ng: 0,
            np: 0,
            jac_sp: Sparsity::empty(0, 2),
            hess_sp: Some(Sparsity::from_triplets(2, 2, &[(0, 0), (1, 1)])),
        }
    }
}

impl NlpOracle for Quadratic {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = 0.5 * (x[0] * x[0] + x[1] * x[1]) - self.b[0] * x[0] - self.b[1] * x[1];
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        _jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        self.eval_fg(x, p, f, g)?;
        grad_f[0] = x[0] - self.b[0];
        grad_f[1] = x[1] - self.b[1];
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        sigma_f: f64,
        _lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError> {
        hess[0] = sigma_f;
        hess[1] = sigma_f;
        Ok(())
    }
}

/// f(x) = -x on one variable; linear, empty Hessian pattern.
struct NegX;

impl NegX {
    fn problem() -> NlpProblem {
        NlpProblem {
            nx: 1,
            ng: 0,
            np: 0,
            jac_sp: Sparsity::empty(0, 1),
            hess_sp: Some(Sparsity::empty(1, 1)),
        }
    }
}

impl NlpOracle for NegX {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = -x[0];
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        _p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        _g: &mut [f64],
        _jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        *f = -x[0];
        grad_f[0] = -1.0;
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        _sigma_f: f64,
        _lam_g: &[f64],
        _hess: &mut [f64],
    ) -> Result<(), EvalError> {
        Ok(())
    }
}

/// f(x) = x on one variable (for the infeasible box).
struct PlusX;

impl NlpOracle for PlusX {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = x[0];
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        _p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        _g: &mut [f64],
        _jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        *f = x[0];
        grad_f[0] = 1.0;
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        _sigma_f: f64,
        _lam_g: &[f64],
        _hess: &mut [f64],
    ) -> Result<(), EvalError> {
        Ok(())
    }
}

/// The Rosenbrock function, unconstrained.
struct Rosenbrock;

impl Rosenbrock {
    fn problem() -> NlpProblem {
        NlpProblem {
            nx: 2,
            ng: 0,
            np: 0,
            jac_sp: Sparsity::empty(0, 2),
            hess_sp: Some(Sparsity::dense(2, 2)),
        }
    }
}

impl NlpOracle for Rosenbrock {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        _jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        self.eval_fg(x, p, f, g)?;
        grad_f[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]);
        grad_f[1] = 200.0 * (x[1] - x[0] * x[0]);
        Ok(())
    }

    fn eval_hess_l(
        &self,
        x: &[f64],
        _p: &[f64],
        sigma_f: f64,
        _lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError> {
        hess[0] = sigma_f * (2.0 - 400.0 * x[1] + 1200.0 * x[0] * x[0]);
        hess[1] = sigma_f * (-400.0 * x[0]);
        hess[2] = sigma_f * (-400.0 * x[0]);
        hess[3] = sigma_f * 200.0;
        Ok(())
    }
}

/// f = 1/2 x'x subject to x1 + x2 = 1. Solution (0.5, 0.5), lam_g = -0.5.
struct EqQuad;

impl EqQuad {
    fn problem() -> NlpProblem {
        NlpProblem {
            nx: 2,
            ng: 1,
            np: 0,
            jac_sp: Sparsity::dense(1, 2),
            hess_sp: Some(Sparsity::from_triplets(2, 2, &[(0, 0), (1, 1)])),
        }
    }
}

impl NlpOracle for EqQuad {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, g: &mut [f64]) -> Result<(), EvalError> {
        *f = 0.5 * (x[0] * x[0] + x[1] * x[1]);
        g[0] = x[0] + x[1];
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        self.eval_fg(x, p, f, g)?;
        grad_f[0] = x[0];
        grad_f[1] = x[1];
        jac_g[0] = 1.0;
        jac_g[1] = 1.0;
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        sigma_f: f64,
        _lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError> {
        hess[0] = sigma_f;
        hess[1] = sigma_f;
        Ok(())
    }
}

/// min x1 + x2 subject to x1^2 + x2^2 <= 1.
/// Solution (-1/sqrt(2), -1/sqrt(2)), lam_g = 1/sqrt(2).
struct Circle;

impl Circle {
    fn problem() -> NlpProblem {
        NlpProblem {
            nx: 2,
            ng: 1,
            np: 0,
            jac_sp: Sparsity::dense(1, 2),
            hess_sp: Some(Sparsity::from_triplets(2, 2, &[(0, 0), (1, 1)])),
        }
    }
}

impl NlpOracle for Circle {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, g: &mut [f64]) -> Result<(), EvalError> {
        *f = x[0] + x[1];
        g[0] = x[0].powi(2) + x[1].powi(2);
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        self.eval_fg(x, p, f, g)?;
        grad_f[0] = 1.0;
        grad_f[1] = 1.0;
        jac_g[0] = 2.0 * x[0];
        jac_g[1] = 2.0 * x[1];
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        _sigma_f: f64,
        lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError> {
        hess[0] = 2.0 * lam_g[0];
        hess[1] = 2.0 * lam_g[0];
        Ok(())
    }
}

/// Nonconvex saddle: f = x1 * x2, indefinite Hessian everywhere.
struct Saddle;

impl Saddle {
    fn problem() -> NlpProblem {
        NlpProblem {
            nx: 2,
            ng: 0,
            np: 0,
            jac_sp: Sparsity::empty(0, 2),
            hess_sp: Some(Sparsity::dense(2, 2)),
        }
    }
}

impl NlpOracle for Saddle {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = x[0] * x[1];
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        _p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        _g: &mut [f64],
        _jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        *f = x[0] * x[1];
        grad_f[0] = x[1];
        grad_f[1] = x[0];
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        sigma_f: f64,
        _lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError> {
        hess[0] = 0.0;
        hess[1] = sigma_f;
        hess[2] = sigma_f;
        hess[3] = 0.0;
        Ok(())
    }
}

/// f = 1/2 x'x - p'x with a parameter vector p; minimizer x = p.
struct ParamQuad;

impl ParamQuad {
    fn problem() -> NlpProblem {
        NlpProblem {
            nx: 2,
            ng: 0,
            np: 2,
            jac_sp: Sparsity::empty(0, 2),
            hess_sp: Some(Sparsity::from_triplets(2, 2, &[(0, 0), (1, 1)])),
        }
    }
}

impl NlpOracle for ParamQuad {
    fn eval_fg(&self, x: &[f64], p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = 0.5 * (x[0] * x[0] + x[1] * x[1]) - p[0] * x[0] - p[1] * x[1];
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        _jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        self.eval_fg(x, p, f, g)?;
        grad_f[0] = x[0] - p[0];
        grad_f[1] = x[1] - p[1];
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        sigma_f: f64,
        _lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError> {
        hess[0] = sigma_f;
        hess[1] = sigma_f;
        Ok(())
    }

    fn eval_grad(
        &self,
        x: &[f64],
        p: &[f64],
        sigma_f: f64,
        _lam_g: &[f64],
        f: Option<&mut f64>,
        g: Option<&mut [f64]>,
        grad_x: Option<&mut [f64]>,
        grad_p: Option<&mut [f64]>,
    ) -> Result<(), EvalError> {
        if let Some(f) = f {
            *f = 0.5 * (x[0] * x[0] + x[1] * x[1]) - p[0] * x[0] - p[1] * x[1];
        }
        if let Some(_g) = g {
            // ng = 0, nothing to write
        }
        if let Some(gx) = grad_x {
            gx[0] = sigma_f * (x[0] - p[0]);
            gx[1] = sigma_f * (x[1] - p[1]);
        }
        if let Some(gp) = grad_p {
            gp[0] = -sigma_f * x[0];
            gp[1] = -sigma_f * x[1];
        }
        Ok(())
    }
}

/// f = 1/2 (4 x1^2 + x2^2) - 4 x1 - x2, minimizer (1, 1). Used in
/// limited-memory mode, so no Hessian pattern is required.
struct AnisoQuad;

impl NlpOracle for AnisoQuad {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = 0.5 * (4.0 * x[0] * x[0] + x[1] * x[1]) - 4.0 * x[0] - x[1];
        Ok(())
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        _jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        self.eval_fg(x, p, f, g)?;
        grad_f[0] = 4.0 * x[0] - 4.0;
        grad_f[1] = x[1] - 1.0;
        Ok(())
    }

    fn eval_hess_l(
        &self,
        _x: &[f64],
        _p: &[f64],
        _sigma_f: f64,
        _lam_g: &[f64],
        _hess: &mut [f64],
    ) -> Result<(), EvalError> {
        // Limited-memory mode only; never called
        Ok(())
    }
}

/// Quadratic whose first `eval_fg` call fails, exercising the
/// backtrack-on-failure path of the line search.
struct Fragile {
    inner: Quadratic,
    armed: Cell<bool>,
}

impl NlpOracle for Fragile {
    fn eval_fg(&self, x: &[f64], p: &[f64], f: &mut f64, g: &mut [f64]) -> Result<(), EvalError> {
        if self.armed.replace(false) {
            return Err(EvalError::new("eval_fg"));
        }
        self.inner.eval_fg(x, p, f, g)
    }

    fn eval_jac_fg(
        &self,
        x: &[f64],
        p: &[f64],
        f: &mut f64,
        grad_f: &mut [f64],
        g: &mut [f64],
        jac_g: &mut [f64],
    ) -> Result<(), EvalError> {
        self.inner.eval_jac_fg(x, p, f, grad_f, g, jac_g)
    }

    fn eval_hess_l(
        &self,
        x: &[f64],
        p: &[f64],
        sigma_f: f64,
        lam_g: &[f64],
        hess: &mut [f64],
    ) -> Result<(), EvalError> {
        self.inner.eval_hess_l(x, p, sigma_f, lam_g, hess)
    }
}

// ---------------------------------------------------------------------------
// Scenario tests
// ---------------------------------------------------------------------------

#[test]
fn unconstrained_quadratic_converges_in_one_iteration() {
    let mut solver = Sqp::new(
        Quadratic::problem(),
        Quadratic { b: [1.0, 2.0] },
        quiet(),
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let infos = Rc::new(RefCell::new(Vec::new()));
    let sink = infos.clone();
    solver.set_callback(move |info| {
        sink.borrow_mut().push(info.clone());
        true
    });

    let result = solver.solve(&SolveInputs::new(&[0.0, 0.0])).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert!(result.stats.success);
    assert_eq!(result.stats.unified, UnifiedStatus::Success);
    assert_eq!(result.stats.iter_count, 1);
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-9);
    assert_relative_eq!(result.x[1], 2.0, epsilon = 1e-9);

    // Dual infeasibility at the accepted iterate
    let last = infos.borrow().last().unwrap().clone();
    assert!(last.inf_du < 1e-10, "inf_du = {:e}", last.inf_du);
    assert_eq!(last.inf_pr, 0.0);
}

#[test]
fn box_constrained_linear_hits_upper_bound() {
    let mut solver = Sqp::new(NegX::problem(), NegX, quiet(), AdmmQp::factory(admm())).unwrap();

    let inputs = SolveInputs {
        lbx: Some(&[0.0]),
        ubx: Some(&[1.0]),
        ..SolveInputs::new(&[0.5])
    };
    let result = solver.solve(&inputs).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_eq!(result.stats.return_status, "Solve_Succeeded");
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(result.lam_x[0], 1.0, epsilon = 1e-6);
}

#[test]
fn rosenbrock_converges_with_exact_hessian() {
    let mut solver = Sqp::new(
        Rosenbrock::problem(),
        Rosenbrock,
        quiet(),
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let result = solver.solve(&SolveInputs::new(&[-1.2, 1.0])).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert!(result.stats.iter_count < 50);
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-5);
    assert_relative_eq!(result.x[1], 1.0, epsilon = 1e-5);
    assert!(result.f < 1e-10);
}

#[test]
fn infeasible_box_terminates_without_crashing() {
    let prob = NlpProblem {
        nx: 1,
        ng: 0,
        np: 0,
        jac_sp: Sparsity::empty(0, 1),
        hess_sp: Some(Sparsity::empty(1, 1)),
    };
    let mut solver = Sqp::new(prob, PlusX, quiet(), AdmmQp::factory(admm())).unwrap();

    // x >= 1 and x <= 0 cannot both hold
    let inputs = SolveInputs {
        lbx: Some(&[1.0]),
        ubx: Some(&[0.0]),
        ..SolveInputs::new(&[0.5])
    };
    let result = solver.solve(&inputs).unwrap();

    assert!(!result.stats.success);
    assert!(matches!(
        result.status,
        SolveStatus::MaxIterationsExceeded | SolveStatus::StepTooSmall
    ));
    assert!(result.f.is_finite());
    assert!(result.x[0].is_finite());
    assert!(result.lam_x[0].is_finite());
}

#[test]
fn max_iter_cutoff_reports_limit_status() {
    let settings = SqpSettings {
        max_iter: 2,
        ..quiet()
    };
    let mut solver = Sqp::new(
        Rosenbrock::problem(),
        Rosenbrock,
        settings,
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let result = solver.solve(&SolveInputs::new(&[-1.2, 1.0])).unwrap();

    assert_eq!(result.status, SolveStatus::MaxIterationsExceeded);
    assert_eq!(result.stats.return_status, "Maximum_Iterations_Exceeded");
    assert_eq!(result.stats.unified, UnifiedStatus::Limited);
    assert_eq!(result.stats.iter_count, 2);
}

#[test]
fn disabled_line_search_takes_full_steps() {
    let settings = SqpSettings {
        max_iter_ls: 0,
        ..quiet()
    };
    let mut solver = Sqp::new(
        Quadratic::problem(),
        Quadratic { b: [1.0, 2.0] },
        settings,
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let result = solver.solve(&SolveInputs::new(&[0.0, 0.0])).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_eq!(result.stats.iter_count, 1);
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-9);
    assert_relative_eq!(result.x[1], 2.0, epsilon = 1e-9);
}

// ---------------------------------------------------------------------------
// Constrained problems
// ---------------------------------------------------------------------------

#[test]
fn equality_constrained_quadratic() {
    let mut solver = Sqp::new(EqQuad::problem(), EqQuad, quiet(), AdmmQp::factory(admm())).unwrap();

    let inputs = SolveInputs {
        lbg: Some(&[1.0]),
        ubg: Some(&[1.0]),
        ..SolveInputs::new(&[0.0, 0.0])
    };
    let result = solver.solve(&inputs).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_relative_eq!(result.x[0], 0.5, epsilon = 1e-6);
    assert_relative_eq!(result.x[1], 0.5, epsilon = 1e-6);
    assert_relative_eq!(result.lam_g[0], -0.5, epsilon = 1e-6);
    // Constraint slots of the iterate mirror g(x) at the final point
    assert_eq!(result.g[0], result.x[0] + result.x[1]);
}

#[test]
fn inequality_constrained_circle() {
    let mut solver = Sqp::new(Circle::problem(), Circle, quiet(), AdmmQp::factory(admm())).unwrap();

    let lam_g0 = [1.0];
    let inputs = SolveInputs {
        lbg: Some(&[-INF]),
        ubg: Some(&[1.0]),
        lam_g0: Some(&lam_g0),
        ..SolveInputs::new(&[-0.5, -0.5])
    };
    let result = solver.solve(&inputs).unwrap();

    let s = -(0.5_f64).sqrt();
    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_relative_eq!(result.x[0], s, epsilon = 1e-5);
    assert_relative_eq!(result.x[1], s, epsilon = 1e-5);
    assert_relative_eq!(result.lam_g[0], (0.5_f64).sqrt(), epsilon = 1e-4);
    assert_relative_eq!(result.g[0], 1.0, epsilon = 1e-5);
}

// ---------------------------------------------------------------------------
// Laws
// ---------------------------------------------------------------------------

#[test]
fn feasible_restart_terminates_immediately() {
    let mut solver = Sqp::new(EqQuad::problem(), EqQuad, quiet(), AdmmQp::factory(admm())).unwrap();

    let inputs = SolveInputs {
        lbg: Some(&[1.0]),
        ubg: Some(&[1.0]),
        ..SolveInputs::new(&[0.0, 0.0])
    };
    let first = solver.solve(&inputs).unwrap();
    assert_eq!(first.status, SolveStatus::Succeeded);

    let restart = SolveInputs {
        lbg: Some(&[1.0]),
        ubg: Some(&[1.0]),
        lam_x0: Some(&first.lam_x),
        lam_g0: Some(&first.lam_g),
        ..SolveInputs::new(&first.x)
    };
    let second = solver.solve(&restart).unwrap();

    assert_eq!(second.status, SolveStatus::Succeeded);
    assert!(second.stats.iter_count <= 1);
}

#[test]
fn merit_penalty_is_monotone() {
    let mut solver = Sqp::new(NegX::problem(), NegX, quiet(), AdmmQp::factory(admm())).unwrap();

    let sigmas = Rc::new(RefCell::new(Vec::new()));
    let sink = sigmas.clone();
    solver.set_callback(move |info| {
        sink.borrow_mut().push(info.sigma);
        true
    });

    let inputs = SolveInputs {
        lbx: Some(&[0.0]),
        ubx: Some(&[1.0]),
        ..SolveInputs::new(&[0.5])
    };
    solver.solve(&inputs).unwrap();

    let sigmas = sigmas.borrow();
    assert!(sigmas.len() >= 2);
    for w in sigmas.windows(2) {
        assert!(w[1] >= w[0], "sigma decreased: {:?}", &*sigmas);
    }
    assert!(*sigmas.last().unwrap() > 0.0);
}

#[test]
fn bfgs_identity_start_takes_exact_newton_step() {
    // With B reset to the identity each iteration and the true Hessian
    // equal to the identity, the first step is the exact Newton step.
    let prob = NlpProblem {
        hess_sp: None,
        ..Quadratic::problem()
    };
    let settings = SqpSettings {
        hessian_approximation: HessianApprox::LimitedMemory,
        lbfgs_memory: 1,
        ..quiet()
    };
    let mut solver = Sqp::new(
        prob,
        Quadratic { b: [1.0, 2.0] },
        settings,
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let result = solver.solve(&SolveInputs::new(&[0.0, 0.0])).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_eq!(result.stats.iter_count, 1);
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-9);
    assert_relative_eq!(result.x[1], 2.0, epsilon = 1e-9);
}

#[test]
fn bfgs_recovers_anisotropic_curvature() {
    // f = 1/2 (4 x1^2 + x2^2) - 4 x1 - x2, minimizer (1, 1). The first
    // identity-Hessian step overshoots; one secant update restores the
    // diagonal curvature and the iteration turns Newton-like.
    let prob = NlpProblem {
        hess_sp: None,
        ..Quadratic::problem()
    };
    let settings = SqpSettings {
        hessian_approximation: HessianApprox::LimitedMemory,
        max_iter: 100,
        ..quiet()
    };
    let mut solver = Sqp::new(prob, AnisoQuad, settings, AdmmQp::factory(admm())).unwrap();

    let result = solver.solve(&SolveInputs::new(&[0.0, 0.0])).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-5);
    assert_relative_eq!(result.x[1], 1.0, epsilon = 1e-5);
}

#[test]
fn serialization_round_trip_reproduces_iterates() {
    fn run(settings: SqpSettings) -> (Vec<(usize, u64, u64, u64)>, Vec<f64>) {
        let mut solver = Sqp::new(
            Rosenbrock::problem(),
            Rosenbrock,
            settings,
            AdmmQp::factory(admm()),
        )
        .unwrap();
        let trace = Rc::new(RefCell::new(Vec::new()));
        let sink = trace.clone();
        solver.set_callback(move |info| {
            sink.borrow_mut().push((
                info.iter,
                info.obj.to_bits(),
                info.inf_du.to_bits(),
                info.dx_norm.to_bits(),
            ));
            true
        });
        let result = solver.solve(&SolveInputs::new(&[-1.2, 1.0])).unwrap();
        let trace = trace.borrow().clone();
        (trace, result.x)
    }

    let settings = quiet();
    let solver = Sqp::new(
        Rosenbrock::problem(),
        Rosenbrock,
        settings.clone(),
        AdmmQp::factory(admm()),
    )
    .unwrap();
    let json = solver.config().to_json().unwrap();
    drop(solver);

    let restored = SqpConfig::from_json(&json).unwrap();
    assert_eq!(restored.settings(), settings);
    assert_eq!(restored.hsp, Sparsity::dense(2, 2));

    let (trace_a, x_a) = run(settings);
    let (trace_b, x_b) = run(restored.settings());
    assert_eq!(trace_a, trace_b);
    assert_eq!(x_a, x_b);
}

// ---------------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------------

#[test]
fn callback_stop_terminates_with_user_status() {
    let mut solver = Sqp::new(
        Rosenbrock::problem(),
        Rosenbrock,
        quiet(),
        AdmmQp::factory(admm()),
    )
    .unwrap();

    solver.set_callback(|info| info.iter < 1);
    let result = solver.solve(&SolveInputs::new(&[-1.2, 1.0])).unwrap();

    assert_eq!(result.status, SolveStatus::UserRequestedStop);
    assert_eq!(result.stats.return_status, "User_Requested_Stop");
    assert_eq!(result.stats.iter_count, 1);
    assert!(!result.stats.success);
}

#[test]
fn line_search_absorbs_candidate_eval_failure() {
    let oracle = Fragile {
        inner: Quadratic { b: [1.0, 2.0] },
        armed: Cell::new(true),
    };
    let mut solver = Sqp::new(
        Quadratic::problem(),
        oracle,
        quiet(),
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let trials = Rc::new(RefCell::new(Vec::new()));
    let sink = trials.clone();
    solver.set_callback(move |info| {
        sink.borrow_mut().push(info.ls_trials);
        true
    });

    let result = solver.solve(&SolveInputs::new(&[0.0, 0.0])).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(result.x[1], 2.0, epsilon = 1e-8);
    // The failed full-step candidate cost one extra trial in iteration 1
    assert_eq!(trials.borrow()[1], 2);
}

#[test]
fn regularization_stays_zero_on_convex_problems() {
    let settings = SqpSettings {
        regularize: true,
        ..quiet()
    };
    let mut solver = Sqp::new(
        Quadratic::problem(),
        Quadratic { b: [1.0, 2.0] },
        settings,
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let regs = Rc::new(RefCell::new(Vec::new()));
    let sink = regs.clone();
    solver.set_callback(move |info| {
        sink.borrow_mut().push(info.reg);
        true
    });

    let result = solver.solve(&SolveInputs::new(&[0.0, 0.0])).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_eq!(result.stats.iter_count, 1);
    assert!(regs.borrow().iter().all(|&r| r == 0.0));
}

#[test]
fn regularization_fires_on_indefinite_hessian() {
    let settings = SqpSettings {
        regularize: true,
        ..quiet()
    };
    let mut solver = Sqp::new(
        Saddle::problem(),
        Saddle,
        settings,
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let regs = Rc::new(RefCell::new(Vec::new()));
    let sink = regs.clone();
    solver.set_callback(move |info| {
        sink.borrow_mut().push(info.reg);
        true
    });

    let inputs = SolveInputs {
        lbx: Some(&[-1.0, -1.0]),
        ubx: Some(&[1.0, 1.0]),
        ..SolveInputs::new(&[0.5, 0.5])
    };
    let result = solver.solve(&inputs).unwrap();

    // Gershgorin bound of [[0, 1], [1, 0]] is -1: the corrected formula
    // yields reg = 1 once the Hessian has been evaluated
    assert!(regs.borrow().iter().any(|&r| (r - 1.0).abs() < 1e-12));
    assert!(result.x.iter().all(|v| v.is_finite()));
}

#[test]
fn parameter_sensitivities_from_post_solve_extraction() {
    let mut solver = Sqp::new(
        ParamQuad::problem(),
        ParamQuad,
        quiet(),
        AdmmQp::factory(admm()),
    )
    .unwrap();

    let p = [1.0, 2.0];
    let inputs = SolveInputs {
        p: &p,
        ..SolveInputs::new(&[0.0, 0.0])
    };
    let result = solver.solve(&inputs).unwrap();

    assert_eq!(result.status, SolveStatus::Succeeded);
    assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(result.x[1], 2.0, epsilon = 1e-8);
    // lam_p = -grad_p L = x at the solution
    assert_relative_eq!(result.lam_p[0], result.x[0], epsilon = 1e-12);
    assert_relative_eq!(result.lam_p[1], result.x[1], epsilon = 1e-12);
}

#[test]
fn mismatched_input_lengths_are_rejected() {
    let mut solver = Sqp::new(
        Quadratic::problem(),
        Quadratic { b: [1.0, 2.0] },
        quiet(),
        AdmmQp::factory(admm()),
    )
    .unwrap();

    // x0 too short
    assert!(solver.solve(&SolveInputs::new(&[0.0])).is_err());

    // Bound slice of the wrong length
    let inputs = SolveInputs {
        lbx: Some(&[0.0]),
        ..SolveInputs::new(&[0.0, 0.0])
    };
    assert!(solver.solve(&inputs).is_err());
}
