//! Sequential quadratic programming driver.
//!
//! Each major iteration evaluates first-order information, checks
//! convergence, builds the Lagrangian Hessian (exact or damped BFGS),
//! delegates the step computation to the injected QP subsolver, runs the
//! non-monotone L1 merit line search, and applies the accepted step to
//! the primal/dual iterate.

pub(crate) mod linesearch;
mod print;
pub(crate) mod workspace;

use thiserror::Error;

use crate::linalg::kernels::{axpy, bfgs, bfgs_reset, bilin, lb_eig, max_viol, mv, norm_inf, regularize, scal};
use crate::linalg::Sparsity;
use crate::oracle::{EvalError, NlpOracle};
use crate::problem::{
    ConfigError, IterationInfo, NlpProblem, SolveInputs, SolveResult, SolveStats, SolveStatus,
    SqpSettings, UnifiedStatus,
};
use crate::qp::{QpError, QpProblem, QpSolver, QpVars};

use linesearch::LsOutcome;
use workspace::SqpWorkspace;

/// Construction errors.
#[derive(Debug, Error)]
pub enum SqpError {
    /// Invalid options or inconsistent problem description.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The QP factory failed.
    #[error(transparent)]
    Qp(#[from] QpError),
}

/// Solve-time errors. Terminal-but-ordinary outcomes (iteration limit,
/// stall, callback stop) are reported through
/// [`SolveStatus`], not through this type.
#[derive(Debug, Error)]
pub enum SolveError {
    /// Input slices have the wrong lengths.
    #[error("invalid solve inputs: {0}")]
    Inputs(String),

    /// A structural evaluation (Jacobian, Hessian, post-solve gradient)
    /// failed.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// The QP subsolver failed.
    #[error(transparent)]
    Qp(#[from] QpError),
}

/// Iteration callback: receives a diagnostics snapshot once per
/// iteration; returning `false` requests a cooperative stop.
pub type IterationCallback = Box<dyn FnMut(&IterationInfo) -> bool>;

/// SQP solver instance.
///
/// Owns the per-solve memory record; one instance serves repeated
/// solves of the same problem. For concurrent solves, create one
/// instance per thread over a shared oracle.
pub struct Sqp<O: NlpOracle> {
    prob: NlpProblem,
    oracle: O,
    settings: SqpSettings,
    hsp: Sparsity,
    qpsol: Box<dyn QpSolver>,
    ws: SqpWorkspace,
    callback: Option<IterationCallback>,
}

impl<O: NlpOracle> Sqp<O> {
    /// Validate the configuration, acquire a QP subsolver from the
    /// factory, and lay out the workspace.
    pub fn new<F>(
        prob: NlpProblem,
        oracle: O,
        settings: SqpSettings,
        qp_factory: F,
    ) -> Result<Self, SqpError>
    where
        F: FnOnce(&Sparsity, &Sparsity) -> Result<Box<dyn QpSolver>, QpError>,
    {
        settings.validate()?;
        prob.validate()?;

        let hsp = if settings.exact_hessian() {
            prob.hess_sp.clone().ok_or_else(|| {
                ConfigError::InvalidProblem(
                    "exact Hessian requested but no Hessian pattern given".to_string(),
                )
            })?
        } else {
            Sparsity::dense(prob.nx, prob.nx)
        };

        let qpsol = qp_factory(&hsp, &prob.jac_sp)?;
        let ws = SqpWorkspace::new(&prob, &settings, &hsp);

        if settings.print_header {
            print::banner(
                prob.nx,
                prob.ng,
                prob.jac_sp.nnz(),
                hsp.nnz(),
                settings.exact_hessian(),
            );
        }

        Ok(Self {
            prob,
            oracle,
            settings,
            hsp,
            qpsol,
            ws,
            callback: None,
        })
    }

    /// Install the per-iteration callback.
    pub fn set_callback<F>(&mut self, cb: F)
    where
        F: FnMut(&IterationInfo) -> bool + 'static,
    {
        self.callback = Some(Box::new(cb));
    }

    /// Remove the per-iteration callback.
    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    /// Solver options.
    pub fn settings(&self) -> &SqpSettings {
        &self.settings
    }

    /// Problem descriptor.
    pub fn problem(&self) -> &NlpProblem {
        &self.prob
    }

    /// Effective Hessian pattern (dense in limited-memory mode).
    pub fn hess_sp(&self) -> &Sparsity {
        &self.hsp
    }

    /// Run the SQP iteration from the given inputs.
    pub fn solve(&mut self, inputs: &SolveInputs<'_>) -> Result<SolveResult, SolveError> {
        self.check_inputs(inputs)?;

        let nx = self.prob.nx;
        let np = self.prob.np;
        let set = self.settings.clone();
        let exact_hessian = set.exact_hessian();

        self.ws.init_solve(inputs);

        let mut iter_count = 0usize;
        let mut ls_iter = 0usize;
        let mut ls_success = true;
        let mut merit_ind = 0usize;
        let mut sigma = 0.0_f64;
        let mut reg = 0.0_f64;

        self.ws.dx.fill(0.0);

        // MAIN OPTIMIZATION LOOP
        let status = loop {
            // Evaluate f, g and first-order derivative information;
            // refreshes the constraint slots of z in place
            {
                let ws = &mut self.ws;
                let (x, gvals) = ws.z.split_at_mut(nx);
                self.oracle
                    .eval_jac_fg(x, inputs.p, &mut ws.f, &mut ws.gf, gvals, &mut ws.jk)?;
            }

            // Gradient of the Lagrangian: gf + Jk' lam_g + lam_x
            self.ws.glag.copy_from_slice(&self.ws.gf);
            mv(
                &self.ws.jk,
                &self.prob.jac_sp,
                &self.ws.lam[nx..],
                &mut self.ws.glag,
                true,
            );
            axpy(1.0, &self.ws.lam[..nx], &mut self.ws.glag);

            // Iterate diagnostics
            let pr_inf = max_viol(&self.ws.z, &self.ws.lbz, &self.ws.ubz);
            let du_inf = norm_inf(&self.ws.glag);
            let dx_norminf = norm_inf(&self.ws.dx);

            if set.print_iteration {
                if iter_count % 10 == 0 {
                    print::iteration_header();
                }
                print::iteration_row(
                    iter_count, self.ws.f, pr_inf, du_inf, dx_norminf, reg, ls_iter, ls_success,
                );
            }

            if let Some(cb) = self.callback.as_mut() {
                let info = IterationInfo {
                    iter: iter_count,
                    obj: self.ws.f,
                    inf_pr: pr_inf,
                    inf_du: du_inf,
                    dx_norm: dx_norminf,
                    reg,
                    sigma,
                    ls_trials: ls_iter,
                    ls_success,
                };
                if !cb(&info) {
                    if set.print_status {
                        eprintln!("WARNING(sqp-core): aborted by callback");
                    }
                    break SolveStatus::UserRequestedStop;
                }
            }

            // Convergence and termination checks, in order
            if iter_count >= set.min_iter && pr_inf < set.tol_pr && du_inf < set.tol_du {
                if set.print_status {
                    println!(
                        "sqp-core: convergence achieved after {} iterations",
                        iter_count
                    );
                }
                break SolveStatus::Succeeded;
            }

            if iter_count >= set.max_iter {
                if set.print_status {
                    println!("sqp-core: maximum number of iterations reached");
                }
                break SolveStatus::MaxIterationsExceeded;
            }

            if iter_count >= 1 && iter_count >= set.min_iter && dx_norminf <= set.min_step_size {
                if set.print_status {
                    println!(
                        "sqp-core: search direction becomes too small without convergence criteria being met"
                    );
                }
                break SolveStatus::StepTooSmall;
            }

            // Hessian of the Lagrangian
            if exact_hessian {
                {
                    let ws = &mut self.ws;
                    let (x, _) = ws.z.split_at(nx);
                    self.oracle
                        .eval_hess_l(x, inputs.p, 1.0, &ws.lam[nx..], &mut ws.bk)?;
                }
                if set.regularize {
                    reg = f64::max(0.0, -lb_eig(&self.hsp, &self.ws.bk));
                    if reg > 0.0 {
                        regularize(&self.hsp, &mut self.ws.bk, reg);
                    }
                }
            } else if iter_count == 0 {
                // Initialize BFGS
                self.ws.bk.fill(1.0);
                bfgs_reset(&self.hsp, &mut self.ws.bk);
            } else {
                // Reset periodically, then apply the damped update
                if iter_count % set.lbfgs_memory == 0 {
                    bfgs_reset(&self.hsp, &mut self.ws.bk);
                }
                bfgs(
                    &self.hsp,
                    &mut self.ws.bk,
                    &self.ws.dx,
                    &self.ws.glag,
                    &self.ws.glag_old,
                    &mut self.ws.bfgs_work,
                );
            }

            // Formulate the QP: step bounds and warm start
            self.ws.lbdz.copy_from_slice(&self.ws.lbz);
            axpy(-1.0, &self.ws.z, &mut self.ws.lbdz);
            self.ws.ubdz.copy_from_slice(&self.ws.ubz);
            axpy(-1.0, &self.ws.z, &mut self.ws.ubdz);
            self.ws.dlam.copy_from_slice(&self.ws.lam);
            self.ws.dx.fill(0.0);

            iter_count += 1;

            // Solve the QP
            {
                let ws = &mut self.ws;
                let (lbx, lba) = ws.lbdz.split_at(nx);
                let (ubx, uba) = ws.ubdz.split_at(nx);
                let qp = QpProblem {
                    h: &ws.bk,
                    g: &ws.gf,
                    a: &ws.jk,
                    lbx,
                    ubx,
                    lba,
                    uba,
                };
                let (lam_x, lam_a) = ws.dlam.split_at_mut(nx);
                let mut vars = QpVars {
                    x: &mut ws.dx,
                    lam_x,
                    lam_a,
                };
                self.qpsol.solve(&qp, &mut vars)?;
            }

            // Detect indefiniteness (non-fatal)
            let gain = bilin(&self.ws.bk, &self.hsp, &self.ws.dx, &self.ws.dx);
            if gain < 0.0 && set.print_status {
                eprintln!("WARNING(sqp-core): indefinite Hessian detected");
            }

            // Line search, or full step when disabled
            let outcome = if set.max_iter_ls > 0 {
                linesearch::line_search(
                    &self.oracle,
                    inputs.p,
                    &set,
                    &mut self.ws,
                    &mut sigma,
                    &mut merit_ind,
                    iter_count,
                )
            } else {
                self.ws.lam.copy_from_slice(&self.ws.dlam);
                LsOutcome {
                    t: 1.0,
                    ls_iter: 0,
                    ls_success: true,
                }
            };
            ls_iter = outcome.ls_iter;
            ls_success = outcome.ls_success;

            // Take the step (dx already scaled by the accepted fraction)
            axpy(1.0, &self.ws.dx, &mut self.ws.z[..nx]);

            if !exact_hessian {
                // Lagrangian gradient at the old x but new multipliers;
                // the next iteration's refresh completes the secant pair
                self.ws.glag_old.copy_from_slice(&self.ws.gf);
                mv(
                    &self.ws.jk,
                    &self.prob.jac_sp,
                    &self.ws.lam[nx..],
                    &mut self.ws.glag_old,
                    true,
                );
                axpy(1.0, &self.ws.lam[..nx], &mut self.ws.glag_old);
            }
        };

        // Post-solve extraction: parameter sensitivities of the
        // Lagrangian at the final iterate
        let mut lam_p = vec![0.0; np];
        if np > 0 {
            let ws = &mut self.ws;
            let (x, gvals) = ws.z.split_at_mut(nx);
            self.oracle.eval_grad(
                x,
                inputs.p,
                1.0,
                &ws.lam[nx..],
                Some(&mut ws.f),
                Some(gvals),
                None,
                Some(&mut lam_p),
            )?;
            scal(-1.0, &mut lam_p);
        }

        let success = status == SolveStatus::Succeeded;
        let unified = match status {
            SolveStatus::Succeeded => UnifiedStatus::Success,
            SolveStatus::MaxIterationsExceeded => UnifiedStatus::Limited,
            _ => UnifiedStatus::Unknown,
        };

        Ok(SolveResult {
            status,
            f: self.ws.f,
            x: self.ws.z[..nx].to_vec(),
            g: self.ws.z[nx..].to_vec(),
            lam_x: self.ws.lam[..nx].to_vec(),
            lam_g: self.ws.lam[nx..].to_vec(),
            lam_p,
            stats: SolveStats {
                iter_count,
                return_status: status.to_string(),
                success,
                unified,
            },
        })
    }

    fn check_inputs(&self, inputs: &SolveInputs<'_>) -> Result<(), SolveError> {
        let (nx, ng, np) = (self.prob.nx, self.prob.ng, self.prob.np);
        let check = |name: &str, len: usize, expected: usize| {
            if len != expected {
                Err(SolveError::Inputs(format!(
                    "{} has length {}, expected {}",
                    name, len, expected
                )))
            } else {
                Ok(())
            }
        };
        check("x0", inputs.x0.len(), nx)?;
        check("p", inputs.p.len(), np)?;
        if let Some(s) = inputs.lbx {
            check("lbx", s.len(), nx)?;
        }
        if let Some(s) = inputs.ubx {
            check("ubx", s.len(), nx)?;
        }
        if let Some(s) = inputs.lbg {
            check("lbg", s.len(), ng)?;
        }
        if let Some(s) = inputs.ubg {
            check("ubg", s.len(), ng)?;
        }
        if let Some(s) = inputs.lam_x0 {
            check("lam_x0", s.len(), nx)?;
        }
        if let Some(s) = inputs.lam_g0 {
            check("lam_g0", s.len(), ng)?;
        }
        Ok(())
    }
}
