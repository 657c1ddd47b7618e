//! Reference QP subsolver: operator splitting with a dense Cholesky
//! backend.
//!
//! Solves the step QP by ADMM on the stacked constraint system
//! `l <= [I; A] dx <= u`. Suited to the small and medium problems the
//! test suite and examples use; large-scale deployments inject their own
//! [`QpSolver`](super::QpSolver). All buffers are allocated at
//! construction and reused across subproblems.

use crate::linalg::dense::{cholesky_factor, cholesky_solve};
use crate::linalg::kernels::{axpy, mv, norm_inf};
use crate::linalg::Sparsity;

use super::{QpError, QpProblem, QpSolver, QpVars};

/// Splitting parameters.
#[derive(Debug, Clone, Copy)]
pub struct AdmmSettings {
    /// Constraint penalty.
    pub rho: f64,

    /// Proximal regularization on the primal iterate.
    pub sigma: f64,

    /// Absolute termination tolerance on primal and dual residuals.
    pub eps: f64,

    /// Iteration cap.
    pub max_iter: usize,
}

impl Default for AdmmSettings {
    fn default() -> Self {
        Self {
            rho: 0.1,
            sigma: 1e-6,
            eps: 1e-11,
            max_iter: 20_000,
        }
    }
}

/// ADMM subsolver with preallocated workspace.
pub struct AdmmQp {
    sp_h: Sparsity,
    sp_a: Sparsity,
    settings: AdmmSettings,

    /// Whether the last solve met the residual tolerance.
    converged: bool,

    /// Iterations used by the last solve.
    iterations: usize,

    // Factorization workspace
    kkt: Vec<f64>,
    chol: Vec<f64>,
    a_dense: Vec<f64>,

    // Iteration vectors (nx and nx+na)
    xv: Vec<f64>,
    rhs: Vec<f64>,
    zv: Vec<f64>,
    yv: Vec<f64>,
    ax: Vec<f64>,
    wm: Vec<f64>,
    td: Vec<f64>,
}

#[inline]
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    // lo > hi (contradictory bounds) resolves to hi; no panic
    v.max(lo).min(hi)
}

impl AdmmQp {
    /// Bind a subsolver to the Hessian and Jacobian patterns.
    pub fn new(sp_h: &Sparsity, sp_a: &Sparsity, settings: AdmmSettings) -> Self {
        let nx = sp_h.ncol();
        let na = sp_a.nrow();
        let m = nx + na;
        Self {
            sp_h: sp_h.clone(),
            sp_a: sp_a.clone(),
            settings,
            converged: false,
            iterations: 0,
            kkt: vec![0.0; nx * nx],
            chol: vec![0.0; nx * nx],
            a_dense: vec![0.0; na * nx],
            xv: vec![0.0; nx],
            rhs: vec![0.0; nx],
            zv: vec![0.0; m],
            yv: vec![0.0; m],
            ax: vec![0.0; m],
            wm: vec![0.0; m],
            td: vec![0.0; nx],
        }
    }

    /// Factory suitable for [`Sqp::new`](crate::sqp::Sqp::new).
    pub fn factory(
        settings: AdmmSettings,
    ) -> impl FnOnce(&Sparsity, &Sparsity) -> Result<Box<dyn QpSolver>, QpError> {
        move |sp_h, sp_a| Ok(Box::new(AdmmQp::new(sp_h, sp_a, settings)))
    }

    /// Whether the last solve met the residual tolerance.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Iterations used by the last solve.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl QpSolver for AdmmQp {
    fn solve(&mut self, qp: &QpProblem<'_>, vars: &mut QpVars<'_>) -> Result<(), QpError> {
        let nx = self.sp_h.ncol();
        let na = self.sp_a.nrow();
        let m = nx + na;
        let AdmmSettings {
            rho,
            sigma,
            eps,
            max_iter,
        } = self.settings;

        debug_assert_eq!(qp.h.len(), self.sp_h.nnz());
        debug_assert_eq!(qp.a.len(), self.sp_a.nnz());
        debug_assert_eq!(qp.g.len(), nx);
        debug_assert_eq!(vars.x.len(), nx);
        debug_assert_eq!(vars.lam_x.len(), nx);
        debug_assert_eq!(vars.lam_a.len(), na);

        // Assemble M = H + (sigma + rho) I + rho A'A
        self.kkt.fill(0.0);
        for (rr, cc, el) in self.sp_h.iter() {
            self.kkt[rr * nx + cc] += qp.h[el];
        }
        self.a_dense.fill(0.0);
        for (rr, cc, el) in self.sp_a.iter() {
            self.a_dense[rr * nx + cc] = qp.a[el];
        }
        for i in 0..nx {
            self.kkt[i * nx + i] += sigma + rho;
        }
        for i in 0..nx {
            for j in 0..=i {
                let mut s = 0.0;
                for r in 0..na {
                    s += self.a_dense[r * nx + i] * self.a_dense[r * nx + j];
                }
                self.kkt[i * nx + j] += rho * s;
                if i != j {
                    self.kkt[j * nx + i] += rho * s;
                }
            }
        }

        // A failed factorization or a diverging splitting iteration (H
        // indefinite from a nonconvex outer problem) bumps the proximal
        // shift and retries; convex subproblems run once unshifted.
        let mut bump = 0.0_f64;
        loop {
            while cholesky_factor(&self.kkt, nx, &mut self.chol).is_err() {
                let delta = if bump == 0.0 { 1.0 } else { bump * 100.0 };
                for i in 0..nx {
                    self.kkt[i * nx + i] += delta - bump;
                }
                bump = delta;
                if bump > 1e10 {
                    return Err(QpError::Solve(
                        "could not regularize subproblem Hessian".to_string(),
                    ));
                }
            }

            // Warm start: x and y from the caller, z from the projection
            self.xv.copy_from_slice(vars.x);
            self.yv[..nx].copy_from_slice(vars.lam_x);
            self.yv[nx..].copy_from_slice(vars.lam_a);

            self.ax[..nx].copy_from_slice(&self.xv);
            self.ax[nx..].fill(0.0);
            mv(qp.a, &self.sp_a, &self.xv, &mut self.ax[nx..], false);
            for i in 0..m {
                let (lo, hi) = bound_at(qp, nx, i);
                self.zv[i] = clamp(self.ax[i], lo, hi);
            }

            self.converged = false;
            self.iterations = 0;
            let mut diverged = false;
            for iter in 0..max_iter {
                // x-update: M x = sigma x - g + A_ext' (rho z - y)
                for i in 0..m {
                    self.wm[i] = rho * self.zv[i] - self.yv[i];
                }
                // The bump stays out of the proximal term: it shifts the
                // subproblem Hessian itself, so the iteration targets the
                // convexified QP and regains contraction.
                for i in 0..nx {
                    self.rhs[i] = sigma * self.xv[i] - qp.g[i] + self.wm[i];
                }
                mv(qp.a, &self.sp_a, &self.wm[nx..], &mut self.rhs, true);
                cholesky_solve(&self.chol, nx, &mut self.rhs);
                self.xv.copy_from_slice(&self.rhs);

                // A_ext x
                self.ax[..nx].copy_from_slice(&self.xv);
                self.ax[nx..].fill(0.0);
                mv(qp.a, &self.sp_a, &self.xv, &mut self.ax[nx..], false);

                // z-update and dual update
                for i in 0..m {
                    let (lo, hi) = bound_at(qp, nx, i);
                    self.zv[i] = clamp(self.ax[i] + self.yv[i] / rho, lo, hi);
                    self.yv[i] += rho * (self.ax[i] - self.zv[i]);
                }

                // Residuals: r_prim = ||A_ext x - z||, r_dual = ||H x + g + A_ext' y||
                let mut r_prim = 0.0_f64;
                for i in 0..m {
                    r_prim = r_prim.max((self.ax[i] - self.zv[i]).abs());
                }
                self.td.copy_from_slice(qp.g);
                mv(qp.h, &self.sp_h, &self.xv, &mut self.td, false);
                // Stationarity of the (possibly shifted) subproblem
                axpy(bump, &self.xv, &mut self.td);
                axpy(1.0, &self.yv[..nx], &mut self.td);
                mv(qp.a, &self.sp_a, &self.yv[nx..], &mut self.td, true);
                let r_dual = norm_inf(&self.td);

                self.iterations = iter + 1;
                if !r_prim.is_finite() || !r_dual.is_finite() || r_prim.max(r_dual) > 1e10 {
                    diverged = true;
                    break;
                }
                if r_prim <= eps && r_dual <= eps {
                    self.converged = true;
                    break;
                }
            }

            if !diverged {
                break;
            }
            let delta = if bump == 0.0 { 1.0 } else { bump * 100.0 };
            for i in 0..nx {
                self.kkt[i * nx + i] += delta - bump;
            }
            bump = delta;
            if bump > 1e10 {
                return Err(QpError::Solve(
                    "splitting iteration diverged beyond recovery".to_string(),
                ));
            }
        }

        // Hand back the final iterate whether or not the tolerance was
        // met; contradictory bounds never converge and the outer loop
        // absorbs the resulting step.
        vars.x.copy_from_slice(&self.xv);
        vars.lam_x.copy_from_slice(&self.yv[..nx]);
        vars.lam_a.copy_from_slice(&self.yv[nx..]);
        Ok(())
    }
}

#[inline]
fn bound_at(qp: &QpProblem<'_>, nx: usize, i: usize) -> (f64, f64) {
    if i < nx {
        (qp.lbx[i], qp.ubx[i])
    } else {
        (qp.lba[i - nx], qp.uba[i - nx])
    }
}
