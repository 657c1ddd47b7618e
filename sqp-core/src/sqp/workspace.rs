//! Pre-allocated per-solve memory for the SQP driver.
//!
//! Every buffer is sized once from the problem descriptor and the
//! settings; the iteration loop performs no heap activity. The `z`,
//! `lam`, and bound vectors concatenate the primal slots `[0, nx)` and
//! the constraint slots `[nx, nx+ng)` in one contiguous allocation,
//! split at `nx` wherever the two halves are addressed separately.

use crate::linalg::Sparsity;
use crate::problem::{NlpProblem, SolveInputs, SqpSettings};

/// Reusable solve-state record.
///
/// Remains valid across solves; [`SqpWorkspace::init_solve`] re-seeds it
/// at each entry.
#[derive(Debug)]
pub(crate) struct SqpWorkspace {
    pub nx: usize,
    pub ng: usize,

    /// Current objective value.
    pub f: f64,

    /// Primal variables and constraint values, concatenated.
    pub z: Vec<f64>,

    /// Concatenated lower bounds on `z`.
    pub lbz: Vec<f64>,

    /// Concatenated upper bounds on `z`.
    pub ubz: Vec<f64>,

    /// Bound and constraint multipliers, concatenated.
    pub lam: Vec<f64>,

    /// QP primal solution (search direction).
    pub dx: Vec<f64>,

    /// QP dual solution / warm start, concatenated.
    pub dlam: Vec<f64>,

    /// Step-space lower bounds `lbz - z`.
    pub lbdz: Vec<f64>,

    /// Step-space upper bounds `ubz - z`.
    pub ubdz: Vec<f64>,

    /// Objective gradient.
    pub gf: Vec<f64>,

    /// Jacobian values, `Asp` pattern order.
    pub jk: Vec<f64>,

    /// Hessian values (exact or BFGS), `Hsp` pattern order.
    pub bk: Vec<f64>,

    /// Lagrangian gradient at the current iterate.
    pub glag: Vec<f64>,

    /// Lagrangian gradient at the previous primal point (BFGS secant).
    pub glag_old: Vec<f64>,

    /// Line-search trial point (primal and constraint slots).
    pub z_cand: Vec<f64>,

    /// Circular history of merit values.
    pub merit_mem: Vec<f64>,

    /// BFGS scratch (2 nx; empty in exact-Hessian mode).
    pub bfgs_work: Vec<f64>,
}

impl SqpWorkspace {
    /// Size all buffers from the descriptor, the chosen Hessian
    /// pattern, and the settings.
    pub fn new(prob: &NlpProblem, settings: &SqpSettings, hsp: &Sparsity) -> Self {
        let nx = prob.nx;
        let ng = prob.ng;
        let nz = nx + ng;
        let bfgs_len = if settings.exact_hessian() { 0 } else { 2 * nx };
        Self {
            nx,
            ng,
            f: 0.0,
            z: vec![0.0; nz],
            lbz: vec![0.0; nz],
            ubz: vec![0.0; nz],
            lam: vec![0.0; nz],
            dx: vec![0.0; nx],
            dlam: vec![0.0; nz],
            lbdz: vec![0.0; nz],
            ubdz: vec![0.0; nz],
            gf: vec![0.0; nx],
            jk: vec![0.0; prob.jac_sp.nnz()],
            bk: vec![0.0; hsp.nnz()],
            glag: vec![0.0; nx],
            glag_old: vec![0.0; nx],
            z_cand: vec![0.0; nz],
            merit_mem: vec![0.0; settings.merit_memory],
            bfgs_work: vec![0.0; bfgs_len],
        }
    }

    /// Seed the record for a new solve.
    pub fn init_solve(&mut self, inputs: &SolveInputs<'_>) {
        let nx = self.nx;

        self.f = 0.0;
        self.z[..nx].copy_from_slice(inputs.x0);
        self.z[nx..].fill(0.0);

        seed(&mut self.lbz[..nx], inputs.lbx, f64::NEG_INFINITY);
        seed(&mut self.ubz[..nx], inputs.ubx, f64::INFINITY);
        seed(&mut self.lbz[nx..], inputs.lbg, f64::NEG_INFINITY);
        seed(&mut self.ubz[nx..], inputs.ubg, f64::INFINITY);

        seed(&mut self.lam[..nx], inputs.lam_x0, 0.0);
        seed(&mut self.lam[nx..], inputs.lam_g0, 0.0);

        self.dx.fill(0.0);
        self.dlam.fill(0.0);
        self.lbdz.fill(0.0);
        self.ubdz.fill(0.0);
        self.gf.fill(0.0);
        self.jk.fill(0.0);
        self.bk.fill(0.0);
        self.glag.fill(0.0);
        self.glag_old.fill(0.0);
        self.z_cand.fill(0.0);
        self.merit_mem.fill(0.0);
        self.bfgs_work.fill(0.0);
    }
}

fn seed(dst: &mut [f64], src: Option<&[f64]>, default: f64) {
    match src {
        Some(s) => dst.copy_from_slice(s),
        None => dst.fill(default),
    }
}
