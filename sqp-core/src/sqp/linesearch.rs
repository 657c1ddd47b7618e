//! Non-monotone L1 merit line search.
//!
//! Progress is measured by `M(x) = f(x) + sigma * max_viol(z)`, with the
//! penalty `sigma` ratcheted up to dominate the current multipliers. The
//! Armijo comparison is against the maximum merit over a sliding window
//! of recent iterations, so transient merit increases are admitted.

use crate::linalg::kernels::{axpy, dot, max_viol, norm_inf, scal, vfmax};
use crate::oracle::NlpOracle;
use crate::problem::SqpSettings;

use super::workspace::SqpWorkspace;

/// Line-search result for one iteration.
pub(crate) struct LsOutcome {
    /// Accepted step fraction.
    pub t: f64,

    /// Number of trials used.
    pub ls_iter: usize,

    /// Whether the Armijo test was met (false when the trial cap forced
    /// acceptance).
    pub ls_success: bool,
}

/// Search along `dx`, update the duals by the accepted fraction, and
/// scale `dx` in place so the caller applies `z += dx`.
///
/// `iter_count` is the already-incremented iteration number, which also
/// bounds the filled portion of the merit window.
pub(crate) fn line_search<O: NlpOracle>(
    oracle: &O,
    p: &[f64],
    settings: &SqpSettings,
    ws: &mut SqpWorkspace,
    sigma: &mut f64,
    merit_ind: &mut usize,
    iter_count: usize,
) -> LsOutcome {
    let nx = ws.nx;

    // Penalty parameter of the merit function: monotone non-decreasing
    *sigma = sigma.max(1.01 * norm_inf(&ws.dlam));

    // Merit value and directional derivative at the current iterate
    let l1_infeas = max_viol(&ws.z, &ws.lbz, &ws.ubz);
    let f_sens = dot(&ws.dx, &ws.gf);
    let l1_dir = f_sens - *sigma * l1_infeas;
    let l1_merit = ws.f + *sigma * l1_infeas;

    // Record the merit value and form the non-monotone reference: the
    // window seed merit_mem[0] combined with the filled tail
    ws.merit_mem[*merit_ind] = l1_merit;
    *merit_ind = (*merit_ind + 1) % settings.merit_memory;
    let filled = settings.merit_memory.min(iter_count);
    let meritmax = vfmax(&ws.merit_mem[1..filled], ws.merit_mem[0]);

    let mut t = 1.0;
    let mut ls_iter = 0;
    let mut ls_success = true;
    let mut f_cand = 0.0;

    loop {
        ls_iter += 1;

        // Candidate step
        ws.z_cand[..nx].copy_from_slice(&ws.z[..nx]);
        axpy(t, &ws.dx, &mut ws.z_cand[..nx]);

        // Objective and constraints at the candidate; a failing
        // evaluation is treated as a rejected point
        let (x_cand, g_cand) = ws.z_cand.split_at_mut(nx);
        if oracle.eval_fg(x_cand, p, &mut f_cand, g_cand).is_err() {
            t *= settings.beta;
            if ls_iter == settings.max_iter_ls {
                ls_success = false;
                break;
            }
            continue;
        }

        let infeas_cand = max_viol(&ws.z_cand, &ws.lbz, &ws.ubz);
        let merit_cand = f_cand + *sigma * infeas_cand;
        if merit_cand <= meritmax + t * settings.c1 * l1_dir {
            break;
        }

        // Trial cap reached: accept anyway, flag the failure
        if ls_iter == settings.max_iter_ls {
            ls_success = false;
            break;
        }

        // Backtracking
        t *= settings.beta;
    }

    // Candidate accepted: interpolate the duals and scale the step
    scal(1.0 - t, &mut ws.lam);
    axpy(t, &ws.dlam, &mut ws.lam);
    scal(t, &mut ws.dx);

    LsOutcome {
        t,
        ls_iter,
        ls_success,
    }
}
