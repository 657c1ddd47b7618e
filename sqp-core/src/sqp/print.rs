//! Console output: problem banner and fixed-width iteration rows.

/// Problem-statistics banner, printed once at construction.
pub(crate) fn banner(nx: usize, ng: usize, nnz_a: usize, nnz_h: usize, exact_hessian: bool) {
    println!("-------------------------------------------");
    println!("This is sqp-core.");
    if exact_hessian {
        println!("Using exact Hessian");
    } else {
        println!("Using limited memory BFGS Hessian approximation");
    }
    println!("Number of variables:                       {:9}", nx);
    println!("Number of constraints:                     {:9}", ng);
    println!("Number of nonzeros in constraint Jacobian: {:9}", nnz_a);
    println!("Number of nonzeros in Lagrangian Hessian:  {:9}", nnz_h);
    println!();
}

/// Iteration column headers.
pub(crate) fn iteration_header() {
    println!(
        "{:>4} {:>14} {:>9} {:>9} {:>9} {:>7} {:>2}",
        "iter", "objective", "inf_pr", "inf_du", "||d||", "lg(rg)", "ls"
    );
}

/// One iteration row. Regularization prints as `log10(rg)` when active,
/// a dash otherwise; a trailing `F` marks a failed line search.
#[allow(clippy::too_many_arguments)]
pub(crate) fn iteration_row(
    iter: usize,
    obj: f64,
    pr_inf: f64,
    du_inf: f64,
    dx_norm: f64,
    rg: f64,
    ls_trials: usize,
    ls_success: bool,
) {
    let rg_col = if rg > 0.0 {
        format!("{:7.2}", rg.log10())
    } else {
        format!("{:>7}", "-")
    };
    let mut line = format!(
        "{:4} {:14.6e} {:9.2e} {:9.2e} {:9.2e} {} {:2}",
        iter, obj, pr_inf, du_inf, dx_norm, rg_col, ls_trials
    );
    if !ls_success {
        line.push('F');
    }
    println!("{}", line);
}
