//! Minimize the Rosenbrock function with the SQP driver and the
//! bundled ADMM subsolver.

use sqp_core::{
    AdmmQp, AdmmSettings, EvalError, NlpOracle, NlpProblem, SolveInputs, Sparsity, Sqp,
    SqpSettings,
};

/// f(x, y) = (1 - x)^2 + 100 (y - x^2)^2, unconstrained.
struct Rosenbrock;

impl NlpOracle for Rosenbrock {
    fn eval_fg(&self, x: &[f64], _p: &[f64], f: &mut f64, _g: &mut [f64]) -> Result<(), EvalError> {
        *f = (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
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
        *f = (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
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
        // Dense 2x2, column-major
        hess[0] = sigma_f * (2.0 - 400.0 * x[1] + 1200.0 * x[0] * x[0]);
        hess[1] = sigma_f * (-400.0 * x[0]);
        hess[2] = sigma_f * (-400.0 * x[0]);
        hess[3] = sigma_f * 200.0;
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let prob = NlpProblem {
        nx: 2,
        ng: 0,
        np: 0,
        jac_sp: Sparsity::empty(0, 2),
        hess_sp: Some(Sparsity::dense(2, 2)),
    };

    let mut solver = Sqp::new(
        prob,
        Rosenbrock,
        SqpSettings::default(),
        AdmmQp::factory(AdmmSettings::default()),
    )?;

    let result = solver.solve(&SolveInputs::new(&[-1.2, 1.0]))?;

    println!();
    println!("status:     {}", result.status);
    println!("iterations: {}", result.stats.iter_count);
    println!("x =         {:?}", result.x);
    println!("f =         {:.3e}", result.f);
    Ok(())
}
