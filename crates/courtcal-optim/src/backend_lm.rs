use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use courtcal_core::Real;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

/// Adapts an [`NllsProblem`] to the `levenberg-marquardt` problem trait.
///
/// Non-finite residuals or Jacobians are reported as `None`, which the crate
/// treats as a failed evaluation and terminates on.
struct Adapter<'a, P: NllsProblem> {
    problem: &'a P,
    x: DVector<Real>,
}

fn all_finite(values: &[Real]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl<P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for Adapter<'_, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.x.copy_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.x.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        let r = self.problem.residuals(&self.x);
        all_finite(r.as_slice()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let j = self.problem.jacobian(&self.x);
        all_finite(j.as_slice()).then_some(j)
    }
}

/// Levenberg–Marquardt (MINPACK variant) from the `levenberg-marquardt` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LmBackend;

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let solver = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let (solved, outcome) = solver.minimize(Adapter { problem, x: x0 });
        let report = SolveReport {
            iterations: outcome.number_of_evaluations,
            final_cost: outcome.objective_function,
            converged: outcome.termination.was_successful(),
        };
        log::debug!(
            "lm: {} params, {} residuals, {} evaluations, cost {:.6e} ({:?})",
            problem.num_params(),
            problem.num_residuals(),
            report.iterations,
            report.final_cost,
            outcome.termination
        );
        (solved.x, report)
    }
}
