use courtcal_core::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// A dense least-squares problem over a flat parameter vector.
///
/// Implementors supply raw residuals and, optionally, an analytic Jacobian.
/// Robust kernels enter through [`robust_row_scales`](Self::robust_row_scales):
/// the solver sees every residual row (and its Jacobian row) multiplied by the
/// square root of its IRLS weight, with the weights held fixed for the
/// evaluation.
pub trait NllsProblem {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;

    /// Residuals before any robust weighting.
    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real>;

    /// Jacobian of [`residuals_unweighted`](Self::residuals_unweighted).
    /// Forward differences unless overridden.
    fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
        finite_difference_jacobian(|p| self.residuals_unweighted(p), x, self.num_residuals())
    }

    /// `sqrt(w_i)` per residual row; all ones for plain least squares.
    fn robust_row_scales(&self, r_unweighted: &DVector<Real>) -> DVector<Real> {
        DVector::from_element(r_unweighted.len(), 1.0)
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let r = self.residuals_unweighted(x);
        let scales = self.robust_row_scales(&r);
        r.component_mul(&scales)
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let scales = self.robust_row_scales(&self.residuals_unweighted(x));
        let mut j = self.jacobian_unweighted(x);
        scale_rows(&mut j, &scales);
        j
    }
}

fn scale_rows(j: &mut DMatrix<Real>, scales: &DVector<Real>) {
    debug_assert_eq!(j.nrows(), scales.len());
    for (i, &s) in scales.iter().enumerate() {
        if s != 1.0 {
            j.row_mut(i).scale_mut(s);
        }
    }
}

/// Forward-difference Jacobian of `f` at `x` with `m` residual rows.
///
/// The step is relative to each parameter's magnitude, floored so that
/// parameters near zero (distortion, rotation vectors) still move.
pub fn finite_difference_jacobian(
    f: impl Fn(&DVector<Real>) -> DVector<Real>,
    x: &DVector<Real>,
    m: usize,
) -> DMatrix<Real> {
    let base = f(x);
    let mut jac = DMatrix::zeros(m, x.len());
    let mut xp = x.clone();
    for k in 0..x.len() {
        let step = 1e-7 * x[k].abs().max(1e-2);
        xp[k] += step;
        jac.set_column(k, &((f(&xp) - &base) / step));
        xp[k] = x[k];
    }
    jac
}

/// Stopping criteria shared by every refinement stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Iteration budget; the LM backend caps evaluations at
    /// `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Relative cost reduction below which the solver stops.
    pub ftol: Real,
    /// Gradient orthogonality tolerance.
    pub gtol: Real,
    /// Relative parameter step tolerance.
    pub xtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-12,
            gtol: 1e-12,
            xtol: 1e-12,
        }
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    /// Residual evaluations spent.
    pub iterations: usize,
    /// Half the squared norm of the weighted residuals at the solution.
    pub final_cost: Real,
    pub converged: bool,
}

pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
