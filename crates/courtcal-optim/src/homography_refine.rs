//! Robust refinement of an image → ground-plane homography.
//!
//! The homography is parametrised by its first eight entries (row-major) with
//! `h33 = 1`. Residuals are the transfer errors `world - H(image)` in world
//! units, down-weighted by a [`RobustKernel`].

use crate::{NllsProblem, NllsSolverBackend, RobustKernel, SolveOptions, SolveReport};
use courtcal_core::{CalibError, CalibResult, Mat3, Pt2, Real};
use nalgebra::DVector;

#[derive(Debug, Clone)]
pub struct HomographyRefineProblem<'a> {
    image: &'a [Pt2],
    world: &'a [Pt2],
    kernel: RobustKernel,
}

impl<'a> HomographyRefineProblem<'a> {
    pub fn new(image: &'a [Pt2], world: &'a [Pt2], kernel: RobustKernel) -> CalibResult<Self> {
        if image.len() != world.len() {
            return Err(CalibError::InvalidInput(format!(
                "{} image points but {} world points",
                image.len(),
                world.len()
            )));
        }
        if image.len() < 4 {
            return Err(CalibError::insufficient("homography correspondences", 4, image.len()));
        }
        Ok(Self {
            image,
            world,
            kernel,
        })
    }
}

fn pack(h: &Mat3) -> CalibResult<DVector<Real>> {
    let s = h[(2, 2)];
    if s.abs() <= Real::EPSILON {
        return Err(CalibError::divergence("initial homography has h33 = 0"));
    }
    let n = h / s;
    Ok(DVector::from_iterator(
        8,
        (0..8).map(|i| n[(i / 3, i % 3)]),
    ))
}

fn unpack(x: &DVector<Real>) -> Mat3 {
    Mat3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0)
}

impl NllsProblem for HomographyRefineProblem<'_> {
    fn num_params(&self) -> usize {
        8
    }

    fn num_residuals(&self) -> usize {
        2 * self.image.len()
    }

    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
        let h = unpack(x);
        let mut r = DVector::zeros(self.num_residuals());
        for (i, (p, w)) in self.image.iter().zip(self.world).enumerate() {
            let q = h * p.to_homogeneous();
            let (dx, dy) = if q.z.abs() > Real::EPSILON {
                (w.x - q.x / q.z, w.y - q.y / q.z)
            } else {
                (1e9, 1e9)
            };
            r[2 * i] = dx;
            r[2 * i + 1] = dy;
        }
        r
    }

    fn robust_row_scales(&self, r_unweighted: &DVector<Real>) -> DVector<Real> {
        self.kernel.row_scales_2d(r_unweighted)
    }
}

#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    /// Image → world, normalised so that `h33 = 1`.
    pub h: Mat3,
    /// Root mean square transfer error in world units.
    pub rms: Real,
    pub report: SolveReport,
}

/// Refine `initial` (image → world) with robust transfer residuals.
pub fn refine_homography<B: NllsSolverBackend>(
    backend: &B,
    image: &[Pt2],
    world: &[Pt2],
    initial: &Mat3,
    kernel: RobustKernel,
    opts: &SolveOptions,
) -> CalibResult<HomographyEstimate> {
    let problem = HomographyRefineProblem::new(image, world, kernel)?;
    let (x, report) = backend.solve(&problem, pack(initial)?, opts);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(CalibError::divergence("homography refinement produced non-finite entries"));
    }
    if !report.converged {
        return Err(CalibError::divergence(format!(
            "homography refinement did not converge (cost {:.3e})",
            report.final_cost
        )));
    }
    let r = problem.residuals_unweighted(&x);
    Ok(HomographyEstimate {
        h: unpack(&x),
        rms: (r.norm_squared() / image.len() as Real).sqrt(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmBackend;
    use approx::assert_relative_eq;

    fn ground_truth() -> Mat3 {
        Mat3::new(
            4.2, 0.35, -800.0, //
            -0.1, 9.5, -2600.0, //
            0.00002, 0.0011, 1.0,
        )
    }

    fn correspondences(h: &Mat3) -> (Vec<Pt2>, Vec<Pt2>) {
        let mut image = Vec::new();
        let mut world = Vec::new();
        for y in 0..4 {
            for x in 0..5 {
                let p = Pt2::new(400.0 + 700.0 * x as Real, 600.0 + 450.0 * y as Real);
                let q = h * p.to_homogeneous();
                image.push(p);
                world.push(Pt2::new(q.x / q.z, q.y / q.z));
            }
        }
        (image, world)
    }

    #[test]
    fn recovers_homography_from_perturbed_start() {
        let gt = ground_truth();
        let (image, world) = correspondences(&gt);
        let mut init = gt;
        init[(0, 0)] *= 1.01;
        init[(1, 2)] += 15.0;

        let est = refine_homography(
            &LmBackend,
            &image,
            &world,
            &init,
            RobustKernel::None,
            &SolveOptions::default(),
        )
        .unwrap();
        assert_relative_eq!(est.h, gt, max_relative = 1e-6);
        assert!(est.rms < 1e-6);
    }

    #[test]
    fn huber_kernel_limits_outlier_influence() {
        let gt = ground_truth();
        let (image, mut world) = correspondences(&gt);
        world[7].x += 5000.0;

        let robust = refine_homography(
            &LmBackend,
            &image,
            &world,
            &gt,
            RobustKernel::Huber { delta: 50.0 },
            &SolveOptions::default(),
        )
        .unwrap();
        let plain = refine_homography(
            &LmBackend,
            &image,
            &world,
            &gt,
            RobustKernel::None,
            &SolveOptions::default(),
        )
        .unwrap();

        let sample = image[12].to_homogeneous();
        let truth = gt * sample;
        let err = |h: &Mat3| {
            let q = h * sample;
            ((q.x / q.z - truth.x / truth.z).powi(2) + (q.y / q.z - truth.y / truth.z).powi(2))
                .sqrt()
        };
        assert!(err(&robust.h) < err(&plain.h));
    }
}
