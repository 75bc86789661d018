use courtcal_core::Real;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Loss applied to residual blocks during refinement.
///
/// Configured as tagged JSON, e.g. `{"kind": "huber", "delta": 50.0}`; the
/// scale is in the units of the residual (pixels or world units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RobustKernel {
    #[default]
    None,
    /// Quadratic up to `delta`, linear beyond.
    Huber { delta: Real },
    Cauchy { c: Real },
}

impl RobustKernel {
    /// Loss `rho` and IRLS weight `w` for a squared residual norm `r2`.
    pub fn rho_and_weight(self, r2: Real) -> (Real, Real) {
        match self {
            Self::None => (r2, 1.0),
            Self::Huber { delta } => {
                let r = r2.sqrt();
                if r > delta {
                    (delta * (2.0 * r - delta), delta / r)
                } else {
                    (r2, 1.0)
                }
            }
            Self::Cauchy { c } => {
                let c2 = c * c;
                let t = 1.0 + r2 / c2;
                (c2 * t.ln(), t.recip())
            }
        }
    }

    /// Row scales for residuals laid out as consecutive 2D blocks `(dx, dy)`.
    ///
    /// Both rows of a block share the weight of the block's squared norm.
    pub fn row_scales_2d(self, r: &DVector<Real>) -> DVector<Real> {
        let mut scales = DVector::from_element(r.len(), 1.0);
        if self == RobustKernel::None {
            return scales;
        }
        for (block, out) in r.as_slice().chunks_exact(2).zip(scales.as_mut_slice().chunks_exact_mut(2)) {
            let (_, w) = self.rho_and_weight(block[0] * block[0] + block[1] * block[1]);
            out.fill(w.sqrt());
        }
        scales
    }
}
