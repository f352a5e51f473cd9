use crate::error::MulensError;
use crate::float_trait::Float;
use crate::lens::LensEquation;
use crate::magnification::MagnificationMethodTrait;

use num_complex::Complex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Point-source magnification
///
/// Closed form for a single lens without external field, sum of image magnifications
/// $\sum_k 1 / |\det J(z_k)|$ otherwise. Source radius and limb darkening are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PointSource;

impl<T> MagnificationMethodTrait<T> for PointSource
where
    T: Float,
{
    fn magnification(
        &self,
        lens: &LensEquation<T>,
        source: Complex<T>,
        _rho: T,
        _gamma: T,
    ) -> Result<T, MulensError> {
        lens.point_source_magnification(source)
    }

    fn requires_finite_source(&self) -> bool {
        false
    }

    fn supports_limb_darkening(&self) -> bool {
        false
    }
}
