use crate::error::MulensError;
use crate::float_trait::Float;
use crate::lens::LensEquation;
use crate::magnification::MagnificationMethodTrait;

use conv::prelude::*;
use macro_const::macro_const;
use num_complex::Complex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_const! {
    const QUADRUPOLE_DOC: &str = r"
Quadrupole finite-source approximation

Gould (2008) expansion of the finite-source magnification over point-source magnifications
on circles around the source centre:
$$
A = A_0 + \frac{A_2 \rho^2}{2} \left(1 - \frac{\Gamma}{5}\right),
$$
$$
A_2 \rho^2 = \frac{16 A_{\rho/2,+} - A_{\rho,+}}{3},
$$
where $A_0$ is the point-source magnification at the centre, $A_{r,+}$ is the mean of the
point-source magnification at four points $w + r e^{i j \pi / 2}$, $j = 0..3$, minus $A_0$,
and $\Gamma$ is the linear limb-darkening coefficient. $A_0 + A_2 r^2$ is the expansion of the
mean magnification over a ring of radius $r$, the $1/2$ factor comes from averaging it over
the disk.

The approximation is valid for sources well outside of caustics, it underestimates
magnification close to them.
";
}

macro_const! {
    const HEXADECAPOLE_DOC: &str = r"
Hexadecapole finite-source approximation

Gould (2008) expansion up to the fourth order:
$$
A = A_0 + \frac{A_2 \rho^2}{2} \left(1 - \frac{\Gamma}{5}\right)
    + \frac{A_4 \rho^4}{3} \left(1 - \frac{11 \Gamma}{35}\right),
$$
$$
A_4 \rho^4 = \frac{A_{\rho,+} + A_{\rho,\times}}{2} - A_2 \rho^2,
$$
where $A_{\rho,\times}$ is the same as $A_{\rho,+}$ but with the four points rotated by
$\pi / 4$. See [Quadrupole](crate::Quadrupole) for other notation.
";
}

#[doc = QUADRUPOLE_DOC!()]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Quadrupole;

#[doc = HEXADECAPOLE_DOC!()]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Hexadecapole;

/// $A_0$, $A_2 \rho^2$ and $A_4 \rho^4$
struct MultipoleTerms<T> {
    a0: T,
    a2: T,
    a4: T,
}

impl<T> MultipoleTerms<T>
where
    T: Float,
{
    fn new(lens: &LensEquation<T>, w: Complex<T>, rho: T) -> Result<Self, MulensError> {
        let a0 = lens.point_source_magnification(w)?;
        let ring = |r: T, phase: T| -> Result<T, MulensError> {
            let mut sum = T::zero();
            for j in 0..4_usize {
                let j: T = j.value_as::<T>().unwrap();
                let angle = phase + j * T::FRAC_PI_2();
                sum += lens.point_source_magnification(w + Complex::from_polar(r, angle))?;
            }
            Ok(sum / T::four() - a0)
        };
        let a_rho_plus = ring(rho, T::zero())?;
        let a_rho_cross = ring(rho, T::FRAC_PI_4())?;
        let a_half_plus = ring(rho * T::half(), T::zero())?;

        let sixteen = T::four() * T::four();
        let a2 = (sixteen * a_half_plus - a_rho_plus) / T::three();
        let a4 = T::half() * (a_rho_plus + a_rho_cross) - a2;
        Ok(Self { a0, a2, a4 })
    }

    fn quadrupole(&self, gamma: T) -> T {
        self.a0 + T::half() * self.a2 * (T::one() - gamma / T::five())
    }

    fn hexadecapole(&self, gamma: T) -> T {
        let eleven_35: T = (11.0_f64 / 35.0).approx_as::<T>().unwrap();
        self.quadrupole(gamma) + self.a4 / T::three() * (T::one() - eleven_35 * gamma)
    }
}

impl<T> MagnificationMethodTrait<T> for Quadrupole
where
    T: Float,
{
    fn magnification(
        &self,
        lens: &LensEquation<T>,
        source: Complex<T>,
        rho: T,
        gamma: T,
    ) -> Result<T, MulensError> {
        if rho.is_zero() {
            return lens.point_source_magnification(source);
        }
        Ok(MultipoleTerms::new(lens, source, rho)?.quadrupole(gamma))
    }

    fn requires_finite_source(&self) -> bool {
        true
    }

    fn supports_limb_darkening(&self) -> bool {
        true
    }
}

impl<T> MagnificationMethodTrait<T> for Hexadecapole
where
    T: Float,
{
    fn magnification(
        &self,
        lens: &LensEquation<T>,
        source: Complex<T>,
        rho: T,
        gamma: T,
    ) -> Result<T, MulensError> {
        if rho.is_zero() {
            return lens.point_source_magnification(source);
        }
        Ok(MultipoleTerms::new(lens, source, rho)?.hexadecapole(gamma))
    }

    fn requires_finite_source(&self) -> bool {
        true
    }

    fn supports_limb_darkening(&self) -> bool {
        true
    }
}
