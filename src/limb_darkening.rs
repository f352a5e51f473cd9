use crate::error::MulensError;
use crate::float_trait::Float;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Linear limb-darkening coefficient in one of two conventions
///
/// The `u` convention is $I(r) \propto 1 - u (1 - \mu)$, the `gamma` convention is
/// $I(r) \propto 1 - \Gamma (1 - \frac32 \mu)$ with $\mu = \sqrt{1 - r^2 / \rho^2}$. They are
/// related by $\Gamma = 2u / (3 - u)$.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", bound = "T: Float")]
pub enum LimbDarkening<T> {
    Gamma(T),
    U(T),
}

impl<T> LimbDarkening<T>
where
    T: Float,
{
    pub fn gamma(&self) -> T {
        match *self {
            Self::Gamma(gamma) => gamma,
            Self::U(u) => gamma_from_u(u),
        }
    }

    pub fn u(&self) -> T {
        match *self {
            Self::Gamma(gamma) => u_from_gamma(gamma),
            Self::U(u) => u,
        }
    }
}

/// $\Gamma = 2u / (3 - u)$
pub fn gamma_from_u<T: Float>(u: T) -> T {
    T::two() * u / (T::three() - u)
}

/// $u = 3\Gamma / (2 + \Gamma)$
pub fn u_from_gamma<T: Float>(gamma: T) -> T {
    T::three() * gamma / (T::two() + gamma)
}

/// Limb-darkening coefficients by bandpass name, stored in the gamma convention
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound = "T: Float")]
pub struct LimbDarkeningCoeffs<T> {
    gamma: BTreeMap<String, T>,
}

impl<T> LimbDarkeningCoeffs<T>
where
    T: Float,
{
    pub fn new() -> Self {
        Self {
            gamma: BTreeMap::new(),
        }
    }

    /// Store or replace the coefficient of the bandpass
    pub fn set(
        &mut self,
        bandpass: impl Into<String>,
        coeff: LimbDarkening<T>,
    ) -> Result<(), MulensError> {
        let gamma = coeff.gamma();
        if !gamma.is_finite() {
            return Err(MulensError::invalid_parameter(
                "limb_darkening",
                "coefficient must give finite gamma",
            ));
        }
        self.gamma.insert(bandpass.into(), gamma);
        Ok(())
    }

    pub fn gamma(&self, bandpass: &str) -> Result<T, MulensError> {
        self.gamma.get(bandpass).copied().ok_or_else(|| {
            MulensError::invalid_input(
                "bandpass",
                format!("no limb-darkening coefficient is set for bandpass {bandpass:?}"),
            )
        })
    }

    pub fn u(&self, bandpass: &str) -> Result<T, MulensError> {
        self.gamma(bandpass).map(u_from_gamma)
    }

    pub fn bandpasses(&self) -> impl Iterator<Item = &str> {
        self.gamma.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.gamma.is_empty()
    }
}
