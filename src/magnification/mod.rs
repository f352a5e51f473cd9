//! Magnification methods and the method-scheduled magnification curve

use crate::error::MulensError;
use crate::float_trait::Float;
use crate::lens::LensEquation;

use enum_dispatch::enum_dispatch;
use num_complex::Complex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

mod contour;
pub use contour::FullContour;

mod curve;
pub use curve::{CausticProximity, CurveOutput, MagnificationConfig, MagnificationCurve};

mod multipole;
pub use multipole::{Hexadecapole, Quadrupole};

mod point_source;
pub use point_source::PointSource;

mod schedule;
pub use schedule::{MethodSchedule, ScheduleToken};

/// Magnification of a source at a single position
#[enum_dispatch]
pub trait MagnificationMethodTrait<T>: Debug + Clone + Send + Sync
where
    T: Float,
{
    /// Magnification of the source centred at `source` with angular radius `rho` and linear
    /// limb-darkening coefficient `gamma`
    fn magnification(
        &self,
        lens: &LensEquation<T>,
        source: Complex<T>,
        rho: T,
        gamma: T,
    ) -> Result<T, MulensError>;

    /// Does the method need the source radius?
    fn requires_finite_source(&self) -> bool;

    fn supports_limb_darkening(&self) -> bool;
}

/// Magnification method
#[enum_dispatch(MagnificationMethodTrait<T>)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound = "T: Float")]
#[non_exhaustive]
pub enum MagnificationMethod<T>
where
    T: Float,
{
    PointSource(PointSource),
    Quadrupole(Quadrupole),
    Hexadecapole(Hexadecapole),
    FullContour(FullContour<T>),
}

impl<T> MagnificationMethod<T>
where
    T: Float,
{
    /// Method for the given name, `contour` provides settings of the full contour method
    pub fn from_name(name: MethodName, contour: &FullContour<T>) -> Self {
        match name {
            MethodName::PointSource => PointSource.into(),
            MethodName::Quadrupole => Quadrupole.into(),
            MethodName::Hexadecapole => Hexadecapole.into(),
            MethodName::FullContour => contour.clone().into(),
        }
    }

    pub fn name(&self) -> MethodName {
        match self {
            Self::PointSource(_) => MethodName::PointSource,
            Self::Quadrupole(_) => MethodName::Quadrupole,
            Self::Hexadecapole(_) => MethodName::Hexadecapole,
            Self::FullContour(_) => MethodName::FullContour,
        }
    }
}

/// Closed set of method names used by schedules and configuration
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MethodName {
    #[default]
    PointSource,
    Quadrupole,
    Hexadecapole,
    #[serde(alias = "vbbl")]
    FullContour,
}

/// Accepted tokens, matched case-insensitively
const METHOD_NAMES: [(&str, MethodName); 5] = [
    ("point_source", MethodName::PointSource),
    ("quadrupole", MethodName::Quadrupole),
    ("hexadecapole", MethodName::Hexadecapole),
    ("vbbl", MethodName::FullContour),
    ("full_contour", MethodName::FullContour),
];

impl MethodName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointSource => "point_source",
            Self::Quadrupole => "quadrupole",
            Self::Hexadecapole => "hexadecapole",
            Self::FullContour => "full_contour",
        }
    }

    pub fn requires_finite_source(&self) -> bool {
        !matches!(self, Self::PointSource)
    }

    /// Gould (2008) multipole expansions
    pub fn is_multipole(&self) -> bool {
        matches!(self, Self::Quadrupole | Self::Hexadecapole)
    }
}

impl FromStr for MethodName {
    type Err = MulensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        METHOD_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, method)| method)
            .ok_or_else(|| MulensError::UnknownMethod(s.to_owned()))
    }
}

impl Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
