#![doc = include_str!("../README.md")]

#[cfg(test)]
#[macro_use]
mod tests;

#[macro_use]
mod macros;

mod caustics;
pub use caustics::{CausticCurves, Caustics, n_angles};

mod error;
pub use error::MulensError;

mod float_trait;
pub use float_trait::Float;

mod lens;
pub use lens::{Image, LensEquation, PointMass, point_lens_magnification};

mod limb_darkening;
pub use limb_darkening::{LimbDarkening, LimbDarkeningCoeffs, gamma_from_u, u_from_gamma};

pub mod magnification;
pub use magnification::*;

mod model;
pub use model::Model;

mod parallax;
pub use parallax::{
    CircularOrbitEphemeris, EQUINOX_J2000, Ephemeris, ParallaxFlags, SIDEREAL_YEAR, SkyOffset,
};

mod parameters;
pub use parameters::{
    Angle, BinaryGeometry, ExternalField, LensParameters, LensParametersBuilder, MassRatio,
    ParallaxFrame, ParallaxVector,
};

mod polynomial;
pub use polynomial::ComplexPolynomial;

mod time_grid;
pub use time_grid::TimeGrid;

mod trajectory;
pub use trajectory::{ObserverGeometry, Trajectory};

pub use ndarray;
pub use num_complex;
