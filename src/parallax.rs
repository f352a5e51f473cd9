use crate::float_trait::Float;

use conv::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// Sidereal year, days
pub const SIDEREAL_YEAR: f64 = 365.256_363;
/// March equinox of 2000, JD
pub const EQUINOX_J2000: f64 = 2_451_623.815_972;

/// Which parallax effects are applied to the source trajectory
///
/// Parallax is applied only if the lens parameters have the parallax vector. Earth-orbital
/// parallax needs an [Ephemeris], satellite and topocentric parallax need per-time positions
/// of the satellite and the observatory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ParallaxFlags {
    pub earth_orbital: bool,
    pub satellite: bool,
    pub topocentric: bool,
}

impl ParallaxFlags {
    pub fn none() -> Self {
        Self {
            earth_orbital: false,
            satellite: false,
            topocentric: false,
        }
    }

    pub fn all() -> Self {
        Self {
            earth_orbital: true,
            satellite: true,
            topocentric: true,
        }
    }

    pub fn any(&self) -> bool {
        self.earth_orbital || self.satellite || self.topocentric
    }
}

impl Default for ParallaxFlags {
    /// Earth-orbital parallax only
    fn default() -> Self {
        Self {
            earth_orbital: true,
            ..Self::none()
        }
    }
}

/// Position projected on the sky plane, north and east components in AU
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound = "T: Float")]
pub struct SkyOffset<T> {
    pub north: T,
    pub east: T,
}

impl<T> SkyOffset<T>
where
    T: Float,
{
    pub fn new(north: T, east: T) -> Self {
        Self { north, east }
    }

    pub fn zero() -> Self {
        Self::new(T::zero(), T::zero())
    }
}

impl<T: Float> Add for SkyOffset<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.north + rhs.north, self.east + rhs.east)
    }
}

impl<T: Float> Sub for SkyOffset<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.north - rhs.north, self.east - rhs.east)
    }
}

impl<T: Float> Neg for SkyOffset<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.north, -self.east)
    }
}

impl<T: Float> Mul<T> for SkyOffset<T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self::new(self.north * rhs, self.east * rhs)
    }
}

/// Source of the Earth position projected on the plane of the sky
pub trait Ephemeris<T>: Debug + Send + Sync
where
    T: Float,
{
    /// Projected heliocentric Earth position at time `t`, AU
    fn earth_position(&self, t: T) -> SkyOffset<T>;

    /// Projected Earth velocity, AU per unit time
    ///
    /// Default implementation is the central difference of [Ephemeris::earth_position] with a
    /// step of [Ephemeris::velocity_step].
    fn earth_velocity(&self, t: T) -> SkyOffset<T> {
        let dt = self.velocity_step();
        (self.earth_position(t + dt) - self.earth_position(t - dt)) * (T::two() * dt).recip()
    }

    fn velocity_step(&self) -> T {
        T::one()
    }
}

/// Circular Earth orbit in the ecliptic plane
///
/// The event direction is given by ecliptic longitude and latitude. Times are expected to be
/// Julian dates unless a different `equinox_epoch` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound = "T: Float")]
pub struct CircularOrbitEphemeris<T> {
    /// Ecliptic longitude of the event, radians
    pub longitude: T,
    /// Ecliptic latitude of the event, radians
    pub latitude: T,
    /// Orbital period, days
    pub period: T,
    /// Time of the March equinox when the Earth has ecliptic longitude of 180 degrees
    pub equinox_epoch: T,
}

impl<T> CircularOrbitEphemeris<T>
where
    T: Float,
{
    pub fn new(longitude: T, latitude: T) -> Self {
        Self {
            longitude,
            latitude,
            period: SIDEREAL_YEAR.approx_as::<T>().unwrap(),
            equinox_epoch: EQUINOX_J2000.approx_as::<T>().unwrap(),
        }
    }

    pub fn with_equinox_epoch(self, equinox_epoch: T) -> Self {
        Self {
            equinox_epoch,
            ..self
        }
    }

    /// Earth's heliocentric ecliptic longitude
    fn earth_longitude(&self, t: T) -> T {
        T::PI() + T::two() * T::PI() * (t - self.equinox_epoch) / self.period
    }
}

impl<T> Ephemeris<T> for CircularOrbitEphemeris<T>
where
    T: Float,
{
    fn earth_position(&self, t: T) -> SkyOffset<T> {
        let (sin_l, cos_l) = self.earth_longitude(t).sin_cos();
        let (sin_lambda, cos_lambda) = self.longitude.sin_cos();
        let sin_beta = self.latitude.sin();
        // Projections on the local east and north unit vectors of the event direction
        let east = -sin_lambda * cos_l + cos_lambda * sin_l;
        let north = -sin_beta * (cos_lambda * cos_l + sin_lambda * sin_l);
        SkyOffset::new(north, east)
    }

    fn earth_velocity(&self, t: T) -> SkyOffset<T> {
        let (sin_l, cos_l) = self.earth_longitude(t).sin_cos();
        let (sin_lambda, cos_lambda) = self.longitude.sin_cos();
        let sin_beta = self.latitude.sin();
        let omega = T::two() * T::PI() / self.period;
        let east = (sin_lambda * sin_l + cos_lambda * cos_l) * omega;
        let north = -sin_beta * (-cos_lambda * sin_l + sin_lambda * cos_l) * omega;
        SkyOffset::new(north, east)
    }
}
