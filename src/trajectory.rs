use crate::error::MulensError;
use crate::float_trait::Float;
use crate::parallax::{Ephemeris, ParallaxFlags, SkyOffset};
use crate::parameters::LensParameters;

use ndarray::{Array1, ArrayView1, Zip};
use num_complex::Complex;

/// Observer-related inputs of the trajectory
///
/// Satellite and observatory positions are geocentric sky-projected offsets in AU, one per time
/// sample.
#[derive(Clone, Copy, Debug)]
pub struct ObserverGeometry<'a, T>
where
    T: Float,
{
    pub ephemeris: Option<&'a dyn Ephemeris<T>>,
    pub satellite: Option<&'a [SkyOffset<T>]>,
    pub observatory: Option<&'a [SkyOffset<T>]>,
}

impl<'a, T> ObserverGeometry<'a, T>
where
    T: Float,
{
    pub fn new() -> Self {
        Self {
            ephemeris: None,
            satellite: None,
            observatory: None,
        }
    }

    pub fn ephemeris(mut self, ephemeris: &'a dyn Ephemeris<T>) -> Self {
        self.ephemeris = Some(ephemeris);
        self
    }

    pub fn satellite(mut self, positions: &'a [SkyOffset<T>]) -> Self {
        self.satellite = Some(positions);
        self
    }

    pub fn observatory(mut self, positions: &'a [SkyOffset<T>]) -> Self {
        self.observatory = Some(positions);
        self
    }

    /// Check that per-time arrays are aligned with `n` time samples
    pub fn validate(&self, n: usize) -> Result<(), MulensError> {
        if let Some(satellite) = self.satellite {
            if satellite.len() != n {
                return Err(MulensError::length_mismatch(
                    "satellite_positions",
                    n,
                    satellite.len(),
                ));
            }
        }
        if let Some(observatory) = self.observatory {
            if observatory.len() != n {
                return Err(MulensError::length_mismatch(
                    "observatory_positions",
                    n,
                    observatory.len(),
                ));
            }
        }
        Ok(())
    }
}

impl<T> Default for ObserverGeometry<'_, T>
where
    T: Float,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Source trajectory in the lens plane, units of the Einstein radius
///
/// The origin is the lens centre of mass, for a binary lens the x axis goes along the binary
/// axis from the primary to the secondary.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory<T> {
    x: Array1<T>,
    y: Array1<T>,
}

impl<T> Trajectory<T>
where
    T: Float,
{
    pub fn new(
        times: ArrayView1<T>,
        parameters: &LensParameters<T>,
        flags: &ParallaxFlags,
        observer: &ObserverGeometry<T>,
    ) -> Result<Self, MulensError> {
        observer.validate(times.len())?;

        let t_0 = parameters.t_0();
        let t_e = parameters.t_e();
        let mut tau = times.mapv(|t| (t - t_0) / t_e);
        let mut beta = Array1::from_elem(times.len(), parameters.u_0());

        if let Some(pi_e) = parameters.parallax() {
            let offsets = observer_offsets(times, parameters.t_0_par(), flags, observer)?;
            if let Some(offsets) = offsets {
                Zip::from(&mut tau)
                    .and(&mut beta)
                    .and(&offsets)
                    .for_each(|tau, beta, delta| {
                        *tau += pi_e.north * delta.north + pi_e.east * delta.east;
                        *beta += pi_e.north * delta.east - pi_e.east * delta.north;
                    });
            }
        }

        let (x, y) = match parameters.alpha() {
            Some(alpha) => {
                let (sin_a, cos_a) = alpha.sin_cos();
                let mut x = Array1::zeros(tau.len());
                let mut y = Array1::zeros(tau.len());
                Zip::from(&mut x)
                    .and(&mut y)
                    .and(&tau)
                    .and(&beta)
                    .for_each(|x, y, &tau, &beta| {
                        *x = tau * cos_a + beta * sin_a;
                        *y = -tau * sin_a + beta * cos_a;
                    });
                (x, y)
            }
            None => (tau, beta),
        };
        Ok(Self { x, y })
    }

    /// Trajectory without any parallax effect
    pub fn rectilinear(times: ArrayView1<T>, parameters: &LensParameters<T>) -> Self {
        let t_0 = parameters.t_0();
        let t_e = parameters.t_e();
        let u_0 = parameters.u_0();
        let tau = times.mapv(|t| (t - t_0) / t_e);
        match parameters.alpha() {
            Some(alpha) => {
                let (sin_a, cos_a) = alpha.sin_cos();
                Self {
                    x: tau.mapv(|tau| tau * cos_a + u_0 * sin_a),
                    y: tau.mapv(|tau| -tau * sin_a + u_0 * cos_a),
                }
            }
            None => Self {
                y: Array1::from_elem(tau.len(), u_0),
                x: tau,
            },
        }
    }

    pub fn x(&self) -> ArrayView1<T> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView1<T> {
        self.y.view()
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Source positions as complex numbers `x + iy`
    pub fn positions(&self) -> impl Iterator<Item = Complex<T>> + '_ {
        self.x
            .iter()
            .zip(self.y.iter())
            .map(|(&x, &y)| Complex::new(x, y))
    }

    /// Distance from the origin
    pub fn separation(&self) -> Array1<T> {
        Zip::from(&self.x)
            .and(&self.y)
            .map_collect(|&x, &y| x.hypot(y))
    }
}

/// Sum of observer offsets of all enabled frames, `None` if no frame is enabled
fn observer_offsets<T>(
    times: ArrayView1<T>,
    t_0_par: T,
    flags: &ParallaxFlags,
    observer: &ObserverGeometry<T>,
) -> Result<Option<Array1<SkyOffset<T>>>, MulensError>
where
    T: Float,
{
    if !flags.any() {
        return Ok(None);
    }
    let mut offsets = Array1::from_elem(times.len(), SkyOffset::zero());

    if flags.earth_orbital {
        let ephemeris = observer.ephemeris.ok_or_else(|| {
            MulensError::invalid_input(
                "ephemeris",
                "Earth-orbital parallax requires an ephemeris",
            )
        })?;
        let position_0 = ephemeris.earth_position(t_0_par);
        let velocity_0 = ephemeris.earth_velocity(t_0_par);
        Zip::from(&mut offsets).and(&times).for_each(|delta, &t| {
            let relative = ephemeris.earth_position(t) - position_0 - velocity_0 * (t - t_0_par);
            *delta = *delta - relative;
        });
    }
    if flags.satellite {
        let satellite = observer.satellite.ok_or_else(|| {
            MulensError::invalid_input(
                "satellite_positions",
                "satellite parallax requires satellite positions",
            )
        })?;
        add_negated(&mut offsets, satellite);
    }
    if flags.topocentric {
        let observatory = observer.observatory.ok_or_else(|| {
            MulensError::invalid_input(
                "observatory_positions",
                "topocentric parallax requires observatory positions",
            )
        })?;
        add_negated(&mut offsets, observatory);
    }
    Ok(Some(offsets))
}

fn add_negated<T: Float>(offsets: &mut Array1<SkyOffset<T>>, positions: &[SkyOffset<T>]) {
    for (delta, &position) in offsets.iter_mut().zip(positions) {
        *delta = *delta - position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallax::CircularOrbitEphemeris;

    use approx::assert_relative_eq;
    use light_curve_common::all_close;
    use ndarray::array;

    fn point_lens() -> LensParameters<f64> {
        LensParameters::builder(100.0, 0.2, 20.0).build().unwrap()
    }

    fn parallax_lens() -> LensParameters<f64> {
        LensParameters::builder(100.0, 0.2, 20.0)
            .parallax(0.3, -0.1)
            .build()
            .unwrap()
    }

    #[test]
    fn rectilinear_point_lens() {
        let times = array![80.0, 100.0, 130.0];
        let trajectory = Trajectory::new(
            times.view(),
            &point_lens(),
            &ParallaxFlags::default(),
            &ObserverGeometry::new(),
        )
        .unwrap();
        all_close(trajectory.x().as_slice().unwrap(), &[-1.0, 0.0, 1.5], 1e-12);
        all_close(trajectory.y().as_slice().unwrap(), &[0.2; 3], 1e-12);
        assert_eq!(trajectory, Trajectory::rectilinear(times.view(), &point_lens()));
    }

    #[test]
    fn binary_is_rotated() {
        let parameters = LensParameters::builder(0.0, 0.1, 10.0)
            .s(1.2)
            .q(0.5)
            .alpha_degrees(90.0)
            .build()
            .unwrap();
        let times = array![0.0, 10.0];
        let trajectory = Trajectory::rectilinear(times.view(), &parameters);
        // x = tau cos a + beta sin a, y = -tau sin a + beta cos a
        assert_relative_eq!(trajectory.x()[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(trajectory.y()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(trajectory.x()[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(trajectory.y()[1], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn rotation_preserves_separation() {
        let parameters = LensParameters::builder(0.0, -0.3, 10.0)
            .s(0.8)
            .q(0.1)
            .alpha_degrees(33.0)
            .build()
            .unwrap();
        let times = Array1::linspace(-20.0, 20.0, 11);
        let rotated = Trajectory::rectilinear(times.view(), &parameters);
        let expected: Vec<_> = times
            .iter()
            .map(|t| (t / 10.0_f64).hypot(-0.3))
            .collect();
        all_close(rotated.separation().as_slice().unwrap(), &expected, 1e-12);
    }

    #[test]
    fn satellite_length_mismatch() {
        let times = Array1::linspace(90.0, 110.0, 5);
        let positions = vec![SkyOffset::new(0.1, 0.2); 4];
        let flags = ParallaxFlags {
            satellite: true,
            ..ParallaxFlags::none()
        };
        let result = Trajectory::new(
            times.view(),
            &parallax_lens(),
            &flags,
            &ObserverGeometry::new().satellite(&positions),
        );
        assert_invalid_input!(result, "satellite_positions");
    }

    #[test]
    fn observatory_length_mismatch() {
        let times = Array1::linspace(90.0, 110.0, 5);
        let positions = vec![SkyOffset::new(1e-5, -2e-5); 6];
        let flags = ParallaxFlags {
            topocentric: true,
            ..ParallaxFlags::none()
        };
        let observer = ObserverGeometry::new().observatory(&positions);
        assert_invalid_input!(observer.validate(times.len()), "observatory_positions");
        let result = Trajectory::new(times.view(), &parallax_lens(), &flags, &observer);
        assert_invalid_input!(result, "observatory_positions");
    }

    #[test]
    fn satellite_flag_without_positions() {
        let times = Array1::linspace(90.0, 110.0, 5);
        let flags = ParallaxFlags {
            satellite: true,
            ..ParallaxFlags::none()
        };
        let result = Trajectory::new(
            times.view(),
            &parallax_lens(),
            &flags,
            &ObserverGeometry::new(),
        );
        assert_invalid_input!(result, "satellite_positions");
    }

    #[test]
    fn earth_orbital_without_ephemeris() {
        let times = Array1::linspace(90.0, 110.0, 5);
        let result = Trajectory::new(
            times.view(),
            &parallax_lens(),
            &ParallaxFlags::default(),
            &ObserverGeometry::new(),
        );
        assert_invalid_input!(result, "ephemeris");
    }

    #[test]
    fn satellite_offset() {
        let times = array![100.0, 110.0];
        let positions = [SkyOffset::new(0.5, 0.0), SkyOffset::new(0.0, 1.0)];
        let flags = ParallaxFlags {
            satellite: true,
            ..ParallaxFlags::none()
        };
        let trajectory = Trajectory::new(
            times.view(),
            &parallax_lens(),
            &flags,
            &ObserverGeometry::new().satellite(&positions),
        )
        .unwrap();
        // delta = -S, d_tau = pi_N d_N + pi_E d_E, d_beta = pi_N d_E - pi_E d_N
        assert_relative_eq!(trajectory.x()[0], -0.3 * 0.5);
        assert_relative_eq!(trajectory.y()[0], 0.2 - 0.1 * 0.5);
        assert_relative_eq!(trajectory.x()[1], 0.5 + 0.1);
        assert_relative_eq!(trajectory.y()[1], 0.2 - 0.3);
    }

    #[test]
    fn earth_orbital_parallax_vanishes_to_first_order_at_t_0_par() {
        let eph = CircularOrbitEphemeris::new(4.7, -0.1).with_equinox_epoch(0.0);
        let times = array![99.0, 100.0, 101.0];
        let trajectory = Trajectory::new(
            times.view(),
            &parallax_lens(),
            &ParallaxFlags::default(),
            &ObserverGeometry::new().ephemeris(&eph),
        )
        .unwrap();
        let plain = Trajectory::rectilinear(times.view(), &parallax_lens());
        assert_relative_eq!(trajectory.x()[1], plain.x()[1], epsilon = 1e-14);
        assert_relative_eq!(trajectory.y()[1], plain.y()[1], epsilon = 1e-14);
        // Second-order deviation over one day is small
        assert_relative_eq!(trajectory.x()[0], plain.x()[0], epsilon = 1e-4);
        assert_relative_eq!(trajectory.x()[2], plain.x()[2], epsilon = 1e-4);
    }

    #[test]
    fn parallax_flags_ignored_without_parallax_vector() {
        let times = array![90.0, 100.0];
        let trajectory = Trajectory::new(
            times.view(),
            &point_lens(),
            &ParallaxFlags::all(),
            &ObserverGeometry::new(),
        )
        .unwrap();
        assert_eq!(trajectory, Trajectory::rectilinear(times.view(), &point_lens()));
    }
}
