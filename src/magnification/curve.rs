use crate::caustics::Caustics;
use crate::error::MulensError;
use crate::float_trait::Float;
use crate::lens::LensEquation;
use crate::magnification::{
    FullContour, MagnificationMethod, MagnificationMethodTrait, MethodName, MethodSchedule,
};
use crate::parallax::ParallaxFlags;
use crate::parameters::LensParameters;
use crate::trajectory::{ObserverGeometry, Trajectory};

use itertools::Itertools;
use ndarray::{Array1, ArrayView1};
use num_complex::Complex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Switch multipole methods to [FullContour] near caustics
///
/// A sample evaluated by a multipole method is evaluated by the full contour method instead if
/// its source centre is closer than `factor * rho` to any of the caustic points sampled with
/// `n_points` points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound = "T: Float")]
pub struct CausticProximity<T> {
    pub factor: T,
    pub n_points: usize,
}

impl<T> Default for CausticProximity<T>
where
    T: Float,
{
    fn default() -> Self {
        Self {
            factor: T::five() * T::two(),
            n_points: 5000,
        }
    }
}

/// Evaluation settings of [MagnificationCurve]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound = "T: Float", default)]
pub struct MagnificationConfig<T>
where
    T: Float,
{
    /// Method for samples outside of all scheduled intervals
    pub default_method: MethodName,
    pub schedule: Option<MethodSchedule<T>>,
    /// Linear limb-darkening coefficient in the gamma convention
    pub gamma: T,
    pub parallax: ParallaxFlags,
    /// Settings of the full contour method wherever it is used
    pub contour: FullContour<T>,
    pub caustic_proximity: Option<CausticProximity<T>>,
}

impl<T> MagnificationConfig<T>
where
    T: Float,
{
    pub fn with_default_method(self, default_method: MethodName) -> Self {
        Self {
            default_method,
            ..self
        }
    }

    pub fn with_schedule(self, schedule: MethodSchedule<T>) -> Self {
        Self {
            schedule: Some(schedule),
            ..self
        }
    }

    pub fn with_gamma(self, gamma: T) -> Self {
        Self { gamma, ..self }
    }

    pub fn with_parallax(self, parallax: ParallaxFlags) -> Self {
        Self { parallax, ..self }
    }

    pub fn with_contour(self, contour: FullContour<T>) -> Self {
        Self { contour, ..self }
    }

    pub fn with_caustic_proximity(self, caustic_proximity: CausticProximity<T>) -> Self {
        Self {
            caustic_proximity: Some(caustic_proximity),
            ..self
        }
    }
}

impl<T> Default for MagnificationConfig<T>
where
    T: Float,
{
    fn default() -> Self {
        Self {
            default_method: MethodName::default(),
            schedule: None,
            gamma: T::zero(),
            parallax: ParallaxFlags::default(),
            contour: FullContour::default(),
            caustic_proximity: None,
        }
    }
}

/// Magnification per time sample
#[derive(Clone, Debug, PartialEq)]
pub struct CurveOutput<T> {
    /// NaN for samples where the method didn't converge
    pub magnification: Array1<T>,
    /// Indices of the samples which didn't converge, ascending
    pub failed: Vec<usize>,
}

impl<T> CurveOutput<T> {
    pub fn len(&self) -> usize {
        self.magnification.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnification.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Magnification at given times for given lens parameters
///
/// Evaluation builds a [Trajectory], assigns a method to every sample from the
/// [MethodSchedule] and runs every contiguous group of samples sharing a method. Configuration
/// errors are returned before any magnification is evaluated. Convergence failures of a single
/// sample are not errors: such samples are NaN and listed in [CurveOutput::failed].
#[derive(Clone, Copy, Debug)]
pub struct MagnificationCurve<'a, T>
where
    T: Float,
{
    times: ArrayView1<'a, T>,
    parameters: &'a LensParameters<T>,
    observer: ObserverGeometry<'a, T>,
    caustics: Option<&'a Caustics<T>>,
}

impl<'a, T> MagnificationCurve<'a, T>
where
    T: Float,
{
    pub fn new(times: ArrayView1<'a, T>, parameters: &'a LensParameters<T>) -> Self {
        Self {
            times,
            parameters,
            observer: ObserverGeometry::new(),
            caustics: None,
        }
    }

    pub fn with_observer(self, observer: ObserverGeometry<'a, T>) -> Self {
        Self { observer, ..self }
    }

    /// Caustics to use for the proximity check, their memo is reused between calls
    pub fn with_caustics(self, caustics: &'a Caustics<T>) -> Self {
        Self {
            caustics: Some(caustics),
            ..self
        }
    }

    pub fn times(&self) -> ArrayView1<'a, T> {
        self.times
    }

    pub fn parameters(&self) -> &'a LensParameters<T> {
        self.parameters
    }

    pub fn trajectory(&self, parallax: &ParallaxFlags) -> Result<Trajectory<T>, MulensError> {
        Trajectory::new(self.times, self.parameters, parallax, &self.observer)
    }

    /// Method of every sample, as scheduled and without the caustic-proximity fallback
    pub fn scheduled_methods(
        &self,
        config: &MagnificationConfig<T>,
    ) -> Result<Vec<MethodName>, MulensError> {
        let methods = match &config.schedule {
            Some(schedule) => schedule.assign(self.times, config.default_method),
            None => vec![config.default_method; self.times.len()],
        };
        if self.parameters.rho().is_none()
            && methods.iter().any(MethodName::requires_finite_source)
        {
            return Err(MulensError::invalid_parameter(
                "rho",
                "finite-source method is used but the source radius is not set",
            ));
        }
        Ok(methods)
    }

    /// Method of every sample including the caustic-proximity fallback
    pub fn methods(&self, config: &MagnificationConfig<T>) -> Result<Vec<MethodName>, MulensError> {
        let trajectory = self.trajectory(&config.parallax)?;
        self.plan(config, &trajectory)
    }

    fn plan(
        &self,
        config: &MagnificationConfig<T>,
        trajectory: &Trajectory<T>,
    ) -> Result<Vec<MethodName>, MulensError> {
        let mut methods = self.scheduled_methods(config)?;
        let Some(proximity) = &config.caustic_proximity else {
            return Ok(methods);
        };
        if !methods.iter().any(MethodName::is_multipole) {
            return Ok(methods);
        }
        let rho = self.parameters.rho().unwrap_or_else(T::zero);
        let local_caustics;
        let caustics = match self.caustics {
            Some(caustics) => caustics,
            None => {
                local_caustics = Caustics::from_parameters(self.parameters);
                &local_caustics
            }
        };
        let curves = caustics.curves(proximity.n_points)?;
        let threshold = proximity.factor * rho;
        let mut n_switched = 0_usize;
        for (method, w) in methods.iter_mut().zip(trajectory.positions()) {
            if method.is_multipole() && curves.distance_to(w) < threshold {
                *method = MethodName::FullContour;
                n_switched += 1;
            }
        }
        if n_switched > 0 {
            log::debug!("{n_switched} samples near caustics are switched to the full contour method");
        }
        Ok(methods)
    }

    pub fn evaluate(&self, config: &MagnificationConfig<T>) -> Result<CurveOutput<T>, MulensError> {
        let trajectory = self.trajectory(&config.parallax)?;
        let methods = self.plan(config, &trajectory)?;
        let positions: Vec<Complex<T>> = trajectory.positions().collect();

        let lens = LensEquation::from_parameters(self.parameters);
        let rho = self.parameters.rho().unwrap_or_else(T::zero);

        let mut magnification = Array1::zeros(self.times.len());
        let mut failed = vec![];
        let groups = methods.iter().copied().enumerate().chunk_by(|&(_, name)| name);
        for (name, group) in &groups {
            let method = MagnificationMethod::from_name(name, &config.contour);
            let gamma = if method.supports_limb_darkening() {
                config.gamma
            } else {
                T::zero()
            };
            let mut n_samples = 0_usize;
            for (i, _) in group {
                n_samples += 1;
                magnification[i] = match method.magnification(&lens, positions[i], rho, gamma) {
                    Ok(a) => a,
                    Err(MulensError::NumericNonConvergence(_)) => {
                        failed.push(i);
                        T::nan()
                    }
                    Err(err) => return Err(err),
                };
            }
            log::debug!("{n_samples} samples evaluated with {name}");
        }
        if !failed.is_empty() {
            log::warn!(
                "magnification did not converge for {} of {} samples, NaN is used for them",
                failed.len(),
                self.times.len()
            );
        }
        Ok(CurveOutput {
            magnification,
            failed,
        })
    }
}
