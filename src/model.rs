use crate::caustics::{CausticCurves, Caustics};
use crate::error::MulensError;
use crate::float_trait::Float;
use crate::limb_darkening::{LimbDarkening, LimbDarkeningCoeffs};
use crate::magnification::{
    CausticProximity, CurveOutput, FullContour, MagnificationConfig, MagnificationCurve,
    MethodName, MethodSchedule,
};
use crate::parallax::{Ephemeris, ParallaxFlags, SkyOffset};
use crate::parameters::LensParameters;
use crate::time_grid::TimeGrid;
use crate::trajectory::{ObserverGeometry, Trajectory};

use ndarray::{Array1, ArrayView1};
use std::sync::Arc;

/// Microlensing model: lens parameters together with the evaluation settings
///
/// Parameters are immutable, [Model::set_parameters] replaces them and keeps the caustics memo
/// only while the lens geometry stays the same.
#[derive(Clone, Debug)]
pub struct Model<T>
where
    T: Float,
{
    parameters: LensParameters<T>,
    config: MagnificationConfig<T>,
    limb_darkening: LimbDarkeningCoeffs<T>,
    ephemeris: Option<Arc<dyn Ephemeris<T>>>,
    caustics: Caustics<T>,
}

impl<T> Model<T>
where
    T: Float,
{
    pub fn new(parameters: LensParameters<T>) -> Self {
        Self {
            caustics: Caustics::from_parameters(&parameters),
            parameters,
            config: MagnificationConfig::default(),
            limb_darkening: LimbDarkeningCoeffs::new(),
            ephemeris: None,
        }
    }

    pub fn parameters(&self) -> &LensParameters<T> {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: LensParameters<T>) -> Result<(), MulensError> {
        match (parameters.binary(), self.caustics.q()) {
            (Some(binary), Some(_)) => {
                self.caustics.set_q(binary.q)?;
                self.caustics.set_s(binary.s)?;
            }
            _ => self.caustics = Caustics::from_parameters(&parameters),
        }
        self.caustics
            .set_external_field(parameters.external_field().copied().unwrap_or_default());
        self.parameters = parameters;
        Ok(())
    }

    /// Settings used by [Model::magnification], its `gamma` is ignored
    pub fn config(&self) -> &MagnificationConfig<T> {
        &self.config
    }

    pub fn set_default_method(&mut self, method: MethodName) {
        self.config.default_method = method;
    }

    pub fn set_schedule(&mut self, schedule: Option<MethodSchedule<T>>) {
        self.config.schedule = schedule;
    }

    pub fn set_parallax(&mut self, parallax: ParallaxFlags) {
        self.config.parallax = parallax;
    }

    pub fn set_contour(&mut self, contour: FullContour<T>) {
        self.config.contour = contour;
    }

    pub fn set_caustic_proximity(&mut self, caustic_proximity: Option<CausticProximity<T>>) {
        self.config.caustic_proximity = caustic_proximity;
    }

    pub fn set_ephemeris(&mut self, ephemeris: Arc<dyn Ephemeris<T>>) {
        self.ephemeris = Some(ephemeris);
    }

    pub fn set_limb_darkening(
        &mut self,
        bandpass: impl Into<String>,
        coeff: LimbDarkening<T>,
    ) -> Result<(), MulensError> {
        self.limb_darkening.set(bandpass, coeff)
    }

    pub fn limb_darkening(&self) -> &LimbDarkeningCoeffs<T> {
        &self.limb_darkening
    }

    /// Observer geometry with the model ephemeris
    pub fn observer<'a>(&'a self, satellite: Option<&'a [SkyOffset<T>]>) -> ObserverGeometry<'a, T> {
        ObserverGeometry {
            ephemeris: self.ephemeris.as_deref(),
            satellite,
            observatory: None,
        }
    }

    pub fn trajectory(
        &self,
        times: ArrayView1<T>,
        satellite: Option<&[SkyOffset<T>]>,
    ) -> Result<Trajectory<T>, MulensError> {
        Trajectory::new(
            times,
            &self.parameters,
            &self.config.parallax,
            &self.observer(satellite),
        )
    }

    /// Magnification at `times` with the linear limb-darkening coefficient `gamma`
    pub fn magnification<'a>(
        &'a self,
        times: ArrayView1<'a, T>,
        satellite: Option<&'a [SkyOffset<T>]>,
        gamma: T,
    ) -> Result<CurveOutput<T>, MulensError> {
        self.evaluate(times, self.observer(satellite), gamma)
    }

    /// Magnification with the limb-darkening coefficient stored for `bandpass`
    pub fn bandpass_magnification<'a>(
        &'a self,
        times: ArrayView1<'a, T>,
        satellite: Option<&'a [SkyOffset<T>]>,
        bandpass: &str,
    ) -> Result<CurveOutput<T>, MulensError> {
        let gamma = self.limb_darkening.gamma(bandpass)?;
        self.magnification(times, satellite, gamma)
    }

    /// Magnification for an arbitrary observer, the model ephemeris is used if the observer
    /// has none
    pub fn evaluate<'a>(
        &'a self,
        times: ArrayView1<'a, T>,
        observer: ObserverGeometry<'a, T>,
        gamma: T,
    ) -> Result<CurveOutput<T>, MulensError> {
        let observer = ObserverGeometry {
            ephemeris: observer.ephemeris.or(self.ephemeris.as_deref()),
            ..observer
        };
        let config = self.config.clone().with_gamma(gamma);
        MagnificationCurve::new(times, &self.parameters)
            .with_observer(observer)
            .with_caustics(&self.caustics)
            .evaluate(&config)
    }

    /// Critical curve and caustic with about `n_points` points
    pub fn caustics(&self, n_points: usize) -> Result<Arc<CausticCurves<T>>, MulensError> {
        self.caustics.curves(n_points)
    }

    pub fn times(&self, grid: &TimeGrid<T>) -> Result<Array1<T>, MulensError> {
        grid.times(&self.parameters)
    }
}
