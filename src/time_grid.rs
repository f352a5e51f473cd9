use crate::error::MulensError;
use crate::float_trait::Float;
use crate::parameters::LensParameters;

use conv::prelude::*;
use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Uniform time grid around the event
///
/// Missing `start` and `stop` are $t_0 \mp 1.5 t_E$, missing `step` is
/// $(\mathrm{stop} - \mathrm{start}) / \mathrm{n\_epochs}$. The grid includes `stop` when it is
/// a whole number of steps away from `start`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound = "T: Float", default)]
#[schemars(bound = "T: Float")]
pub struct TimeGrid<T> {
    pub start: Option<T>,
    pub stop: Option<T>,
    pub step: Option<T>,
    pub n_epochs: usize,
}

impl<T> TimeGrid<T>
where
    T: Float,
{
    pub const DEFAULT_N_EPOCHS: usize = 1000;

    pub fn new() -> Self {
        Self {
            start: None,
            stop: None,
            step: None,
            n_epochs: Self::DEFAULT_N_EPOCHS,
        }
    }

    pub fn range(self, start: T, stop: T) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
            ..self
        }
    }

    pub fn step(self, step: T) -> Self {
        Self {
            step: Some(step),
            ..self
        }
    }

    pub fn n_epochs(self, n_epochs: usize) -> Self {
        Self { n_epochs, ..self }
    }

    pub fn times(&self, parameters: &LensParameters<T>) -> Result<Array1<T>, MulensError> {
        let half_width = T::three() * T::half() * parameters.t_e();
        let start = self.start.unwrap_or(parameters.t_0() - half_width);
        let stop = self.stop.unwrap_or(parameters.t_0() + half_width);
        if !(start.is_finite() && stop.is_finite() && start < stop) {
            return Err(MulensError::invalid_input(
                "time_grid",
                format!("start {start} must be smaller than stop {stop}"),
            ));
        }
        let step = match self.step {
            Some(step) => step,
            None if self.n_epochs > 0 => (stop - start) / self.n_epochs.value_as::<T>().unwrap(),
            None => {
                return Err(MulensError::invalid_input(
                    "time_grid",
                    "number of epochs must be positive",
                ));
            }
        };
        if !(step > T::zero() && step.is_finite()) {
            return Err(MulensError::invalid_input(
                "time_grid",
                format!("step {step} must be positive"),
            ));
        }
        let n_steps_exact = (stop - start) / step;
        let n_steps_rounded = n_steps_exact.round();
        let n_steps = if (n_steps_exact - n_steps_rounded).abs() <= T::epsilon().sqrt() {
            n_steps_rounded
        } else {
            n_steps_exact.floor()
        };
        let n_steps: usize = n_steps
            .value_as::<f64>()
            .unwrap()
            .approx_as::<usize>()
            .map_err(|_| MulensError::invalid_input("time_grid", "too many time samples"))?;
        Ok((0..=n_steps)
            .map(|i| start + step * i.value_as::<T>().unwrap())
            .collect())
    }
}

impl<T> Default for TimeGrid<T>
where
    T: Float,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn parameters() -> LensParameters<f64> {
        LensParameters::builder(2455000.0, 0.1, 20.0).build().unwrap()
    }

    #[test]
    fn default_grid() {
        let times = TimeGrid::default().times(&parameters()).unwrap();
        assert_eq!(times.len(), 1001);
        assert_relative_eq!(times[0], 2455000.0 - 30.0);
        assert_relative_eq!(times[1000], 2455000.0 + 30.0);
        assert_relative_eq!(times[1] - times[0], 0.06, max_relative = 1e-6);
    }

    #[test]
    fn explicit_step() {
        let times = TimeGrid::new()
            .range(0.0, 1.0)
            .step(0.3)
            .times(&parameters())
            .unwrap();
        assert_eq!(times.len(), 4);
        assert_relative_eq!(times[3], 0.9);
    }

    #[test]
    fn invalid_grids() {
        assert!(TimeGrid::new().range(1.0, 0.0).times(&parameters()).is_err());
        assert!(TimeGrid::new().step(-1.0).times(&parameters()).is_err());
        assert!(TimeGrid::new().n_epochs(0).times(&parameters()).is_err());
    }

    #[test]
    fn json_schema_lists_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(TimeGrid<f64>)).unwrap();
        for field in ["start", "stop", "step", "n_epochs"] {
            assert!(schema["properties"][field].is_object(), "{field}");
        }
    }
}
