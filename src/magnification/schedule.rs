use crate::error::MulensError;
use crate::float_trait::Float;
use crate::magnification::MethodName;

use ndarray::ArrayView1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Element of a method schedule literal: breakpoint time or method name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged, bound = "T: Float")]
pub enum ScheduleToken<T> {
    Time(T),
    Method(String),
}

impl<T> ScheduleToken<T> {
    pub fn time(t: T) -> Self {
        Self::Time(t)
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::Method(name.into())
    }
}

/// Time intervals evaluated with non-default magnification methods
///
/// Constructed from an alternating token list `[t_1, m_1, t_2, m_2, ..., t_n]`: time samples in
/// $[t_i, t_{i+1})$ use method $m_i$, other samples use the default method. Breakpoints must be
/// strictly increasing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<ScheduleToken<T>>",
    into = "Vec<ScheduleToken<T>>",
    bound = "T: Float"
)]
pub struct MethodSchedule<T> {
    breakpoints: Vec<T>,
    methods: Vec<MethodName>,
}

impl<T> MethodSchedule<T>
where
    T: Float,
{
    pub fn new(tokens: &[ScheduleToken<T>]) -> Result<Self, MulensError> {
        if tokens.len() < 3 {
            return Err(MulensError::invalid_input(
                "method_schedule",
                format!("at least three tokens are required, {} given", tokens.len()),
            ));
        }
        if tokens.len() % 2 == 0 {
            return Err(MulensError::invalid_input(
                "method_schedule",
                "must start and end with a time",
            ));
        }
        let mut breakpoints = Vec::with_capacity(tokens.len() / 2 + 1);
        let mut methods = Vec::with_capacity(tokens.len() / 2);
        for (i, token) in tokens.iter().enumerate() {
            match (i % 2, token) {
                (0, &ScheduleToken::Time(t)) => breakpoints.push(t),
                (1, ScheduleToken::Method(name)) => methods.push(MethodName::from_str(name)?),
                (0, ScheduleToken::Method(name)) => {
                    return Err(MulensError::invalid_input(
                        "method_schedule",
                        format!("time expected at position {i}, method {name:?} found"),
                    ));
                }
                _ => {
                    return Err(MulensError::invalid_input(
                        "method_schedule",
                        format!("method expected at position {i}, time found"),
                    ));
                }
            }
        }
        Self::from_parts(breakpoints, methods)
    }

    /// Schedule from breakpoints and methods, `breakpoints` must be one element longer
    pub fn from_parts(breakpoints: Vec<T>, methods: Vec<MethodName>) -> Result<Self, MulensError> {
        if methods.is_empty() || breakpoints.len() != methods.len() + 1 {
            return Err(MulensError::invalid_input(
                "method_schedule",
                format!(
                    "{} breakpoints don't bound {} methods",
                    breakpoints.len(),
                    methods.len()
                ),
            ));
        }
        if !breakpoints.iter().all(|t| t.is_finite()) {
            return Err(MulensError::invalid_input(
                "method_schedule",
                "breakpoints must be finite",
            ));
        }
        if !breakpoints.windows(2).all(|w| w[0] < w[1]) {
            return Err(MulensError::invalid_input(
                "method_schedule",
                "breakpoints must be strictly increasing",
            ));
        }
        Ok(Self {
            breakpoints,
            methods,
        })
    }

    pub fn breakpoints(&self) -> &[T] {
        &self.breakpoints
    }

    pub fn methods(&self) -> &[MethodName] {
        &self.methods
    }

    /// Scheduled method for time `t`, `None` outside of all intervals
    pub fn method_at(&self, t: T) -> Option<MethodName> {
        let idx = self.breakpoints.partition_point(|&b| b <= t);
        if idx == 0 || idx == self.breakpoints.len() {
            None
        } else {
            Some(self.methods[idx - 1])
        }
    }

    /// Method of every time sample
    pub fn assign(&self, times: ArrayView1<T>, default: MethodName) -> Vec<MethodName> {
        times
            .iter()
            .map(|&t| self.method_at(t).unwrap_or(default))
            .collect()
    }

    /// `(start, end, method)` of every interval
    pub fn intervals(&self) -> impl Iterator<Item = (T, T, MethodName)> + '_ {
        self.breakpoints
            .windows(2)
            .zip(self.methods.iter())
            .map(|(w, &method)| (w[0], w[1], method))
    }

    pub fn tokens(&self) -> Vec<ScheduleToken<T>> {
        let mut tokens = Vec::with_capacity(2 * self.methods.len() + 1);
        for (&t, method) in self.breakpoints.iter().zip(self.methods.iter()) {
            tokens.push(ScheduleToken::Time(t));
            tokens.push(ScheduleToken::Method(method.as_str().to_owned()));
        }
        if let Some(&last) = self.breakpoints.last() {
            tokens.push(ScheduleToken::Time(last));
        }
        tokens
    }
}

impl<T> TryFrom<Vec<ScheduleToken<T>>> for MethodSchedule<T>
where
    T: Float,
{
    type Error = MulensError;

    fn try_from(tokens: Vec<ScheduleToken<T>>) -> Result<Self, Self::Error> {
        Self::new(&tokens)
    }
}

impl<T> From<MethodSchedule<T>> for Vec<ScheduleToken<T>>
where
    T: Float,
{
    fn from(schedule: MethodSchedule<T>) -> Self {
        schedule.tokens()
    }
}

impl<T> JsonSchema for MethodSchedule<T>
where
    T: Float,
{
    json_schema!(Vec<ScheduleToken<T>>, false);
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    fn tokens(t1: f64, method: &str, t2: f64) -> Vec<ScheduleToken<f64>> {
        vec![
            ScheduleToken::time(t1),
            ScheduleToken::method(method),
            ScheduleToken::time(t2),
        ]
    }

    #[test]
    fn samples_straddling_both_boundaries() {
        let schedule = MethodSchedule::new(&tokens(1.0, "quadrupole", 2.0)).unwrap();
        let times = array![0.5, 1.0, 1.5, 2.0, 2.5];
        assert_eq!(
            schedule.assign(times.view(), MethodName::PointSource),
            vec![
                MethodName::PointSource,
                MethodName::Quadrupole,
                MethodName::Quadrupole,
                MethodName::PointSource,
                MethodName::PointSource,
            ]
        );
    }

    #[test]
    fn several_intervals() {
        let schedule: MethodSchedule<f64> = serde_json::from_str(
            r#"[2455746.0, "Quadrupole", 2455746.6, "Hexadecapole", 2455746.7, "VBBL",
                2455747.0, "Hexadecapole", 2455747.15, "Quadrupole", 2455748.0]"#,
        )
        .unwrap();
        assert_eq!(schedule.methods().len(), 5);
        assert_eq!(schedule.method_at(2455746.65), Some(MethodName::Hexadecapole));
        assert_eq!(schedule.method_at(2455746.7), Some(MethodName::FullContour));
        assert_eq!(schedule.method_at(2455748.0), None);
        assert_eq!(schedule.method_at(2455745.0), None);
        let (start, end, method) = schedule.intervals().nth(2).unwrap();
        assert_eq!((start, end, method), (2455746.7, 2455747.0, MethodName::FullContour));
    }

    #[test]
    fn serialization_uses_canonical_names() {
        let schedule = MethodSchedule::new(&tokens(1.0, "VBBL", 2.0)).unwrap();
        assert_eq!(
            serde_json::to_string(&schedule).unwrap(),
            r#"[1.0,"full_contour",2.0]"#
        );
    }

    #[test]
    fn unknown_method_token() {
        assert_eq!(
            MethodSchedule::new(&tokens(1.0, "Gould94", 2.0)),
            Err(MulensError::UnknownMethod("Gould94".to_owned()))
        );
    }

    #[test]
    fn malformed_schedules() {
        let too_short = vec![ScheduleToken::time(1.0), ScheduleToken::method("quadrupole")];
        let ends_with_method = vec![
            ScheduleToken::time(1.0),
            ScheduleToken::method("quadrupole"),
            ScheduleToken::time(2.0),
            ScheduleToken::method("quadrupole"),
        ];
        let starts_with_method = vec![
            ScheduleToken::method("quadrupole"),
            ScheduleToken::time(1.0),
            ScheduleToken::method("quadrupole"),
        ];
        let two_times = vec![
            ScheduleToken::time(1.0),
            ScheduleToken::time(1.5),
            ScheduleToken::time(2.0),
        ];
        for schedule in [
            too_short,
            ends_with_method,
            starts_with_method,
            two_times,
            tokens(2.0, "quadrupole", 1.0),
            tokens(1.0, "quadrupole", 1.0),
            tokens(f64::NAN, "quadrupole", 1.0),
        ] {
            assert!(
                matches!(
                    MethodSchedule::new(&schedule),
                    Err(MulensError::InvalidInput { .. })
                ),
                "{schedule:?}"
            );
        }
    }
}
