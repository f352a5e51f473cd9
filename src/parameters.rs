use crate::error::MulensError;
use crate::float_trait::Float;

use num_complex::Complex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Angle with explicit units
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Angle<T> {
    Degrees(T),
    Radians(T),
}

impl<T> Angle<T>
where
    T: Float,
{
    pub fn radians(&self) -> T {
        match *self {
            Self::Degrees(x) => x.to_radians(),
            Self::Radians(x) => x,
        }
    }
}

/// Mass ratio of the secondary to the primary
///
/// Sequences are accepted for compatibility with multi-body definitions, but only a
/// single-element sequence (two lens bodies) is supported
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MassRatio<T> {
    Single(T),
    Sequence(Vec<T>),
}

impl<T> From<T> for MassRatio<T> {
    fn from(q: T) -> Self {
        Self::Single(q)
    }
}

/// Microlens parallax vector $\vec\pi_E$ in North and East components
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParallaxVector<T> {
    pub north: T,
    pub east: T,
}

impl<T> ParallaxVector<T>
where
    T: Float,
{
    pub fn new(north: T, east: T) -> Self {
        Self { north, east }
    }

    /// Vector with `first` and `second` components in `frame`
    pub fn from_frame(first: T, second: T, frame: &ParallaxFrame<T>) -> Self {
        match frame {
            ParallaxFrame::NorthEast => Self::new(first, second),
            ParallaxFrame::LensAxis { position_angle } => {
                let (sin, cos) = position_angle.radians().sin_cos();
                Self::new(first * cos - second * sin, first * sin + second * cos)
            }
        }
    }

    /// Components in `frame`, inverse of [ParallaxVector::from_frame]
    pub fn components_in(&self, frame: &ParallaxFrame<T>) -> (T, T) {
        match frame {
            ParallaxFrame::NorthEast => (self.north, self.east),
            ParallaxFrame::LensAxis { position_angle } => {
                let (sin, cos) = position_angle.radians().sin_cos();
                (
                    self.north * cos + self.east * sin,
                    -self.north * sin + self.east * cos,
                )
            }
        }
    }

    /// $|\vec\pi_E|$
    pub fn norm(&self) -> T {
        T::hypot(self.north, self.east)
    }
}

/// Reference frame of the parallax vector components
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParallaxFrame<T> {
    /// North and East on the sky
    #[default]
    NorthEast,
    /// Along the lens axis and perpendicular to it, the second axis is the first one turned by
    /// 90 degrees from North towards East. `position_angle` of the lens axis is counted from
    /// North through East.
    LensAxis { position_angle: Angle<T> },
}

/// Separation, mass ratio and trajectory angle of a two-body lens
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BinaryGeometry<T> {
    /// Separation in Einstein radii
    pub s: T,
    /// Secondary to primary mass ratio
    pub q: T,
    /// Angle between the lens axis and the source trajectory, radians
    pub alpha: T,
}

/// External mass sheet: convergence $K$ and complex shear $G$
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalField<T> {
    pub convergence_k: T,
    pub shear_g: Complex<T>,
}

impl<T> ExternalField<T>
where
    T: Float,
{
    pub fn new(convergence_k: T, shear_g: Complex<T>) -> Self {
        Self {
            convergence_k,
            shear_g,
        }
    }

    /// No external field, $K = 0$, $G = 0$
    pub fn none() -> Self {
        Self::new(T::zero(), Complex::new(T::zero(), T::zero()))
    }

    pub fn is_none(&self) -> bool {
        self.convergence_k.is_zero() && self.shear_g.re.is_zero() && self.shear_g.im.is_zero()
    }

    pub fn is_shear_free(&self) -> bool {
        self.shear_g.re.is_zero() && self.shear_g.im.is_zero()
    }
}

impl<T> Default for ExternalField<T>
where
    T: Float,
{
    fn default() -> Self {
        Self::none()
    }
}

/// Field-by-field description of a microlensing model, validated by [LensParametersBuilder::build]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct LensParametersBuilder<T> {
    pub t_0: T,
    pub u_0: T,
    #[serde(rename = "t_E")]
    pub t_e: T,
    #[serde(default)]
    pub rho: Option<T>,
    #[serde(default)]
    pub s: Option<T>,
    #[serde(default)]
    pub q: Option<MassRatio<T>>,
    #[serde(default)]
    pub alpha: Option<Angle<T>>,
    #[serde(default, rename = "pi_E_N")]
    pub pi_e_n: Option<T>,
    #[serde(default, rename = "pi_E_E")]
    pub pi_e_e: Option<T>,
    /// Frame of `pi_E_N` and `pi_E_E` components, they are North and East if it is missing
    #[serde(default, rename = "pi_E_ref")]
    pub pi_e_ref: Option<ParallaxFrame<T>>,
    #[serde(default)]
    pub t_0_par: Option<T>,
    #[serde(default)]
    pub convergence_k: Option<T>,
    #[serde(default)]
    pub shear_g: Option<Complex<T>>,
}

impl<T> LensParametersBuilder<T>
where
    T: Float,
{
    /// Point-source point-lens model, the only required parameters
    pub fn new(t_0: T, u_0: T, t_e: T) -> Self {
        Self {
            t_0,
            u_0,
            t_e,
            rho: None,
            s: None,
            q: None,
            alpha: None,
            pi_e_n: None,
            pi_e_e: None,
            pi_e_ref: None,
            t_0_par: None,
            convergence_k: None,
            shear_g: None,
        }
    }

    pub fn rho(mut self, rho: T) -> Self {
        self.rho = Some(rho);
        self
    }

    pub fn s(mut self, s: T) -> Self {
        self.s = Some(s);
        self
    }

    pub fn q(mut self, q: impl Into<MassRatio<T>>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn alpha(mut self, alpha: Angle<T>) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn alpha_degrees(self, alpha: T) -> Self {
        self.alpha(Angle::Degrees(alpha))
    }

    pub fn alpha_radians(self, alpha: T) -> Self {
        self.alpha(Angle::Radians(alpha))
    }

    pub fn parallax(mut self, pi_e_n: T, pi_e_e: T) -> Self {
        self.pi_e_n = Some(pi_e_n);
        self.pi_e_e = Some(pi_e_e);
        self.pi_e_ref = None;
        self
    }

    /// Parallax vector given by its components in `frame`
    pub fn parallax_in_frame(mut self, first: T, second: T, frame: ParallaxFrame<T>) -> Self {
        self.pi_e_n = Some(first);
        self.pi_e_e = Some(second);
        self.pi_e_ref = Some(frame);
        self
    }

    pub fn t_0_par(mut self, t_0_par: T) -> Self {
        self.t_0_par = Some(t_0_par);
        self
    }

    pub fn convergence_k(mut self, k: T) -> Self {
        self.convergence_k = Some(k);
        self
    }

    pub fn shear_g(mut self, g: Complex<T>) -> Self {
        self.shear_g = Some(g);
        self
    }

    pub fn build(self) -> Result<LensParameters<T>, MulensError> {
        for (name, value) in [("t_0", self.t_0), ("u_0", self.u_0)] {
            if !value.is_finite() {
                return Err(MulensError::invalid_parameter(name, "must be finite"));
            }
        }
        if !(self.t_e.is_finite() && self.t_e > T::zero()) {
            return Err(MulensError::invalid_parameter(
                "t_E",
                "must be positive and finite",
            ));
        }
        if let Some(rho) = self.rho {
            if !(rho.is_finite() && rho >= T::zero()) {
                return Err(MulensError::invalid_parameter(
                    "rho",
                    "must be non-negative and finite",
                ));
            }
        }

        let binary = match (self.s, self.q, self.alpha) {
            (None, None, None) => None,
            (Some(s), Some(q), Some(alpha)) => Some(validate_binary(s, q, alpha)?),
            _ => {
                return Err(MulensError::invalid_parameter(
                    "s, q, alpha",
                    "if one of (s, q, alpha) is specified, all three must be specified",
                ));
            }
        };

        let parallax = match (self.pi_e_n, self.pi_e_e) {
            (None, None) => {
                if self.pi_e_ref.is_some() {
                    return Err(MulensError::invalid_parameter(
                        "pi_E_ref",
                        "frame is given without the parallax vector",
                    ));
                }
                None
            }
            (Some(first), Some(second)) => {
                if !(first.is_finite() && second.is_finite()) {
                    return Err(MulensError::invalid_parameter("pi_E", "must be finite"));
                }
                let frame = self.pi_e_ref.unwrap_or_default();
                if let ParallaxFrame::LensAxis { position_angle } = frame {
                    if !position_angle.radians().is_finite() {
                        return Err(MulensError::invalid_parameter(
                            "pi_E_ref",
                            "position angle must be finite",
                        ));
                    }
                }
                Some(ParallaxVector::from_frame(first, second, &frame))
            }
            _ => {
                return Err(MulensError::invalid_parameter(
                    "pi_E",
                    "must specify both or neither of pi_E_N and pi_E_E",
                ));
            }
        };
        let t_0_par = self.t_0_par.unwrap_or(self.t_0);
        if !t_0_par.is_finite() {
            return Err(MulensError::invalid_parameter("t_0_par", "must be finite"));
        }

        let external_field = match (self.convergence_k, self.shear_g) {
            (None, None) => None,
            (k, g) => {
                let field = ExternalField::new(
                    k.unwrap_or_else(T::zero),
                    g.unwrap_or_else(|| Complex::new(T::zero(), T::zero())),
                );
                if !(field.convergence_k.is_finite()
                    && field.shear_g.re.is_finite()
                    && field.shear_g.im.is_finite())
                {
                    return Err(MulensError::invalid_parameter(
                        "convergence_K, shear_G",
                        "must be finite",
                    ));
                }
                if field.convergence_k == T::one() {
                    return Err(MulensError::invalid_parameter(
                        "convergence_K",
                        "unity convergence makes the lens mapping degenerate",
                    ));
                }
                Some(field)
            }
        };

        let mass_fractions = match &binary {
            None => vec![T::one()],
            Some(b) => vec![(T::one() + b.q).recip(), b.q / (T::one() + b.q)],
        };

        Ok(LensParameters {
            t_0: self.t_0,
            u_0: self.u_0,
            t_e: self.t_e,
            rho: self.rho,
            binary,
            parallax,
            t_0_par,
            external_field,
            mass_fractions,
        })
    }
}

fn validate_binary<T>(s: T, q: MassRatio<T>, alpha: Angle<T>) -> Result<BinaryGeometry<T>, MulensError>
where
    T: Float,
{
    let q = match q {
        MassRatio::Single(q) => q,
        MassRatio::Sequence(v) => match v[..] {
            [] => return Err(MulensError::invalid_parameter("q", "must not be empty")),
            [q] => q,
            _ => {
                return Err(MulensError::UnsupportedConfiguration(
                    "more than two lens bodies are not supported",
                ));
            }
        },
    };
    if !(s.is_finite() && s > T::zero()) {
        return Err(MulensError::invalid_parameter("s", "must be positive and finite"));
    }
    if !(q > T::zero() && q <= T::one()) {
        return Err(MulensError::invalid_parameter("q", "must be in (0, 1]"));
    }
    let alpha = alpha.radians();
    if !alpha.is_finite() {
        return Err(MulensError::invalid_parameter("alpha", "must be finite"));
    }
    Ok(BinaryGeometry { s, q, alpha })
}

/// Immutable, validated snapshot of the microlensing model
///
/// Use [LensParameters::to_builder] or `with_*` methods to get a modified copy, derived values
/// like mass fractions are recomputed for the new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "LensParametersBuilder<T>",
    try_from = "LensParametersBuilder<T>",
    bound = "T: Float"
)]
pub struct LensParameters<T> {
    t_0: T,
    u_0: T,
    t_e: T,
    rho: Option<T>,
    binary: Option<BinaryGeometry<T>>,
    parallax: Option<ParallaxVector<T>>,
    t_0_par: T,
    external_field: Option<ExternalField<T>>,
    mass_fractions: Vec<T>,
}

impl<T> LensParameters<T>
where
    T: Float,
{
    pub fn builder(t_0: T, u_0: T, t_e: T) -> LensParametersBuilder<T> {
        LensParametersBuilder::new(t_0, u_0, t_e)
    }

    pub fn to_builder(&self) -> LensParametersBuilder<T> {
        let builder = LensParametersBuilder {
            rho: self.rho,
            t_0_par: Some(self.t_0_par),
            ..LensParametersBuilder::new(self.t_0, self.u_0, self.t_e)
        };
        let builder = match self.binary {
            Some(b) => builder.s(b.s).q(b.q).alpha_radians(b.alpha),
            None => builder,
        };
        let builder = match self.parallax {
            Some(p) => builder.parallax(p.north, p.east),
            None => builder,
        };
        match self.external_field {
            Some(f) => builder.convergence_k(f.convergence_k).shear_g(f.shear_g),
            None => builder,
        }
    }

    pub fn t_0(&self) -> T {
        self.t_0
    }

    pub fn u_0(&self) -> T {
        self.u_0
    }

    /// Einstein timescale $t_E$
    pub fn t_e(&self) -> T {
        self.t_e
    }

    /// Source radius in Einstein radii, `None` if undefined
    pub fn rho(&self) -> Option<T> {
        self.rho
    }

    pub fn binary(&self) -> Option<&BinaryGeometry<T>> {
        self.binary.as_ref()
    }

    pub fn s(&self) -> Option<T> {
        self.binary.map(|b| b.s)
    }

    pub fn q(&self) -> Option<T> {
        self.binary.map(|b| b.q)
    }

    /// Trajectory angle in radians
    pub fn alpha(&self) -> Option<T> {
        self.binary.map(|b| b.alpha)
    }

    pub fn parallax(&self) -> Option<&ParallaxVector<T>> {
        self.parallax.as_ref()
    }

    /// Reference time of the parallax expansion, equals $t_0$ unless given explicitly
    pub fn t_0_par(&self) -> T {
        self.t_0_par
    }

    pub fn external_field(&self) -> Option<&ExternalField<T>> {
        self.external_field.as_ref()
    }

    /// Masses of the lens components relative to the total mass, the primary goes first
    pub fn mass_fractions(&self) -> &[T] {
        &self.mass_fractions
    }

    pub fn n_lenses(&self) -> usize {
        self.mass_fractions.len()
    }

    pub fn is_binary(&self) -> bool {
        self.binary.is_some()
    }

    pub fn with_rho(&self, rho: T) -> Result<Self, MulensError> {
        self.to_builder().rho(rho).build()
    }

    pub fn with_s(&self, s: T) -> Result<Self, MulensError> {
        self.to_builder().s(s).build()
    }

    pub fn with_q(&self, q: T) -> Result<Self, MulensError> {
        self.to_builder().q(q).build()
    }

    pub fn with_external_field(&self, field: ExternalField<T>) -> Result<Self, MulensError> {
        self.to_builder()
            .convergence_k(field.convergence_k)
            .shear_g(field.shear_g)
            .build()
    }
}

impl<T> From<LensParameters<T>> for LensParametersBuilder<T>
where
    T: Float,
{
    fn from(parameters: LensParameters<T>) -> Self {
        parameters.to_builder()
    }
}

impl<T> TryFrom<LensParametersBuilder<T>> for LensParameters<T>
where
    T: Float,
{
    type Error = MulensError;

    fn try_from(builder: LensParametersBuilder<T>) -> Result<Self, Self::Error> {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn binary_builder() -> LensParametersBuilder<f64> {
        LensParameters::builder(300.0, -0.07, 500.0)
            .s(1.0)
            .q(0.01)
            .alpha_degrees(270.0)
            .rho(1e-4)
    }

    #[test]
    fn point_lens_mass_fractions() {
        let params = LensParameters::builder(0.0, 0.1, 20.0).build().unwrap();
        assert_eq!(params.mass_fractions(), &[1.0]);
        assert_eq!(params.n_lenses(), 1);
        assert!(!params.is_binary());
        assert_eq!(params.t_0_par(), 0.0);
    }

    #[test]
    fn binary_mass_fractions() {
        let params = binary_builder().build().unwrap();
        let eps = params.mass_fractions();
        assert_relative_eq!(eps[0], 1.0 / 1.01);
        assert_relative_eq!(eps[1], 0.01 / 1.01);
        assert_relative_eq!(params.alpha().unwrap(), 1.5 * std::f64::consts::PI);
    }

    #[test]
    fn mass_fractions_follow_q() {
        let params = binary_builder().build().unwrap();
        let modified = params.with_q(0.5).unwrap();
        assert_relative_eq!(modified.mass_fractions()[1], 1.0 / 3.0);
        // The original value is untouched
        assert_relative_eq!(params.mass_fractions()[1], 0.01 / 1.01);
        assert_eq!(modified.s(), params.s());
    }

    #[test]
    fn zero_t_e() {
        let err = LensParameters::builder(0.0, 0.1, 0.0).build().unwrap_err();
        assert!(matches!(err, MulensError::InvalidParameter { name: "t_E", .. }));
    }

    #[test]
    fn negative_rho() {
        let err = LensParameters::builder(0.0, 0.1, 10.0)
            .rho(-1e-3)
            .build()
            .unwrap_err();
        assert!(matches!(err, MulensError::InvalidParameter { name: "rho", .. }));
    }

    #[test]
    fn incomplete_binary() {
        let err = LensParameters::builder(0.0, 0.1, 10.0)
            .s(1.2)
            .q(0.1)
            .build()
            .unwrap_err();
        assert!(matches!(err, MulensError::InvalidParameter { .. }));
    }

    #[test]
    fn q_sequences() {
        let single = binary_builder()
            .q(MassRatio::Sequence(vec![0.01]))
            .build()
            .unwrap();
        assert_eq!(single.q(), Some(0.01));

        let err = binary_builder()
            .q(MassRatio::Sequence(vec![0.01, 0.02]))
            .build()
            .unwrap_err();
        assert!(matches!(err, MulensError::UnsupportedConfiguration(_)));

        let err = binary_builder()
            .q(MassRatio::Sequence(vec![]))
            .build()
            .unwrap_err();
        assert!(matches!(err, MulensError::InvalidParameter { name: "q", .. }));
    }

    #[test]
    fn half_parallax_vector() {
        let builder = LensParametersBuilder {
            pi_e_n: Some(0.1),
            ..LensParameters::builder(0.0, 0.1, 10.0)
        };
        let err = builder.build().unwrap_err();
        assert!(matches!(err, MulensError::InvalidParameter { name: "pi_E", .. }));
    }

    #[test]
    fn lens_axis_parallax_frame() {
        let frame = ParallaxFrame::LensAxis {
            position_angle: Angle::Degrees(30.0),
        };
        let params = LensParameters::builder(0.0, 0.1, 10.0)
            .parallax_in_frame(0.2, -0.1, frame)
            .build()
            .unwrap();
        let pi_e = params.parallax().unwrap();
        let (sin, cos) = 30.0_f64.to_radians().sin_cos();
        assert_relative_eq!(pi_e.north, 0.2 * cos + 0.1 * sin, max_relative = 1e-12);
        assert_relative_eq!(pi_e.east, 0.2 * sin - 0.1 * cos, max_relative = 1e-12);
        assert_relative_eq!(pi_e.norm(), 0.2_f64.hypot(0.1), max_relative = 1e-12);

        let (first, second) = pi_e.components_in(&frame);
        assert_relative_eq!(first, 0.2, max_relative = 1e-12);
        assert_relative_eq!(second, -0.1, max_relative = 1e-12);
        assert_eq!(
            pi_e.components_in(&ParallaxFrame::NorthEast),
            (pi_e.north, pi_e.east)
        );

        // Rebuilt parameters keep North and East components
        let rebuilt = params.to_builder();
        assert_eq!(rebuilt.pi_e_ref, None);
        assert_eq!(rebuilt.build().unwrap(), params);
    }

    #[test]
    fn lens_axis_along_north() {
        let frame = ParallaxFrame::LensAxis {
            position_angle: Angle::Radians(0.0),
        };
        let pi_e = ParallaxVector::from_frame(0.3, 0.4, &frame);
        assert_eq!(pi_e, ParallaxVector::new(0.3, 0.4));
    }

    #[test]
    fn parallax_frame_without_vector() {
        let builder = LensParametersBuilder {
            pi_e_ref: Some(ParallaxFrame::NorthEast),
            ..LensParameters::builder(0.0, 0.1, 10.0)
        };
        let err = builder.build().unwrap_err();
        assert!(matches!(err, MulensError::InvalidParameter { name: "pi_E_ref", .. }));
    }

    #[test]
    fn deserialize_parallax_in_lens_axis_frame() {
        let params: LensParameters<f64> = serde_json::from_str(
            r#"{"t_0": 0.0, "u_0": 0.1, "t_E": 10.0, "pi_E_N": 0.2, "pi_E_E": -0.1,
                "pi_E_ref": {"lens_axis": {"position_angle": {"degrees": 90.0}}}}"#,
        )
        .unwrap();
        let pi_e = params.parallax().unwrap();
        assert_relative_eq!(pi_e.north, 0.1, max_relative = 1e-12);
        assert_relative_eq!(pi_e.east, 0.2, max_relative = 1e-12);
    }

    #[test]
    fn unity_convergence() {
        let err = binary_builder().convergence_k(1.0).build().unwrap_err();
        assert!(matches!(
            err,
            MulensError::InvalidParameter {
                name: "convergence_K",
                ..
            }
        ));
    }

    #[test]
    fn shear_only_field_defaults_convergence() {
        let params = binary_builder()
            .shear_g(Complex::new(0.05, 0.0))
            .build()
            .unwrap();
        let field = params.external_field().unwrap();
        assert_eq!(field.convergence_k, 0.0);
        assert!(!field.is_shear_free());
    }

    #[test]
    fn deserialize_validates() {
        let params: LensParameters<f64> = serde_json::from_str(
            r#"{"t_0": 300.0, "u_0": -0.07, "t_E": 500.0, "s": 1.0, "q": 0.01,
                "alpha": {"degrees": 270.0}, "rho": 1e-4}"#,
        )
        .unwrap();
        assert_eq!(params, binary_builder().build().unwrap());

        let result: Result<LensParameters<f64>, _> =
            serde_json::from_str(r#"{"t_0": 0.0, "u_0": 0.1, "t_E": -1.0}"#);
        assert!(result.is_err());
    }
}
