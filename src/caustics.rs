use crate::error::MulensError;
use crate::float_trait::Float;
use crate::lens::LensEquation;
use crate::parameters::{ExternalField, LensParameters};

use conv::prelude::*;
use ndarray::Array1;
use num_complex::Complex;
use std::sync::{Arc, PoisonError, RwLock};

/// Number of angles used to sample the critical curve
///
/// Every angle gives two critical points for a point lens and up to four for a binary lens, so
/// the number of angles is `n_points / 4` rounded half up.
pub fn n_angles(n_points: usize) -> usize {
    (n_points + 2) / 4
}

/// Critical curve and caustic points, both in the angular sampling order
#[derive(Clone, Debug, PartialEq)]
pub struct CausticCurves<T> {
    critical_curve: Vec<Complex<T>>,
    caustic_points: Vec<Complex<T>>,
}

impl<T> CausticCurves<T>
where
    T: Float,
{
    pub fn critical_curve(&self) -> &[Complex<T>] {
        &self.critical_curve
    }

    pub fn caustic_points(&self) -> &[Complex<T>] {
        &self.caustic_points
    }

    pub fn len(&self) -> usize {
        self.caustic_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caustic_points.is_empty()
    }

    /// Caustic x coordinates
    pub fn x(&self) -> Array1<T> {
        self.caustic_points.iter().map(|w| w.re).collect()
    }

    /// Caustic y coordinates
    pub fn y(&self) -> Array1<T> {
        self.caustic_points.iter().map(|w| w.im).collect()
    }

    pub fn critical_x(&self) -> Array1<T> {
        self.critical_curve.iter().map(|z| z.re).collect()
    }

    pub fn critical_y(&self) -> Array1<T> {
        self.critical_curve.iter().map(|z| z.im).collect()
    }

    /// Smallest distance from `w` to a caustic point, infinity for empty curves
    pub fn distance_to(&self, w: Complex<T>) -> T {
        self.caustic_points
            .iter()
            .map(|&c| (c - w).norm())
            .fold(T::infinity(), T::min)
    }
}

/// Caustic structure of a point lens with external field or of a binary lens
///
/// The critical curve is where the lens mapping Jacobian vanishes, the caustic is its image in
/// the source plane. Critical points solve
/// $\sum_i m_i / (z - z_i)^2 = (1 - K) e^{-i\phi} + \bar{G}$ for $\phi$ sampled uniformly on
/// $[0, 2\pi)$. Computed curves are memoised for the last requested number of points and shared
/// through [Arc], the memo is dropped when the lens geometry changes.
#[derive(Debug)]
pub struct Caustics<T> {
    geometry: Option<(T, T)>,
    lens: LensEquation<T>,
    memo: RwLock<Option<(usize, Arc<CausticCurves<T>>)>>,
}

impl<T> Caustics<T>
where
    T: Float,
{
    /// Binary lens with mass ratio `q` and separation `s`
    pub fn binary(q: T, s: T) -> Self {
        Self::from_lens(Some((q, s)), LensEquation::binary(s, q))
    }

    /// Single point mass
    pub fn point_lens() -> Self {
        Self::from_lens(None, LensEquation::point_lens())
    }

    pub fn from_parameters(parameters: &LensParameters<T>) -> Self {
        Self::from_lens(
            parameters.binary().map(|b| (b.q, b.s)),
            LensEquation::from_parameters(parameters),
        )
    }

    fn from_lens(geometry: Option<(T, T)>, lens: LensEquation<T>) -> Self {
        Self {
            geometry,
            lens,
            memo: RwLock::new(None),
        }
    }

    pub fn with_field(mut self, field: ExternalField<T>) -> Self {
        self.set_external_field(field);
        self
    }

    pub fn lens(&self) -> &LensEquation<T> {
        &self.lens
    }

    pub fn q(&self) -> Option<T> {
        self.geometry.map(|(q, _)| q)
    }

    pub fn s(&self) -> Option<T> {
        self.geometry.map(|(_, s)| s)
    }

    /// Change the mass ratio of a binary lens
    pub fn set_q(&mut self, q: T) -> Result<(), MulensError> {
        let (_, s) = self.geometry.ok_or(MulensError::UnsupportedConfiguration(
            "mass ratio of a single lens",
        ))?;
        if !(q > T::zero() && q <= T::one()) {
            return Err(MulensError::invalid_parameter("q", "must be in (0, 1]"));
        }
        self.set_geometry(q, s);
        Ok(())
    }

    /// Change the separation of a binary lens
    pub fn set_s(&mut self, s: T) -> Result<(), MulensError> {
        let (q, _) = self.geometry.ok_or(MulensError::UnsupportedConfiguration(
            "separation of a single lens",
        ))?;
        if !(s > T::zero() && s.is_finite()) {
            return Err(MulensError::invalid_parameter("s", "must be positive"));
        }
        self.set_geometry(q, s);
        Ok(())
    }

    pub fn set_external_field(&mut self, field: ExternalField<T>) {
        if *self.lens.field() != field {
            self.lens = self.lens.clone().with_field(field);
            self.invalidate();
        }
    }

    fn set_geometry(&mut self, q: T, s: T) {
        if self.geometry != Some((q, s)) {
            self.geometry = Some((q, s));
            self.lens = LensEquation::binary(s, q).with_field(*self.lens.field());
            self.invalidate();
        }
    }

    fn invalidate(&mut self) {
        *self.memo.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Critical curve and caustic sampled with about `n_points` points
    ///
    /// Repeated calls with the same `n_points` return the same [Arc].
    pub fn curves(&self, n_points: usize) -> Result<Arc<CausticCurves<T>>, MulensError> {
        if let Some((n, curves)) = self
            .memo
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            if *n == n_points {
                return Ok(Arc::clone(curves));
            }
        }
        log::debug!("computing caustics with {n_points} points");
        let curves = Arc::new(self.compute(n_points)?);
        *self.memo.write().unwrap_or_else(PoisonError::into_inner) =
            Some((n_points, Arc::clone(&curves)));
        Ok(curves)
    }

    fn compute(&self, n_points: usize) -> Result<CausticCurves<T>, MulensError> {
        let n = n_angles(n_points);
        if n == 0 {
            return Err(MulensError::invalid_input(
                "n_points",
                format!("{n_points} points give no sampling angles"),
            ));
        }
        let n_t: T = n.value_as::<T>().unwrap();
        let lambda = T::one() - self.lens.field().convergence_k;
        let g_conj = self.lens.field().shear_g.conj();

        let mut critical_curve = Vec::with_capacity(4 * n);
        for k in 0..n {
            let k_t: T = k.value_as::<T>().unwrap();
            let phi = T::two() * T::PI() * k_t / n_t;
            let c = Complex::from_polar(lambda, -phi) + g_conj;
            if self.lens.masses().len() == 1 {
                let z = c.inv().sqrt();
                critical_curve.push(z);
                critical_curve.push(-z);
            } else {
                let tolerance = T::epsilon().sqrt() * (T::one() + c.norm());
                let roots = self.lens.critical_curve_polynomial(c).roots()?;
                critical_curve.extend(roots.into_iter().filter(|&z| {
                    z.re.is_finite()
                        && z.im.is_finite()
                        && self.lens.critical_curve_residual(z, c) <= tolerance
                }));
            }
        }
        let caustic_points = critical_curve
            .iter()
            .map(|&z| self.lens.source_position(z))
            .collect();
        Ok(CausticCurves {
            critical_curve,
            caustic_points,
        })
    }
}

impl<T> Clone for Caustics<T>
where
    T: Float,
{
    fn clone(&self) -> Self {
        let memo = self
            .memo
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self {
            geometry: self.geometry,
            lens: self.lens.clone(),
            memo: RwLock::new(memo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn sheared_point_lens() -> Caustics<f64> {
        Caustics::point_lens().with_field(ExternalField::new(0.1, Complex::new(0.05, 0.02)))
    }

    #[test]
    fn number_of_angles() {
        assert_eq!(n_angles(100), 25);
        assert_eq!(n_angles(5000), 1250);
        assert_eq!(n_angles(37), 9);
        assert_eq!(n_angles(2), 1);
        assert_eq!(n_angles(1), 0);
    }

    #[test]
    fn point_lens_with_field_point_counts() {
        let caustics = sheared_point_lens();
        for (n_points, n) in [(100, 25), (5000, 1250), (37, 9)] {
            let curves = caustics.curves(n_points).unwrap();
            assert_eq!(curves.critical_curve().len(), 2 * n);
            assert_eq!(curves.caustic_points().len(), 2 * n);
            assert_eq!(curves.x().len(), 2 * n);
            assert_eq!(curves.y().len(), 2 * n);
        }
    }

    #[test]
    fn binary_point_counts() {
        let caustics = Caustics::binary(0.3, 1.1);
        for (n_points, n) in [(100, 25), (5000, 1250), (37, 9)] {
            let curves = caustics.curves(n_points).unwrap();
            assert!(curves.len() <= 4 * n);
            assert!(curves.len() >= 3 * n, "{}", curves.len());
        }
    }

    #[test]
    fn memoised_curves_are_shared() {
        let caustics = Caustics::binary(0.01, 1.0);
        let a = caustics.curves(200).unwrap();
        let b = caustics.curves(200).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = caustics.curves(100).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn changing_q_invalidates_memo() {
        let mut caustics = Caustics::binary(0.01, 1.0);
        let a = caustics.curves(200).unwrap();
        caustics.set_q(0.5).unwrap();
        let b = caustics.curves(200).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.caustic_points(), b.caustic_points());
        // Same value keeps the memo
        caustics.set_q(0.5).unwrap();
        assert!(Arc::ptr_eq(&b, &caustics.curves(200).unwrap()));
    }

    #[test]
    fn changing_s_invalidates_memo() {
        let mut caustics = Caustics::binary(0.5, 1.0);
        let a = caustics.curves(100).unwrap();
        caustics.set_s(2.0).unwrap();
        assert!(!Arc::ptr_eq(&a, &caustics.curves(100).unwrap()));
    }

    #[test]
    fn point_lens_has_no_binary_geometry() {
        let mut caustics = Caustics::<f64>::point_lens();
        assert!(matches!(
            caustics.set_q(0.5),
            Err(MulensError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn critical_points_have_zero_jacobian() {
        let caustics = Caustics::<f64>::binary(0.2, 0.8)
            .with_field(ExternalField::new(0.0, Complex::new(0.1, 0.0)));
        let curves = caustics.curves(400).unwrap();
        for &z in curves.critical_curve() {
            let det = caustics.lens().jacobian_determinant(z);
            assert!(det.abs() < 1e-6, "{det}");
        }
    }

    #[test]
    fn einstein_ring() {
        let curves = Caustics::<f64>::point_lens().curves(40).unwrap();
        for (&z, &w) in curves.critical_curve().iter().zip(curves.caustic_points()) {
            assert_relative_eq!(z.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(w.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn equal_mass_caustic_is_symmetric() {
        let curves = Caustics::binary(1.0_f64, 1.0).curves(400).unwrap();
        let max_x = curves.x().fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
        let min_x = curves.x().fold(f64::INFINITY, |acc, &x| acc.min(x));
        assert_relative_eq!(max_x, -min_x, max_relative = 1e-6);
    }

    #[test]
    fn too_few_points() {
        assert!(matches!(
            Caustics::binary(0.5_f64, 1.0).curves(1),
            Err(MulensError::InvalidInput { .. })
        ));
    }
}
