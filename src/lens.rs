use crate::error::MulensError;
use crate::float_trait::Float;
use crate::parameters::{ExternalField, LensParameters};
use crate::polynomial::ComplexPolynomial;

use num_complex::Complex;

/// Point-source point-lens magnification
///
/// $$
/// A(u) = \frac{u^2 + 2}{u \sqrt{u^2 + 4}},
/// $$
/// where $u$ is the lens-source separation in Einstein radii. The value formally diverges at
/// $u = 0$, positive infinity is returned in this case.
pub fn point_lens_magnification<T>(u: T) -> T
where
    T: Float,
{
    let u = u.abs();
    if u.is_zero() {
        return T::infinity();
    }
    let u2 = u.powi(2);
    (u2 + T::two()) / (u * (u2 + T::four()).sqrt())
}

/// Component of a lens, mass is in units of the total lens mass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMass<T> {
    pub position: Complex<T>,
    pub mass: T,
}

/// Lensed image of a point source
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Image<T> {
    pub position: Complex<T>,
    /// Determinant of the lens mapping Jacobian at the image position
    pub jacobian_determinant: T,
}

impl<T> Image<T>
where
    T: Float,
{
    pub fn magnification(&self) -> T {
        self.jacobian_determinant.abs().recip()
    }

    /// +1 for direct images, -1 for mirrored ones
    pub fn parity(&self) -> T {
        self.jacobian_determinant.signum()
    }
}

/// Lens mapping from the lens plane $z$ to the source plane $w$ in complex coordinates
///
/// $$
/// w = (1 - K) z - G \bar{z} - \sum_i \frac{m_i}{\bar{z} - \bar{z}_i},
/// $$
/// where $K$ is the external convergence, $G$ is the external shear, $m_i$ and $z_i$ are masses
/// and positions of the lens components. The origin is the centre of mass.
#[derive(Clone, Debug, PartialEq)]
pub struct LensEquation<T> {
    masses: Vec<PointMass<T>>,
    field: ExternalField<T>,
}

impl<T> LensEquation<T>
where
    T: Float,
{
    /// Unit mass at the origin
    pub fn point_lens() -> Self {
        Self {
            masses: vec![PointMass {
                position: Complex::new(T::zero(), T::zero()),
                mass: T::one(),
            }],
            field: ExternalField::none(),
        }
    }

    /// Two masses on the real axis, the primary is on the negative side
    pub fn binary(s: T, q: T) -> Self {
        let total = T::one() + q;
        Self {
            masses: vec![
                PointMass {
                    position: Complex::new(-q * s / total, T::zero()),
                    mass: total.recip(),
                },
                PointMass {
                    position: Complex::new(s / total, T::zero()),
                    mass: q / total,
                },
            ],
            field: ExternalField::none(),
        }
    }

    pub fn with_field(mut self, field: ExternalField<T>) -> Self {
        self.field = field;
        self
    }

    pub fn from_parameters(parameters: &LensParameters<T>) -> Self {
        let lens = match parameters.binary() {
            Some(b) => Self::binary(b.s, b.q),
            None => Self::point_lens(),
        };
        match parameters.external_field() {
            Some(&field) => lens.with_field(field),
            None => lens,
        }
    }

    pub fn masses(&self) -> &[PointMass<T>] {
        &self.masses
    }

    pub fn field(&self) -> &ExternalField<T> {
        &self.field
    }

    /// Single mass without external field, magnification has a closed form
    pub fn is_simple_point_lens(&self) -> bool {
        self.masses.len() == 1 && self.field.is_none()
    }

    #[inline]
    fn lambda(&self) -> T {
        T::one() - self.field.convergence_k
    }

    /// Source-plane position of the lens-plane point `z`
    pub fn source_position(&self, z: Complex<T>) -> Complex<T> {
        let z_conj = z.conj();
        let deflection: Complex<T> = self
            .masses
            .iter()
            .map(|m| (z_conj - m.position.conj()).inv() * m.mass)
            .sum();
        z * self.lambda() - self.field.shear_g * z_conj - deflection
    }

    /// $\partial w / \partial \bar{z}$
    pub fn dw_dzbar(&self, z: Complex<T>) -> Complex<T> {
        let z_conj = z.conj();
        let sum: Complex<T> = self
            .masses
            .iter()
            .map(|m| {
                let dz = z_conj - m.position.conj();
                (dz * dz).inv() * m.mass
            })
            .sum();
        sum - self.field.shear_g
    }

    /// $\det J = (1 - K)^2 - |\partial w / \partial \bar{z}|^2$
    pub fn jacobian_determinant(&self, z: Complex<T>) -> T {
        self.lambda().powi(2) - self.dw_dzbar(z).norm_sqr()
    }

    /// Polynomial in $z$ whose roots include all images of the source at `w`
    ///
    /// It is obtained by substituting the conjugated lens equation into the lens equation, so it
    /// has spurious roots which are not images. The degree is $n^2 + 1$ for the shear-free case
    /// ($2$ for a point lens, $5$ for a binary) and $(n + 1)^2$ otherwise.
    pub fn image_polynomial(&self, w: Complex<T>) -> ComplexPolynomial<T> {
        let lambda = Complex::new(self.lambda(), T::zero());
        let g = self.field.shear_g;

        let d = ComplexPolynomial::from_roots(self.masses.iter().map(|m| m.position));
        let cofactors = self.cofactors();
        let f = cofactors
            .iter()
            .zip(self.masses.iter())
            .fold(zero_poly(), |acc, (cofactor, m)| {
                &acc + &cofactor.scale(real(m.mass))
            });
        // (1 - K) z̄ D(z) expressed via the conjugated lens equation
        let n = &(&ComplexPolynomial::new(vec![w.conj(), g.conj()]) * &d) + &f;
        let p: Vec<_> = self
            .masses
            .iter()
            .map(|m| &n - &d.scale(lambda * m.position.conj()))
            .collect();
        let prod_p = p.iter().fold(one_poly(), |acc, x| &acc * x);
        let p_cofactor_sum = (0..p.len()).fold(zero_poly(), |acc, i| {
            let others = p
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .fold(one_poly(), |prod, (_, x)| &prod * x);
            &acc + &others.scale(real(self.masses[i].mass))
        });
        // w - (1 - K) z
        let w_term = ComplexPolynomial::new(vec![w, -lambda]);

        if self.field.is_shear_free() {
            &(&w_term * &prod_p) + &(&d * &p_cofactor_sum).scale(lambda)
        } else {
            let a = (&(&w_term * &d) * &prod_p).scale(lambda);
            let b = (&n * &prod_p).scale(g);
            let c = (&(&d * &d) * &p_cofactor_sum).scale(lambda * lambda);
            &(&a + &b) + &c
        }
    }

    /// Critical curve condition for the angle parameter `c`
    ///
    /// Critical points satisfy $\sum_i m_i / (z - z_i)^2 = c$ with
    /// $c = (1 - K) e^{-i\phi} + \bar{G}$, which is the polynomial
    /// $c \prod_i (z - z_i)^2 - \sum_i m_i \prod_{j \neq i} (z - z_j)^2 = 0$.
    pub fn critical_curve_polynomial(&self, c: Complex<T>) -> ComplexPolynomial<T> {
        let d = ComplexPolynomial::from_roots(self.masses.iter().map(|m| m.position));
        let lhs = (&d * &d).scale(c);
        let rhs = self
            .cofactors()
            .iter()
            .zip(self.masses.iter())
            .fold(zero_poly(), |acc, (cofactor, m)| {
                &acc + &(cofactor * cofactor).scale(real(m.mass))
            });
        &lhs - &rhs
    }

    /// $|\sum_i m_i / (z - z_i)^2 - c|$, zero on the critical curve
    pub fn critical_curve_residual(&self, z: Complex<T>, c: Complex<T>) -> T {
        let sum: Complex<T> = self
            .masses
            .iter()
            .map(|m| {
                let dz = z - m.position;
                (dz * dz).inv() * m.mass
            })
            .sum();
        (sum - c).norm()
    }

    /// Images of a point source located at `w`
    ///
    /// Roots of [LensEquation::image_polynomial] are kept if they satisfy the lens equation to
    /// the numerical precision. If fewer than the minimum possible number of images pass the
    /// check, the best roots are taken to complete the set.
    pub fn images(&self, w: Complex<T>) -> Result<Vec<Image<T>>, MulensError> {
        let roots = self.image_polynomial(w).roots()?;
        let ten = T::two() * T::five();
        let tolerance = T::epsilon().sqrt() * ten * (T::one() + w.norm());

        let mut candidates: Vec<_> = roots
            .into_iter()
            .filter_map(|z| {
                let residual = (self.source_position(z) - w).norm();
                residual.is_finite().then_some((residual, z))
            })
            .collect();
        candidates.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let n_passed = candidates
            .iter()
            .take_while(|(residual, _)| *residual <= tolerance)
            .count();
        let n_images = usize::min(
            usize::max(n_passed, self.masses.len() + 1),
            candidates.len(),
        );
        Ok(candidates
            .into_iter()
            .take(n_images)
            .map(|(_, z)| Image {
                position: z,
                jacobian_determinant: self.jacobian_determinant(z),
            })
            .collect())
    }

    /// Magnification of a point source located at `w`
    pub fn point_source_magnification(&self, w: Complex<T>) -> Result<T, MulensError> {
        if self.is_simple_point_lens() {
            let u = (w - self.masses[0].position).norm();
            return Ok(point_lens_magnification(u));
        }
        let images = self.images(w)?;
        if images.is_empty() {
            return Err(MulensError::NumericNonConvergence("no images found"));
        }
        Ok(images.iter().map(Image::magnification).sum())
    }

    /// $\prod_{j \neq i} (z - z_j)$ for every component $i$
    fn cofactors(&self) -> Vec<ComplexPolynomial<T>> {
        (0..self.masses.len())
            .map(|i| {
                ComplexPolynomial::from_roots(
                    self.masses
                        .iter()
                        .enumerate()
                        .filter(|&(j, _)| j != i)
                        .map(|(_, m)| m.position),
                )
            })
            .collect()
    }
}

#[inline]
fn real<T: Float>(x: T) -> Complex<T> {
    Complex::new(x, T::zero())
}

#[inline]
fn zero_poly<T: Float>() -> ComplexPolynomial<T> {
    ComplexPolynomial::constant(real(T::zero()))
}

#[inline]
fn one_poly<T: Float>() -> ComplexPolynomial<T> {
    ComplexPolynomial::constant(real(T::one()))
}

#[cfg(test)]
#[allow(clippy::unreadable_literal)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use light_curve_common::linspace;

    #[test]
    fn point_lens_formula() {
        assert_relative_eq!(point_lens_magnification(1.0_f64), 3.0 / 5.0_f64.sqrt());
        assert_relative_eq!(
            point_lens_magnification(0.1_f64),
            2.01 / (0.1 * 4.01_f64.sqrt())
        );
    }

    #[test]
    fn point_lens_zero_separation_is_guarded() {
        let a = point_lens_magnification(0.0_f64);
        assert!(a.is_infinite() && a.is_sign_positive());
    }

    #[test]
    fn point_lens_monotonic_and_tends_to_unity() {
        let u = linspace(1e-3_f64, 100.0, 1000);
        let a: Vec<_> = u.iter().map(|&u| point_lens_magnification(u)).collect();
        assert!(a.windows(2).all(|w| w[1] < w[0]));
        assert!(a.iter().all(|&x| x > 1.0));
        assert_relative_eq!(point_lens_magnification(1e4_f64), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn binary_centre_of_mass() {
        let lens = LensEquation::binary(1.3_f64, 0.2);
        let com: Complex<f64> = lens.masses().iter().map(|m| m.position * m.mass).sum();
        assert_relative_eq!(com.norm(), 0.0, epsilon = 1e-15);
        assert!(lens.masses()[0].position.re < 0.0);
        assert!(lens.masses()[0].mass > lens.masses()[1].mass);
    }

    #[test]
    fn point_lens_images_match_closed_form() {
        let lens = LensEquation::<f64>::point_lens();
        let w = Complex::new(0.3, -0.2);
        let images = lens.images(w).unwrap();
        assert_eq!(images.len(), 2);
        let by_images: f64 = images.iter().map(Image::magnification).sum();
        assert_relative_eq!(
            by_images,
            point_lens_magnification(w.norm()),
            max_relative = 1e-10
        );
        let parities: f64 = images.iter().map(Image::parity).sum();
        assert_eq!(parities, 0.0);
    }

    #[test]
    fn image_polynomial_degrees() {
        let w = Complex::new(0.1, 0.05);
        assert_eq!(LensEquation::<f64>::point_lens().image_polynomial(w).degree(), 2);
        let binary = LensEquation::binary(1.0_f64, 0.5);
        assert_eq!(binary.image_polynomial(w).degree(), 5);
        let sheared = binary.with_field(ExternalField::new(0.1, Complex::new(0.05, 0.0)));
        assert_eq!(sheared.image_polynomial(w).degree(), 9);
    }

    #[test]
    fn binary_images_satisfy_lens_equation() {
        let lens = LensEquation::binary(0.9_f64, 0.3);
        for &w in &[Complex::new(0.5, 0.4), Complex::new(-0.05, 0.01), Complex::new(2.0, -1.0)] {
            let images = lens.images(w).unwrap();
            assert!(images.len() == 3 || images.len() == 5, "{images:?}");
            for image in &images {
                let residual = (lens.source_position(image.position) - w).norm();
                assert!(residual < 1e-6);
            }
        }
    }

    #[test]
    fn wide_binary_far_from_companion_is_point_lens_like() {
        // Source close to the primary of a very wide binary with tiny companion
        let lens = LensEquation::binary(50.0_f64, 1e-6);
        let primary = lens.masses()[0].position;
        let w = primary + Complex::new(0.3, 0.2);
        let actual = lens.point_source_magnification(w).unwrap();
        let desired = point_lens_magnification(0.3_f64.hypot(0.2));
        assert_relative_eq!(actual, desired, max_relative = 1e-3);
    }

    #[test]
    fn convergence_only_point_lens() {
        // For K != 0 and G = 0 images are those of a point lens with rescaled coordinates
        let k = 0.2_f64;
        let lens =
            LensEquation::point_lens().with_field(ExternalField::new(k, Complex::new(0.0, 0.0)));
        let w = Complex::new(0.4_f64, 0.0);
        let lambda = 1.0 - k;
        let desired = point_lens_magnification(w.norm() / lambda.sqrt()) / lambda.powi(2);
        let actual = lens.point_source_magnification(w).unwrap();
        assert_relative_eq!(actual, desired, max_relative = 1e-8);
    }

    #[test]
    fn planetary_binary_images_over_source_grid() {
        let lens = LensEquation::binary(1.0_f64, 0.01);
        let step = 0.015;
        for i in 0..200 {
            for j in 0..200 {
                let w = Complex::new(-1.5 + step * i as f64, -1.5 + step * j as f64);
                let a = lens.point_source_magnification(w).unwrap();
                assert!(a.is_finite() && a >= 1.0 - 1e-6, "A({w}) = {a}");
            }
        }
    }

    #[test]
    fn planetary_binary_magnification_near_planetary_caustic() {
        let lens = LensEquation::binary(1.0_f64, 0.01);
        let w = Complex::new(-1.215, -0.030000000000000027);
        let actual = lens.point_source_magnification(w).unwrap();
        assert_relative_eq!(actual, 1.2162, max_relative = 1e-4);
        let nudged = lens
            .point_source_magnification(Complex::new(-1.215, -0.03))
            .unwrap();
        assert_relative_eq!(actual, nudged, max_relative = 1e-10);
    }

    #[test]
    fn jacobian_vanishes_on_einstein_ring() {
        let lens = LensEquation::<f64>::point_lens();
        let z = Complex::from_polar(1.0, 0.7);
        assert_relative_eq!(lens.jacobian_determinant(z), 0.0, epsilon = 1e-14);
    }
}
