use crate::error::MulensError;
use crate::float_trait::Float;

use conv::prelude::*;
use num_complex::Complex;
use std::ops::{Add, Mul, Sub};

const MR: usize = 8;
const MT: usize = 10;
const MAX_ITERATIONS: usize = MT * MR;
const N_RESTARTS: usize = 8;
// Fractional steps used every MT iterations to break limit cycles
const FRACTIONS: [f64; MR + 1] = [0.0, 0.5, 0.25, 0.75, 0.13, 0.38, 0.62, 0.88, 1.0];

/// Polynomial with complex coefficients, the lowest power goes first
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexPolynomial<T> {
    coeffs: Vec<Complex<T>>,
}

impl<T> ComplexPolynomial<T>
where
    T: Float,
{
    /// Construct from coefficients in ascending power order, trailing zeros are dropped
    pub fn new(coeffs: Vec<Complex<T>>) -> Self {
        let mut poly = Self { coeffs };
        poly.trim();
        poly
    }

    pub fn constant(c: Complex<T>) -> Self {
        Self::new(vec![c])
    }

    /// $z - z_0$
    pub fn linear_factor(root: Complex<T>) -> Self {
        Self::new(vec![-root, Complex::new(T::one(), T::zero())])
    }

    /// $\prod_i (z - z_i)$
    pub fn from_roots(roots: impl IntoIterator<Item = Complex<T>>) -> Self {
        roots
            .into_iter()
            .fold(Self::constant(Complex::new(T::one(), T::zero())), |acc, root| {
                &acc * &Self::linear_factor(root)
            })
    }

    pub fn coeffs(&self) -> &[Complex<T>] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|c| c.re.is_zero() && c.im.is_zero())
    }

    /// Horner evaluation
    pub fn eval(&self, z: Complex<T>) -> Complex<T> {
        self.coeffs
            .iter()
            .rev()
            .fold(Complex::new(T::zero(), T::zero()), |acc, &c| acc * z + c)
    }

    pub fn scale(&self, factor: Complex<T>) -> Self {
        Self::new(self.coeffs.iter().map(|&c| c * factor).collect())
    }

    /// All complex roots
    ///
    /// Laguerre's method with deflation, every root found is polished against the full
    /// polynomial afterwards. The implementation follows Numerical Recipes, Press et al., 1997,
    /// Section 9.5. Iterations that stall are restarted from points spread over the circle of
    /// the mean root modulus, and the best iterate is used if none of them converges. Multiple
    /// roots are returned as many times as their multiplicity.
    pub fn roots(&self) -> Result<Vec<Complex<T>>, MulensError> {
        if self.is_zero() {
            return Err(MulensError::invalid_input(
                "polynomial",
                "zero polynomial has no isolated roots",
            ));
        }
        let m = self.degree();

        let mut deflated = self.coeffs.clone();
        let mut roots = Vec::with_capacity(m);
        for j in (1..=m).rev() {
            let x = deflation_root(&deflated[..=j])?;
            roots.push(x);
            // Synthetic division by (z - x)
            let mut b = deflated[j];
            for jj in (0..j).rev() {
                let c = deflated[jj];
                deflated[jj] = b;
                b = x * b + c;
            }
        }

        for root in roots.iter_mut() {
            let polished = laguerre(&self.coeffs, *root);
            if polished.converged && self.eval(polished.root).norm() <= self.eval(*root).norm() {
                *root = polished.root;
            }
        }
        Ok(roots)
    }

    fn trim(&mut self) {
        while self.coeffs.len() > 1 {
            match self.coeffs.last() {
                Some(c) if c.re.is_zero() && c.im.is_zero() => {
                    self.coeffs.pop();
                }
                _ => break,
            }
        }
        if self.coeffs.is_empty() {
            self.coeffs.push(Complex::new(T::zero(), T::zero()));
        }
    }
}

/// Outcome of a Laguerre iteration, `root` is the best iterate if it didn't converge
#[derive(Clone, Copy, Debug)]
struct LaguerreRoot<T> {
    root: Complex<T>,
    residual: T,
    converged: bool,
}

/// One root of the polynomial `a`, restarting stalled iterations
fn deflation_root<T>(a: &[Complex<T>]) -> Result<Complex<T>, MulensError>
where
    T: Float,
{
    let m = a.len() - 1;
    let mut best = laguerre(a, Complex::new(T::zero(), T::zero()));
    if !best.converged {
        let radius = mean_root_modulus(a);
        let n_restarts_f: T = N_RESTARTS.approx().unwrap();
        for k in 0..N_RESTARTS {
            let k_f: T = k.approx().unwrap();
            // Irrational offset keeps restarts off symmetry axes of the lens
            let angle = (k_f + T::half()) * T::TAU() / n_restarts_f + T::SQRT_2();
            let attempt = laguerre(a, Complex::from_polar(radius, angle));
            if attempt.converged || attempt.residual < best.residual {
                best = attempt;
            }
            if best.converged {
                break;
            }
        }
        if !best.converged {
            log::debug!(
                "Laguerre iterations didn't converge for degree {m}, best residual is {:e}",
                best.residual
            );
        }
    }
    if best.root.re.is_finite() && best.root.im.is_finite() {
        Ok(best.root)
    } else {
        Err(MulensError::NumericNonConvergence("Laguerre iterations"))
    }
}

/// $|a_0 / a_m|^{1/m}$, the geometric mean of the root moduli, or unity if it is degenerate
fn mean_root_modulus<T>(a: &[Complex<T>]) -> T
where
    T: Float,
{
    let m = a.len() - 1;
    let m_f: T = m.approx().unwrap();
    let radius = (a[0].norm() / a[m].norm()).powf(m_f.recip());
    if radius.is_finite() && radius > T::zero() {
        radius
    } else {
        T::one()
    }
}

fn laguerre<T>(a: &[Complex<T>], x0: Complex<T>) -> LaguerreRoot<T>
where
    T: Float,
{
    let m = a.len() - 1;
    let m_f: T = m.approx().unwrap();
    let zero = Complex::new(T::zero(), T::zero());

    let mut best = LaguerreRoot {
        root: x0,
        residual: T::infinity(),
        converged: false,
    };
    let mut x = x0;
    for iter in 1..=MAX_ITERATIONS {
        let abx = x.norm();
        let mut b = a[m];
        let mut err = b.norm();
        let mut d = zero;
        let mut f = zero;
        for j in (0..m).rev() {
            f = x * f + d;
            d = x * d + b;
            b = x * b + a[j];
            err = b.norm() + abx * err;
        }
        err *= T::epsilon();
        let residual = b.norm();
        if residual < best.residual {
            best.root = x;
            best.residual = residual;
        }
        // Value is zero to the round-off precision
        if residual <= err {
            return LaguerreRoot {
                root: x,
                residual,
                converged: true,
            };
        }

        let g = d / b;
        let g2 = g * g;
        let h = g2 - f / b * T::two();
        let sq = ((h * m_f - g2) * (m_f - T::one())).sqrt();
        let gm = g - sq;
        let mut gp = g + sq;
        let abp = gp.norm();
        let abm = gm.norm();
        if abp < abm {
            gp = gm;
        }
        let dx = if abp.max(abm) > T::zero() {
            Complex::new(m_f, T::zero()) / gp
        } else {
            let iter_f: T = iter.approx().unwrap();
            Complex::from_polar(T::one() + abx, iter_f)
        };

        let x1 = x - dx;
        // Step is below the round-off of the iterate
        if x == x1 || dx.norm() <= T::epsilon() * x1.norm() {
            return LaguerreRoot {
                root: x1,
                residual,
                converged: true,
            };
        }
        if iter % MT != 0 {
            x = x1;
        } else {
            let frac: T = FRACTIONS[iter / MT].approx().unwrap();
            x -= dx * frac;
        }
    }
    best
}

impl<T> Add for &ComplexPolynomial<T>
where
    T: Float,
{
    type Output = ComplexPolynomial<T>;

    fn add(self, rhs: Self) -> Self::Output {
        let n = usize::max(self.coeffs.len(), rhs.coeffs.len());
        let zero = Complex::new(T::zero(), T::zero());
        ComplexPolynomial::new(
            (0..n)
                .map(|i| {
                    self.coeffs.get(i).copied().unwrap_or(zero)
                        + rhs.coeffs.get(i).copied().unwrap_or(zero)
                })
                .collect(),
        )
    }
}

impl<T> Sub for &ComplexPolynomial<T>
where
    T: Float,
{
    type Output = ComplexPolynomial<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        self + &rhs.scale(Complex::new(-T::one(), T::zero()))
    }
}

impl<T> Mul for &ComplexPolynomial<T>
where
    T: Float,
{
    type Output = ComplexPolynomial<T>;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut coeffs =
            vec![Complex::new(T::zero(), T::zero()); self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        ComplexPolynomial::new(coeffs)
    }
}
