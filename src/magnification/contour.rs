use crate::error::MulensError;
use crate::float_trait::Float;
use crate::lens::LensEquation;
use crate::magnification::MagnificationMethodTrait;

use conv::prelude::*;
use macro_const::macro_const;
use num_complex::Complex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_const! {
    const DOC: &str = r"
Finite-source magnification by contour integration of image boundaries

The area of the images of a source disk of radius $r$ centred at $w$ is found by Green's theorem
$$
S(r) = \int_0^{2\pi} \sum_k p_k \, \frac12 \mathrm{Im}\left(\bar{z}_k \frac{dz_k}{d\theta}\right) d\theta,
$$
where $z_k(\theta)$ are the images of the boundary point $w + r e^{i\theta}$, $p_k$ is the
image parity and
$$
\frac{dz}{d\theta} = \frac{(1 - K) \frac{dw}{d\theta} - \frac{\partial w}{\partial \bar{z}} \overline{\frac{dw}{d\theta}}}{\det J}.
$$
The sum over all images at every $\theta$ makes image tracking unnecessary.

If the number of images is the same all over the boundary, the integral is evaluated by the
trapezoid rule on $2^n$ uniform nodes, $n$ is increased from `min_log2_samples` until two
successive estimates agree to `relative_tolerance`. If the boundary crosses the caustic, the
image count changes at the crossing points, which are located by bisection. A pair of images is
created or destroyed there and the integrand has an integrable singularity
$\propto |\theta - \theta_c|^{-1/2}$. Every arc between two crossings is integrated by Romberg's
method after the substitution $\theta = a + (b - a)\,s(u)$ with
$s(u) = u^4 (35 - 84 u + 70 u^2 - 20 u^3)$, which vanishes with its first three derivatives at
both ends and makes the transformed integrand smooth. Arcs which don't converge are halved, arcs
where another change of the image count is found are split at it. A boundary point where the
images can't be found is shifted by a tiny angle.

The number of image computations is limited by $2^{\mathrm{max\_log2\_samples} + 1}$, the error is
[NumericNonConvergence](crate::MulensError::NumericNonConvergence) if the limit is reached. The
uniform-source magnification is $S(\rho) / (\pi \rho^2)$.

Linear limb darkening with the profile
$$
I(r) \propto 1 - \Gamma \left(1 - \frac32 \sqrt{1 - \frac{r^2}{\rho^2}}\right)
$$
is taken into account by splitting the source into `annuli` concentric rings, denser towards the
limb, each weighted by its exact mean surface brightness.
";
}

#[doc = DOC!()]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "FullContourParameters<T>",
    into = "FullContourParameters<T>",
    bound = "T: Float"
)]
pub struct FullContour<T> {
    relative_tolerance: T,
    min_log2_samples: u32,
    max_log2_samples: u32,
    annuli: usize,
}

impl<T> FullContour<T>
where
    T: Float,
{
    pub fn new(
        relative_tolerance: T,
        min_log2_samples: u32,
        max_log2_samples: u32,
        annuli: usize,
    ) -> Result<Self, MulensError> {
        if !(relative_tolerance > T::zero() && relative_tolerance.is_finite()) {
            return Err(MulensError::invalid_parameter(
                "relative_tolerance",
                "must be positive",
            ));
        }
        if min_log2_samples < 2 || min_log2_samples > max_log2_samples {
            return Err(MulensError::invalid_parameter(
                "min_log2_samples",
                "must be at least 2 and not larger than max_log2_samples",
            ));
        }
        if max_log2_samples > Self::MAX_LOG2_SAMPLES_LIMIT {
            return Err(MulensError::invalid_parameter(
                "max_log2_samples",
                "must not be larger than 24",
            ));
        }
        if annuli == 0 {
            return Err(MulensError::invalid_parameter(
                "annuli",
                "must be positive",
            ));
        }
        Ok(Self {
            relative_tolerance,
            min_log2_samples,
            max_log2_samples,
            annuli,
        })
    }

    const MAX_LOG2_SAMPLES_LIMIT: u32 = 24;

    pub fn default_relative_tolerance() -> T {
        1e-4_f64.approx_as::<T>().unwrap()
    }

    pub const fn default_min_log2_samples() -> u32 {
        5
    }

    pub const fn default_max_log2_samples() -> u32 {
        14
    }

    pub const fn default_annuli() -> usize {
        8
    }

    pub fn relative_tolerance(&self) -> T {
        self.relative_tolerance
    }

    pub fn min_log2_samples(&self) -> u32 {
        self.min_log2_samples
    }

    pub fn max_log2_samples(&self) -> u32 {
        self.max_log2_samples
    }

    pub fn annuli(&self) -> usize {
        self.annuli
    }

    /// Magnified area of the source disk of radius `r` centred at `w`
    pub fn image_area(
        &self,
        lens: &LensEquation<T>,
        w: Complex<T>,
        r: T,
    ) -> Result<T, MulensError> {
        let mut boundary = SourceBoundary::new(lens, w, r, 2 << self.max_log2_samples);
        let two_pi = T::TAU();
        let mut n = 1_usize << self.min_log2_samples;
        let n_t = |n: usize| n.value_as::<T>().unwrap();

        let mut samples = Vec::with_capacity(2 * n);
        let mut sum = T::zero();
        for j in 0..n {
            let theta = two_pi * n_t(j) / n_t(n);
            let sample = boundary.sample(theta)?;
            sum += sample.value;
            samples.push((theta, sample.n_images));
        }
        let n_images = samples[0].1;
        let mut count_changes = samples.iter().any(|&(_, count)| count != n_images);

        if !count_changes {
            let mut estimate = two_pi * sum / n_t(n);
            for _ in self.min_log2_samples..self.max_log2_samples {
                // New nodes are midpoints of the old ones
                for j in 0..n {
                    let theta = two_pi * (n_t(j) + T::half()) / n_t(n);
                    let sample = boundary.sample(theta)?;
                    sum += sample.value;
                    samples.push((theta, sample.n_images));
                    count_changes |= sample.n_images != n_images;
                }
                if count_changes {
                    break;
                }
                n *= 2;
                let refined = two_pi * sum / n_t(n);
                if (refined - estimate).abs() <= self.relative_tolerance * refined.abs() {
                    return Ok(refined);
                }
                estimate = refined;
            }
            if !count_changes {
                return Err(MulensError::NumericNonConvergence("contour integral"));
            }
        }

        samples.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let mut crossings = Vec::new();
        for (i, &(theta, count)) in samples.iter().enumerate() {
            let (next_theta, next_count) = match samples.get(i + 1) {
                Some(&next) => next,
                None => (samples[0].0 + two_pi, samples[0].1),
            };
            if count != next_count {
                let crossing =
                    boundary.locate_crossing((theta, count), (next_theta, next_count))?;
                crossings.push(crossing);
            }
        }
        log::debug!(
            "source boundary of radius {r:e} at {w} crosses the caustic {} times",
            crossings.len()
        );
        self.arcs_integral(&mut boundary, &crossings)
    }

    /// Sum of integrals over arcs between consecutive crossing angles
    fn arcs_integral(
        &self,
        boundary: &mut SourceBoundary<'_, T>,
        crossings: &[T],
    ) -> Result<T, MulensError> {
        let two_pi = T::TAU();
        let absolute_tolerance = self.relative_tolerance * T::PI() * boundary.r.powi(2);

        let mut arcs: Vec<_> = crossings
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                let b = match crossings.get(i + 1) {
                    Some(&b) => b,
                    None => crossings[0] + two_pi,
                };
                (a, b, 0_usize)
            })
            .collect();
        let mut area = T::zero();
        while let Some((a, b, depth)) = arcs.pop() {
            if depth > MAX_ARC_DEPTH {
                return Err(MulensError::NumericNonConvergence("contour integral"));
            }
            let tolerance = absolute_tolerance * (b - a) / two_pi;
            match self.romberg_arc(boundary, a, b, tolerance)? {
                ArcIntegral::Converged(value) => area += value,
                ArcIntegral::CountChange { inner, outer } => {
                    let theta = boundary.locate_crossing(inner, outer)?;
                    arcs.push((a, theta, depth + 1));
                    arcs.push((theta, b, depth + 1));
                }
                ArcIntegral::NotConverged => {
                    let mid = T::half() * (a + b);
                    arcs.push((a, mid, depth + 1));
                    arcs.push((mid, b, depth + 1));
                }
            }
        }
        Ok(area)
    }

    /// Romberg integration over the arc $[a, b]$ in the variable $u$ of the polynomial mapping
    fn romberg_arc(
        &self,
        boundary: &mut SourceBoundary<'_, T>,
        a: T,
        b: T,
        absolute_tolerance: T,
    ) -> Result<ArcIntegral<T>, MulensError> {
        let width = b - a;
        let n_t = |n: usize| n.value_as::<T>().unwrap();

        // u = 1/2 maps to the middle of the arc
        let theta_mid = a + T::half() * width;
        let mid = boundary.sample(theta_mid)?;
        let n_images = mid.n_images;
        let mut trapezoid = T::half() * width * mid.value * arc_mapping_derivative(T::half());
        let mut previous_row = vec![trapezoid];

        for level in 2..=MAX_ROMBERG_LEVEL {
            let n_intervals = 1_usize << level;
            let h = n_t(n_intervals).recip();
            let mut sum = T::zero();
            for i in 0..n_intervals / 2 {
                let u = h * n_t(2 * i + 1);
                let theta = a + width * arc_mapping(u);
                let sample = boundary.sample(theta)?;
                if sample.n_images != n_images {
                    return Ok(ArcIntegral::CountChange {
                        inner: (theta_mid, n_images),
                        outer: (theta, sample.n_images),
                    });
                }
                sum += sample.value * arc_mapping_derivative(u);
            }
            trapezoid = T::half() * trapezoid + h * width * sum;

            let mut row = Vec::with_capacity(level);
            row.push(trapezoid);
            let mut factor = T::one();
            for j in 1..level {
                factor *= T::four();
                let extrapolated =
                    row[j - 1] + (row[j - 1] - previous_row[j - 1]) / (factor - T::one());
                row.push(extrapolated);
            }
            let estimate = row[level - 1];
            let change = (estimate - previous_row[level - 2]).abs();
            if level >= MIN_ROMBERG_LEVEL
                && change <= T::max(self.relative_tolerance * estimate.abs(), absolute_tolerance)
            {
                return Ok(ArcIntegral::Converged(estimate));
            }
            previous_row = row;
        }
        Ok(ArcIntegral::NotConverged)
    }

    /// Magnification of the uniform disk
    fn uniform(&self, lens: &LensEquation<T>, w: Complex<T>, rho: T) -> Result<T, MulensError> {
        Ok(self.image_area(lens, w, rho)? / (T::PI() * rho.powi(2)))
    }

    fn limb_darkened(
        &self,
        lens: &LensEquation<T>,
        w: Complex<T>,
        rho: T,
        gamma: T,
    ) -> Result<T, MulensError> {
        let n: T = self.annuli.value_as::<T>().unwrap();
        let three_halves = T::three() * T::half();
        let mut magnified_flux = T::zero();
        // s = 1 - r^2 / rho^2 on the inner boundary of the current annulus
        let mut s_inner = T::one();
        let mut area_inner = T::zero();
        for j in 1..=self.annuli {
            let j: T = j.value_as::<T>().unwrap();
            let s_outer = (T::one() - j / n).powi(2);
            let r_outer = rho * (T::one() - s_outer).sqrt();
            let area_outer = self.image_area(lens, w, r_outer)?;
            let mean_brightness = T::one() - gamma
                + gamma * (s_inner.powf(three_halves) - s_outer.powf(three_halves))
                    / (s_inner - s_outer);
            magnified_flux += mean_brightness * (area_outer - area_inner);
            s_inner = s_outer;
            area_inner = area_outer;
        }
        Ok(magnified_flux / (T::PI() * rho.powi(2)))
    }
}

const MIN_ROMBERG_LEVEL: usize = 4;
const MAX_ROMBERG_LEVEL: usize = 10;
const MAX_ARC_DEPTH: usize = 32;
const MAX_BISECTIONS: usize = 64;
const MAX_SHIFTS: usize = 4;

/// $s(u) = u^4 (35 - 84 u + 70 u^2 - 20 u^3)$, maps $[0, 1]$ onto itself
fn arc_mapping<T: Float>(u: T) -> T {
    let c = |x: usize| x.value_as::<T>().unwrap();
    u.powi(4) * (c(35) - c(84) * u + c(70) * u.powi(2) - c(20) * u.powi(3))
}

/// $s'(u) = 140 u^3 (1 - u)^3$
fn arc_mapping_derivative<T: Float>(u: T) -> T {
    140_usize.value_as::<T>().unwrap() * (u * (T::one() - u)).powi(3)
}

enum ArcIntegral<T> {
    Converged(T),
    NotConverged,
    /// Image count at `outer` differs from the one at `inner`, pairs are angle and image count
    CountChange {
        inner: (T, usize),
        outer: (T, usize),
    },
}

#[derive(Clone, Copy, Debug)]
struct BoundarySample<T> {
    value: T,
    n_images: usize,
}

/// Contour integrand over the boundary of a source disk, counts image computations
struct SourceBoundary<'a, T>
where
    T: Float,
{
    lens: &'a LensEquation<T>,
    w: Complex<T>,
    r: T,
    lambda: T,
    evaluations: usize,
    max_evaluations: usize,
}

impl<'a, T> SourceBoundary<'a, T>
where
    T: Float,
{
    fn new(lens: &'a LensEquation<T>, w: Complex<T>, r: T, max_evaluations: usize) -> Self {
        Self {
            lens,
            w,
            r,
            lambda: T::one() - lens.field().convergence_k,
            evaluations: 0,
            max_evaluations,
        }
    }

    /// Integrand at `theta`, the angle is shifted a little if the images can't be found
    fn sample(&mut self, theta: T) -> Result<BoundarySample<T>, MulensError> {
        let shift = T::epsilon().sqrt() * T::TAU();
        let mut result = self.evaluate(theta);
        for k in 1..=MAX_SHIFTS {
            if result.is_ok() {
                break;
            }
            let step = ((k + 1) / 2).value_as::<T>().unwrap() * shift;
            let offset = if k % 2 == 1 { step } else { -step };
            result = self.evaluate(theta + offset);
        }
        result
    }

    fn evaluate(&mut self, theta: T) -> Result<BoundarySample<T>, MulensError> {
        if self.evaluations >= self.max_evaluations {
            return Err(MulensError::NumericNonConvergence("contour integral"));
        }
        self.evaluations += 1;

        let e = Complex::from_polar(T::one(), theta);
        let dw = Complex::new(T::zero(), self.r) * e;
        let images = self.lens.images(self.w + e * self.r)?;
        let value: T = images
            .iter()
            .map(|image| {
                let z = image.position;
                let b = self.lens.dw_dzbar(z);
                let dz = (dw * self.lambda - b * dw.conj()) / image.jacobian_determinant;
                image.parity() * T::half() * (z.conj() * dz).im
            })
            .sum();
        if value.is_finite() {
            Ok(BoundarySample {
                value,
                n_images: images.len(),
            })
        } else {
            Err(MulensError::NumericNonConvergence("contour integrand"))
        }
    }

    /// Angle where the image count changes between `first` and `second`, pairs are angle and
    /// image count
    fn locate_crossing(&mut self, first: (T, usize), second: (T, usize)) -> Result<T, MulensError> {
        let tolerance = T::epsilon() * T::TAU() * T::four();
        let (mut lo, n_lo) = first;
        let mut hi = second.0;
        for _ in 0..MAX_BISECTIONS {
            if (hi - lo).abs() <= tolerance {
                break;
            }
            let mid = T::half() * (lo + hi);
            if self.sample(mid)?.n_images == n_lo {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(T::half() * (lo + hi))
    }
}

impl<T> Default for FullContour<T>
where
    T: Float,
{
    fn default() -> Self {
        Self {
            relative_tolerance: Self::default_relative_tolerance(),
            min_log2_samples: Self::default_min_log2_samples(),
            max_log2_samples: Self::default_max_log2_samples(),
            annuli: Self::default_annuli(),
        }
    }
}

impl<T> MagnificationMethodTrait<T> for FullContour<T>
where
    T: Float,
{
    fn magnification(
        &self,
        lens: &LensEquation<T>,
        source: Complex<T>,
        rho: T,
        gamma: T,
    ) -> Result<T, MulensError> {
        let magnification = if rho.is_zero() {
            lens.point_source_magnification(source)?
        } else if gamma.is_zero() {
            self.uniform(lens, source, rho)?
        } else {
            self.limb_darkened(lens, source, rho, gamma)?
        };
        if magnification.is_finite() {
            Ok(magnification)
        } else {
            Err(MulensError::NumericNonConvergence("contour integral"))
        }
    }

    fn requires_finite_source(&self) -> bool {
        true
    }

    fn supports_limb_darkening(&self) -> bool {
        true
    }
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename = "FullContour", bound = "T: Float")]
#[schemars(bound = "T: Float")]
struct FullContourParameters<T> {
    #[serde(default = "FullContour::<T>::default_relative_tolerance")]
    relative_tolerance: T,
    #[serde(default = "FullContour::<T>::default_min_log2_samples")]
    min_log2_samples: u32,
    #[serde(default = "FullContour::<T>::default_max_log2_samples")]
    max_log2_samples: u32,
    #[serde(default = "FullContour::<T>::default_annuli")]
    annuli: usize,
}

impl<T> From<FullContour<T>> for FullContourParameters<T> {
    fn from(f: FullContour<T>) -> Self {
        Self {
            relative_tolerance: f.relative_tolerance,
            min_log2_samples: f.min_log2_samples,
            max_log2_samples: f.max_log2_samples,
            annuli: f.annuli,
        }
    }
}

impl<T> TryFrom<FullContourParameters<T>> for FullContour<T>
where
    T: Float,
{
    type Error = MulensError;

    fn try_from(p: FullContourParameters<T>) -> Result<Self, Self::Error> {
        Self::new(
            p.relative_tolerance,
            p.min_log2_samples,
            p.max_log2_samples,
            p.annuli,
        )
    }
}

impl<T> JsonSchema for FullContour<T>
where
    T: Float,
{
    json_schema!(FullContourParameters<T>, false);
}
