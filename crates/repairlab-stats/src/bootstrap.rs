//! Percentile bootstrap for sample means and differences of means.

use crate::rng::RandomSource;
use crate::summary::mean;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Resample count used by the aggregation layer.
pub const DEFAULT_RESAMPLES: usize = 2000;

/// Point estimate with a 95% percentile interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BootstrapEstimate {
    pub point_estimate: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

impl BootstrapEstimate {
    /// A degenerate interval collapsed onto `value`.
    #[must_use]
    pub const fn point(value: f64) -> Self {
        Self {
            point_estimate: value,
            ci_low: value,
            ci_high: value,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.ci_high - self.ci_low
    }

    /// Whether the interval excludes zero.
    #[must_use]
    pub fn excludes_zero(&self) -> bool {
        self.ci_low > 0.0 || self.ci_high < 0.0
    }
}

fn resample_mean<R: RandomSource + ?Sized>(sample: &[f64], rng: &mut R) -> f64 {
    let n = sample.len();
    let mut sum = 0.0;
    for _ in 0..n {
        sum += sample[rng.int(n)];
    }
    sum / n as f64
}

fn interval(point: f64, mut draws: Vec<f64>) -> BootstrapEstimate {
    if draws.is_empty() {
        return BootstrapEstimate::point(point);
    }
    draws.sort_unstable_by_key(|&d| OrderedFloat(d));
    let reps = draws.len();
    let lo = ((0.025 * reps as f64).floor() as usize).min(reps - 1);
    let hi = ((0.975 * reps as f64).floor() as usize).min(reps - 1);
    BootstrapEstimate {
        point_estimate: point,
        ci_low: draws[lo],
        ci_high: draws[hi],
    }
}

fn finite(sample: &[f64]) -> Vec<f64> {
    sample.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Bootstrap the mean of `sample` with `reps` resamples drawn from `rng`.
///
/// Non-finite values are dropped first. An empty sample yields an all-zero
/// estimate; `reps == 0` collapses the interval onto the point estimate.
pub fn bootstrap_mean<R: RandomSource + ?Sized>(
    sample: &[f64],
    reps: usize,
    rng: &mut R,
) -> BootstrapEstimate {
    let sample = finite(sample);
    if sample.is_empty() {
        return BootstrapEstimate::default();
    }
    let point = mean(&sample);
    let draws = (0..reps).map(|_| resample_mean(&sample, rng)).collect();
    interval(point, draws)
}

/// Bootstrap `mean(a) − mean(b)`, resampling both samples independently on
/// every draw from the same generator.
pub fn bootstrap_diff<R: RandomSource + ?Sized>(
    a: &[f64],
    b: &[f64],
    reps: usize,
    rng: &mut R,
) -> BootstrapEstimate {
    let a = finite(a);
    let b = finite(b);
    if a.is_empty() || b.is_empty() {
        return BootstrapEstimate::default();
    }
    let point = mean(&a) - mean(&b);
    let draws = (0..reps)
        .map(|_| {
            let ma = resample_mean(&a, rng);
            let mb = resample_mean(&b, rng);
            ma - mb
        })
        .collect();
    interval(point, draws)
}

/// Bootstrap `mean(a) − mean(b)` with a dedicated generator per sample.
///
/// Draw `i` pairs the `i`-th resample of `a` with the `i`-th resample of `b`,
/// so either side reproduces on its own given its seed.
pub fn bootstrap_diff_split<A, B>(
    a: &[f64],
    b: &[f64],
    reps: usize,
    rng_a: &mut A,
    rng_b: &mut B,
) -> BootstrapEstimate
where
    A: RandomSource + ?Sized,
    B: RandomSource + ?Sized,
{
    let a = finite(a);
    let b = finite(b);
    if a.is_empty() || b.is_empty() {
        return BootstrapEstimate::default();
    }
    let point = mean(&a) - mean(&b);
    let draws_a: Vec<f64> = (0..reps).map(|_| resample_mean(&a, rng_a)).collect();
    let draws = draws_a
        .into_iter()
        .map(|ma| ma - resample_mean(&b, rng_b))
        .collect();
    interval(point, draws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Lcg32;

    const SAMPLE: [f64; 10] = [0.2, 0.4, 0.1, 0.5, 0.3, 0.35, 0.25, 0.45, 0.15, 0.3];

    #[test]
    fn interval_brackets_point_estimate() {
        let est = bootstrap_mean(&SAMPLE, DEFAULT_RESAMPLES, &mut Lcg32::new(101));
        assert!((est.point_estimate - 0.3).abs() < 1e-12);
        assert!(est.ci_low <= est.point_estimate);
        assert!(est.point_estimate <= est.ci_high);
        assert!(est.width() > 0.0);
    }

    #[test]
    fn same_seed_reproduces_bounds() {
        let a = bootstrap_mean(&SAMPLE, 500, &mut Lcg32::new(7));
        let b = bootstrap_mean(&SAMPLE, 500, &mut Lcg32::new(7));
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_inputs_collapse() {
        assert_eq!(
            bootstrap_mean(&[], 100, &mut Lcg32::new(1)),
            BootstrapEstimate::default()
        );
        assert_eq!(
            bootstrap_mean(&[2.0, 2.0], 0, &mut Lcg32::new(1)),
            BootstrapEstimate::point(2.0)
        );
        let constant = bootstrap_mean(&[4.0; 6], 200, &mut Lcg32::new(1));
        assert_eq!(constant, BootstrapEstimate::point(4.0));
    }

    #[test]
    fn clearly_separated_samples_have_a_nonzero_difference() {
        let high: Vec<f64> = SAMPLE.iter().map(|v| v + 1.0).collect();
        let est = bootstrap_diff(&high, &SAMPLE, 1000, &mut Lcg32::new(1234));
        assert!((est.point_estimate - 1.0).abs() < 1e-9);
        assert!(est.excludes_zero());
    }

    #[test]
    fn split_generators_match_independent_means() {
        let high: Vec<f64> = SAMPLE.iter().map(|v| v + 0.5).collect();
        let est = bootstrap_diff_split(
            &high,
            &SAMPLE,
            800,
            &mut Lcg32::new(7001),
            &mut Lcg32::new(8235),
        );
        assert!((est.point_estimate - 0.5).abs() < 1e-9);
        assert!(est.ci_low <= est.point_estimate && est.point_estimate <= est.ci_high);
        let again = bootstrap_diff_split(
            &high,
            &SAMPLE,
            800,
            &mut Lcg32::new(7001),
            &mut Lcg32::new(8235),
        );
        assert_eq!(est, again);
    }
}
