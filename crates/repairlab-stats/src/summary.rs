use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Arithmetic mean over finite values; 0 when none are finite.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Population standard deviation over finite values; 0 for fewer than two.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return 0.0;
    }
    let m = mean(&finite);
    let var = finite.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / finite.len() as f64;
    var.sqrt()
}

/// Lower nearest-rank percentile: `sorted[floor(p·(n−1))]` over finite values.
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<OrderedFloat<f64>> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(OrderedFloat)
        .collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_unstable();
    let p = p.clamp(0.0, 1.0);
    let idx = ((p * (sorted.len() - 1) as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx].0
}

/// Mean and standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryStat {
    pub mean: f64,
    pub std: f64,
    pub n: usize,
}

impl SummaryStat {
    #[must_use]
    pub fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            std: std_dev(values),
            n: values.iter().filter(|v| v.is_finite()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_are_skipped() {
        let v = [1.0, f64::NAN, 3.0, f64::INFINITY];
        assert_eq!(mean(&v), 2.0);
        assert_eq!(std_dev(&v), 1.0);
        assert_eq!(SummaryStat::of(&v).n, 2);
    }

    #[test]
    fn percentile_uses_lower_rank() {
        let v = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&v, 0.5), 3.0);
        assert_eq!(percentile(&v, 0.95), 4.0);
        assert_eq!(percentile(&v, 1.0), 5.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }
}
