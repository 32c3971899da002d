//! Distance measures between a corrupted layer and the field it should track.

use crate::region::{RegionMask, quadrant_index};

/// Mean `|a − b|` over masked cells; 0 for an empty mask.
#[must_use]
pub fn mean_abs_diff(a: &[f32], b: &[f32], mask: &RegionMask) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for q in mask.indices() {
        let (Some(&x), Some(&y)) = (a.get(q), b.get(q)) else {
            continue;
        };
        sum += f64::from((x - y).abs());
        count += 1;
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// One logical bit per quadrant: whether the masked quadrant mean reaches
/// half of `level_max`. Quadrants with no masked cells read as 0.
#[must_use]
pub fn quadrant_bits(field: &[f32], grid: usize, level_max: u32, mask: &RegionMask) -> [bool; 4] {
    let mut sums = [0.0f64; 4];
    let mut counts = [0usize; 4];
    for q in mask.indices() {
        let Some(&value) = field.get(q) else { continue };
        let quadrant = quadrant_index(q, grid);
        sums[quadrant] += f64::from(value);
        counts[quadrant] += 1;
    }
    let threshold = f64::from(level_max) / 2.0;
    std::array::from_fn(|i| {
        let mean = if counts[i] > 0 {
            sums[i] / counts[i] as f64
        } else {
            0.0
        };
        mean >= threshold
    })
}

/// Fraction of the four quadrant bits on which `layer` disagrees with `reference`.
#[must_use]
pub fn bit_error_rate(
    reference: &[f32],
    layer: &[f32],
    grid: usize,
    level_max: u32,
    mask: &RegionMask,
) -> f64 {
    let expected = quadrant_bits(reference, grid, level_max, mask);
    let actual = quadrant_bits(layer, grid, level_max, mask);
    let mismatches = expected.iter().zip(&actual).filter(|(a, b)| a != b).count();
    mismatches as f64 / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionConfig;
    use crate::region::hazard_mask;

    #[test]
    fn identical_fields_have_no_distance() {
        let mask = hazard_mask(4, &RegionConfig::default());
        let field: Vec<f32> = (0..16).map(|i| (i % 3) as f32).collect();
        assert_eq!(mean_abs_diff(&field, &field, &mask), 0.0);
        assert_eq!(bit_error_rate(&field, &field, 4, 2, &mask), 0.0);
    }

    #[test]
    fn flipping_a_quadrant_costs_one_bit() {
        let mask = hazard_mask(4, &RegionConfig::default());
        let reference = vec![2.0f32; 16];
        let corrupted = vec![0.0f32; 16];
        assert_eq!(mean_abs_diff(&reference, &corrupted, &mask), 2.0);
        // only quadrant 2 is masked; the other three read 0 in both
        assert_eq!(bit_error_rate(&reference, &corrupted, 4, 2, &mask), 0.25);
    }

    #[test]
    fn empty_mask_is_neutral() {
        let mask = RegionMask::empty(16);
        assert_eq!(mean_abs_diff(&[1.0; 16], &[0.0; 16], &mask), 0.0);
    }
}
