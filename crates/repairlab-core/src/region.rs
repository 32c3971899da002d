//! Hazard region masks and their size-matched outside controls.

use crate::config::{RegionConfig, RegionKind};
use crate::scope::MaskKind;
use repairlab_stats::rng::{Xorshift32, shuffle_in_place};

/// Boolean per-cell mask over a square grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMask {
    cells: Vec<bool>,
    population: usize,
}

impl RegionMask {
    /// Mask with every cell cleared.
    #[must_use]
    pub fn empty(len: usize) -> Self {
        Self {
            cells: vec![false; len],
            population: 0,
        }
    }

    #[must_use]
    pub fn from_cells(cells: Vec<bool>) -> Self {
        let population = cells.iter().filter(|&&c| c).count();
        Self { cells, population }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, cell: usize) -> bool {
        self.cells.get(cell).copied().unwrap_or(false)
    }

    /// Number of cells covered by the mask's grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of set cells.
    #[must_use]
    pub const fn population(&self) -> usize {
        self.population
    }

    /// Indices of set cells in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, &set)| set.then_some(i))
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.indices().any(|i| other.contains(i))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }
}

/// Quadrant (0..4) of a cell: `qy * 2 + qx` with halves split at `g / 2`.
#[must_use]
pub fn quadrant_index(cell: usize, grid: usize) -> usize {
    let x = cell % grid;
    let y = cell / grid;
    let qx = usize::from(2 * x >= grid);
    let qy = usize::from(2 * y >= grid);
    qy * 2 + qx
}

/// Stripe bin of a column, `min(bins − 1, floor(bins · x / g))`.
#[must_use]
pub fn stripe_index(x: usize, grid: usize, bins: usize) -> usize {
    if grid == 0 || bins == 0 {
        return 0;
    }
    (x * bins / grid).min(bins - 1)
}

/// Build the hazard mask for `region` on a `grid × grid` lattice.
#[must_use]
pub fn hazard_mask(grid: usize, region: &RegionConfig) -> RegionMask {
    let cells = grid * grid;
    let mask = (0..cells)
        .map(|cell| match region.kind {
            RegionKind::Quadrant => quadrant_index(cell, grid) == region.index,
            RegionKind::Stripe => {
                let bins = region.bins.max(1);
                let stripe = stripe_index(cell % grid, grid, bins);
                (0..region.span.max(1)).any(|k| (region.index + k) % bins == stripe)
            }
        })
        .collect();
    RegionMask::from_cells(mask)
}

/// Size-matched control mask drawn from cells outside `hazard`.
///
/// The outside cells are shuffled with a xorshift32 generator seeded by `seed`
/// and the first `min(|hazard|, |outside|)` are kept. The result never
/// overlaps `hazard`.
#[must_use]
pub fn matched_outside_mask(hazard: &RegionMask, seed: u32) -> RegionMask {
    let mut outside: Vec<usize> = (0..hazard.len()).filter(|&i| !hazard.contains(i)).collect();
    if outside.is_empty() {
        return RegionMask::empty(hazard.len());
    }
    shuffle_in_place(&mut outside, &mut Xorshift32::new(seed));
    let take = hazard.population().min(outside.len());
    let mut cells = vec![false; hazard.len()];
    for &cell in &outside[..take] {
        cells[cell] = true;
    }
    RegionMask::from_cells(cells)
}

/// Hazard and matched outside masks of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPair {
    pub hazard: RegionMask,
    pub outside: RegionMask,
}

impl MaskPair {
    #[must_use]
    pub fn build(grid: usize, region: &RegionConfig, outside_seed: u32) -> Self {
        let hazard = hazard_mask(grid, region);
        let outside = matched_outside_mask(&hazard, outside_seed);
        Self { hazard, outside }
    }

    #[must_use]
    pub fn get(&self, kind: MaskKind) -> &RegionMask {
        match kind {
            MaskKind::Hazard => &self.hazard,
            MaskKind::Outside => &self.outside,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe(index: usize, span: usize, bins: usize) -> RegionConfig {
        RegionConfig {
            kind: RegionKind::Stripe,
            index,
            span,
            bins,
        }
    }

    #[test]
    fn quadrants_tile_the_grid() {
        let grid = 16;
        let mut total = 0;
        for q in 0..4 {
            let mask = hazard_mask(
                grid,
                &RegionConfig {
                    index: q,
                    ..RegionConfig::default()
                },
            );
            assert_eq!(mask.population(), 64);
            total += mask.population();
        }
        assert_eq!(total, 256);
        // quadrant 2 is the lower-left block: x < 8, y >= 8
        let q2 = hazard_mask(grid, &RegionConfig::default());
        assert!(q2.contains(8 * 16));
        assert!(!q2.contains(8));
    }

    #[test]
    fn stripes_wrap_around() {
        let mask = hazard_mask(16, &stripe(7, 2, 8));
        // bins 7 and 0 -> columns 14, 15, 0, 1
        for x in [0, 1, 14, 15] {
            assert!(mask.contains(x));
        }
        assert!(!mask.contains(2));
        assert_eq!(mask.population(), 4 * 16);
    }

    #[test]
    fn outside_mask_matches_size_and_is_disjoint() {
        for grid in [4, 7, 16] {
            for region in [
                RegionConfig::default(),
                stripe(0, 1, 8),
                stripe(3, 3, 5),
                stripe(1, 9, 4),
            ] {
                let masks = MaskPair::build(grid, &region, 1000);
                let expected = masks
                    .hazard
                    .population()
                    .min(grid * grid - masks.hazard.population());
                assert_eq!(masks.outside.population(), expected);
                assert!(!masks.hazard.overlaps(&masks.outside));
            }
        }
    }

    #[test]
    fn outside_mask_is_seed_stable() {
        let region = RegionConfig::default();
        let a = MaskPair::build(16, &region, 1999);
        let b = MaskPair::build(16, &region, 1999);
        let c = MaskPair::build(16, &region, 2000);
        assert_eq!(a, b);
        assert_ne!(a.outside, c.outside);
    }

    #[test]
    fn full_hazard_leaves_empty_outside() {
        let mask = hazard_mask(8, &stripe(0, 8, 8));
        assert_eq!(mask.population(), 64);
        let outside = matched_outside_mask(&mask, 5);
        assert_eq!(outside.population(), 0);
        assert_eq!(outside.len(), 64);
    }
}
