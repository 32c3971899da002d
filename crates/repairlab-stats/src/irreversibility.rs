//! Detailed-balance violation measures over directed transition counts.

use crate::counts::{CountMap, EdgeWeights, StateId, TransitionTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Laplace pseudo-count added to both directions of a pair.
pub const DEFAULT_SMOOTHING: f64 = 0.5;

const REGULARIZER: f64 = 1e-12;

/// `Σ|n_ij − n_ji| / Σ(n_ij + n_ji)` over unordered pairs; 0 without traffic.
#[must_use]
pub fn symmetry_gap(table: &TransitionTable) -> f64 {
    let mut num = 0u64;
    let mut denom = 0u64;
    for (_, _, forward, reverse) in table.unordered_pairs() {
        num += forward.abs_diff(reverse);
        denom += forward + reverse;
    }
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

fn pair_ep(forward: f64, reverse: f64) -> f64 {
    (forward - reverse) * (forward / reverse).ln()
}

/// Smoothed coarse-grained entropy production
/// `Σ_{i<j} (n_ij − n_ji)·ln((n_ij+α)/(n_ji+α))`.
///
/// Pairs without traffic contribute exactly zero, so the sum only visits
/// pairs observed in at least one direction. Each term is non-negative.
#[must_use]
pub fn coarse_ep_smoothed(table: &TransitionTable, alpha: f64) -> f64 {
    let alpha = alpha.max(0.0);
    table
        .unordered_pairs()
        .into_iter()
        .filter(|&(_, _, f, r)| f != r)
        .map(|(_, _, f, r)| pair_ep(f as f64 + alpha, r as f64 + alpha))
        .filter(|ep| ep.is_finite())
        .sum()
}

/// Unsmoothed estimator with an ε guard in the log ratio, used as a sanity check.
#[must_use]
pub fn coarse_ep_regularized(table: &TransitionTable) -> f64 {
    table
        .unordered_pairs()
        .into_iter()
        .map(|(_, _, f, r)| {
            let diff = f as f64 - r as f64;
            diff * ((f as f64 + REGULARIZER) / (r as f64 + REGULARIZER)).ln()
        })
        .sum()
}

/// Smoothed coarse EP split over states and directed edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoarseEpDecomposition {
    pub total: f64,
    /// Half of every pair's EP credited to each endpoint.
    pub per_state: BTreeMap<StateId, f64>,
    /// `n_ij · ln(c_ij / c_ji)` for each observed directed edge.
    pub per_edge: EdgeWeights,
}

impl CoarseEpDecomposition {
    /// States ordered by descending EP share.
    #[must_use]
    pub fn ranked_states(&self) -> Vec<(StateId, f64)> {
        let mut ranked: Vec<_> = self.per_state.iter().map(|(&s, &v)| (s, v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Occupancy-weighted sum of per-state shares, useful to compare hotspots
    /// against a count map drawn from the same scope.
    #[must_use]
    pub fn occupancy_weighted(&self, occupancy: &CountMap) -> f64 {
        let total = occupancy.total();
        if total == 0 {
            return 0.0;
        }
        self.per_state
            .iter()
            .map(|(&s, &v)| v * occupancy.get(s) as f64 / total as f64)
            .sum()
    }
}

/// Decompose [`coarse_ep_smoothed`] per state and per directed edge.
#[must_use]
pub fn coarse_ep_decompose(table: &TransitionTable, alpha: f64) -> CoarseEpDecomposition {
    let alpha = alpha.max(0.0);
    let mut out = CoarseEpDecomposition::default();
    for (i, j, forward, reverse) in table.unordered_pairs() {
        let c1 = forward as f64 + alpha;
        let c2 = reverse as f64 + alpha;
        let ep = if forward == reverse { 0.0 } else { pair_ep(c1, c2) };
        if !ep.is_finite() {
            continue;
        }
        if ep > 0.0 {
            out.total += ep;
        }
        *out.per_state.entry(i).or_insert(0.0) += ep / 2.0;
        *out.per_state.entry(j).or_insert(0.0) += ep / 2.0;
        if forward > 0 {
            out.per_edge.add(i, j, forward as f64 * (c1 / c2).ln());
        }
        if reverse > 0 {
            out.per_edge.add(j, i, reverse as f64 * (c2 / c1).ln());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symmetric() -> TransitionTable {
        let mut t = TransitionTable::new();
        t.add(1, 2, 5);
        t.add(2, 1, 5);
        t.add(3, 7, 2);
        t.add(7, 3, 2);
        t
    }

    #[test]
    fn symmetric_counts_have_no_gap_and_no_production() {
        let t = symmetric();
        assert_eq!(symmetry_gap(&t), 0.0);
        assert_eq!(coarse_ep_smoothed(&t, DEFAULT_SMOOTHING), 0.0);
        assert_eq!(coarse_ep_regularized(&t), 0.0);
        assert_eq!(coarse_ep_decompose(&t, DEFAULT_SMOOTHING).total, 0.0);
    }

    #[test]
    fn any_imbalance_is_strictly_positive() {
        let mut t = symmetric();
        t.add(9, 4, 1);
        assert!(coarse_ep_smoothed(&t, DEFAULT_SMOOTHING) > 0.0);
        assert!(symmetry_gap(&t) > 0.0);
    }

    #[test]
    fn one_way_flow_is_maximally_asymmetric() {
        let mut t = TransitionTable::new();
        t.add(0, 1, 10);
        assert_eq!(symmetry_gap(&t), 1.0);
        let expected = 10.0 * (10.5_f64 / 0.5).ln();
        assert!((coarse_ep_smoothed(&t, 0.5) - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_table_is_neutral() {
        let t = TransitionTable::new();
        assert_eq!(symmetry_gap(&t), 0.0);
        assert_eq!(coarse_ep_smoothed(&t, 0.5), 0.0);
        assert!(coarse_ep_decompose(&t, 0.5).per_state.is_empty());
    }

    #[test]
    fn decomposition_splits_pair_ep_between_endpoints() {
        let mut t = TransitionTable::new();
        t.add(0, 1, 6);
        t.add(1, 0, 2);
        let d = coarse_ep_decompose(&t, 0.5);
        assert!((d.total - coarse_ep_smoothed(&t, 0.5)).abs() < 1e-12);
        assert!((d.per_state[&0] - d.total / 2.0).abs() < 1e-12);
        assert!((d.per_state[&1] - d.total / 2.0).abs() < 1e-12);
        assert!(d.per_edge.get(0, 1) > 0.0);
        assert!(d.per_edge.get(1, 0) < 0.0);
        let json = serde_json::to_string(&d).expect("serialize");
        assert!(json.contains(r#""from":0,"to":1"#));
        assert_eq!(d.ranked_states().len(), 2);
    }
}
