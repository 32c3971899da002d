//! Sparse occupancy and transition counts keyed by motif state id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Integer identifier of a motif class.
pub type StateId = u32;

/// Sparse map from state id to occurrence count.
///
/// Backed by a `BTreeMap` so iteration (and therefore every float sum built
/// from it) is in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountMap {
    counts: BTreeMap<StateId, u64>,
}

impl CountMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `state`.
    pub fn increment(&mut self, state: StateId) {
        self.add(state, 1);
    }

    /// Add `amount` occurrences of `state`. Zero amounts leave no entry behind.
    pub fn add(&mut self, state: StateId, amount: u64) {
        if amount == 0 {
            return;
        }
        *self.counts.entry(state).or_insert(0) += amount;
    }

    /// Fold every count of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        for (&state, &count) in &other.counts {
            self.add(state, count);
        }
    }

    #[must_use]
    pub fn get(&self, state: StateId) -> u64 {
        self.counts.get(&state).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct states observed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StateId, u64)> + '_ {
        self.counts.iter().map(|(&k, &v)| (k, v))
    }

    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.counts.keys().copied()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

impl FromIterator<StateId> for CountMap {
    fn from_iter<I: IntoIterator<Item = StateId>>(iter: I) -> Self {
        let mut map = Self::new();
        for state in iter {
            map.increment(state);
        }
        map
    }
}

impl FromIterator<(StateId, u64)> for CountMap {
    fn from_iter<I: IntoIterator<Item = (StateId, u64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (state, count) in iter {
            map.add(state, count);
        }
        map
    }
}

impl<const N: usize> From<[(StateId, u64); N]> for CountMap {
    fn from(entries: [(StateId, u64); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// One directed transition count in serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub from: StateId,
    pub to: StateId,
    pub count: u64,
}

/// Sparse directed transition counts between distinct states.
///
/// Self-transitions are never stored: [`TransitionTable::record`] and
/// [`TransitionTable::add`] ignore `from == to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TransitionEntry>", into = "Vec<TransitionEntry>")]
pub struct TransitionTable {
    counts: BTreeMap<(StateId, StateId), u64>,
}

impl TransitionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `from -> to` transition. Returns whether anything was stored.
    pub fn record(&mut self, from: StateId, to: StateId) -> bool {
        self.add(from, to, 1)
    }

    pub fn add(&mut self, from: StateId, to: StateId, amount: u64) -> bool {
        if from == to || amount == 0 {
            return false;
        }
        *self.counts.entry((from, to)).or_insert(0) += amount;
        true
    }

    pub fn merge(&mut self, other: &Self) {
        for (&(from, to), &count) in &other.counts {
            self.add(from, to, count);
        }
    }

    #[must_use]
    pub fn get(&self, from: StateId, to: StateId) -> u64 {
        self.counts.get(&(from, to)).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct directed edges with a nonzero count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TransitionEntry> + '_ {
        self.counts
            .iter()
            .map(|(&(from, to), &count)| TransitionEntry { from, to, count })
    }

    /// Every unordered pair `{i, j}` with `i < j` that has traffic in either
    /// direction, as `(i, j, n_ij, n_ji)`, in ascending pair order.
    #[must_use]
    pub fn unordered_pairs(&self) -> Vec<(StateId, StateId, u64, u64)> {
        let mut pairs: BTreeMap<(StateId, StateId), (u64, u64)> = BTreeMap::new();
        for (&(from, to), &count) in &self.counts {
            if from < to {
                pairs.entry((from, to)).or_default().0 += count;
            } else {
                pairs.entry((to, from)).or_default().1 += count;
            }
        }
        pairs
            .into_iter()
            .map(|((i, j), (forward, reverse))| (i, j, forward, reverse))
            .collect()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

impl From<Vec<TransitionEntry>> for TransitionTable {
    fn from(entries: Vec<TransitionEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.add(entry.from, entry.to, entry.count);
        }
        table
    }
}

impl From<TransitionTable> for Vec<TransitionEntry> {
    fn from(table: TransitionTable) -> Self {
        table.iter().collect()
    }
}

/// One real-valued directed edge weight in serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeWeight {
    pub from: StateId,
    pub to: StateId,
    pub value: f64,
}

/// Sparse real-valued weights on directed edges, e.g. entropy production
/// attributed to a transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<EdgeWeight>", into = "Vec<EdgeWeight>")]
pub struct EdgeWeights {
    weights: BTreeMap<(StateId, StateId), f64>,
}

impl EdgeWeights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, from: StateId, to: StateId, value: f64) {
        *self.weights.entry((from, to)).or_insert(0.0) += value;
    }

    pub fn merge(&mut self, other: &Self) {
        for (&(from, to), &value) in &other.weights {
            self.add(from, to, value);
        }
    }

    #[must_use]
    pub fn get(&self, from: StateId, to: StateId) -> f64 {
        self.weights.get(&(from, to)).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = EdgeWeight> + '_ {
        self.weights
            .iter()
            .map(|(&(from, to), &value)| EdgeWeight { from, to, value })
    }
}

impl From<Vec<EdgeWeight>> for EdgeWeights {
    fn from(entries: Vec<EdgeWeight>) -> Self {
        let mut weights = Self::new();
        for entry in entries {
            weights.add(entry.from, entry.to, entry.value);
        }
        weights
    }
}

impl From<EdgeWeights> for Vec<EdgeWeight> {
    fn from(weights: EdgeWeights) -> Self {
        weights.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_map_ignores_zero_amounts() {
        let mut map = CountMap::new();
        map.add(4, 0);
        assert!(map.is_empty());
        map.increment(4);
        map.add(2, 3);
        assert_eq!(map.total(), 4);
        assert_eq!(map.states().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn self_transitions_are_dropped() {
        let mut table = TransitionTable::new();
        assert!(!table.record(3, 3));
        assert!(table.record(3, 5));
        assert_eq!(table.total(), 1);
    }

    #[test]
    fn unordered_pairs_include_reverse_only_edges() {
        let mut table = TransitionTable::new();
        table.add(1, 2, 4);
        table.add(2, 1, 1);
        table.add(9, 3, 2);
        let pairs = table.unordered_pairs();
        assert_eq!(pairs, vec![(1, 2, 4, 1), (3, 9, 0, 2)]);
    }

    #[test]
    fn transition_table_serializes_as_entry_list() {
        let mut table = TransitionTable::new();
        table.add(7, 1, 2);
        let json = serde_json::to_string(&table).expect("serialize");
        assert_eq!(json, r#"[{"from":7,"to":1,"count":2}]"#);
        let back: TransitionTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, table);
    }
}
