use crate::counts::CountMap;
use serde::{Deserialize, Serialize};

/// Default number of classes folded into [`VocabStats::top_mass`].
pub const DEFAULT_TOP_N: usize = 10;

/// Vocabulary statistics of a single count map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct VocabStats {
    /// Shannon entropy in nats.
    pub entropy: f64,
    /// Effective vocabulary size, `exp(entropy)`. 1 for a single class, 0 when empty.
    pub effective_vocab: f64,
    /// Fraction of the total mass held by the `top_n` most frequent classes.
    pub top_mass: f64,
    /// Number of distinct classes with nonzero count.
    pub unique: usize,
    pub total: u64,
}

/// Shannon entropy `-Σ p ln p` of a count map, 0 for an empty map.
#[must_use]
pub fn shannon_entropy(counts: &CountMap) -> f64 {
    let total = counts.total();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let mut h = 0.0;
    for (_, count) in counts.iter() {
        let p = count as f64 / total;
        h -= p * p.ln();
    }
    h.max(0.0)
}

/// Entropy, effective vocabulary and top-`top_n` mass of `counts`.
#[must_use]
pub fn vocab_stats(counts: &CountMap, top_n: usize) -> VocabStats {
    let total = counts.total();
    if total == 0 {
        return VocabStats::default();
    }
    let entropy = shannon_entropy(counts);
    let mut sorted: Vec<u64> = counts.iter().map(|(_, c)| c).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let top: u64 = sorted.iter().take(top_n).sum();
    VocabStats {
        entropy,
        effective_vocab: entropy.exp(),
        top_mass: top as f64 / total as f64,
        unique: counts.len(),
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_is_neutral() {
        let stats = vocab_stats(&CountMap::new(), DEFAULT_TOP_N);
        assert_eq!(stats, VocabStats::default());
        assert_eq!(shannon_entropy(&CountMap::new()), 0.0);
    }

    #[test]
    fn uniform_map_has_full_vocabulary() {
        let counts = CountMap::from([(0, 5), (1, 5), (2, 5), (3, 5)]);
        let stats = vocab_stats(&counts, 2);
        assert!((stats.entropy - 4.0_f64.ln()).abs() < 1e-12);
        assert!((stats.effective_vocab - 4.0).abs() < 1e-9);
        assert!((stats.top_mass - 0.5).abs() < 1e-12);
        assert_eq!(stats.unique, 4);
    }

    #[test]
    fn single_class_has_zero_entropy() {
        let counts = CountMap::from([(9, 7)]);
        let stats = vocab_stats(&counts, DEFAULT_TOP_N);
        assert_eq!(stats.entropy, 0.0);
        assert_eq!(stats.effective_vocab, 1.0);
        assert_eq!(stats.top_mass, 1.0);
    }
}
