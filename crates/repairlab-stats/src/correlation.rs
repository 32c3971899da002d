use ordered_float::OrderedFloat;

/// 1-based ranks with ties replaced by the mean of their positions.
#[must_use]
pub fn midranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(values[i]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && OrderedFloat(values[order[j]]) == OrderedFloat(values[order[i]]) {
            j += 1;
        }
        let rank = 0.5 * (i + j - 1) as f64 + 1.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }
        i = j;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut dx2 = 0.0;
    let mut dy2 = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        num += dx * dy;
        dx2 += dx * dx;
        dy2 += dy * dy;
    }
    let denom = (dx2 * dy2).sqrt();
    if denom > 0.0 && denom.is_finite() {
        num / denom
    } else {
        0.0
    }
}

/// Spearman rank correlation with midrank tie handling.
///
/// Returns 0 for empty or unequal-length inputs and when either sequence is
/// constant.
#[must_use]
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || x.len() != y.len() {
        return 0.0;
    }
    pearson(&midranks(x), &midranks(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_share_the_mean_rank() {
        assert_eq!(midranks(&[3.0, 1.0, 3.0, 2.0]), vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn monotone_sequences_correlate_perfectly() {
        let depth = [1.0, 2.0, 3.0, 4.0];
        let entropy = [0.1, 0.4, 0.9, 2.5];
        assert!((spearman(&depth, &entropy) - 1.0).abs() < 1e-12);
        let reversed: Vec<f64> = entropy.iter().rev().copied().collect();
        assert!((spearman(&depth, &reversed) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        assert_eq!(spearman(&[], &[]), 0.0);
        assert_eq!(spearman(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(spearman(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), 0.0);
    }
}
