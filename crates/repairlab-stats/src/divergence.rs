use crate::counts::CountMap;
use std::collections::BTreeSet;

const EPS: f64 = 1e-12;

/// Jensen-Shannon divergence (nats) between two count maps, each normalized by
/// its own total. Returns 0 when both maps are empty.
#[must_use]
pub fn js_divergence(a: &CountMap, b: &CountMap) -> f64 {
    let total_a = a.total();
    let total_b = b.total();
    if total_a == 0 && total_b == 0 {
        return 0.0;
    }
    let norm_a = if total_a == 0 { 1.0 } else { total_a as f64 };
    let norm_b = if total_b == 0 { 1.0 } else { total_b as f64 };
    let keys: BTreeSet<_> = a.states().chain(b.states()).collect();

    let mut kl_a = 0.0;
    let mut kl_b = 0.0;
    for key in keys {
        let p = a.get(key) as f64 / norm_a;
        let q = b.get(key) as f64 / norm_b;
        let m = 0.5 * (p + q);
        if p > 0.0 {
            kl_a += p * ((p + EPS) / (m + EPS)).ln();
        }
        if q > 0.0 {
            kl_b += q * ((q + EPS) / (m + EPS)).ln();
        }
    }
    (0.5 * (kl_a + kl_b)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_maps_have_zero_divergence() {
        let a = CountMap::from([(1, 3), (2, 9), (5, 1)]);
        assert_eq!(js_divergence(&a, &a.clone()), 0.0);
    }

    #[test]
    fn divergence_is_symmetric() {
        let a = CountMap::from([(1, 3), (2, 9)]);
        let b = CountMap::from([(2, 1), (4, 6)]);
        assert_eq!(js_divergence(&a, &b), js_divergence(&b, &a));
    }

    #[test]
    fn disjoint_supports_reach_ln_two() {
        let a = CountMap::from([(1, 4)]);
        let b = CountMap::from([(2, 4)]);
        assert!((js_divergence(&a, &b) - 2.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs_are_neutral() {
        assert_eq!(js_divergence(&CountMap::new(), &CountMap::new()), 0.0);
    }
}
