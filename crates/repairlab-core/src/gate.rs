//! Clock-aligned sampling gate for the hazard region.

use crate::config::{GateConfig, GateMode};

const QUADRANT_CLOCK_WIDTH: u32 = 4;

/// Decides whether the hazard region is observable at a given clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardGate {
    mode: GateMode,
    conditioned: bool,
    clock_k: u32,
    region_index: usize,
    span: usize,
}

impl HazardGate {
    #[must_use]
    pub fn new(config: &GateConfig, region_index: usize, span: usize) -> Self {
        Self {
            mode: config.mode,
            conditioned: config.conditioned,
            clock_k: config.clock_k.max(1),
            region_index,
            span,
        }
    }

    /// Whether samples must be gated at all.
    #[must_use]
    pub const fn is_conditioned(&self) -> bool {
        self.conditioned
    }

    /// Raw clock test, ignoring the conditioning flag.
    #[must_use]
    pub fn region_active(&self, clock_state: i64) -> bool {
        match self.mode {
            GateMode::Always => true,
            GateMode::Clock => self.within_span(clock_state, self.clock_k),
            GateMode::Quadrant4 => self.within_span(clock_state, QUADRANT_CLOCK_WIDTH),
        }
    }

    /// Whether a sample taken at `clock_state` may be accumulated.
    #[must_use]
    pub fn is_open(&self, clock_state: i64) -> bool {
        !self.conditioned || self.region_active(clock_state)
    }

    fn within_span(&self, clock_state: i64, width: u32) -> bool {
        let k = i64::from(width);
        let active = clock_state.rem_euclid(k);
        let center = self.region_index as i64;
        let span = self.span as i64;
        (-span..=span).any(|offset| (center + offset).rem_euclid(k) == active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(mode: GateMode, conditioned: bool) -> HazardGate {
        let config = GateConfig {
            mode,
            conditioned,
            ..GateConfig::default()
        };
        HazardGate::new(&config, 2, 1)
    }

    #[test]
    fn clock_gate_opens_within_circular_span() {
        let g = gate(GateMode::Clock, true);
        let open: Vec<i64> = (0..8).filter(|&c| g.is_open(c)).collect();
        assert_eq!(open, vec![1, 2, 3]);
        // negative and wrapped clock states reduce modulo K
        assert!(g.is_open(-6));
        assert!(g.is_open(10));
    }

    #[test]
    fn span_wraps_across_zero() {
        let config = GateConfig::default();
        let g = HazardGate::new(&config, 0, 1);
        assert!(g.is_open(7));
        assert!(g.is_open(0));
        assert!(g.is_open(1));
        assert!(!g.is_open(4));
    }

    #[test]
    fn quadrant_gate_uses_width_four() {
        let g = gate(GateMode::Quadrant4, true);
        let open: Vec<i64> = (0..8).filter(|&c| g.is_open(c)).collect();
        assert_eq!(open, vec![1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn unconditioned_gate_is_always_open() {
        let g = gate(GateMode::Clock, false);
        assert!((0..8).all(|c| g.is_open(c)));
        assert!(!g.region_active(6));
        assert!(gate(GateMode::Always, true).is_open(5));
    }
}
