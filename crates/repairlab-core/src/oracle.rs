//! Contract between the harness and the simulation it drives.

use crate::config::{PerturbMode, RegionConfig, RegionKind};
use crate::error::HarnessError;
use serde::{Deserialize, Serialize};

/// Move label of base-layer repair moves.
pub const LABEL_REPAIR_BASE: &str = "P5Base";
/// Move label of meta-layer repair moves.
pub const LABEL_REPAIR_META: &str = "P5Meta";
/// Move label of operator token moves.
pub const LABEL_OPERATOR: &str = "OpK";
/// Move label of clock advances.
pub const LABEL_CLOCK: &str = "Clock";

/// Region selector of a perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "region", rename_all = "snake_case")]
pub enum PerturbRegion {
    Quadrant { quadrant: usize },
    Stripe { bin: usize, span: usize, bins: usize },
}

impl From<&RegionConfig> for PerturbRegion {
    fn from(region: &RegionConfig) -> Self {
        match region.kind {
            RegionKind::Quadrant => Self::Quadrant {
                quadrant: region.index,
            },
            RegionKind::Stripe => Self::Stripe {
                bin: region.index,
                span: region.span,
                bins: region.bins,
            },
        }
    }
}

/// Corruption request handed to [`Oracle::perturb`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerturbSpec {
    /// Meta layer to corrupt.
    pub layer: usize,
    #[serde(flatten)]
    pub region: PerturbRegion,
    /// Probability that each region cell is rewritten.
    pub frac: f64,
    pub mode: PerturbMode,
    pub seed: u64,
}

/// One accepted move recorded by the oracle.
///
/// `meta` packs the move id in bits 0..8 and three move-specific bytes above
/// it: layer (8..16), then either mismatch and direction (repair moves) or
/// source and destination offset (operator moves).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptLogEntry {
    pub time: u64,
    pub cell: u32,
    pub meta: u32,
    /// Entropy production of this move.
    pub ep: f64,
}

impl AcceptLogEntry {
    /// Pack a meta word from its four bytes.
    #[must_use]
    pub const fn pack_meta(move_id: u8, layer: u8, b2: u8, b3: u8) -> u32 {
        move_id as u32 | (layer as u32) << 8 | (b2 as u32) << 16 | (b3 as u32) << 24
    }

    #[must_use]
    pub const fn move_id(&self) -> usize {
        (self.meta & 0xff) as usize
    }

    #[must_use]
    pub const fn layer(&self) -> usize {
        ((self.meta >> 8) & 0xff) as usize
    }

    /// Third byte: mismatch bin of repair moves, source offset of operator moves.
    #[must_use]
    pub const fn byte2(&self) -> usize {
        ((self.meta >> 16) & 0xff) as usize
    }

    /// Fourth byte: direction of repair moves, destination offset of operator moves.
    #[must_use]
    pub const fn byte3(&self) -> usize {
        ((self.meta >> 24) & 0xff) as usize
    }
}

/// Bounded buffer of accepted moves.
pub trait AcceptLog {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out every buffered entry in acceptance order.
    fn read(&self) -> Vec<AcceptLogEntry>;

    fn clear(&mut self);

    /// Whether entries were dropped since the last [`AcceptLog::clear`].
    fn overflowed(&self) -> bool;
}

/// A stochastic lattice simulation the harness can step, perturb and observe.
///
/// Fields are row-major `grid_size × grid_size` arrays. Layer `0` is the first
/// meta layer sitting on top of the reference field; layer `l` sits on top of
/// layer `l − 1`. Operator tokens are indexed per interface (one interface per
/// meta layer) as `cell * offsets + r`.
pub trait Oracle {
    fn grid_size(&self) -> usize;
    fn meta_layers(&self) -> usize;
    /// Largest level a field cell can take.
    fn level_max(&self) -> u32;
    /// Oracle time in steps, including any burn-in.
    fn time(&self) -> u64;
    fn step(&mut self, steps: u64);
    fn perturb(&mut self, spec: &PerturbSpec);
    fn clock_state(&self) -> i64;
    fn reference_field(&self) -> &[f32];
    fn layer_field(&self, layer: usize) -> &[f32];
    fn op_offsets(&self) -> &[(i32, i32)];
    fn op_budget(&self) -> u32;
    fn op_tokens(&self, interface: usize) -> &[u32];
    fn move_labels(&self) -> Vec<String>;
    /// Cumulative accepted moves per move label.
    fn accepted_counts(&self) -> &[u64];
    fn entropy_production_total(&self) -> f64;
    /// Cumulative entropy production per move label.
    fn entropy_production_by_move(&self) -> &[f64];
    /// Enable logging of accepted moves whose id bit is set in `mask`.
    fn configure_accept_log(&mut self, mask: u32, capacity: usize);
    fn accept_log(&mut self) -> &mut dyn AcceptLog;
}

/// Indices of the move categories the harness attributes counts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIndex {
    pub repair_base: usize,
    pub repair_meta: usize,
    pub operator: usize,
    pub clock: usize,
}

impl MoveIndex {
    /// Resolve the required labels, failing if any is absent.
    pub fn resolve(labels: &[String]) -> Result<Self, HarnessError> {
        let find = |label: &'static str| {
            labels
                .iter()
                .position(|l| l == label)
                .ok_or_else(|| HarnessError::MissingMoveLabel {
                    label,
                    available: labels.to_vec(),
                })
        };
        Ok(Self {
            repair_base: find(LABEL_REPAIR_BASE)?,
            repair_meta: find(LABEL_REPAIR_META)?,
            operator: find(LABEL_OPERATOR)?,
            clock: find(LABEL_CLOCK)?,
        })
    }

    /// Accept-log mask bit of a move index.
    pub fn mask_bit(label: &'static str, index: usize) -> Result<u32, HarnessError> {
        if index > 31 {
            return Err(HarnessError::ActionMaskOverflow { label, index });
        }
        Ok(1 << index)
    }
}

/// Cumulative entropy production split by category.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpSnapshot {
    pub total: f64,
    pub repair: f64,
    pub operator: f64,
    pub clock: f64,
}

impl EpSnapshot {
    #[must_use]
    pub fn capture<O: Oracle + ?Sized>(oracle: &O, moves: &MoveIndex) -> Self {
        let by_move = oracle.entropy_production_by_move();
        let at = |i: usize| by_move.get(i).copied().unwrap_or(0.0);
        Self {
            total: oracle.entropy_production_total(),
            repair: at(moves.repair_base) + at(moves.repair_meta),
            operator: at(moves.operator),
            clock: at(moves.clock),
        }
    }

    #[must_use]
    pub fn delta_since(&self, earlier: &Self) -> Self {
        Self {
            total: self.total - earlier.total,
            repair: self.repair - earlier.repair,
            operator: self.operator - earlier.operator,
            clock: self.clock - earlier.clock,
        }
    }

    /// Entropy production not attributed to any named category.
    #[must_use]
    pub fn other(&self) -> f64 {
        self.total - self.repair - self.operator - self.clock
    }
}

/// Accepted-move counters split by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveCounts {
    pub repair_meta: u64,
    pub operator: u64,
    pub clock: u64,
    pub total: u64,
}

impl MoveCounts {
    #[must_use]
    pub fn capture<O: Oracle + ?Sized>(oracle: &O, moves: &MoveIndex) -> Self {
        let counts = oracle.accepted_counts();
        let at = |i: usize| counts.get(i).copied().unwrap_or(0);
        Self {
            repair_meta: at(moves.repair_meta),
            operator: at(moves.operator),
            clock: at(moves.clock),
            total: counts.iter().sum(),
        }
    }

    #[must_use]
    pub fn delta_since(&self, earlier: &Self) -> Self {
        Self {
            repair_meta: self.repair_meta.saturating_sub(earlier.repair_meta),
            operator: self.operator.saturating_sub(earlier.operator),
            clock: self.clock.saturating_sub(earlier.clock),
            total: self.total.saturating_sub(earlier.total),
        }
    }
}
