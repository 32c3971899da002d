//! Quantization of layered fields and operator tokens into motif ids.
//!
//! Every classifier here is a pure function of the snapshot it is handed. One
//! motif array is produced per interface; interface `i` pairs meta layer `i`
//! (upper) with the field directly below it (the reference field for `i == 0`).

use crate::config::{AxisThreshold, MotifConfig, OpBinsMode};
use crate::error::HarnessError;
use crate::oracle::Oracle;
use crate::region::RegionMask;
use repairlab_stats::{CountMap, StateId, TransitionTable};
use serde::{Deserialize, Serialize};

/// Number of distinct base motifs, `3^5`.
pub const BASE_ALPHABET: u32 = 243;

/// Number of distinct operator motifs produced by `mode`.
#[must_use]
pub const fn operator_alphabet(mode: OpBinsMode) -> u32 {
    match mode {
        OpBinsMode::Axis => 729,
        OpBinsMode::Direction => 27,
        OpBinsMode::DirectionEntropy => 81,
    }
}

/// Ternary bin: `≤ t1 → 0`, `≤ t2 → 1`, otherwise 2.
#[inline]
#[must_use]
pub fn bin_by_thresholds(value: f64, t1: f64, t2: f64) -> u32 {
    if value <= t1 {
        0
    } else if value <= t2 {
        1
    } else {
        2
    }
}

/// Ternary sign: `> eps → 2`, `< −eps → 0`, otherwise 1.
#[inline]
#[must_use]
pub fn sign_bin(value: f64, eps: f64) -> u32 {
    if value > eps {
        2
    } else if value < -eps {
        0
    } else {
        1
    }
}

/// Pack ternary digits with positional weights `3^i`.
#[must_use]
pub fn combine_base3(digits: &[u32]) -> u32 {
    digits
        .iter()
        .rev()
        .fold(0, |acc, &digit| acc * 3 + digit)
}

/// Inverse of [`combine_base3`] for a fixed number of digits.
#[must_use]
pub fn split_base3<const N: usize>(mut id: u32) -> [u32; N] {
    let mut digits = [0; N];
    for digit in &mut digits {
        *digit = id % 3;
        id /= 3;
    }
    digits
}

#[inline]
fn wrap_index(x: usize, y: usize, grid: usize) -> usize {
    (y % grid) * grid + (x % grid)
}

/// Base motifs of one interface.
///
/// Digits, lowest first: lower level bin, upper level bin, mismatch sign of
/// `upper − lower`, sign of the rightward and downward step of the lower field
/// (toroidal).
#[must_use]
pub fn classify_base(lower: &[f32], upper: &[f32], grid: usize, level_max: f32) -> Vec<StateId> {
    let cells = grid * grid;
    let t1 = f64::from(level_max) / 3.0;
    let t2 = 2.0 * f64::from(level_max) / 3.0;
    let at = |field: &[f32], i: usize| f64::from(field.get(i).copied().unwrap_or(0.0));
    (0..cells)
        .map(|q| {
            let x = q % grid;
            let y = q / grid;
            let lo = at(lower, q);
            let up = at(upper, q);
            let right = at(lower, wrap_index(x + 1, y, grid));
            let down = at(lower, wrap_index(x, y + 1, grid));
            combine_base3(&[
                bin_by_thresholds(lo, t1, t2),
                bin_by_thresholds(up, t1, t2),
                sign_bin(up - lo, 0.0),
                sign_bin(right - lo, 0.0),
                sign_bin(down - lo, 0.0),
            ])
        })
        .collect()
}

/// Direction slot of an offset in the 9-bin histogram.
#[must_use]
pub const fn direction_slot(dx: i32, dy: i32) -> usize {
    match (dx.signum(), dy.signum()) {
        (0, 0) => 0,
        (1, 0) => 1,
        (-1, 0) => 2,
        (0, -1) => 3,
        (0, 1) => 4,
        (1, -1) => 5,
        (-1, -1) => 6,
        (1, 1) => 7,
        _ => 8,
    }
}

/// Parameters of the operator-motif encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorEncoding {
    pub mode: OpBinsMode,
    pub threshold: AxisThreshold,
    pub offsets: Vec<(i32, i32)>,
    pub budget: u32,
}

impl OperatorEncoding {
    fn axis_bin(&self, mass: f64) -> u32 {
        let denom = if self.budget > 0 { f64::from(self.budget) } else { 1.0 };
        match self.threshold {
            AxisThreshold::RawTokens => bin_by_thresholds(mass, 0.0, 3.0),
            AxisThreshold::BudgetFine => bin_by_thresholds(mass / denom, 0.08, 0.16),
            AxisThreshold::BudgetSixths => bin_by_thresholds(mass / denom, 1.0 / 6.0, 2.0 / 6.0),
        }
    }

    /// `[center, +x, −x, +y, −y]` bins of one cell's token distribution.
    fn axis_bins(&self, tokens: &[u32]) -> [u32; 5] {
        let mut mass = [0.0f64; 5];
        for (&count, &(dx, dy)) in tokens.iter().zip(&self.offsets) {
            let slot = if dx == 0 && dy == 0 {
                0
            } else if dx.abs() >= dy.abs() {
                if dx >= 0 { 1 } else { 2 }
            } else if dy >= 0 {
                3
            } else {
                4
            };
            mass[slot] += f64::from(count);
        }
        mass.map(|m| self.axis_bin(m))
    }

    fn direction_masses(&self, tokens: &[u32]) -> [f64; 9] {
        let denom = f64::from(self.budget.max(1));
        let mut masses = [0.0; 9];
        for (&count, &(dx, dy)) in tokens.iter().zip(&self.offsets) {
            if count > 0 {
                masses[direction_slot(dx, dy)] += f64::from(count) / denom;
            }
        }
        masses
    }

    /// Motif id of one cell given its mismatch digit and token slice.
    #[must_use]
    pub fn encode(&self, mismatch: u32, tokens: &[u32]) -> StateId {
        let usable = !self.offsets.is_empty() && tokens.len() >= self.offsets.len();
        match self.mode {
            OpBinsMode::Axis => {
                let bins = if usable { self.axis_bins(tokens) } else { [0; 5] };
                combine_base3(&[mismatch, bins[0], bins[1], bins[2], bins[3], bins[4]])
            }
            OpBinsMode::Direction | OpBinsMode::DirectionEntropy => {
                let masses = if usable {
                    self.direction_masses(tokens)
                } else {
                    [0.0; 9]
                };
                let mut argmax = 0;
                for (i, &m) in masses.iter().enumerate().skip(1) {
                    if m > masses[argmax] {
                        argmax = i;
                    }
                }
                let argmax = argmax as u32;
                if self.mode == OpBinsMode::Direction {
                    return mismatch * 9 + argmax;
                }
                let entropy_bin = bin_normalized_entropy(&masses);
                mismatch + 3 * (argmax + 9 * entropy_bin)
            }
        }
    }
}

fn bin_normalized_entropy(masses: &[f64; 9]) -> u32 {
    let sum: f64 = masses.iter().sum();
    let mut h = 0.0;
    if sum > 0.0 {
        for &m in masses {
            let p = m / sum;
            if p > 0.0 {
                h -= p * p.ln();
            }
        }
    }
    let normalized = h / 9.0_f64.ln();
    if normalized < 0.33 {
        0
    } else if normalized < 0.66 {
        1
    } else {
        2
    }
}

/// Operator motifs of one interface. `tokens` holds `cells × offsets` counts.
#[must_use]
pub fn classify_operator(
    lower: &[f32],
    upper: &[f32],
    tokens: &[u32],
    grid: usize,
    encoding: &OperatorEncoding,
) -> Vec<StateId> {
    let r = encoding.offsets.len();
    (0..grid * grid)
        .map(|q| {
            let lo = f64::from(lower.get(q).copied().unwrap_or(0.0));
            let up = f64::from(upper.get(q).copied().unwrap_or(0.0));
            let mismatch = sign_bin(up - lo, 0.0);
            let cell_tokens = tokens.get(q * r..(q + 1) * r).unwrap_or(&[]);
            encoding.encode(mismatch, cell_tokens)
        })
        .collect()
}

/// Which motif family a statistic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifFamily {
    Base,
    Operator,
}

/// Motif ids of a whole snapshot, indexed `[interface][cell]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MotifFrame {
    pub base: Vec<Vec<StateId>>,
    pub operator: Vec<Vec<StateId>>,
}

impl MotifFrame {
    #[must_use]
    pub fn family(&self, family: MotifFamily) -> &[Vec<StateId>] {
        match family {
            MotifFamily::Base => &self.base,
            MotifFamily::Operator => &self.operator,
        }
    }

    /// Occupancy of masked cells pooled over every interface.
    #[must_use]
    pub fn counts(&self, family: MotifFamily, mask: &RegionMask) -> CountMap {
        let mut counts = CountMap::new();
        for interface in self.family(family) {
            for q in mask.indices() {
                if let Some(&id) = interface.get(q) {
                    counts.increment(id);
                }
            }
        }
        counts
    }

    /// Occupancy of masked cells on a single interface.
    #[must_use]
    pub fn interface_counts(
        &self,
        family: MotifFamily,
        interface: usize,
        mask: &RegionMask,
    ) -> CountMap {
        let Some(ids) = self.family(family).get(interface) else {
            return CountMap::new();
        };
        mask.indices().filter_map(|q| ids.get(q).copied()).collect()
    }
}

/// Changed and compared masked cells between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeStats {
    pub changed: u64,
    pub compared: u64,
}

impl ChangeStats {
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.compared == 0 {
            0.0
        } else {
            self.changed as f64 / self.compared as f64
        }
    }
}

/// Record `from → to` for every masked cell whose motif changed between two
/// temporally adjacent frames of the same family.
pub fn record_transitions(
    prev: &[Vec<StateId>],
    next: &[Vec<StateId>],
    mask: &RegionMask,
    table: &mut TransitionTable,
) -> ChangeStats {
    let mut stats = ChangeStats::default();
    for (before, after) in prev.iter().zip(next) {
        for q in mask.indices() {
            let (Some(&from), Some(&to)) = (before.get(q), after.get(q)) else {
                continue;
            };
            stats.compared += 1;
            if from != to {
                table.record(from, to);
                stats.changed += 1;
            }
        }
    }
    stats
}

/// Classifier bound to one oracle's shape and the configured encodings.
#[derive(Debug, Clone)]
pub struct MotifClassifier {
    grid: usize,
    level_max: f32,
    meta_layers: usize,
    encoding: OperatorEncoding,
}

impl MotifClassifier {
    #[must_use]
    pub fn new(
        config: &MotifConfig,
        grid: usize,
        level_max: u32,
        meta_layers: usize,
        offsets: Vec<(i32, i32)>,
        budget: u32,
    ) -> Self {
        Self {
            grid,
            level_max: level_max as f32,
            meta_layers,
            encoding: OperatorEncoding {
                mode: config.op_bins,
                threshold: config.axis_threshold,
                offsets,
                budget,
            },
        }
    }

    /// Bind to the shape reported by `oracle`.
    #[must_use]
    pub fn for_oracle<O: Oracle + ?Sized>(config: &MotifConfig, oracle: &O) -> Self {
        Self::new(
            config,
            oracle.grid_size(),
            oracle.level_max(),
            oracle.meta_layers(),
            oracle.op_offsets().to_vec(),
            oracle.op_budget(),
        )
    }

    #[must_use]
    pub const fn meta_layers(&self) -> usize {
        self.meta_layers
    }

    #[must_use]
    pub fn operator_alphabet(&self) -> u32 {
        operator_alphabet(self.encoding.mode)
    }

    #[must_use]
    pub fn encoding(&self) -> &OperatorEncoding {
        &self.encoding
    }

    /// Classify the oracle's current snapshot on every interface.
    pub fn classify<O: Oracle + ?Sized>(&self, oracle: &O) -> Result<MotifFrame, HarnessError> {
        let cells = self.grid * self.grid;
        let reference = oracle.reference_field();
        check_len("reference field", cells, reference.len())?;
        let mut frame = MotifFrame {
            base: Vec::with_capacity(self.meta_layers),
            operator: Vec::with_capacity(self.meta_layers),
        };
        for interface in 0..self.meta_layers {
            let upper = oracle.layer_field(interface);
            check_len("layer field", cells, upper.len())?;
            let lower = if interface == 0 {
                reference
            } else {
                oracle.layer_field(interface - 1)
            };
            let tokens = oracle.op_tokens(interface);
            check_len(
                "operator tokens",
                cells * self.encoding.offsets.len(),
                tokens.len(),
            )?;
            frame
                .base
                .push(classify_base(lower, upper, self.grid, self.level_max));
            frame.operator.push(classify_operator(
                lower,
                upper,
                tokens,
                self.grid,
                &self.encoding,
            ));
        }
        Ok(frame)
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), HarnessError> {
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::OracleShape {
            what,
            expected,
            actual,
        })
    }
}
