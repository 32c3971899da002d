//! A layered toroidal lattice with local repair, noise, operator tokens and a clock.
//!
//! Layer `0` sits on a fixed reference field and every meta layer `l` sits on
//! layer `l − 1`. Repair moves nudge one cell of a layer one level toward the
//! field below it, at a neighbour chosen by that cell's operator tokens. The
//! dynamics are deliberately simple: the lattice exists to give the harness
//! something deterministic to drive, not to model any particular physics.

use crate::accept_log::BoundedAcceptLog;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use repairlab_core::motif::sign_bin;
use repairlab_core::{
    AcceptLog, AcceptLogEntry, LABEL_CLOCK, LABEL_OPERATOR, LABEL_REPAIR_BASE, LABEL_REPAIR_META,
    Oracle, PerturbMode, PerturbRegion, PerturbSpec, RegionConfig, RegionKind, hazard_mask,
};
use repairlab_stats::Xorshift32;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Label of unbiased noise moves.
pub const LABEL_NOISE: &str = "Noise";

const MOVE_NOISE: usize = 0;
const MOVE_REPAIR_BASE: usize = 1;
const MOVE_REPAIR_META: usize = 2;
const MOVE_OPERATOR: usize = 3;
const MOVE_CLOCK: usize = 4;
const MOVE_COUNT: usize = 5;

const CROSS: [(i32, i32); 5] = [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)];
const FULL: [(i32, i32); 9] = [
    (0, 0),
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

/// Operator token offset set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stencil {
    /// Centre plus the four axis neighbours.
    #[default]
    Cross,
    /// Full 3×3 Moore neighbourhood.
    Full,
}

impl Stencil {
    #[must_use]
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Self::Cross => &CROSS,
            Self::Full => &FULL,
        }
    }
}

/// Errors raised when a lattice configuration is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LatticeError {
    #[error("invalid lattice configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Lattice parameters. Rates are per-step probabilities of attempting a move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    pub grid_size: usize,
    pub meta_layers: usize,
    pub level_max: u32,
    pub stencil: Stencil,
    /// Operator tokens per cell and interface.
    pub op_budget: u32,
    pub repair: bool,
    pub repair_rate: f64,
    /// Entropy produced by one accepted repair move.
    pub repair_ep: f64,
    pub noise_rate: f64,
    pub op_rate: f64,
    /// Entropy produced per unit of distance a token moves toward the centre.
    pub op_drive: f64,
    /// Steps between clock advances.
    pub clock_period: u64,
    pub clock_k: u32,
    pub clock_ep: f64,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            grid_size: 16,
            meta_layers: 2,
            level_max: 2,
            stencil: Stencil::Cross,
            op_budget: 4,
            repair: true,
            repair_rate: 1.0,
            repair_ep: 1.0,
            noise_rate: 0.0,
            op_rate: 0.5,
            op_drive: 0.0,
            clock_period: 1_000,
            clock_k: 8,
            clock_ep: 0.1,
        }
    }
}

impl LatticeConfig {
    pub fn validate(&self) -> Result<(), LatticeError> {
        if self.grid_size < 2 {
            return Err(LatticeError::InvalidConfig("grid_size must be at least 2"));
        }
        if self.level_max == 0 {
            return Err(LatticeError::InvalidConfig("level_max must be positive"));
        }
        for rate in [self.repair_rate, self.noise_rate, self.op_rate] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(LatticeError::InvalidConfig("move rates must be within [0, 1]"));
            }
        }
        if self.clock_period == 0 || self.clock_k == 0 {
            return Err(LatticeError::InvalidConfig(
                "clock_period and clock_k must be positive",
            ));
        }
        Ok(())
    }
}

/// Reference oracle over a `grid_size × grid_size` torus.
#[derive(Debug, Clone)]
pub struct LatticeOracle {
    config: LatticeConfig,
    rng: SmallRng,
    time: u64,
    clock: i64,
    labels: Vec<String>,
    reference: Vec<f32>,
    layers: Vec<Vec<f32>>,
    offsets: Vec<(i32, i32)>,
    tokens: Vec<Vec<u32>>,
    accepted: Vec<u64>,
    ep_by_move: Vec<f64>,
    ep_total: f64,
    log: BoundedAcceptLog,
}

impl LatticeOracle {
    pub fn new(config: LatticeConfig, seed: u64) -> Result<Self, LatticeError> {
        config.validate()?;
        let mut rng = SmallRng::seed_from_u64(seed);
        let grid = config.grid_size;
        let cells = grid * grid;
        let levels = config.level_max + 1;
        let block = (grid / 4).max(1);
        let reference: Vec<f32> = (0..cells)
            .map(|q| {
                let (x, y) = (q % grid, q / grid);
                ((x / block + y / block) as u32 % levels) as f32
            })
            .collect();
        let layers = vec![reference.clone(); config.meta_layers];
        let offsets = config.stencil.offsets().to_vec();
        let r = offsets.len();
        let tokens = (0..config.meta_layers)
            .map(|_| {
                let mut slice = vec![0u32; cells * r];
                for q in 0..cells {
                    for _ in 0..config.op_budget {
                        slice[q * r + rng.random_range(0..r)] += 1;
                    }
                }
                slice
            })
            .collect();
        let labels = [
            LABEL_NOISE,
            LABEL_REPAIR_BASE,
            LABEL_REPAIR_META,
            LABEL_OPERATOR,
            LABEL_CLOCK,
        ]
        .iter()
        .map(|label| (*label).to_string())
        .collect();
        Ok(Self {
            config,
            rng,
            time: 0,
            clock: 0,
            labels,
            reference,
            layers,
            offsets,
            tokens,
            accepted: vec![0; MOVE_COUNT],
            ep_by_move: vec![0.0; MOVE_COUNT],
            ep_total: 0.0,
            log: BoundedAcceptLog::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    /// Rename the move reported at `index`, e.g. to exercise label validation.
    pub fn relabel(&mut self, index: usize, label: impl Into<String>) {
        if let Some(slot) = self.labels.get_mut(index) {
            *slot = label.into();
        }
    }

    fn cells(&self) -> usize {
        self.config.grid_size * self.config.grid_size
    }

    fn neighbour(&self, cell: usize, (dx, dy): (i32, i32)) -> usize {
        let g = self.config.grid_size as i64;
        let x = (cell as i64 % g + i64::from(dx)).rem_euclid(g);
        let y = (cell as i64 / g + i64::from(dy)).rem_euclid(g);
        (y * g + x) as usize
    }

    fn accept(&mut self, move_id: usize, cell: usize, meta: u32, ep: f64) {
        self.accepted[move_id] += 1;
        self.ep_by_move[move_id] += ep;
        self.ep_total += ep;
        self.log.push(AcceptLogEntry {
            time: self.time,
            cell: cell as u32,
            meta,
            ep,
        });
    }

    fn tick(&mut self) {
        self.time += 1;
        if self.time % self.config.clock_period == 0 {
            self.clock = (self.clock + 1) % i64::from(self.config.clock_k);
            let meta = AcceptLogEntry::pack_meta(MOVE_CLOCK as u8, 0, 0, 0);
            self.accept(MOVE_CLOCK, 0, meta, self.config.clock_ep);
        }
        if self.config.meta_layers == 0 {
            return;
        }
        if self.config.noise_rate > 0.0 && self.rng.random::<f64>() < self.config.noise_rate {
            self.noise_move();
        }
        if self.config.repair && self.rng.random::<f64>() < self.config.repair_rate {
            self.repair_move();
        }
        if self.config.op_rate > 0.0 && self.rng.random::<f64>() < self.config.op_rate {
            self.operator_move();
        }
    }

    fn noise_move(&mut self) {
        let q = self.rng.random_range(0..self.cells());
        let layer = self.rng.random_range(0..self.config.meta_layers);
        let level = self.rng.random_range(0..=self.config.level_max) as f32;
        if self.layers[layer][q] == level {
            return;
        }
        self.layers[layer][q] = level;
        let meta = AcceptLogEntry::pack_meta(MOVE_NOISE as u8, layer as u8, 0, 0);
        self.accept(MOVE_NOISE, q, meta, 0.0);
    }

    /// Direction drawn in proportion to the operator tokens of `(layer, cell)`.
    fn token_direction(&mut self, layer: usize, cell: usize) -> usize {
        let r = self.offsets.len();
        let slice = &self.tokens[layer][cell * r..(cell + 1) * r];
        let total: u32 = slice.iter().sum();
        if total == 0 {
            return 0;
        }
        let mut pick = self.rng.random_range(0..total);
        for (dir, &count) in slice.iter().enumerate() {
            if pick < count {
                return dir;
            }
            pick -= count;
        }
        0
    }

    fn repair_move(&mut self) {
        let q = self.rng.random_range(0..self.cells());
        let layer = self.rng.random_range(0..self.config.meta_layers);
        let dir = self.token_direction(layer, q);
        let target = self.neighbour(q, self.offsets[dir]);
        let lower = if layer == 0 {
            self.reference[target]
        } else {
            self.layers[layer - 1][target]
        };
        let upper = self.layers[layer][target];
        if upper == lower {
            return;
        }
        let mismatch = sign_bin(f64::from(upper - lower), 0.0);
        self.layers[layer][target] += (lower - upper).signum();
        let move_id = if layer == 0 {
            MOVE_REPAIR_BASE
        } else {
            MOVE_REPAIR_META
        };
        let meta = AcceptLogEntry::pack_meta(move_id as u8, layer as u8, mismatch as u8, dir as u8);
        self.accept(move_id, target, meta, self.config.repair_ep);
    }

    fn operator_move(&mut self) {
        let r = self.offsets.len();
        let q = self.rng.random_range(0..self.cells());
        let layer = self.rng.random_range(0..self.config.meta_layers);
        let from = self.rng.random_range(0..r);
        let to = self.rng.random_range(0..r);
        let slice = &mut self.tokens[layer][q * r..(q + 1) * r];
        if from == to || slice[from] == 0 {
            return;
        }
        slice[from] -= 1;
        slice[to] += 1;
        let dist = |(dx, dy): (i32, i32)| f64::from(dx.abs() + dy.abs());
        let ep = self.config.op_drive * (dist(self.offsets[from]) - dist(self.offsets[to]));
        let meta =
            AcceptLogEntry::pack_meta(MOVE_OPERATOR as u8, layer as u8, from as u8, to as u8);
        self.accept(MOVE_OPERATOR, q, meta, ep);
    }
}

fn region_config(region: PerturbRegion) -> RegionConfig {
    match region {
        PerturbRegion::Quadrant { quadrant } => RegionConfig {
            kind: RegionKind::Quadrant,
            index: quadrant,
            ..RegionConfig::default()
        },
        PerturbRegion::Stripe { bin, span, bins } => RegionConfig {
            kind: RegionKind::Stripe,
            index: bin,
            span,
            bins,
        },
    }
}

impl Oracle for LatticeOracle {
    fn grid_size(&self) -> usize {
        self.config.grid_size
    }

    fn meta_layers(&self) -> usize {
        self.config.meta_layers
    }

    fn level_max(&self) -> u32 {
        self.config.level_max
    }

    fn time(&self) -> u64 {
        self.time
    }

    fn step(&mut self, steps: u64) {
        for _ in 0..steps {
            self.tick();
        }
    }

    fn perturb(&mut self, spec: &PerturbSpec) {
        let Some(field) = self.layers.get_mut(spec.layer) else {
            warn!(layer = spec.layer, "perturbation targets a missing layer; ignored");
            return;
        };
        let mask = hazard_mask(self.config.grid_size, &region_config(spec.region));
        let levels = self.config.level_max;
        let mut rng = Xorshift32::new(spec.seed as u32);
        let mut corrupted = 0usize;
        for q in mask.indices() {
            let draw = f64::from(rng.next_u32() >> 8) / 16_777_216.0;
            if draw >= spec.frac {
                continue;
            }
            field[q] = match spec.mode {
                PerturbMode::Randomize => {
                    let old = field[q] as u32;
                    ((old + 1 + rng.next_u32() % levels) % (levels + 1)) as f32
                }
                PerturbMode::Zero => 0.0,
            };
            corrupted += 1;
        }
        debug!(time = self.time, corrupted, seed = spec.seed, "lattice perturbed");
    }

    fn clock_state(&self) -> i64 {
        self.clock
    }

    fn reference_field(&self) -> &[f32] {
        &self.reference
    }

    fn layer_field(&self, layer: usize) -> &[f32] {
        self.layers.get(layer).map_or(&[], Vec::as_slice)
    }

    fn op_offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }

    fn op_budget(&self) -> u32 {
        self.config.op_budget
    }

    fn op_tokens(&self, interface: usize) -> &[u32] {
        self.tokens.get(interface).map_or(&[], Vec::as_slice)
    }

    fn move_labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn accepted_counts(&self) -> &[u64] {
        &self.accepted
    }

    fn entropy_production_total(&self) -> f64 {
        self.ep_total
    }

    fn entropy_production_by_move(&self) -> &[f64] {
        &self.ep_by_move
    }

    fn configure_accept_log(&mut self, mask: u32, capacity: usize) {
        self.log.configure(mask, capacity);
    }

    fn accept_log(&mut self) -> &mut dyn AcceptLog {
        &mut self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadrant_spec(frac: f64, seed: u64) -> PerturbSpec {
        PerturbSpec {
            layer: 0,
            region: PerturbRegion::Quadrant { quadrant: 2 },
            frac,
            mode: PerturbMode::Randomize,
            seed,
        }
    }

    fn mismatched(oracle: &LatticeOracle) -> usize {
        oracle
            .layer_field(0)
            .iter()
            .zip(oracle.reference_field())
            .filter(|(a, b)| a != b)
            .count()
    }

    #[test]
    fn layers_start_consistent() {
        let oracle = LatticeOracle::new(LatticeConfig::default(), 1).expect("oracle");
        assert_eq!(mismatched(&oracle), 0);
        assert_eq!(oracle.layer_field(1), oracle.layer_field(0));
        assert_eq!(oracle.op_tokens(0).len(), 256 * 5);
        let per_cell: u32 = oracle.op_tokens(0)[..5].iter().sum();
        assert_eq!(per_cell, 4);
    }

    #[test]
    fn perturbation_stays_in_region_and_is_seeded() {
        let mut a = LatticeOracle::new(LatticeConfig::default(), 1).expect("oracle");
        let mut b = a.clone();
        a.perturb(&quadrant_spec(0.5, 77));
        b.perturb(&quadrant_spec(0.5, 77));
        assert_eq!(a.layer_field(0), b.layer_field(0));
        let hits = mismatched(&a);
        assert!(hits > 0 && hits <= 64);
        for (q, (x, y)) in a.layer_field(0).iter().zip(a.reference_field()).enumerate() {
            if x != y {
                assert_eq!(repairlab_core::region::quadrant_index(q, 16), 2);
            }
        }
    }

    #[test]
    fn full_corruption_changes_every_region_cell() {
        let mut oracle = LatticeOracle::new(LatticeConfig::default(), 3).expect("oracle");
        oracle.perturb(&quadrant_spec(1.0, 5));
        assert_eq!(mismatched(&oracle), 64);
    }

    #[test]
    fn repair_restores_the_reference() {
        let mut oracle = LatticeOracle::new(LatticeConfig::default(), 9).expect("oracle");
        oracle.perturb(&quadrant_spec(0.3, 11));
        assert!(mismatched(&oracle) > 0);
        oracle.step(60_000);
        assert_eq!(mismatched(&oracle), 0);
        assert!(oracle.accepted_counts()[MOVE_REPAIR_BASE] > 0);
    }

    #[test]
    fn without_repair_damage_persists() {
        let config = LatticeConfig {
            repair: false,
            ..LatticeConfig::default()
        };
        let mut oracle = LatticeOracle::new(config, 9).expect("oracle");
        oracle.perturb(&quadrant_spec(0.3, 11));
        let before = mismatched(&oracle);
        oracle.step(20_000);
        assert_eq!(mismatched(&oracle), before);
    }

    #[test]
    fn clock_cycles_and_books_entropy() {
        let mut oracle = LatticeOracle::new(LatticeConfig::default(), 1).expect("oracle");
        oracle.step(9_000);
        assert_eq!(oracle.clock_state(), 1);
        assert_eq!(oracle.accepted_counts()[MOVE_CLOCK], 9);
        let by_move: f64 = oracle.entropy_production_by_move().iter().sum();
        assert!((by_move - oracle.entropy_production_total()).abs() < 1e-9);
    }

    #[test]
    fn tokens_are_conserved() {
        let mut oracle = LatticeOracle::new(LatticeConfig::default(), 2).expect("oracle");
        let before: u32 = oracle.op_tokens(1).iter().sum();
        oracle.step(5_000);
        assert_eq!(oracle.op_tokens(1).iter().sum::<u32>(), before);
    }

    #[test]
    fn accept_log_records_enabled_moves() {
        let mut oracle = LatticeOracle::new(LatticeConfig::default(), 2).expect("oracle");
        oracle.configure_accept_log(1 << MOVE_OPERATOR, 100_000);
        oracle.step(2_000);
        let entries = oracle.accept_log().read();
        assert!(!entries.is_empty());
        assert!(entries.iter().all(|e| e.move_id() == MOVE_OPERATOR));
        assert!(entries.iter().all(|e| e.byte2() < 5 && e.byte3() < 5));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let config = LatticeConfig {
            repair_rate: 1.5,
            ..LatticeConfig::default()
        };
        assert!(LatticeOracle::new(config, 1).is_err());
    }
}
