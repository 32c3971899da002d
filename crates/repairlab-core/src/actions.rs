//! Accept-log driven action statistics.
//!
//! When enabled, the tracker drains the oracle's accept log every chunk and
//! folds each accepted move that lands inside an event's recovery interval into
//! a per-mask [`ActionTally`].

use crate::config::{ActionMode, HarnessConfig};
use crate::error::HarnessError;
use crate::oracle::{
    AcceptLogEntry, LABEL_OPERATOR, LABEL_REPAIR_BASE, LABEL_REPAIR_META, MoveIndex, Oracle,
};
use crate::region::MaskPair;
use repairlab_stats::{CountMap, EdgeWeights, StateId, TransitionTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accepted-move statistics of one mask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionTally {
    pub moves: u64,
    pub ep_total: f64,
    /// Repair action motif occupancy.
    pub motifs: CountMap,
    pub motif_ep: BTreeMap<StateId, f64>,
    pub motif_ep_abs: BTreeMap<StateId, f64>,
    /// Consecutive action motifs within the mask.
    pub sequences: TransitionTable,
    /// Operator `(from offset, to offset)` edges.
    pub edges: TransitionTable,
    pub edge_ep: EdgeWeights,
    pub edge_ep_abs: EdgeWeights,
    /// Edge-family histogram, `(sign dx + 1) · 3 + (sign dy + 1)`.
    pub families: CountMap,
    #[serde(skip)]
    last_motif: Option<StateId>,
}

impl ActionTally {
    fn record_motif(&mut self, motif: StateId, ep: f64) {
        if let Some(prev) = self.last_motif {
            self.sequences.record(prev, motif);
        }
        self.last_motif = Some(motif);
        self.motifs.increment(motif);
        *self.motif_ep.entry(motif).or_insert(0.0) += ep;
        *self.motif_ep_abs.entry(motif).or_insert(0.0) += ep.abs();
        self.moves += 1;
        self.ep_total += ep;
    }

    fn record_edge(&mut self, from: StateId, to: StateId, family: Option<StateId>, ep: f64) {
        self.edges.record(from, to);
        self.edge_ep.add(from, to, ep);
        self.edge_ep_abs.add(from, to, ep.abs());
        if let Some(family) = family {
            self.families.increment(family);
        }
        self.moves += 1;
        self.ep_total += ep;
    }

    /// Directed edges ordered by descending count.
    #[must_use]
    pub fn top_edges(&self, limit: usize) -> Vec<(StateId, StateId, u64)> {
        let mut edges: Vec<_> = self.edges.iter().map(|e| (e.from, e.to, e.count)).collect();
        edges.sort_by(|a, b| b.2.cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));
        edges.truncate(limit);
        edges
    }
}

/// Finished action statistics of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub mode: ActionMode,
    /// Number of distinct repair action motifs (0 for operator edges).
    pub alphabet: u32,
    pub hazard: ActionTally,
    pub outside: ActionTally,
    /// Log entries dropped because they fell outside every recovery interval.
    pub skipped: u64,
}

/// Recovery intervals of the event schedule, in harness time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventClock {
    every: u64,
    deadline: u64,
    steps: u64,
}

impl EventClock {
    fn in_recovery(&self, t: u64) -> bool {
        let t0 = (t / self.every) * self.every;
        t0 >= self.every && t0 + self.deadline <= self.steps && t - t0 < self.deadline
    }
}

/// Drains the accept log and tallies accepted moves per mask.
#[derive(Debug, Clone)]
pub struct ActionRecorder {
    mode: ActionMode,
    moves: MoveIndex,
    masks: MaskPair,
    clock: EventClock,
    origin: u64,
    capacity: usize,
    meta_layers: usize,
    offsets: Vec<(i32, i32)>,
    summary: ActionSummary,
}

impl ActionRecorder {
    /// Recorder for `config.motif.action_mode`, or `None` when actions are off.
    ///
    /// Configures the oracle's accept-log mask and empties the buffer so that
    /// only moves after `origin` are seen.
    pub fn attach<O: Oracle + ?Sized>(
        config: &HarnessConfig,
        oracle: &mut O,
        moves: MoveIndex,
        masks: MaskPair,
        origin: u64,
    ) -> Result<Option<Self>, HarnessError> {
        let mask = match config.motif.action_mode {
            ActionMode::Off => return Ok(None),
            ActionMode::RepairActions => {
                MoveIndex::mask_bit(LABEL_REPAIR_BASE, moves.repair_base)?
                    | MoveIndex::mask_bit(LABEL_REPAIR_META, moves.repair_meta)?
            }
            ActionMode::OperatorEdges => MoveIndex::mask_bit(LABEL_OPERATOR, moves.operator)?,
        };
        let capacity = config.motif.accept_log_capacity;
        oracle.configure_accept_log(mask, capacity);
        oracle.accept_log().clear();

        let offsets = oracle.op_offsets().to_vec();
        let meta_layers = oracle.meta_layers();
        let eff_r = offsets.len().max(1) as u32;
        let alphabet = match config.motif.action_mode {
            ActionMode::RepairActions => eff_r * 3 * (1 + meta_layers as u32),
            _ => 0,
        };
        tracing::debug!(mask, capacity, alphabet, "accept log attached");
        Ok(Some(Self {
            mode: config.motif.action_mode,
            moves,
            masks,
            clock: EventClock {
                every: config.event.event_every,
                deadline: config.event.deadline,
                steps: config.run.steps,
            },
            origin,
            capacity,
            meta_layers,
            offsets,
            summary: ActionSummary {
                mode: config.motif.action_mode,
                alphabet,
                ..ActionSummary::default()
            },
        }))
    }

    /// Read and clear the accept log. Overflow aborts the run.
    pub fn drain<O: Oracle + ?Sized>(
        &mut self,
        oracle: &mut O,
        t: u64,
    ) -> Result<usize, HarnessError> {
        let log = oracle.accept_log();
        if log.overflowed() {
            log.clear();
            return Err(HarnessError::AcceptLogOverflow {
                time: t,
                capacity: self.capacity,
            });
        }
        let entries = log.read();
        log.clear();
        for entry in &entries {
            self.ingest(entry);
        }
        Ok(entries.len())
    }

    fn ingest(&mut self, entry: &AcceptLogEntry) {
        let Some(t) = entry.time.checked_sub(self.origin) else {
            self.summary.skipped += 1;
            return;
        };
        if !self.clock.in_recovery(t) {
            self.summary.skipped += 1;
            return;
        }
        let cell = entry.cell as usize;
        let tally = if self.masks.hazard.contains(cell) {
            &mut self.summary.hazard
        } else if self.masks.outside.contains(cell) {
            &mut self.summary.outside
        } else {
            return;
        };
        match self.mode {
            ActionMode::Off => {}
            ActionMode::RepairActions => {
                let motif =
                    repair_motif(entry, &self.moves, self.offsets.len(), self.meta_layers);
                if let Some(motif) = motif {
                    tally.record_motif(motif, entry.ep);
                }
            }
            ActionMode::OperatorEdges => {
                if entry.move_id() != self.moves.operator {
                    return;
                }
                let (from, to) = (entry.byte2(), entry.byte3());
                let (Some(&a), Some(&b)) = (self.offsets.get(from), self.offsets.get(to)) else {
                    return;
                };
                let family = (b.0 - a.0).signum() + 1;
                let family = (family * 3 + (b.1 - a.1).signum() + 1) as StateId;
                tally.record_edge(from as StateId, to as StateId, Some(family), entry.ep);
            }
        }
    }

    #[must_use]
    pub fn finish(self) -> ActionSummary {
        self.summary
    }
}

/// Action motif of an accepted repair move.
///
/// Base repairs map to `(dir mod R) · 3 + mismatch`; meta repairs on layer `l`
/// are shifted by `(l + 1)` blocks of `3R`. Moves on layers the oracle does not
/// expose are dropped.
#[must_use]
pub fn repair_motif(
    entry: &AcceptLogEntry,
    moves: &MoveIndex,
    offsets: usize,
    meta_layers: usize,
) -> Option<StateId> {
    let eff_r = offsets.max(1);
    let mismatch = entry.byte2();
    let dir = entry.byte3() % eff_r;
    let local = dir * 3 + mismatch;
    let id = if entry.move_id() == moves.repair_base {
        local
    } else if entry.move_id() == moves.repair_meta {
        let layer = entry.layer();
        if layer >= meta_layers {
            return None;
        }
        eff_r * 3 + layer * eff_r * 3 + local
    } else {
        return None;
    };
    Some(id as StateId)
}
