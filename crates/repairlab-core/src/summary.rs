//! Finished per-run outputs: summary metrics, report ticks and sparse-signal markers.

use crate::actions::ActionSummary;
use crate::event::HazardEvent;
use crate::scope::{FamilyMap, ScopeMap};
use crate::window::EdgeEp;
use repairlab_stats::{CountMap, SummaryStat, TransitionTable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this many gate-open samples the motif statistics are not trusted.
pub const MIN_GATE_SAMPLES: u64 = 10;
/// Below this many distinct hazard operator motifs the encoding is considered collapsed.
pub const MIN_OPERATOR_MOTIFS: usize = 10;

/// One goodness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub t: u64,
    /// Bit-error rate after error-floor adjustment.
    pub err: f64,
    pub sdiff: f64,
    pub good: bool,
    /// Steps since the most recent event, `None` before the first one.
    pub since_event: Option<u64>,
}

/// Low-confidence condition surfaced alongside a run instead of failing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "marker", rename_all = "snake_case")]
pub enum SparseMarker {
    TooSparseGateSamples { count: u64 },
    RecoveryWindowUnobserved,
    OperatorMotifCollapsed { unique: usize },
}

impl SparseMarker {
    /// Stable name used in aggregate tables.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TooSparseGateSamples { .. } => "too_sparse_gate_samples",
            Self::RecoveryWindowUnobserved => "recovery_window_unobserved",
            Self::OperatorMotifCollapsed { .. } => "operator_motif_collapsed",
        }
    }

    /// Markers raised by a finished run.
    #[must_use]
    pub fn detect(
        gate_samples: u64,
        events: usize,
        recovery_samples_mean: f64,
        unique_operator_hazard: usize,
    ) -> Vec<Self> {
        let mut markers = Vec::new();
        if gate_samples < MIN_GATE_SAMPLES {
            markers.push(Self::TooSparseGateSamples {
                count: gate_samples,
            });
        }
        if events > 0 && recovery_samples_mean == 0.0 {
            markers.push(Self::RecoveryWindowUnobserved);
        }
        if unique_operator_hazard < MIN_OPERATOR_MOTIFS {
            markers.push(Self::OperatorMotifCollapsed {
                unique: unique_operator_hazard,
            });
        }
        markers
    }
}

impl fmt::Display for SparseMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSparseGateSamples { count } => {
                write!(f, "only {count} gate-open samples")
            }
            Self::RecoveryWindowUnobserved => f.write_str("no samples inside recovery windows"),
            Self::OperatorMotifCollapsed { unique } => {
                write!(f, "only {unique} distinct hazard operator motifs")
            }
        }
    }
}

/// Per-step rates of entropy production since the harness origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpRates {
    pub total: f64,
    pub repair: f64,
    pub operator: f64,
    pub clock: f64,
    pub other: f64,
}

/// Per-step rates of accepted moves since the harness origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveRates {
    pub repair: f64,
    pub operator: f64,
    pub clock: f64,
    pub total: f64,
}

/// Mean/std of the per-sample vocabulary statistics of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VocabSummary {
    pub entropy: SummaryStat,
    pub effective_vocab: SummaryStat,
    pub top_mass: SummaryStat,
    pub change_frac: SummaryStat,
}

/// Scalar outcome of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub steps: u64,
    pub op_bins: u8,
    pub base_alphabet: u32,
    pub operator_alphabet: u32,

    pub events: usize,
    pub missed: usize,
    pub miss_frac: f64,
    pub recovery_mean: Option<f64>,
    pub recovery_p95: Option<f64>,
    pub recovery_max: Option<u64>,

    pub uptime: f64,
    pub uptime_tail: f64,
    pub err_tail_mean: f64,
    pub sdiff_tail_mean: f64,
    pub err_p95: f64,
    pub err_end: f64,
    pub sdiff_end: f64,
    pub error_floor: Option<f64>,

    pub ep_rates: EpRates,
    pub move_rates: MoveRates,

    pub gate_samples: u64,
    pub recovery_samples_mean: f64,
    pub vocab: ScopeMap<VocabSummary>,
    pub unique: ScopeMap<usize>,
    /// Run-level hazard symmetry gap per family.
    pub symmetry_gap: FamilyMap<f64>,
    /// Run-level smoothed coarse EP of hazard transitions per family.
    pub coarse_ep: FamilyMap<f64>,
    pub ep_per_change: FamilyMap<SummaryStat>,
    /// Hazard vocabulary entropy per interface, shallowest first.
    pub depth_entropy: FamilyMap<Vec<f64>>,

    pub markers: Vec<SparseMarker>,
}

impl RunSummary {
    /// Whether the run clears the success bar used in aggregate tables.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.miss_frac <= 0.2 && self.uptime_tail >= 0.8 && self.err_tail_mean <= 0.05
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub summary: RunSummary,
    pub events: Vec<HazardEvent>,
    /// Run-pooled motif occupancy per scope.
    pub counts: ScopeMap<CountMap>,
    /// Run-pooled motif transitions per scope.
    pub transitions: ScopeMap<TransitionTable>,
    pub edge_ep: FamilyMap<EdgeEp>,
    pub actions: Option<ActionSummary>,
    pub reports: Vec<ReportRecord>,
}

impl RunResult {
    /// Recovery-window hazard operator counts pooled over events with the given outcome.
    #[must_use]
    pub fn recovery_counts(&self, missed: bool) -> CountMap {
        let mut pooled = CountMap::new();
        for event in self
            .events
            .iter()
            .filter(|e| e.outcome.is_missed() == missed)
        {
            pooled.merge(&event.windows.recovery.scopes.operator_hazard.counts);
        }
        pooled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_flag_sparse_runs() {
        let markers = SparseMarker::detect(3, 4, 0.0, 2);
        assert_eq!(
            markers,
            vec![
                SparseMarker::TooSparseGateSamples { count: 3 },
                SparseMarker::RecoveryWindowUnobserved,
                SparseMarker::OperatorMotifCollapsed { unique: 2 },
            ]
        );
        assert!(SparseMarker::detect(100, 4, 2.5, 40).is_empty());
        assert_eq!(markers[2].to_string(), "only 2 distinct hazard operator motifs");
    }

    #[test]
    fn success_needs_every_criterion() {
        let mut summary = RunSummary {
            miss_frac: 0.1,
            uptime_tail: 0.9,
            err_tail_mean: 0.01,
            ..RunSummary::default()
        };
        assert!(summary.is_success());
        summary.uptime_tail = 0.5;
        assert!(!summary.is_success());
    }

    #[test]
    fn markers_serialize_tagged() {
        let json = serde_json::to_value(SparseMarker::OperatorMotifCollapsed { unique: 3 })
            .expect("json");
        assert_eq!(json["marker"], "operator_motif_collapsed");
        assert_eq!(json["unique"], 3);
    }
}
