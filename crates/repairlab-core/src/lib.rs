//! Core types shared across the repairlab workspace: configuration, the oracle
//! contract, region masks, gate conditioning, motif classification and the
//! hazard event tracker.

pub mod actions;
pub mod calibrate;
pub mod config;
pub mod error;
pub mod event;
pub mod fidelity;
pub mod gate;
pub mod motif;
pub mod oracle;
pub mod overrides;
pub mod region;
pub mod scope;
pub mod summary;
pub mod tracker;
pub mod window;

pub use actions::{ActionRecorder, ActionSummary, ActionTally, repair_motif};
pub use calibrate::{GateGapReport, calibrate_gate_gaps};
pub use config::{
    ActionMode, AxisThreshold, EventConfig, GateConfig, GateMode, HarnessConfig, MotifConfig,
    OpBinsMode, PerturbMode, RegionConfig, RegionKind, RunConfig,
};
pub use error::{ConfigError, HarnessError};
pub use event::{EventOutcome, EventSnapshot, HazardEvent, schedule};
pub use gate::HazardGate;
pub use motif::{
    BASE_ALPHABET, ChangeStats, MotifClassifier, MotifFamily, MotifFrame, OperatorEncoding,
    operator_alphabet,
};
pub use oracle::{
    AcceptLog, AcceptLogEntry, EpSnapshot, LABEL_CLOCK, LABEL_OPERATOR, LABEL_REPAIR_BASE,
    LABEL_REPAIR_META, MoveCounts, MoveIndex, Oracle, PerturbRegion, PerturbSpec,
};
pub use overrides::{Override, apply_overrides, apply_patch};
pub use region::{MaskPair, RegionMask, hazard_mask, matched_outside_mask};
pub use scope::{FamilyMap, MaskKind, Scope, ScopeMap};
pub use summary::{ReportRecord, RunResult, RunSummary, SparseMarker, VocabSummary};
pub use tracker::EventTracker;
pub use window::{EdgeEp, EpDelta, SampleWindow, WindowKind, WindowSpec};

/// Number of distinct motifs for both families under `mode`: `(base, operator)`.
#[must_use]
pub const fn motif_alphabet_size(mode: OpBinsMode) -> (u32, u32) {
    (BASE_ALPHABET, operator_alphabet(mode))
}
