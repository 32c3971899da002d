//! Typed harness configuration grouped into cohesive value objects.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Top-level configuration consumed by [`crate::EventTracker`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HarnessConfig {
    pub run: RunConfig,
    pub region: RegionConfig,
    pub event: EventConfig,
    pub gate: GateConfig,
    pub motif: MotifConfig,
}

impl HarnessConfig {
    /// Check every section and the cross-section constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        self.region.validate()?;
        self.event.validate()?;
        self.gate.validate()?;
        self.motif.validate()?;
        if self.event.event_every + self.event.deadline > self.run.steps {
            return Err(ConfigError::Invalid(
                "run.steps must leave room for at least one full event deadline",
            ));
        }
        if self.region.kind == RegionKind::Stripe && self.region.bins != self.gate.clock_k as usize
        {
            tracing::debug!(
                bins = self.region.bins,
                clock_k = self.gate.clock_k,
                "stripe bins differ from gate clock width"
            );
        }
        Ok(())
    }

    /// Width of the pre-event window: the configured value or `min(50_000, deadline)`.
    #[must_use]
    pub fn pre_window(&self) -> u64 {
        self.event
            .pre_window
            .unwrap_or_else(|| self.event.deadline.min(DEFAULT_PRE_WINDOW_CAP))
    }

    /// Seed of the matched outside mask for this run.
    #[must_use]
    pub fn outside_seed(&self) -> u32 {
        self.run.seed.wrapping_add(self.motif.outside_seed_offset) as u32
    }

    /// Per-event perturbation seed, `seed * 1000 + t_event`.
    #[must_use]
    pub fn perturb_seed(&self, t_event: u64) -> u64 {
        self.run.seed.wrapping_mul(1000).wrapping_add(t_event)
    }
}

const DEFAULT_PRE_WINDOW_CAP: u64 = 50_000;

/// Run length, cadence and seed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    /// Harness steps after burn-in.
    pub steps: u64,
    /// Oracle steps taken before the harness clock starts.
    pub burn_in: u64,
    /// Cadence of goodness evaluation.
    pub report_every: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            steps: 2_000_000,
            burn_in: 200_000,
            report_every: 5_000,
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.steps == 0 {
            return Err(ConfigError::Invalid("run.steps must be positive"));
        }
        if self.report_every == 0 {
            return Err(ConfigError::Invalid("run.report_every must be positive"));
        }
        Ok(())
    }
}

/// Shape used to carve the hazard region out of the grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    #[default]
    Quadrant,
    Stripe,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegionConfig {
    pub kind: RegionKind,
    /// Quadrant index (0..4) or first stripe bin.
    pub index: usize,
    /// Number of consecutive stripe bins; also the gate's circular tolerance.
    pub span: usize,
    /// Number of stripe bins across the grid width.
    pub bins: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            kind: RegionKind::Quadrant,
            index: 2,
            span: 1,
            bins: 8,
        }
    }
}

impl RegionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            RegionKind::Quadrant if self.index >= 4 => {
                Err(ConfigError::Invalid("region.index must be below 4 for quadrants"))
            }
            RegionKind::Stripe if self.bins == 0 => {
                Err(ConfigError::Invalid("region.bins must be positive"))
            }
            RegionKind::Stripe if self.index >= self.bins => {
                Err(ConfigError::Invalid("region.index must be below region.bins"))
            }
            _ => Ok(()),
        }
    }
}

/// How corrupted cells are rewritten.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PerturbMode {
    /// Replace the value with a different random level.
    #[default]
    Randomize,
    /// Set the value to zero.
    Zero,
}

/// Hazard schedule and goodness thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventConfig {
    pub event_every: u64,
    pub deadline: u64,
    pub corrupt_frac: f64,
    pub perturb_mode: PerturbMode,
    /// Field layer the perturbation targets.
    pub target_layer: usize,
    /// Maximum adjusted bit-error rate for a good report tick.
    pub err_good: f64,
    /// Maximum mean absolute difference for a good report tick.
    pub sdiff_good: f64,
    pub tail_window: u64,
    /// Defaults to `min(50_000, deadline)` when unset.
    pub pre_window: Option<u64>,
    /// Subtract the pre-event error floor from the bit-error rate.
    pub subtract_error_floor: bool,
    /// Fraction of the deadline after an event excluded from tail uptime.
    pub grace_frac: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            event_every: 50_000,
            deadline: 25_000,
            corrupt_frac: 0.2,
            perturb_mode: PerturbMode::Randomize,
            target_layer: 0,
            err_good: 0.1,
            sdiff_good: 1.0,
            tail_window: 200_000,
            pre_window: None,
            subtract_error_floor: true,
            grace_frac: 0.2,
        }
    }
}

impl EventConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.event_every == 0 {
            return Err(ConfigError::Invalid("event.event_every must be positive"));
        }
        if self.deadline == 0 {
            return Err(ConfigError::Invalid("event.deadline must be positive"));
        }
        if !(0.0..=1.0).contains(&self.corrupt_frac) {
            return Err(ConfigError::Invalid("event.corrupt_frac must be within [0, 1]"));
        }
        if !(self.err_good.is_finite() && self.sdiff_good.is_finite()) {
            return Err(ConfigError::Invalid("goodness thresholds must be finite"));
        }
        if !(0.0..=1.0).contains(&self.grace_frac) {
            return Err(ConfigError::Invalid("event.grace_frac must be within [0, 1]"));
        }
        Ok(())
    }

    /// Report ticks this soon after an event are excluded from tail uptime.
    #[must_use]
    pub fn grace_window(&self) -> u64 {
        (self.grace_frac * self.deadline as f64).floor() as u64
    }
}

/// Which clock test decides whether the hazard region is observable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Always open.
    Always,
    /// Rotating clock of width `clock_k`.
    #[default]
    Clock,
    /// Rotating clock of fixed width 4.
    Quadrant4,
}

impl GateMode {
    /// Numeric mode code used in reports (0, 1, 2).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Always => 0,
            Self::Clock => 1,
            Self::Quadrant4 => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    pub mode: GateMode,
    /// When false every sample is treated as gate-open.
    pub conditioned: bool,
    /// Sampling cadence for motif statistics.
    pub check_every: u64,
    pub clock_k: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::Clock,
            conditioned: true,
            check_every: 5_000,
            clock_k: 8,
        }
    }
}

impl GateConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.check_every == 0 {
            return Err(ConfigError::Invalid("gate.check_every must be positive"));
        }
        if self.clock_k == 0 {
            return Err(ConfigError::Invalid("gate.clock_k must be positive"));
        }
        Ok(())
    }
}

/// Operator-motif encoding (`opBinsMode` 0/1/2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpBinsMode {
    /// Mismatch digit plus five ternary axis-mass bins (729 classes).
    Axis,
    /// Mismatch digit plus argmax of the 9-direction histogram (27 classes).
    Direction,
    /// Mismatch, argmax direction and normalized entropy bin (81 classes).
    #[default]
    DirectionEntropy,
}

impl OpBinsMode {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Axis => 0,
            Self::Direction => 1,
            Self::DirectionEntropy => 2,
        }
    }
}

impl TryFrom<u8> for OpBinsMode {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Axis),
            1 => Ok(Self::Direction),
            2 => Ok(Self::DirectionEntropy),
            _ => Err(ConfigError::Invalid("op_bins mode must be 0, 1 or 2")),
        }
    }
}

/// Thresholding policy applied to axis masses in [`OpBinsMode::Axis`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AxisThreshold {
    /// `mass / budget` split at 1/6 and 2/6.
    #[default]
    BudgetSixths,
    /// Raw token counts split at 0 and 3.
    RawTokens,
    /// `mass / budget` split at 0.08 and 0.16.
    BudgetFine,
}

/// Optional accept-log driven action statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    #[default]
    Off,
    /// Motifs of accepted repair moves.
    RepairActions,
    /// Offset edges of accepted operator token moves.
    OperatorEdges,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MotifConfig {
    pub op_bins: OpBinsMode,
    pub axis_threshold: AxisThreshold,
    /// Classes folded into the top-mass concentration statistic.
    pub top_n: usize,
    pub action_mode: ActionMode,
    /// Oracle steps between accept-log drains.
    pub chunk_steps: u64,
    pub accept_log_capacity: usize,
    /// Added to the run seed to seed the matched outside mask.
    pub outside_seed_offset: u64,
}

impl Default for MotifConfig {
    fn default() -> Self {
        Self {
            op_bins: OpBinsMode::DirectionEntropy,
            axis_threshold: AxisThreshold::BudgetSixths,
            top_n: 10,
            action_mode: ActionMode::Off,
            chunk_steps: 10_000,
            accept_log_capacity: 200_000,
            outside_seed_offset: 999,
        }
    }
}

impl MotifConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::Invalid("motif.top_n must be positive"));
        }
        if self.chunk_steps == 0 {
            return Err(ConfigError::Invalid("motif.chunk_steps must be positive"));
        }
        if self.action_mode != ActionMode::Off && self.accept_log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "motif.accept_log_capacity must be positive when actions are recorded",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        HarnessConfig::default().validate().expect("defaults");
        assert_eq!(HarnessConfig::default().pre_window(), 25_000);
        assert_eq!(EventConfig::default().grace_window(), 5_000);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: HarnessConfig =
            serde_json::from_str(r#"{"event":{"deadline":60000},"motif":{"op_bins":"axis"}}"#)
                .expect("config");
        assert_eq!(config.event.deadline, 60_000);
        assert_eq!(config.event.event_every, 50_000);
        assert_eq!(config.motif.op_bins, OpBinsMode::Axis);
        assert_eq!(config.pre_window(), 50_000);
    }

    #[test]
    fn out_of_range_quadrant_is_rejected() {
        let mut config = HarnessConfig::default();
        config.region.index = 4;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn run_must_fit_one_event() {
        let mut config = HarnessConfig::default();
        config.run.steps = 60_000;
        assert!(config.validate().is_err());
        config.run.steps = 75_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn seeds_follow_run_seed() {
        let mut config = HarnessConfig::default();
        config.run.seed = 7;
        assert_eq!(config.outside_seed(), 1006);
        assert_eq!(config.perturb_seed(50_000), 57_000);
    }

    #[test]
    fn op_bins_codes_round_trip() {
        for code in 0..3u8 {
            assert_eq!(OpBinsMode::try_from(code).expect("mode").code(), code);
        }
        assert!(OpBinsMode::try_from(3).is_err());
    }
}
