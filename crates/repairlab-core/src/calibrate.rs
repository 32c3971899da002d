//! Gate-gap calibration: how long the hazard gate stays closed in practice.

use crate::gate::HazardGate;
use crate::oracle::Oracle;
use repairlab_stats::percentile;
use serde::{Deserialize, Serialize};

/// Multiplier applied to the p95 gap when recommending a deadline.
pub const DEADLINE_SCALE: f64 = 1.2;

/// Distribution of steps between consecutive gate-open report instants.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GateGapReport {
    pub checks: u64,
    pub open: u64,
    pub gaps: Vec<u64>,
    pub p50: Option<u64>,
    pub p95: Option<u64>,
    pub max: Option<u64>,
    /// `ceil(1.2 · p95)`, the shortest deadline that usually spans a closed gate.
    pub recommended_deadline: u64,
}

/// Step `oracle` for `steps` in increments of `every` and record the gaps
/// between instants at which `gate` reports the hazard region active.
pub fn calibrate_gate_gaps<O: Oracle + ?Sized>(
    oracle: &mut O,
    gate: &HazardGate,
    steps: u64,
    every: u64,
) -> GateGapReport {
    let mut report = GateGapReport::default();
    if every == 0 {
        return report;
    }
    let mut last_open: Option<u64> = None;
    let mut t = every;
    while t <= steps {
        oracle.step(every);
        report.checks += 1;
        if gate.region_active(oracle.clock_state()) {
            report.open += 1;
            if let Some(prev) = last_open {
                report.gaps.push(t - prev);
            }
            last_open = Some(t);
        }
        t += every;
    }

    let gaps: Vec<f64> = report.gaps.iter().map(|&g| g as f64).collect();
    if !gaps.is_empty() {
        report.p50 = Some(percentile(&gaps, 0.5) as u64);
        report.p95 = Some(percentile(&gaps, 0.95) as u64);
        report.max = report.gaps.iter().copied().max();
    }
    report.recommended_deadline = (DEADLINE_SCALE * report.p95.unwrap_or(0) as f64).ceil() as u64;
    tracing::debug!(
        checks = report.checks,
        open = report.open,
        p95 = report.p95,
        recommended_deadline = report.recommended_deadline,
        "gate gaps calibrated"
    );
    report
}
