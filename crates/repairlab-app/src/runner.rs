//! Parallel execution of seeds and conditions.
//!
//! Every (condition, seed) pair owns its oracle and tracker, so runs share no
//! state and are farmed out to the rayon pool as independent jobs.

use crate::preset::ResolvedCondition;
use anyhow::{Context, Result};
use rayon::prelude::*;
use repairlab_core::{
    EventTracker, GateGapReport, HarnessConfig, HazardGate, RunResult, calibrate_gate_gaps,
};
use repairlab_oracle::{LatticeConfig, LatticeOracle};
use repairlab_report::{ConditionRuns, ReportSink};
use tracing::info;

/// Run one seed of one condition.
pub fn run_seed(harness: &HarnessConfig, oracle: &LatticeConfig, seed: u64) -> Result<RunResult> {
    let mut config = harness.clone();
    config.run.seed = seed;
    let lattice = LatticeOracle::new(oracle.clone(), seed)
        .with_context(|| format!("seed {seed}: failed to build oracle"))?;
    let mut tracker =
        EventTracker::new(config, lattice).with_context(|| format!("seed {seed}: invalid run"))?;
    tracker
        .run()
        .with_context(|| format!("seed {seed}: run aborted"))
}

/// Run every seed of `condition` in parallel; results come back in seed order.
pub fn run_condition(condition: &ResolvedCondition, seeds: &[u64]) -> Result<ConditionRuns> {
    info!(condition = %condition.name, seeds = seeds.len(), "running condition");
    let runs = seeds
        .par_iter()
        .map(|&seed| run_seed(&condition.harness, &condition.oracle, seed))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("condition '{}' failed", condition.name))?;
    Ok(ConditionRuns::new(condition.name.clone(), runs))
}

/// Run all conditions, streaming each finished run to `sink` in (condition, seed) order.
pub fn run_all(
    conditions: &[ResolvedCondition],
    seeds: &[u64],
    sink: &mut dyn ReportSink,
) -> Result<Vec<ConditionRuns>> {
    let mut all = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let runs = run_condition(condition, seeds)?;
        for run in &runs.runs {
            sink.write_run(&runs.name, run)
                .context("failed to write run record")?;
        }
        all.push(runs);
    }
    Ok(all)
}

/// Measure gate-open gaps on a fresh oracle for `condition`.
pub fn calibrate(
    condition: &ResolvedCondition,
    seed: u64,
    steps: u64,
    every: u64,
) -> Result<GateGapReport> {
    let mut oracle = LatticeOracle::new(condition.oracle.clone(), seed)
        .context("failed to build oracle for calibration")?;
    let harness = &condition.harness;
    let gate = HazardGate::new(&harness.gate, harness.region.index, harness.region.span);
    Ok(calibrate_gate_gaps(&mut oracle, &gate, steps, every))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repairlab_core::GateMode;

    fn condition(repair: bool) -> ResolvedCondition {
        let mut harness = HarnessConfig::default();
        harness.run.steps = 60_000;
        harness.run.burn_in = 0;
        harness.run.report_every = 1_000;
        harness.event.event_every = 30_000;
        harness.event.deadline = 15_000;
        harness.event.sdiff_good = 0.005;
        harness.gate.mode = GateMode::Always;
        harness.gate.check_every = 1_000;
        ResolvedCondition {
            name: if repair { "repair" } else { "frozen" }.to_string(),
            harness,
            oracle: LatticeConfig {
                repair,
                ..LatticeConfig::default()
            },
        }
    }

    #[test]
    fn seeds_come_back_sorted_and_reproducible() {
        let runs = run_condition(&condition(true), &[5, 2, 9]).expect("runs");
        let seeds: Vec<u64> = runs.runs.iter().map(|r| r.summary.seed).collect();
        assert_eq!(seeds, vec![2, 5, 9]);
        let again = run_seed(&condition(true).harness, &condition(true).oracle, 5).expect("run");
        assert_eq!(runs.runs[1], again);
    }

    #[test]
    fn invalid_run_reports_the_seed() {
        let mut bad = condition(true);
        bad.harness.event.target_layer = 9;
        let err = run_condition(&bad, &[4]).expect_err("invalid");
        assert!(format!("{err:#}").contains("seed 4"));
    }

    #[test]
    fn calibration_uses_the_condition_gate() {
        let mut gated = condition(true);
        gated.harness.gate.mode = GateMode::Clock;
        let report = calibrate(&gated, 1, 32_000, 1_000).expect("calibrate");
        assert_eq!(report.checks, 32);
        assert!(report.open < report.checks);
    }
}
