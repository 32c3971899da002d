use repairlab_core::{EventTracker, GateMode, HarnessConfig, RunResult};
use repairlab_oracle::{LatticeConfig, LatticeOracle};
use repairlab_report::{
    AggregateConfig, ConditionRuns, JsonLinesSink, Metric, ReportSink, aggregate,
};
use std::fs;

fn harness_config(seed: u64) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.run.seed = seed;
    config.run.steps = 100_000;
    config.run.burn_in = 0;
    config.run.report_every = 1_000;
    config.event.event_every = 40_000;
    config.event.deadline = 20_000;
    config.event.sdiff_good = 0.005;
    config.event.tail_window = 40_000;
    config.gate.mode = GateMode::Always;
    config.gate.check_every = 1_000;
    config
}

fn run_condition(name: &str, repair: bool) -> ConditionRuns {
    let runs: Vec<RunResult> = (1..=3)
        .map(|seed| {
            let lattice = LatticeConfig {
                repair,
                ..LatticeConfig::default()
            };
            let oracle = LatticeOracle::new(lattice, seed).expect("oracle");
            EventTracker::new(harness_config(seed), oracle)
                .expect("tracker")
                .run()
                .expect("run")
        })
        .collect();
    ConditionRuns::new(name, runs)
}

#[test]
fn repair_condition_beats_disabled_repair() {
    let repair = run_condition("repair", true);
    let frozen = run_condition("frozen", false);
    let report = aggregate(&[repair, frozen], &AggregateConfig { resamples: 400 });

    let on = report.condition("repair").expect("repair summary");
    let off = report.condition("frozen").expect("frozen summary");
    assert_eq!(on.runs, 3);
    assert_eq!(on.success_count, 3);
    assert_eq!(off.success_count, 0);
    assert_eq!(off.metric(Metric::MissFrac).expect("miss").mean, 1.0);
    assert_eq!(off.metric(Metric::RecoveryMean).expect("recovery").n, 0);

    let miss = report
        .diff(Metric::MissFrac, "repair", "frozen")
        .expect("miss diff");
    assert!(miss.estimate.point_estimate < 0.0);
    assert!(miss.estimate.excludes_zero());
    assert_eq!(report.cross_jsd.len(), 1);
    assert!(report.cross_jsd[0].jsd >= 0.0);
}

#[test]
fn json_lines_sink_writes_runs_then_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.jsonl");
    let condition = run_condition("repair", true);
    let report = aggregate(
        std::slice::from_ref(&condition),
        &AggregateConfig { resamples: 200 },
    );

    {
        let mut sink = JsonLinesSink::create(&path).expect("sink");
        for run in &condition.runs {
            sink.write_run(&condition.name, run).expect("run line");
        }
        sink.write_report(&report).expect("report line");
        sink.flush().expect("flush");
    }

    let text = fs::read_to_string(&path).expect("read back");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[..3].iter().all(|l| l["kind"] == "run"));
    assert_eq!(lines[0]["summary"]["seed"], 1);
    assert_eq!(lines[0]["events"].as_array().expect("events").len(), 2);
    assert_eq!(lines[3]["kind"], "report");
    assert_eq!(lines[3]["conditions"][0]["name"], "repair");
}
