use repairlab_app::{Preset, run_all};
use repairlab_core::Override;
use repairlab_report::{AggregateConfig, MemorySink, Metric, aggregate};
use std::fs;
use std::path::Path;

const SMALL_PRESET: &str = r#"{
    "harness": {
        "run": {"steps": 90000, "burn_in": 0, "report_every": 1000},
        "event": {"event_every": 30000, "deadline": 15000, "sdiff_good": 0.005, "tail_window": 20000},
        "gate": {"mode": "always", "check_every": 1000}
    },
    "seeds": [2, 1],
    "conditions": [
        {"name": "repair"},
        {"name": "frozen", "oracle": {"repair": false}}
    ],
    "aggregate": {"resamples": 300}
}"#;

#[test]
fn preset_file_drives_a_full_comparison() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("small.json");
    fs::write(&path, SMALL_PRESET).expect("write preset");

    let preset = Preset::load(&path).expect("load");
    let conditions = preset.resolve().expect("resolve");
    let seeds = preset.seed_list();
    let mut sink = MemorySink::default();
    let runs = run_all(&conditions, &seeds, &mut sink).expect("runs");

    assert_eq!(sink.runs.len(), 4);
    assert_eq!(sink.runs[0].0, "repair");
    assert_eq!(sink.runs[0].1.seed, 1);
    assert_eq!(sink.runs[3].0, "frozen");

    let report = aggregate(&runs, &preset.aggregate);
    let repair = report.condition("repair").expect("repair");
    let frozen = report.condition("frozen").expect("frozen");
    assert_eq!(repair.success_count, 2);
    assert_eq!(frozen.success_count, 0);
    assert_eq!(frozen.metric(Metric::MissFrac).expect("miss").mean, 1.0);
    assert!(report.to_string().contains("frozen"));
}

#[test]
fn command_line_overrides_beat_the_preset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("small.json");
    fs::write(&path, SMALL_PRESET).expect("write preset");

    let overrides = [
        Override::parse("event.deadline=20000").expect("override"),
        Override::parse("oracle.repair=false").expect("override"),
    ];
    let preset = Preset::load(&path)
        .expect("load")
        .with_overrides(&overrides)
        .expect("overrides");
    let conditions = preset.resolve().expect("resolve");
    assert!(conditions.iter().all(|c| c.harness.event.deadline == 20_000));
    assert!(conditions.iter().all(|c| !c.oracle.repair));
    assert_eq!(preset.aggregate, AggregateConfig { resamples: 300 });
}

#[test]
fn missing_and_malformed_presets_fail_with_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = Preset::load(dir.path().join("absent.json")).expect_err("missing");
    assert!(format!("{missing:#}").contains("absent.json"));

    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"oracle": {"grid_size": "wide"}}"#).expect("write");
    let bad = Preset::load(&path).expect_err("malformed");
    assert!(format!("{bad:#}").contains("oracle.grid_size"));
}

#[test]
fn shipped_presets_resolve() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("presets");
    let mut count = 0;
    for entry in fs::read_dir(&dir).expect("presets dir") {
        let path = entry.expect("entry").path();
        if path.extension().is_some_and(|e| e == "json") {
            let preset = Preset::load(&path).expect("load shipped preset");
            assert!(!preset.resolve().expect("resolve").is_empty());
            count += 1;
        }
    }
    assert!(count > 0);
}
