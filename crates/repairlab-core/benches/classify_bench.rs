use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use repairlab_core::{
    EventTracker, GateMode, HarnessConfig, MotifClassifier, MotifConfig, OpBinsMode, Oracle,
};
use repairlab_oracle::{LatticeConfig, LatticeOracle, Stencil};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    group.sample_size(env_or("RL_BENCH_SAMPLES", 30usize).max(10));
    group.warm_up_time(Duration::from_secs(env_or("RL_BENCH_WARMUP_SECS", 2)));
    group.measurement_time(Duration::from_secs(env_or("RL_BENCH_MEASURE_SECS", 5)));

    for grid in [16usize, 32, 64] {
        let lattice = LatticeConfig {
            grid_size: grid,
            meta_layers: 3,
            stencil: Stencil::Full,
            ..LatticeConfig::default()
        };
        let mut oracle = LatticeOracle::new(lattice, 0xBEEF).expect("oracle");
        oracle.step(10_000);
        for mode in [OpBinsMode::Axis, OpBinsMode::Direction, OpBinsMode::DirectionEntropy] {
            let config = MotifConfig {
                op_bins: mode,
                ..MotifConfig::default()
            };
            let classifier = MotifClassifier::for_oracle(&config, &oracle);
            group.bench_function(format!("grid{grid}_mode{}", mode.code()), |b| {
                b.iter(|| classifier.classify(&oracle).expect("frame"));
            });
        }
    }
    group.finish();
}

fn bench_tracker_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_run");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(env_or("RL_BENCH_MEASURE_SECS", 10)));
    let steps: u64 = env_or("RL_BENCH_STEPS", 100_000);

    group.bench_function(format!("steps{steps}"), |b| {
        b.iter_batched(
            || {
                let mut config = HarnessConfig::default();
                config.run.steps = steps;
                config.run.burn_in = 0;
                config.run.report_every = 1_000;
                config.event.event_every = steps / 4;
                config.event.deadline = steps / 8;
                config.gate.mode = GateMode::Always;
                config.gate.check_every = 1_000;
                let oracle = LatticeOracle::new(LatticeConfig::default(), 7).expect("oracle");
                EventTracker::new(config, oracle).expect("tracker")
            },
            |mut tracker| tracker.run().expect("run"),
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_classify, bench_tracker_run);
criterion_main!(benches);
