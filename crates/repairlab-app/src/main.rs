use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use repairlab_app::{Preset, ResolvedCondition, calibrate, run_all};
use repairlab_core::Override;
use repairlab_report::{JsonLinesSink, MemorySink, ReportSink, aggregate};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "repairlab",
    version,
    about = "Run hazard-recovery experiments against the lattice oracle"
)]
struct Cli {
    /// JSON preset with base configs, seeds and conditions.
    #[arg(long, short, env = "REPAIRLAB_PRESET")]
    preset: Option<PathBuf>,

    /// Typed override, e.g. `event.deadline=25000` or `oracle.repair=false`.
    #[arg(long = "set", value_name = "PATH=VALUE")]
    overrides: Vec<Override>,

    /// Comma-separated seeds replacing the preset's seed list.
    #[arg(long, value_delimiter = ',')]
    seeds: Vec<u64>,

    /// Worker threads used for parallel seeds.
    #[arg(long, env = "REPAIRLAB_THREADS")]
    threads: Option<usize>,

    /// Write run and report records as JSON lines to this file.
    #[arg(long, short)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one condition over every seed and print per-run summaries.
    Run {
        /// Condition name; defaults to the first condition of the preset.
        #[arg(long)]
        condition: Option<String>,
    },
    /// Run every condition, aggregate across seeds and compare conditions pairwise.
    Compare,
    /// Measure gaps between gate-open instants and recommend a deadline.
    CalibrateGate {
        #[arg(long)]
        condition: Option<String>,
        #[arg(long, default_value_t = 1_000_000)]
        steps: u64,
        #[arg(long, default_value_t = 5_000)]
        every: u64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Print the resolved configuration of every condition as JSON.
    ShowConfig,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    let mut preset = match &cli.preset {
        Some(path) => Preset::load(path)?,
        None => Preset::default(),
    };
    preset = preset.with_overrides(&cli.overrides)?;
    if !cli.seeds.is_empty() {
        preset.seeds = cli.seeds.clone();
    }
    let conditions = preset.resolve()?;
    let seeds = preset.seed_list();
    let mut sink = open_sink(cli.out.as_deref())?;

    match cli.command {
        Command::Run { condition } => {
            let selected = select(&conditions, condition.as_deref())?;
            let runs = run_all(std::slice::from_ref(selected), &seeds, sink.as_mut())?;
            for run in runs.iter().flat_map(|c| &c.runs) {
                let s = &run.summary;
                println!(
                    "seed {:>4} | events {:>3} | missed {:>3} | uptimeTail {:.3} | errTail {:.4} | recovery {} | {}",
                    s.seed,
                    s.events,
                    s.missed,
                    s.uptime_tail,
                    s.err_tail_mean,
                    s.recovery_mean
                        .map_or_else(|| "-".to_string(), |r| format!("{r:.0}")),
                    if s.is_success() { "ok" } else { "fail" }
                );
            }
        }
        Command::Compare => {
            let runs = run_all(&conditions, &seeds, sink.as_mut())?;
            let report = aggregate(&runs, &preset.aggregate);
            print!("{report}");
            sink.write_report(&report)
                .context("failed to write aggregate report")?;
        }
        Command::CalibrateGate {
            condition,
            steps,
            every,
            seed,
        } => {
            let selected = select(&conditions, condition.as_deref())?;
            let report = calibrate(selected, seed, steps, every)?;
            info!(
                condition = %selected.name,
                open = report.open,
                recommended_deadline = report.recommended_deadline,
                "gate calibration finished"
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to format calibration")?
            );
        }
        Command::ShowConfig => {
            let resolved: Vec<_> = conditions
                .iter()
                .map(|c| json!({"name": c.name, "harness": c.harness, "oracle": c.oracle}))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "seeds": seeds, "conditions": resolved }))
                    .context("failed to format configuration JSON")?
            );
        }
    }

    sink.flush().context("failed to flush report sink")?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn open_sink(out: Option<&Path>) -> Result<Box<dyn ReportSink>> {
    Ok(match out {
        Some(path) => Box::new(
            JsonLinesSink::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(MemorySink::default()),
    })
}

fn select<'a>(
    conditions: &'a [ResolvedCondition],
    name: Option<&str>,
) -> Result<&'a ResolvedCondition> {
    let found = match name {
        Some(name) => conditions.iter().find(|c| c.name == name),
        None => conditions.first(),
    };
    match found {
        Some(condition) => Ok(condition),
        None => bail!(
            "unknown condition '{}'; available: {}",
            name.unwrap_or_default(),
            conditions
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
