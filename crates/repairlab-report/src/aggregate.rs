//! Cross-seed aggregation: per-condition summaries, bootstrap intervals,
//! condition differences and divergence summaries.

use repairlab_core::{FamilyMap, MaskKind, MotifFamily, RunResult, RunSummary, Scope};
use repairlab_stats::{
    BootstrapEstimate, CountMap, DEFAULT_RESAMPLES, Lcg32, bootstrap_diff_split, bootstrap_mean,
    js_divergence, mean, spearman, std_dev,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Seed of the success-rate interval before the sample-size offset.
const SUCCESS_SEED: u32 = 505;
/// Offset between the two generators of a condition difference.
const DIFF_SEED_STRIDE: u32 = 1234;

/// Scalar run metric aggregated across seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    MissFrac,
    UptimeTail,
    ErrTail,
    EpClockRate,
    EpTotalRate,
    RecoveryMean,
    CoarseEpOperator,
    SymmetryGapOperator,
}

impl Metric {
    pub const ALL: [Self; 8] = [
        Self::MissFrac,
        Self::UptimeTail,
        Self::ErrTail,
        Self::EpClockRate,
        Self::EpTotalRate,
        Self::RecoveryMean,
        Self::CoarseEpOperator,
        Self::SymmetryGapOperator,
    ];

    /// Metrics compared between every pair of conditions.
    pub const COMPARED: [Self; 4] = [
        Self::MissFrac,
        Self::UptimeTail,
        Self::ErrTail,
        Self::EpClockRate,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MissFrac => "miss_frac",
            Self::UptimeTail => "uptime_tail",
            Self::ErrTail => "err_tail",
            Self::EpClockRate => "ep_clock_rate",
            Self::EpTotalRate => "ep_total_rate",
            Self::RecoveryMean => "recovery_mean",
            Self::CoarseEpOperator => "coarse_ep_operator",
            Self::SymmetryGapOperator => "symmetry_gap_operator",
        }
    }

    /// Value of this metric for one run; `None` when the run has no such value
    /// (e.g. no event recovered).
    #[must_use]
    pub fn extract(self, summary: &RunSummary) -> Option<f64> {
        match self {
            Self::MissFrac => Some(summary.miss_frac),
            Self::UptimeTail => Some(summary.uptime_tail),
            Self::ErrTail => Some(summary.err_tail_mean),
            Self::EpClockRate => Some(summary.ep_rates.clock),
            Self::EpTotalRate => Some(summary.ep_rates.total),
            Self::RecoveryMean => summary.recovery_mean,
            Self::CoarseEpOperator => Some(summary.coarse_ep.operator),
            Self::SymmetryGapOperator => Some(summary.symmetry_gap.operator),
        }
    }

    const fn ci_seed(self) -> u32 {
        match self {
            Self::MissFrac => 101,
            Self::UptimeTail => 202,
            Self::ErrTail => 303,
            Self::EpClockRate => 404,
            Self::EpTotalRate => 606,
            Self::RecoveryMean => 707,
            Self::CoarseEpOperator => 808,
            Self::SymmetryGapOperator => 909,
        }
    }

    const fn diff_seed(self) -> u32 {
        match self {
            Self::MissFrac => 7001,
            Self::UptimeTail => 8001,
            Self::ErrTail => 9001,
            Self::EpClockRate => 10_001,
            Self::EpTotalRate => 11_001,
            Self::RecoveryMean => 12_001,
            Self::CoarseEpOperator => 13_001,
            Self::SymmetryGapOperator => 14_001,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Bootstrap resamples per interval.
    pub resamples: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            resamples: DEFAULT_RESAMPLES,
        }
    }
}

/// Finished runs of one experimental condition.
#[derive(Debug, Clone, Default)]
pub struct ConditionRuns {
    pub name: String,
    pub runs: Vec<RunResult>,
}

impl ConditionRuns {
    /// Runs are kept in seed order so aggregates do not depend on completion order.
    pub fn new(name: impl Into<String>, mut runs: Vec<RunResult>) -> Self {
        runs.sort_by_key(|r| r.summary.seed);
        Self {
            name: name.into(),
            runs,
        }
    }

    fn values(&self, metric: Metric) -> Vec<f64> {
        self.runs
            .iter()
            .filter_map(|r| metric.extract(&r.summary))
            .collect()
    }

    fn pooled(&self, scope: Scope) -> CountMap {
        let mut pooled = CountMap::new();
        for run in &self.runs {
            pooled.merge(run.counts.get(scope));
        }
        pooled
    }

    fn pooled_recovery(&self, missed: bool) -> CountMap {
        let mut pooled = CountMap::new();
        for run in &self.runs {
            pooled.merge(&run.recovery_counts(missed));
        }
        pooled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    /// Runs that reported the metric.
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub ci: BootstrapEstimate,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub name: String,
    pub runs: usize,
    pub seeds: Vec<u64>,
    pub success_count: usize,
    pub success_rate: f64,
    pub success_ci: BootstrapEstimate,
    pub metrics: Vec<MetricSummary>,
    /// JSD between pooled hazard and outside motif counts, per family.
    pub hazard_outside_jsd: FamilyMap<f64>,
    /// JSD between recovery-window operator motifs of recovered and missed
    /// events; `None` unless both outcomes occurred.
    pub recovered_missed_jsd: Option<f64>,
    /// Mean hazard vocabulary entropy per interface depth.
    pub depth_entropy: FamilyMap<Vec<f64>>,
    /// Spearman correlation of interface depth against `depth_entropy`.
    pub depth_spearman: FamilyMap<f64>,
    /// Sparse-signal marker name to number of runs raising it.
    pub markers: BTreeMap<String, usize>,
}

impl ConditionSummary {
    #[must_use]
    pub fn metric(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Bootstrap difference `a − b` of one metric between two conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDiff {
    pub metric: Metric,
    pub a: String,
    pub b: String,
    pub estimate: BootstrapEstimate,
}

/// JSD between the pooled hazard operator motifs of two conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionJsd {
    pub a: String,
    pub b: String,
    pub jsd: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub conditions: Vec<ConditionSummary>,
    pub diffs: Vec<ConditionDiff>,
    pub cross_jsd: Vec<ConditionJsd>,
}

impl AggregateReport {
    #[must_use]
    pub fn condition(&self, name: &str) -> Option<&ConditionSummary> {
        self.conditions.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn diff(&self, metric: Metric, a: &str, b: &str) -> Option<&ConditionDiff> {
        self.diffs
            .iter()
            .find(|d| d.metric == metric && d.a == a && d.b == b)
    }
}

fn sample_seed(base: u32, n: usize) -> u32 {
    base.wrapping_add(n as u32)
}

fn summarize_metric(condition: &ConditionRuns, metric: Metric, reps: usize) -> MetricSummary {
    let values = condition.values(metric);
    let mut rng = Lcg32::new(sample_seed(metric.ci_seed(), values.len()));
    MetricSummary {
        metric,
        n: values.len(),
        mean: mean(&values),
        std: std_dev(&values),
        ci: bootstrap_mean(&values, reps, &mut rng),
    }
}

fn depth_means(runs: &[RunResult], family: MotifFamily) -> Vec<f64> {
    let depth = runs
        .iter()
        .map(|r| r.summary.depth_entropy.get(family).len())
        .max()
        .unwrap_or(0);
    (0..depth)
        .map(|d| {
            let at: Vec<f64> = runs
                .iter()
                .filter_map(|r| r.summary.depth_entropy.get(family).get(d).copied())
                .collect();
            mean(&at)
        })
        .collect()
}

/// Summarize one condition across its seeds.
#[must_use]
pub fn summarize_condition(
    condition: &ConditionRuns,
    config: &AggregateConfig,
) -> ConditionSummary {
    let reps = config.resamples;
    let flags: Vec<f64> = condition
        .runs
        .iter()
        .map(|r| if r.summary.is_success() { 1.0 } else { 0.0 })
        .collect();
    let success_count = flags.iter().filter(|&&f| f > 0.0).count();
    let mut success_rng = Lcg32::new(sample_seed(SUCCESS_SEED, flags.len()));

    let mut markers = BTreeMap::new();
    for run in &condition.runs {
        for marker in &run.summary.markers {
            *markers.entry(marker.name().to_string()).or_insert(0) += 1;
        }
    }

    let recovered = condition.pooled_recovery(false);
    let missed = condition.pooled_recovery(true);
    let recovered_missed_jsd = (recovered.total() > 0 && missed.total() > 0)
        .then(|| js_divergence(&recovered, &missed));

    let depth_entropy = FamilyMap::from_fn(|f| depth_means(&condition.runs, f));
    let depth_spearman = FamilyMap::from_fn(|f| {
        let entropies = depth_entropy.get(f);
        let depths: Vec<f64> = (0..entropies.len()).map(|d| d as f64).collect();
        spearman(&depths, entropies)
    });

    let summary = ConditionSummary {
        name: condition.name.clone(),
        runs: condition.runs.len(),
        seeds: condition.runs.iter().map(|r| r.summary.seed).collect(),
        success_count,
        success_rate: if flags.is_empty() {
            0.0
        } else {
            success_count as f64 / flags.len() as f64
        },
        success_ci: bootstrap_mean(&flags, reps, &mut success_rng),
        metrics: Metric::ALL
            .iter()
            .map(|&m| summarize_metric(condition, m, reps))
            .collect(),
        hazard_outside_jsd: FamilyMap::from_fn(|f| {
            js_divergence(
                &condition.pooled(Scope::new(f, MaskKind::Hazard)),
                &condition.pooled(Scope::new(f, MaskKind::Outside)),
            )
        }),
        recovered_missed_jsd,
        depth_entropy,
        depth_spearman,
        markers,
    };
    debug!(
        condition = %summary.name,
        runs = summary.runs,
        success_rate = summary.success_rate,
        "condition summarized"
    );
    summary
}

/// Aggregate every condition, then compare each ordered pair `(i, j)` with `i < j`.
#[must_use]
pub fn aggregate(conditions: &[ConditionRuns], config: &AggregateConfig) -> AggregateReport {
    let summaries: Vec<ConditionSummary> = conditions
        .iter()
        .map(|c| summarize_condition(c, config))
        .collect();

    let mut diffs = Vec::new();
    let mut cross_jsd = Vec::new();
    for (i, a) in conditions.iter().enumerate() {
        for b in &conditions[i + 1..] {
            for metric in Metric::COMPARED {
                let seed = metric.diff_seed();
                let estimate = bootstrap_diff_split(
                    &a.values(metric),
                    &b.values(metric),
                    config.resamples,
                    &mut Lcg32::new(seed),
                    &mut Lcg32::new(seed.wrapping_add(DIFF_SEED_STRIDE)),
                );
                diffs.push(ConditionDiff {
                    metric,
                    a: a.name.clone(),
                    b: b.name.clone(),
                    estimate,
                });
            }
            cross_jsd.push(ConditionJsd {
                a: a.name.clone(),
                b: b.name.clone(),
                jsd: js_divergence(
                    &a.pooled(Scope::OPERATOR_HAZARD),
                    &b.pooled(Scope::OPERATOR_HAZARD),
                ),
            });
        }
    }
    info!(
        conditions = summaries.len(),
        diffs = diffs.len(),
        "aggregate report built"
    );
    AggregateReport {
        conditions: summaries,
        diffs,
        cross_jsd,
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.conditions {
            write!(
                f,
                "{} | runs {} | success {:.1}% [{:.1}, {:.1}]",
                c.name,
                c.runs,
                c.success_rate * 100.0,
                c.success_ci.ci_low * 100.0,
                c.success_ci.ci_high * 100.0
            )?;
            for metric in [Metric::MissFrac, Metric::UptimeTail, Metric::ErrTail] {
                if let Some(m) = c.metric(metric) {
                    write!(
                        f,
                        " | {metric} {:.3} [{:.3}, {:.3}]",
                        m.mean, m.ci.ci_low, m.ci.ci_high
                    )?;
                }
            }
            writeln!(f)?;
            for (name, count) in &c.markers {
                writeln!(f, "  marker {name}: {count}/{}", c.runs)?;
            }
        }
        for d in &self.diffs {
            let e = &d.estimate;
            writeln!(
                f,
                "{} {} - {}: {:.4} [{:.4}, {:.4}]",
                d.metric, d.a, d.b, e.point_estimate, e.ci_low, e.ci_high
            )?;
        }
        for j in &self.cross_jsd {
            writeln!(f, "jsd operator hazard {} vs {}: {:.4}", j.a, j.b, j.jsd)?;
        }
        Ok(())
    }
}
