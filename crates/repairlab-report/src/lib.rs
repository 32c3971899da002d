//! Aggregation & reporting for repairlab experiments.
//!
//! Runs are grouped per condition, summarized across seeds with seeded
//! bootstrap intervals, compared pairwise, and handed to a [`ReportSink`].

pub mod aggregate;
pub mod sink;

pub use aggregate::{
    AggregateConfig, AggregateReport, ConditionDiff, ConditionJsd, ConditionRuns,
    ConditionSummary, Metric, MetricSummary, aggregate, summarize_condition,
};
pub use sink::{JsonLinesSink, MemorySink, ReportError, ReportSink};
