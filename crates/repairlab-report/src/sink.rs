//! Destinations for finished runs and aggregate reports.

use crate::aggregate::AggregateReport;
use repairlab_core::{HazardEvent, RunResult, RunSummary};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Sink error wrapper.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Receives per-run results as they finish and the aggregate report at the end.
pub trait ReportSink: Send {
    fn write_run(&mut self, condition: &str, run: &RunResult) -> Result<(), ReportError>;

    fn write_report(&mut self, report: &AggregateReport) -> Result<(), ReportError>;

    fn flush(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Keeps everything in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub runs: Vec<(String, RunSummary)>,
    pub reports: Vec<AggregateReport>,
}

impl ReportSink for MemorySink {
    fn write_run(&mut self, condition: &str, run: &RunResult) -> Result<(), ReportError> {
        self.runs.push((condition.to_string(), run.summary.clone()));
        Ok(())
    }

    fn write_report(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.reports.push(report.clone());
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Run {
        condition: &'a str,
        summary: &'a RunSummary,
        events: &'a [HazardEvent],
    },
    Report(&'a AggregateReport),
}

/// Writes one JSON object per line: `{"kind":"run",...}` or `{"kind":"report",...}`.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    lines: usize,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (or truncate) `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Lines written so far.
    #[must_use]
    pub const fn lines(&self) -> usize {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &Line<'_>) -> Result<(), ReportError> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn write_run(&mut self, condition: &str, run: &RunResult) -> Result<(), ReportError> {
        self.write_line(&Line::Run {
            condition,
            summary: &run.summary,
            events: &run.events,
        })
    }

    fn write_report(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.write_line(&Line::Report(report))
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_are_tagged() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let mut run = RunResult::default();
        run.summary.seed = 4;
        sink.write_run("baseline", &run).expect("run line");
        sink.write_report(&AggregateReport::default())
            .expect("report line");
        assert_eq!(sink.lines(), 2);

        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).expect("json"))
            .collect();
        assert_eq!(lines[0]["kind"], "run");
        assert_eq!(lines[0]["condition"], "baseline");
        assert_eq!(lines[0]["summary"]["seed"], 4);
        assert_eq!(lines[1]["kind"], "report");
        assert!(lines[1]["conditions"].is_array());
    }

    #[test]
    fn memory_sink_keeps_summaries() {
        let mut sink = MemorySink::default();
        sink.write_run("a", &RunResult::default()).expect("run");
        sink.write_report(&AggregateReport::default()).expect("report");
        assert_eq!(sink.runs.len(), 1);
        assert_eq!(sink.runs[0].0, "a");
        assert_eq!(sink.reports.len(), 1);
    }
}
