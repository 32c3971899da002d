//! Shared plumbing for the `repairlab` command-line runner.

pub mod preset;
pub mod runner;

pub use preset::{ConditionSpec, ORACLE_PREFIX, Preset, ResolvedCondition};
pub use runner::{calibrate, run_all, run_condition, run_seed};
