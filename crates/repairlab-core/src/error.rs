use thiserror::Error;

/// Errors raised while building or validating a harness configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    /// An override named a path the configuration does not have.
    #[error("unknown override path: {0}")]
    UnknownPath(String),
    /// An override could not be parsed or merged.
    #[error("{0}")]
    InvalidPatch(String),
}

/// Fatal conditions that abort a run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The accept log filled up between two drains; counts would be silently truncated.
    #[error(
        "ACCEPT_LOG_OVERFLOW at t={time} (capacity {capacity}): reduce motif.chunk_steps or raise motif.accept_log_capacity"
    )]
    AcceptLogOverflow { time: u64, capacity: usize },
    /// The oracle does not expose a move category the harness attributes counts to.
    #[error("oracle is missing move label `{label}` (available: {available:?})")]
    MissingMoveLabel {
        label: &'static str,
        available: Vec<String>,
    },
    /// A move index cannot be represented in the 32-bit accept-log mask.
    #[error("move label `{label}` has index {index}, which does not fit the accept-log mask")]
    ActionMaskOverflow { label: &'static str, index: usize },
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    /// An oracle accessor returned data of an unexpected size.
    #[error("oracle returned {what} of length {actual}, expected {expected}")]
    OracleShape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}
