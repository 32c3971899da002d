//! Count-based statistics shared across the repairlab workspace.
//!
//! Every estimator here is total: degenerate inputs (empty maps, zero-variance
//! sequences, empty samples) produce a neutral finite value instead of `NaN`
//! or an error.

pub mod bootstrap;
pub mod correlation;
pub mod counts;
pub mod divergence;
pub mod entropy;
pub mod irreversibility;
pub mod rng;
pub mod summary;

pub use bootstrap::{
    BootstrapEstimate, DEFAULT_RESAMPLES, bootstrap_diff, bootstrap_diff_split, bootstrap_mean,
};
pub use correlation::{midranks, spearman};
pub use counts::{CountMap, EdgeWeight, EdgeWeights, StateId, TransitionEntry, TransitionTable};
pub use divergence::js_divergence;
pub use entropy::{VocabStats, shannon_entropy, vocab_stats};
pub use irreversibility::{
    CoarseEpDecomposition, DEFAULT_SMOOTHING, coarse_ep_decompose, coarse_ep_regularized,
    coarse_ep_smoothed, symmetry_gap,
};
pub use rng::{Lcg32, RandomSource, Xorshift32, shuffle_in_place};
pub use summary::{SummaryStat, mean, percentile, std_dev};
