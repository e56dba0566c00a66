use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GsdmmError>;

/// Everything that can stop a GSDMM run.
///
/// None of these are retried: for a fixed seed the sampler is
/// deterministic, so a retry would reproduce the same failure.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GsdmmError {
    /// A sampler option is out of its valid range. Raised before any work.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A token id falls outside `[0, vocab_size)`.
    #[error(
        "token {token} at position {position} of document {document} \
         is outside the vocabulary [0, {vocab_size})"
    )]
    TokenOutOfRange {
        /// Index of the offending document
        document: usize,
        /// Position of the token within that document
        position: usize,
        /// The token id as it was given
        token: i64,
        /// Vocabulary size the token was checked against
        vocab_size: usize,
    },

    /// Cluster weights could not be normalized.
    #[error(
        "cluster weights of document {document} in sweep {sweep} \
         could not be normalized (sum = {total})"
    )]
    NumericInstability {
        /// Document being resampled
        document: usize,
        /// Zero-based sweep index
        sweep: usize,
        /// The offending (shifted) weight sum
        total: f64,
    },

    /// A handler asked the sampler to stop.
    #[error("sampling cancelled after {sweeps_completed} sweeps")]
    Cancelled {
        /// Number of full sweeps that finished before the stop was observed
        sweeps_completed: usize,
    },
}
