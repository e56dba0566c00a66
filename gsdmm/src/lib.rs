//! Gibbs Sampling Dirichlet Multinomial Mixture (GSDMM) for short texts.
//!
//! Each document is generated by a single latent cluster's word
//! distribution. Cluster parameters are integrated out, so the sampler
//! only resamples document-to-cluster assignments conditioned on three
//! count tables. Clusters that lose all their documents stay empty, which
//! lets the model settle on fewer clusters than the upper bound `K`.
//!
//! # Model
//!
//! Dirichlet(alpha) prior over cluster proportions, Dirichlet(beta) prior
//! over each cluster's token distribution.
//!
//! # References
//!
//! Yin & Wang (2014). "A Dirichlet multinomial mixture model-based
//! approach for short text clustering." KDD '14.

#![deny(missing_docs)]

/// Error taxonomy shared by every stage of a run
pub mod error;

/// Per-document token counts derived once from the raw input
pub mod document;

/// Sufficient statistics: docs per cluster, tokens per cluster, token x cluster counts
pub mod stats;

/// Sampler options and their validation
pub mod options;

/// Progress reporting and cooperative cancellation
pub mod handler;

/// Collapsed Gibbs sampler over document assignments
pub mod sampler;

/// Final assignments and the sparse token x cluster table
pub mod result;

/// Planted short-text corpora for testing and benchmarking
pub mod simulate;

pub use document::{Corpus, Document};
pub use error::{GsdmmError, Result};
pub use handler::{CancelFlag, LogProgress, ProgressBar, SweepHandler, SweepSummary};
pub use options::GsdmmOptions;
pub use result::{GsdmmFit, TokenClusterCount};
pub use sampler::{fit, fit_with_handler, GsdmmSampler, Termination};
pub use stats::ClusterStats;
