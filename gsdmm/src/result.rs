//! Result extraction.
//!
//! The dense V×K table is only compacted once, after sampling, into
//! `(token, cluster, count)` triples in row-major order.

use crate::document::Document;
use crate::error::{GsdmmError, Result};
use crate::options::GsdmmOptions;
use crate::sampler::{compute_log_probs_for_document, exp_shifted, LogWeightConsts, Termination};
use crate::stats::ClusterStats;
use serde::{Deserialize, Serialize};

/// One nonzero entry of the token-by-cluster table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenClusterCount {
    /// Token id
    pub token: usize,
    /// Cluster id
    pub cluster: usize,
    /// Occurrences of `token` in documents assigned to `cluster`
    pub count: usize,
}

/// Outcome of a successful GSDMM run.
#[derive(Debug, Clone)]
pub struct GsdmmFit {
    /// Cluster of each document, in input order
    pub assignments: Vec<usize>,
    /// Nonzero token-by-cluster counts, ordered by token then cluster
    pub distribution: Vec<TokenClusterCount>,
    /// `Converged` or `MaxSweepsReached`
    pub termination: Termination,
    stats: ClusterStats,
    options: GsdmmOptions,
}

/// Nonzero entries of the dense table, token ascending then cluster
/// ascending.
pub fn sparse_distribution(stats: &ClusterStats) -> Vec<TokenClusterCount> {
    let mut out = vec![];
    for token in 0..stats.v {
        for (cluster, &count) in stats.token_row(token).iter().enumerate() {
            if count != 0 {
                out.push(TokenClusterCount {
                    token,
                    cluster,
                    count,
                });
            }
        }
    }
    out
}

impl GsdmmFit {
    /// Package the final sampler state.
    pub fn new(
        assignments: Vec<usize>,
        stats: ClusterStats,
        termination: Termination,
        options: GsdmmOptions,
    ) -> Self {
        let distribution = sparse_distribution(&stats);
        GsdmmFit {
            assignments,
            distribution,
            termination,
            stats,
            options,
        }
    }

    /// Number of sweeps that ran (at most `max_sweeps`).
    pub fn sweeps(&self) -> usize {
        self.termination.sweeps()
    }

    /// Whether the run stopped early on a stable cluster count.
    pub fn converged(&self) -> bool {
        matches!(self.termination, Termination::Converged { .. })
    }

    /// Final sufficient statistics.
    pub fn stats(&self) -> &ClusterStats {
        &self.stats
    }

    /// Options the run used.
    pub fn options(&self) -> &GsdmmOptions {
        &self.options
    }

    /// Documents per cluster (length K).
    pub fn cluster_sizes(&self) -> &[usize] {
        self.stats.cluster_sizes()
    }

    /// Clusters holding at least one document.
    pub fn num_active_clusters(&self) -> usize {
        self.stats.num_active_clusters()
    }

    /// Rebuild the dense V×K table, row-major, from `distribution`.
    pub fn to_dense(&self) -> Vec<usize> {
        let k = self.stats.k;
        let mut dense = vec![0; self.stats.v * k];
        for t in &self.distribution {
            dense[t.token * k + t.cluster] = t.count;
        }
        dense
    }

    /// The `n` most frequent tokens of `cluster` with their counts.
    ///
    /// Ties are broken by smaller token id.
    pub fn top_tokens(&self, cluster: usize, n: usize) -> Vec<(usize, usize)> {
        let mut tokens: Vec<(usize, usize)> = self
            .distribution
            .iter()
            .filter(|t| t.cluster == cluster)
            .map(|t| (t.token, t.count))
            .collect();
        tokens.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        tokens.truncate(n);
        tokens
    }

    /// Posterior cluster probabilities of an unseen document.
    ///
    /// Uses the same conditional as a sampling step, evaluated against the
    /// final counts. Tokens are checked against the vocabulary.
    pub fn score_document(&self, tokens: &[usize]) -> Result<Vec<f64>> {
        let doc = Document::new(tokens, self.stats.v)?;
        let num_documents = self.assignments.len() + 1;
        let consts = LogWeightConsts::new(&self.options, num_documents);

        let mut probs = vec![0.0; self.stats.k];
        compute_log_probs_for_document(&doc, &self.stats, &consts, &mut probs, false);

        let total = exp_shifted(&mut probs).map_err(|total| GsdmmError::NumericInstability {
            document: 0,
            sweep: self.sweeps(),
            total,
        })?;
        for p in probs.iter_mut() {
            *p /= total;
        }
        Ok(probs)
    }
}
