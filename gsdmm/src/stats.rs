//! Sufficient statistics for the Dirichlet multinomial mixture.
//!
//! Tracks the number of documents per cluster (`m_z`), the number of
//! tokens per cluster (`n_z`) and the V×K token-by-cluster count table
//! (`n_z_w`) for the current assignment.
//!
//! The tables are filled once by the initial assignment and afterwards
//! only change through [`ClusterStats::add_document`] and
//! [`ClusterStats::remove_document`], both O(unique tokens).

use crate::document::{Corpus, Document};

/// Sufficient statistics for GSDMM.
///
/// All arrays use cluster indices in `0..k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStats {
    /// Number of clusters (upper bound K)
    pub k: usize,
    /// Vocabulary size V
    pub v: usize,
    /// Documents per cluster, `m_z`
    pub doc_count: Vec<usize>,
    /// Tokens (with repetition) per cluster, `n_z`
    pub word_count: Vec<usize>,
    /// V×K token-by-cluster counts, flattened row-major: `token_count[w * k + c]`
    pub token_count: Vec<usize>,
}

impl ClusterStats {
    /// All-zero statistics for `k` clusters over a vocabulary of `v` tokens.
    pub fn new(k: usize, v: usize) -> Self {
        ClusterStats {
            k,
            v,
            doc_count: vec![0; k],
            word_count: vec![0; k],
            token_count: vec![0; v * k],
        }
    }

    /// Build statistics from scratch for a full assignment vector.
    pub fn from_assignments(corpus: &Corpus, k: usize, assignments: &[usize]) -> Self {
        assert_eq!(assignments.len(), corpus.num_documents());
        let mut stats = Self::new(k, corpus.vocab_size());
        for (doc, &c) in corpus.documents().iter().zip(assignments) {
            stats.add_document(doc, c);
        }
        stats
    }

    /// Occurrences of `token` in documents currently assigned to `cluster`.
    #[inline]
    pub fn token_stat(&self, token: usize, cluster: usize) -> usize {
        self.token_count[token * self.k + cluster]
    }

    /// Row of the token-by-cluster table for `token` (length K).
    #[inline]
    pub fn token_row(&self, token: usize) -> &[usize] {
        &self.token_count[token * self.k..(token + 1) * self.k]
    }

    /// Add one document's contribution to `cluster`.
    pub fn add_document(&mut self, doc: &Document, cluster: usize) {
        self.doc_count[cluster] += 1;
        self.word_count[cluster] += doc.len();
        for (w, c) in doc.token_counts() {
            self.token_count[w * self.k + cluster] += c;
        }
    }

    /// Remove one document's contribution from `cluster`.
    ///
    /// `cluster` must be the document's current cluster.
    pub fn remove_document(&mut self, doc: &Document, cluster: usize) {
        self.doc_count[cluster] -= 1;
        self.word_count[cluster] -= doc.len();
        for (w, c) in doc.token_counts() {
            self.token_count[w * self.k + cluster] -= c;
        }
    }

    /// Number of clusters holding at least one document.
    pub fn num_active_clusters(&self) -> usize {
        self.doc_count.iter().filter(|&&m| m > 0).count()
    }

    /// Documents per cluster.
    pub fn cluster_sizes(&self) -> &[usize] {
        &self.doc_count
    }

    /// Recompute every invariant from scratch against `corpus`.
    ///
    /// Returns a description of the first violation. Meant for tests and
    /// diagnostics, not for the sampling loop.
    pub fn check_consistency(&self, corpus: &Corpus) -> Result<(), String> {
        let total_docs: usize = self.doc_count.iter().sum();
        if total_docs != corpus.num_documents() {
            return Err(format!(
                "sum(m_z) = {} but the corpus has {} documents",
                total_docs,
                corpus.num_documents()
            ));
        }

        let total_words: usize = self.word_count.iter().sum();
        if total_words != corpus.num_tokens() {
            return Err(format!(
                "sum(n_z) = {} but the corpus has {} tokens",
                total_words,
                corpus.num_tokens()
            ));
        }

        for c in 0..self.k {
            let col: usize = (0..self.v).map(|w| self.token_stat(w, c)).sum();
            if col != self.word_count[c] {
                return Err(format!(
                    "cluster {}: n_z = {} but sum_w n_z_w = {}",
                    c, self.word_count[c], col
                ));
            }
        }

        for (w, &freq) in corpus.token_frequencies().iter().enumerate() {
            let row: usize = self.token_row(w).iter().sum();
            if row != freq {
                return Err(format!(
                    "token {}: sum_k n_z_w = {} but it occurs {} times",
                    w, row, freq
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_corpus() -> Corpus {
        let docs: Vec<Vec<usize>> = vec![vec![0, 1, 1], vec![1, 2], vec![0, 2, 2, 3]];
        Corpus::new(&docs, 4).unwrap()
    }

    #[test]
    fn test_from_assignments() {
        let corpus = small_corpus();
        let stats = ClusterStats::from_assignments(&corpus, 2, &[0, 1, 0]);

        assert_eq!(stats.doc_count, vec![2, 1]);
        assert_eq!(stats.word_count, vec![7, 2]);
        assert_eq!(stats.token_row(0), &[2, 0]);
        assert_eq!(stats.token_row(1), &[2, 1]);
        assert_eq!(stats.token_row(2), &[2, 1]);
        assert_eq!(stats.token_row(3), &[1, 0]);
        assert!(stats.check_consistency(&corpus).is_ok());
    }

    #[test]
    fn test_remove_is_inverse_of_add() {
        let corpus = small_corpus();
        let mut stats = ClusterStats::from_assignments(&corpus, 3, &[0, 1, 2]);
        let before = stats.clone();

        let doc = corpus.document(2);
        stats.remove_document(doc, 2);
        assert_eq!(stats.doc_count[2], 0);
        assert_eq!(stats.word_count[2], 0);
        stats.add_document(doc, 2);

        assert_eq!(stats, before);
    }

    #[test]
    fn test_move_matches_recompute() {
        let corpus = small_corpus();
        let mut stats = ClusterStats::from_assignments(&corpus, 2, &[0, 0, 1]);

        // move document 1 from cluster 0 to cluster 1
        stats.remove_document(corpus.document(1), 0);
        stats.add_document(corpus.document(1), 1);

        let fresh = ClusterStats::from_assignments(&corpus, 2, &[0, 1, 1]);
        assert_eq!(stats, fresh);
        assert_eq!(stats.num_active_clusters(), 2);
    }

    #[test]
    fn test_consistency_detects_drift() {
        let corpus = small_corpus();
        let mut stats = ClusterStats::from_assignments(&corpus, 2, &[0, 1, 0]);
        stats.token_count[3 * 2 + 1] += 1;
        assert!(stats.check_consistency(&corpus).is_err());
    }
}
