use crate::error::{GsdmmError, Result};
use serde::{Deserialize, Serialize};

/// Options for GSDMM inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsdmmOptions {
    /// Upper bound on the number of sweeps (I). Default: 50
    pub max_sweeps: usize,
    /// Upper bound on the number of clusters (K). Default: 8
    pub num_clusters: usize,
    /// Dirichlet prior on cluster proportions. Default: 0.1
    pub alpha: f64,
    /// Dirichlet prior on each cluster's token distribution. Default: 0.1
    pub beta: f64,
    /// Vocabulary size (V); every token id must be below it. No usable default
    pub vocab_size: usize,
    /// Random seed. Default: 42
    pub seed: u64,
    /// Draw a progress bar on stderr. Default: false
    pub show_progress: bool,
    /// Sweeps (0-based index) up to which convergence is not checked. Default: 25
    pub warmup_sweeps: usize,
    /// Cancellation is polled before every sweep whose index is a multiple of this. Default: 20
    pub cancel_check_interval: usize,
    /// Fan the per-cluster weights out over rayon from this many clusters on. Default: 64
    pub parallel_min_clusters: usize,
}

impl Default for GsdmmOptions {
    fn default() -> Self {
        GsdmmOptions {
            max_sweeps: 50,
            num_clusters: 8,
            alpha: 0.1,
            beta: 0.1,
            vocab_size: 0,
            seed: 42,
            show_progress: false,
            warmup_sweeps: 25,
            cancel_check_interval: 20,
            parallel_min_clusters: 64,
        }
    }
}

impl GsdmmOptions {
    /// Options for a vocabulary of `vocab_size` tokens, defaults elsewhere.
    pub fn with_vocab_size(vocab_size: usize) -> Self {
        GsdmmOptions {
            vocab_size,
            ..Default::default()
        }
    }

    /// Check every option; nothing is sampled until this passes.
    pub fn validate(&self) -> Result<()> {
        if self.num_clusters == 0 {
            return Err(invalid("num_clusters (K) must be positive"));
        }
        if self.vocab_size == 0 {
            return Err(invalid("vocab_size (V) must be positive"));
        }
        if self.max_sweeps == 0 {
            return Err(invalid("max_sweeps (I) must be positive"));
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(invalid(&format!(
                "alpha must be a positive finite number, got {}",
                self.alpha
            )));
        }
        if !(self.beta > 0.0 && self.beta.is_finite()) {
            return Err(invalid(&format!(
                "beta must be a positive finite number, got {}",
                self.beta
            )));
        }
        if self.cancel_check_interval == 0 {
            return Err(invalid("cancel_check_interval must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> GsdmmError {
    GsdmmError::InvalidConfiguration(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_need_vocab_size() {
        assert!(GsdmmOptions::default().validate().is_err());
        assert!(GsdmmOptions::with_vocab_size(10).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_hyperparameters() {
        let base = GsdmmOptions::with_vocab_size(10);

        let bad = [
            GsdmmOptions { num_clusters: 0, ..base.clone() },
            GsdmmOptions { max_sweeps: 0, ..base.clone() },
            GsdmmOptions { alpha: 0.0, ..base.clone() },
            GsdmmOptions { alpha: -1.0, ..base.clone() },
            GsdmmOptions { beta: 0.0, ..base.clone() },
            GsdmmOptions { beta: f64::NAN, ..base.clone() },
        ];

        for opts in bad {
            match opts.validate() {
                Err(GsdmmError::InvalidConfiguration(_)) => {}
                other => panic!("expected InvalidConfiguration for {:?}, got {:?}", opts, other),
            }
        }
    }
}
