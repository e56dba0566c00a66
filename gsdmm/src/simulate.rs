use crate::error::{GsdmmError, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};

/// Parameters of a planted short-text corpus.
#[derive(Debug, Clone)]
pub struct SimArgs {
    /// Number of documents
    pub num_documents: usize,
    /// Number of planted clusters
    pub num_clusters: usize,
    /// Vocabulary size; split into one contiguous block per cluster
    pub vocab_size: usize,
    /// Expected document length (at least one token per document)
    pub mean_length: f64,
    /// Probability that a token comes from its cluster's own block
    pub purity: f64,
    /// Random seed
    pub rseed: u64,
}

impl Default for SimArgs {
    fn default() -> Self {
        SimArgs {
            num_documents: 200,
            num_clusters: 4,
            vocab_size: 100,
            mean_length: 8.0,
            purity: 0.9,
            rseed: 42,
        }
    }
}

/// A simulated corpus with its ground truth.
#[derive(Debug, Clone)]
pub struct SimOut {
    /// Token ids of each document
    pub documents: Vec<Vec<usize>>,
    /// Planted cluster of each document
    pub labels: Vec<usize>,
}

/// Generate a corpus where cluster `c` prefers tokens in
/// `[c * V / K, (c + 1) * V / K)`.
///
/// ```text
/// z_d ~ Uniform(K)
/// |d| ~ 1 + Poisson(mean_length - 1)
/// w   ~ Uniform(block(z_d)) with probability purity, else Uniform(V)
/// ```
pub fn simulate_corpus(args: &SimArgs) -> Result<SimOut> {
    if args.num_clusters == 0 || args.vocab_size < args.num_clusters {
        return Err(GsdmmError::InvalidConfiguration(format!(
            "need 0 < K <= V, got K={} and V={}",
            args.num_clusters, args.vocab_size
        )));
    }
    if !(0.0..=1.0).contains(&args.purity) {
        return Err(GsdmmError::InvalidConfiguration(format!(
            "purity must lie in [0, 1], got {}",
            args.purity
        )));
    }

    let extra = Poisson::new((args.mean_length - 1.0).max(1e-8))
        .map_err(|e| GsdmmError::InvalidConfiguration(format!("document length: {}", e)))?;

    let mut rng = SmallRng::seed_from_u64(args.rseed);
    let block = args.vocab_size / args.num_clusters;

    let mut documents = Vec::with_capacity(args.num_documents);
    let mut labels = Vec::with_capacity(args.num_documents);

    for _ in 0..args.num_documents {
        let z = rng.random_range(0..args.num_clusters);
        let len = 1 + extra.sample(&mut rng) as usize;

        let doc: Vec<usize> = (0..len)
            .map(|_| {
                if rng.random::<f64>() < args.purity {
                    z * block + rng.random_range(0..block)
                } else {
                    rng.random_range(0..args.vocab_size)
                }
            })
            .collect();

        documents.push(doc);
        labels.push(z);
    }

    Ok(SimOut { documents, labels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_in_range_and_nonempty() {
        let args = SimArgs {
            num_documents: 300,
            vocab_size: 37,
            num_clusters: 5,
            ..Default::default()
        };
        let sim = simulate_corpus(&args).unwrap();
        assert_eq!(sim.documents.len(), 300);
        assert_eq!(sim.labels.len(), 300);
        for doc in &sim.documents {
            assert!(!doc.is_empty());
            assert!(doc.iter().all(|&w| w < 37));
        }
    }

    #[test]
    fn test_pure_documents_stay_in_block() {
        let args = SimArgs {
            purity: 1.0,
            ..Default::default()
        };
        let sim = simulate_corpus(&args).unwrap();
        let block = args.vocab_size / args.num_clusters;
        for (doc, &z) in sim.documents.iter().zip(&sim.labels) {
            assert!(doc.iter().all(|&w| w / block == z));
        }
    }

    #[test]
    fn test_same_seed_same_corpus() {
        let a = simulate_corpus(&SimArgs::default()).unwrap();
        let b = simulate_corpus(&SimArgs::default()).unwrap();
        assert_eq!(a.documents, b.documents);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_rejects_more_clusters_than_tokens() {
        let args = SimArgs {
            num_clusters: 10,
            vocab_size: 5,
            ..Default::default()
        };
        assert!(simulate_corpus(&args).is_err());
    }
}
