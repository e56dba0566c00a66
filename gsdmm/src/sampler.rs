//! Collapsed Gibbs sampler for GSDMM.
//!
//! For each document, removes its counts from its current cluster,
//! computes the conditional posterior over all K clusters, samples a new
//! cluster from the categorical distribution and adds the counts back.
//!
//! Documents are visited strictly in order: a document sees the moves of
//! every document before it in the same sweep. Only the K-wide weight
//! computation of a single document may run in parallel, and it reads
//! the statistics through a shared borrow. The random stream is consumed
//! by the coordinating thread alone, so a fixed seed reproduces a run
//! whether or not the fan-out is used.

use crate::document::{Corpus, Document};
use crate::error::{GsdmmError, Result};
use crate::handler::{ProgressBar, SamplerInit, SweepHandler, SweepSummary};
use crate::options::GsdmmOptions;
use crate::result::GsdmmFit;
use crate::stats::ClusterStats;
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a run ended.
///
/// A [`GsdmmFit`] only ever carries `Converged` or `MaxSweepsReached`;
/// the other two are seen by handlers when the run returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The active cluster count stopped changing after the warm-up
    Converged {
        /// Sweeps completed
        sweeps: usize,
    },
    /// The sweep budget ran out
    MaxSweepsReached {
        /// Sweeps completed
        sweeps: usize,
    },
    /// A handler asked the sampler to stop
    Cancelled {
        /// Sweeps completed
        sweeps: usize,
    },
    /// Weights could not be normalized
    Aborted {
        /// Sweeps completed
        sweeps: usize,
    },
}

impl Termination {
    /// Number of full sweeps that ran.
    pub fn sweeps(&self) -> usize {
        match *self {
            Termination::Converged { sweeps }
            | Termination::MaxSweepsReached { sweeps }
            | Termination::Cancelled { sweeps }
            | Termination::Aborted { sweeps } => sweeps,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged { sweeps } => write!(f, "converged after {} sweeps", sweeps),
            Termination::MaxSweepsReached { sweeps } => {
                write!(f, "reached the limit of {} sweeps", sweeps)
            }
            Termination::Cancelled { sweeps } => write!(f, "cancelled after {} sweeps", sweeps),
            Termination::Aborted { sweeps } => write!(f, "aborted after {} sweeps", sweeps),
        }
    }
}

/// Terms of the conditional that stay fixed for a whole run.
#[derive(Debug, Clone, Copy)]
pub struct LogWeightConsts {
    alpha: f64,
    beta: f64,
    /// `V * beta`
    v_beta: f64,
    /// `ln(D - 1 + K * alpha)`
    denom_1: f64,
}

impl LogWeightConsts {
    /// Constants for `num_documents` documents and the given options.
    pub fn new(options: &GsdmmOptions, num_documents: usize) -> Self {
        let k = options.num_clusters as f64;
        LogWeightConsts {
            alpha: options.alpha,
            beta: options.beta,
            v_beta: options.vocab_size as f64 * options.beta,
            denom_1: (num_documents as f64 - 1.0 + k * options.alpha).ln(),
        }
    }
}

/// Collapsed Gibbs sampler for GSDMM cluster assignments.
pub struct GsdmmSampler {
    options: GsdmmOptions,
    rng: SmallRng,
    /// Scratch space for per-cluster log-probabilities
    log_probs: Vec<f64>,
}

impl GsdmmSampler {
    /// Create a sampler seeded from `options.seed`.
    pub fn new(options: GsdmmOptions) -> Result<Self> {
        options.validate()?;
        let rng = SmallRng::seed_from_u64(options.seed);
        Ok(GsdmmSampler {
            log_probs: vec![0.0; options.num_clusters],
            options,
            rng,
        })
    }

    /// The options this sampler was built with.
    pub fn options(&self) -> &GsdmmOptions {
        &self.options
    }

    /// Draw every document's cluster uniformly from `0..K` and build the
    /// statistics for that assignment.
    pub fn initialize(&mut self, corpus: &Corpus) -> (Vec<usize>, ClusterStats) {
        let k = self.options.num_clusters;
        let mut stats = ClusterStats::new(k, corpus.vocab_size());
        let mut assignments = Vec::with_capacity(corpus.num_documents());

        for doc in corpus.documents() {
            let z = self.rng.random_range(0..k);
            assignments.push(z);
            stats.add_document(doc, z);
        }

        (assignments, stats)
    }

    /// Resample the cluster of document `d`.
    ///
    /// Returns `true` if the document moved. On error the document has
    /// been removed from `stats` and not re-added.
    pub fn resample_document(
        &mut self,
        corpus: &Corpus,
        d: usize,
        sweep: usize,
        consts: &LogWeightConsts,
        assignments: &mut [usize],
        stats: &mut ClusterStats,
    ) -> Result<bool> {
        let doc = corpus.document(d);
        let old_c = assignments[d];

        stats.remove_document(doc, old_c);

        let parallel = self.options.num_clusters >= self.options.parallel_min_clusters;
        compute_log_probs_for_document(doc, stats, consts, &mut self.log_probs, parallel);

        let new_c = sample_categorical_log(&mut self.log_probs, &mut self.rng).map_err(|total| {
            GsdmmError::NumericInstability {
                document: d,
                sweep,
                total,
            }
        })?;

        assignments[d] = new_c;
        stats.add_document(doc, new_c);

        Ok(new_c != old_c)
    }

    /// One full sweep over all documents in order.
    ///
    /// Returns the number of documents that changed cluster.
    pub fn sweep(
        &mut self,
        corpus: &Corpus,
        sweep: usize,
        consts: &LogWeightConsts,
        assignments: &mut [usize],
        stats: &mut ClusterStats,
    ) -> Result<usize> {
        let mut moves = 0;
        for d in 0..corpus.num_documents() {
            if self.resample_document(corpus, d, sweep, consts, assignments, stats)? {
                moves += 1;
            }
        }
        Ok(moves)
    }

    /// Initialize, then sweep until convergence, the sweep limit, or
    /// cancellation.
    ///
    /// Convergence is checked after every sweep whose zero-based index
    /// exceeds `warmup_sweeps`: the run stops as soon as the number of
    /// active clusters equals the value seen at the previous check (which
    /// starts out as K).
    pub fn run<H: SweepHandler>(&mut self, corpus: &Corpus, mut handler: H) -> Result<GsdmmFit> {
        let opts = self.options.clone();
        let k = opts.num_clusters;

        if corpus.vocab_size() != opts.vocab_size {
            return Err(GsdmmError::InvalidConfiguration(format!(
                "corpus was built for V={} but the sampler expects V={}",
                corpus.vocab_size(),
                opts.vocab_size
            )));
        }

        let (mut assignments, mut stats) = self.initialize(corpus);
        let consts = LogWeightConsts::new(&opts, corpus.num_documents());

        info!(
            "GSDMM: D={}, V={}, K={}, alpha={}, beta={}, max sweeps={}, seed={}",
            corpus.num_documents(),
            corpus.vocab_size(),
            k,
            opts.alpha,
            opts.beta,
            opts.max_sweeps,
            opts.seed,
        );

        handler.sampler_init(&SamplerInit {
            num_documents: corpus.num_documents(),
            num_clusters: k,
            max_sweeps: opts.max_sweeps,
            active_clusters: stats.num_active_clusters(),
        });

        let mut prev_active = k;
        let mut termination = Termination::MaxSweepsReached {
            sweeps: opts.max_sweeps,
        };

        for sweep in 0..opts.max_sweeps {
            if sweep % opts.cancel_check_interval == 0 && handler.stop_sampler() {
                warn!("GSDMM cancelled before sweep {}", sweep);
                handler.finalize(&Termination::Cancelled { sweeps: sweep });
                return Err(GsdmmError::Cancelled {
                    sweeps_completed: sweep,
                });
            }

            let moves = match self.sweep(corpus, sweep, &consts, &mut assignments, &mut stats) {
                Ok(moves) => moves,
                Err(e) => {
                    handler.finalize(&Termination::Aborted { sweeps: sweep });
                    return Err(e);
                }
            };

            let active = stats.num_active_clusters();
            debug!("  sweep {}: active clusters={}, moves={}", sweep, active, moves);

            handler.sweep_complete(&SweepSummary {
                sweep,
                max_sweeps: opts.max_sweeps,
                active_clusters: active,
                moves,
            });

            if sweep > opts.warmup_sweeps {
                if active == prev_active {
                    termination = Termination::Converged { sweeps: sweep + 1 };
                    break;
                }
                prev_active = active;
            }
        }

        handler.finalize(&termination);
        info!(
            "GSDMM {}: {} active clusters",
            termination,
            stats.num_active_clusters()
        );

        Ok(GsdmmFit::new(assignments, stats, termination, opts))
    }
}

/// Cluster documents given as token id sequences.
///
/// Validates `options`, then every token against `options.vocab_size`,
/// before any sampling state is built. Draws a progress bar on stderr if
/// `options.show_progress` is set.
pub fn fit<D>(documents: &[D], options: &GsdmmOptions) -> Result<GsdmmFit>
where
    D: AsRef<[usize]> + Sync,
{
    fit_with_handler(documents, options, ())
}

/// [`fit`] with a caller-supplied handler for progress and cancellation.
pub fn fit_with_handler<D, H>(
    documents: &[D],
    options: &GsdmmOptions,
    handler: H,
) -> Result<GsdmmFit>
where
    D: AsRef<[usize]> + Sync,
    H: SweepHandler,
{
    options.validate()?;
    let corpus = Corpus::new(documents, options.vocab_size)?;
    let mut sampler = GsdmmSampler::new(options.clone())?;

    if options.show_progress {
        sampler.run(&corpus, (ProgressBar::new(), handler))
    } else {
        sampler.run(&corpus, handler)
    }
}

/// Unnormalized log posterior of assigning `doc` to `cluster`.
///
/// ```text
/// ln(m_z + alpha) - ln(D - 1 + K alpha)
///   + sum_w sum_{j < c_w} ln(n_z_w + beta + j)
///   - sum_{j < |d|} ln(n_z + V beta + j)
/// ```
///
/// Repeated tokens contribute one term per occurrence.
#[inline]
pub fn cluster_log_weight(
    doc: &Document,
    stats: &ClusterStats,
    consts: &LogWeightConsts,
    cluster: usize,
) -> f64 {
    let num_1 = (stats.doc_count[cluster] as f64 + consts.alpha).ln();

    let mut num_2 = 0.0;
    for (w, c) in doc.token_counts() {
        let n_w = stats.token_stat(w, cluster) as f64 + consts.beta;
        for j in 0..c {
            num_2 += (n_w + j as f64).ln();
        }
    }

    let n = stats.word_count[cluster] as f64 + consts.v_beta;
    let mut denom_2 = 0.0;
    for j in 0..doc.len() {
        denom_2 += (n + j as f64).ln();
    }

    num_1 - consts.denom_1 + num_2 - denom_2
}

/// Compute the log weight of every cluster for `doc`.
///
/// With `parallel` the K clusters are spread over the rayon pool. Each
/// entry is computed the same way either way, so results are identical.
///
/// * `doc` - Document being resampled, already removed from `stats`
/// * `stats` - Sufficient statistics (read-only)
/// * `log_probs` - Output buffer of length K (caller-provided)
pub fn compute_log_probs_for_document(
    doc: &Document,
    stats: &ClusterStats,
    consts: &LogWeightConsts,
    log_probs: &mut [f64],
    parallel: bool,
) {
    if parallel {
        log_probs
            .par_iter_mut()
            .enumerate()
            .for_each(|(k, lp)| *lp = cluster_log_weight(doc, stats, consts, k));
    } else {
        for (k, lp) in log_probs.iter_mut().enumerate() {
            *lp = cluster_log_weight(doc, stats, consts, k);
        }
    }
}

/// Turn log weights into unnormalized weights in place, shifted by their
/// maximum, and return the sum.
///
/// The shift leaves the normalized distribution unchanged. Returns the
/// offending sum as the error if it is zero or not finite.
pub fn exp_shifted(log_probs: &mut [f64]) -> std::result::Result<f64, f64> {
    let max = log_probs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return Err(max);
    }

    let mut total = 0.0;
    for lp in log_probs.iter_mut() {
        *lp = (*lp - max).exp();
        total += *lp;
    }

    if total <= 0.0 || !total.is_finite() {
        return Err(total);
    }
    Ok(total)
}

/// Sample from a categorical distribution given log-probabilities.
///
/// Overwrites `log_probs` with the shifted weights.
fn sample_categorical_log(
    log_probs: &mut [f64],
    rng: &mut SmallRng,
) -> std::result::Result<usize, f64> {
    let total = exp_shifted(log_probs)?;

    let u: f64 = rng.random::<f64>() * total;
    let mut cum = 0.0;
    for (i, &w) in log_probs.iter().enumerate() {
        cum += w;
        if cum > u {
            return Ok(i);
        }
    }

    // rounding left u at the very top
    Ok(log_probs.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_docs() -> Corpus {
        Corpus::new(&[vec![0usize, 1], vec![1, 2], vec![0, 2]], 3).unwrap()
    }

    fn options(k: usize, v: usize) -> GsdmmOptions {
        GsdmmOptions {
            num_clusters: k,
            vocab_size: v,
            ..Default::default()
        }
    }

    /// Direct evaluation of the conditional from its product form.
    fn brute_force_weight(
        doc_tokens: &[usize],
        stats: &ClusterStats,
        opts: &GsdmmOptions,
        d: usize,
        k: usize,
    ) -> f64 {
        let mut p = (stats.doc_count[k] as f64 + opts.alpha)
            / (d as f64 - 1.0 + opts.num_clusters as f64 * opts.alpha);

        let mut seen = std::collections::HashMap::new();
        for &w in doc_tokens {
            let j = seen.entry(w).or_insert(0usize);
            p *= stats.token_stat(w, k) as f64 + opts.beta + *j as f64;
            *j += 1;
        }
        for j in 0..doc_tokens.len() {
            p /= stats.word_count[k] as f64 + opts.vocab_size as f64 * opts.beta + j as f64;
        }
        p
    }

    #[test]
    fn test_log_weight_matches_product_form() {
        let tokens = vec![
            vec![0, 1, 1, 3],
            vec![1, 2],
            vec![0, 2, 2, 3],
            vec![3, 3, 3],
        ];
        let corpus = Corpus::new(&tokens, 4).unwrap();
        let opts = GsdmmOptions {
            alpha: 0.3,
            beta: 0.05,
            ..options(3, 4)
        };
        let mut stats = ClusterStats::from_assignments(&corpus, 3, &[0, 1, 0, 2]);
        let consts = LogWeightConsts::new(&opts, corpus.num_documents());

        stats.remove_document(corpus.document(0), 0);
        for k in 0..3 {
            let lw = cluster_log_weight(corpus.document(0), &stats, &consts, k);
            let expected = brute_force_weight(&tokens[0], &stats, &opts, 4, k).ln();
            approx::assert_abs_diff_eq!(lw, expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_parallel_weights_identical() {
        let tokens: Vec<Vec<usize>> = (0..20)
            .map(|d| vec![d % 5, (d * 3) % 5, d % 5])
            .collect();
        let corpus = Corpus::new(&tokens, 5).unwrap();
        let opts = options(70, 5);
        let labels: Vec<usize> = (0..20).map(|d| (d * 7) % 70).collect();
        let stats = ClusterStats::from_assignments(&corpus, 70, &labels);
        let consts = LogWeightConsts::new(&opts, 20);

        let mut seq = vec![0.0; 70];
        let mut par = vec![0.0; 70];
        compute_log_probs_for_document(corpus.document(3), &stats, &consts, &mut seq, false);
        compute_log_probs_for_document(corpus.document(3), &stats, &consts, &mut par, true);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_draws_follow_peaked_weights() {
        let mut rng = SmallRng::seed_from_u64(3);

        // weight of the middle cluster is e^100 times the others
        let mut hits = [0usize; 3];
        for _ in 0..1000 {
            let mut lp = vec![-100.0, 0.0, -100.0];
            hits[sample_categorical_log(&mut lp, &mut rng).unwrap()] += 1;
        }
        assert_eq!(hits, [0, 1000, 0]);
    }

    #[test]
    fn test_large_negative_log_weights_do_not_underflow() {
        let mut log_probs = vec![-2000.0, -2001.0];
        let total = exp_shifted(&mut log_probs).unwrap();
        approx::assert_abs_diff_eq!(
            log_probs[0] / total,
            1.0 / (1.0 + (-1.0f64).exp()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_non_finite_weights_rejected() {
        let mut nan = vec![f64::NAN, f64::NAN];
        assert!(exp_shifted(&mut nan).is_err());

        let mut neg_inf = vec![f64::NEG_INFINITY; 3];
        assert!(exp_shifted(&mut neg_inf).is_err());
    }

    #[test]
    fn test_invariants_hold_after_every_document() {
        let corpus = three_docs();
        let mut sampler = GsdmmSampler::new(options(2, 3)).unwrap();
        let (mut z, mut stats) = sampler.initialize(&corpus);
        let consts = LogWeightConsts::new(sampler.options(), corpus.num_documents());
        assert!(stats.check_consistency(&corpus).is_ok());

        for sweep in 0..10 {
            for d in 0..corpus.num_documents() {
                sampler
                    .resample_document(&corpus, d, sweep, &consts, &mut z, &mut stats)
                    .unwrap();
                stats.check_consistency(&corpus).unwrap();
                assert_eq!(stats, ClusterStats::from_assignments(&corpus, 2, &z));
            }
        }
    }

    #[test]
    fn test_single_cluster_never_moves() {
        let corpus = three_docs();
        let mut sampler = GsdmmSampler::new(options(1, 3)).unwrap();
        let (mut z, mut stats) = sampler.initialize(&corpus);
        assert_eq!(z, vec![0, 0, 0]);

        let consts = LogWeightConsts::new(sampler.options(), 3);
        for sweep in 0..5 {
            let moves = sampler
                .sweep(&corpus, sweep, &consts, &mut z, &mut stats)
                .unwrap();
            assert_eq!(moves, 0);
            assert_eq!(z, vec![0, 0, 0]);
        }
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(
            Termination::Converged { sweeps: 27 }.to_string(),
            "converged after 27 sweeps"
        );
        assert_eq!(Termination::MaxSweepsReached { sweeps: 50 }.sweeps(), 50);
    }
}
