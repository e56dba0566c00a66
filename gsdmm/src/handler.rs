//! Progress reporting and cooperative cancellation.
//!
//! The sampler never writes to an output stream itself. It calls a
//! [`SweepHandler`] after initialization and after every sweep, and asks
//! it at a fixed cadence whether the run should stop.
//!
//! Handlers compose: a tuple of handlers is a handler, so
//! `(ProgressBar::new(), flag.clone())` draws a bar and honours a
//! cancel flag at the same time.

use crate::sampler::Termination;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shape of the run, passed once before the first sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerInit {
    /// Number of documents `D`
    pub num_documents: usize,
    /// Upper bound on clusters `K`
    pub num_clusters: usize,
    /// Upper bound on sweeps `I`
    pub max_sweeps: usize,
    /// Active clusters right after the random initial assignment
    pub active_clusters: usize,
}

/// What happened during one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Zero-based sweep index
    pub sweep: usize,
    /// Upper bound on sweeps `I`
    pub max_sweeps: usize,
    /// Clusters holding at least one document after the sweep
    pub active_clusters: usize,
    /// Documents whose cluster changed during the sweep
    pub moves: usize,
}

impl SweepSummary {
    /// Fraction of the sweep budget used so far, in `(0, 1]`.
    pub fn fraction(&self) -> f64 {
        (self.sweep + 1) as f64 / self.max_sweeps as f64
    }
}

/// Observer of a sampler run.
///
/// Every method has a no-op default.
pub trait SweepHandler {
    /// Called once after the initial assignment, before the first sweep.
    fn sampler_init(&mut self, _init: &SamplerInit) {}

    /// Called after every completed sweep.
    fn sweep_complete(&mut self, _summary: &SweepSummary) {}

    /// Should the sampler stop.
    ///
    /// Polled every `cancel_check_interval` sweeps, never per document.
    fn stop_sampler(&self) -> bool {
        false
    }

    /// Called once when the run ends, whether it succeeded or not.
    fn finalize(&mut self, _termination: &Termination) {}
}

impl SweepHandler for () {}

impl<H: SweepHandler + ?Sized> SweepHandler for &mut H {
    fn sampler_init(&mut self, init: &SamplerInit) {
        (**self).sampler_init(init);
    }

    fn sweep_complete(&mut self, summary: &SweepSummary) {
        (**self).sweep_complete(summary);
    }

    fn stop_sampler(&self) -> bool {
        (**self).stop_sampler()
    }

    fn finalize(&mut self, termination: &Termination) {
        (**self).finalize(termination);
    }
}

macro_rules! impl_tuple {
($($idx:tt $t:tt),+) => {
    impl<$($t,)+> SweepHandler for ($($t,)+)
    where
        $($t: SweepHandler,)+
    {
        fn sampler_init(&mut self, init: &SamplerInit) {
            $(
                self.$idx.sampler_init(init);
            )+
        }

        fn sweep_complete(&mut self, summary: &SweepSummary) {
            $(
                self.$idx.sweep_complete(summary);
            )+
        }

        fn stop_sampler(&self) -> bool {
            $(
                self.$idx.stop_sampler()
            )||+
        }

        fn finalize(&mut self, termination: &Termination) {
            $(
                self.$idx.finalize(termination);
            )+
        }
    }
};
}

impl_tuple!(0 A, 1 B, 2 C, 3 D);
impl_tuple!(0 A, 1 B, 2 C);
impl_tuple!(0 A, 1 B);
impl_tuple!(0 A);

/// Text progress bar on stderr: 50 characters wide, percentage 0-100,
/// redrawn in place.
///
/// Jumps to 100% when the sampler converges early.
#[derive(Default)]
pub enum ProgressBar {
    /// Not drawn yet
    #[default]
    UnInitialized,
    /// Drawing
    Initialized(indicatif::ProgressBar),
}

impl ProgressBar {
    /// A bar that is drawn once the sampler starts.
    pub fn new() -> Self {
        Self::UnInitialized
    }
}

impl SweepHandler for ProgressBar {
    fn sampler_init(&mut self, _init: &SamplerInit) {
        let pb = indicatif::ProgressBar::new(100);
        if let Ok(style) = indicatif::ProgressStyle::default_bar().template("[{bar:50}] {pos:>3}%")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        *self = Self::Initialized(pb);
    }

    fn sweep_complete(&mut self, summary: &SweepSummary) {
        if let Self::Initialized(pb) = self {
            pb.set_position((summary.fraction() * 100.0) as u64);
        }
    }

    fn finalize(&mut self, termination: &Termination) {
        if let Self::Initialized(pb) = self {
            match termination {
                Termination::Cancelled { .. } | Termination::Aborted { .. } => pb.abandon(),
                _ => {
                    pb.set_position(100);
                    pb.finish();
                }
            }
        }
    }
}

/// Report progress through the `log` crate every `every` sweeps.
#[derive(Debug, Clone)]
pub struct LogProgress {
    every: usize,
}

impl LogProgress {
    /// Log every `every` sweeps (at least every sweep).
    pub fn new(every: usize) -> Self {
        LogProgress {
            every: every.max(1),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SweepHandler for LogProgress {
    fn sampler_init(&mut self, init: &SamplerInit) {
        info!(
            "GSDMM: D={}, K={}, max sweeps={}, initially active={}",
            init.num_documents, init.num_clusters, init.max_sweeps, init.active_clusters
        );
    }

    fn sweep_complete(&mut self, summary: &SweepSummary) {
        if summary.sweep % self.every == 0 {
            info!(
                "  sweep {}: active clusters={}, moves={} ({:.0}%)",
                summary.sweep,
                summary.active_clusters,
                summary.moves,
                summary.fraction() * 100.0
            );
        }
    }

    fn finalize(&mut self, termination: &Termination) {
        info!("GSDMM finished: {}", termination);
    }
}

/// Cancellation flag shared between the sampler and its caller.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// A flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the sampler to stop at its next cancellation check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether [`CancelFlag::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// The underlying atomic, e.g. for a signal handler.
    pub fn as_atomic(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

impl SweepHandler for CancelFlag {
    fn stop_sampler(&self) -> bool {
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        fractions: Vec<f64>,
        finalized: bool,
    }

    impl SweepHandler for Recorder {
        fn sweep_complete(&mut self, summary: &SweepSummary) {
            self.fractions.push(summary.fraction());
        }

        fn finalize(&mut self, _termination: &Termination) {
            self.finalized = true;
        }
    }

    #[test]
    fn test_fraction() {
        let summary = SweepSummary {
            sweep: 4,
            max_sweeps: 10,
            active_clusters: 3,
            moves: 0,
        };
        approx::assert_abs_diff_eq!(summary.fraction(), 0.5);
    }

    #[test]
    fn test_tuple_forwards_and_ors_stop() {
        let flag = CancelFlag::new();
        let mut handler = (Recorder::default(), flag.clone());
        assert!(!handler.stop_sampler());

        handler.sweep_complete(&SweepSummary {
            sweep: 0,
            max_sweeps: 2,
            active_clusters: 1,
            moves: 0,
        });
        flag.cancel();
        assert!(handler.stop_sampler());

        handler.finalize(&Termination::Cancelled { sweeps: 1 });
        assert_eq!(handler.0.fractions, vec![0.5]);
        assert!(handler.0.finalized);
    }

    #[test]
    fn test_cancel_flag_clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        other.cancel();
        assert!(flag.is_cancelled());
        assert!(flag.as_atomic().load(Ordering::Relaxed));
    }
}
