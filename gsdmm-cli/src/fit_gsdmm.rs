use crate::common_io::*;

use gsdmm::{fit_with_handler, CancelFlag, GsdmmFit, GsdmmOptions, LogProgress, Termination};

use clap::Args;
use log::{info, warn};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct FitArgs {
    #[arg(
        required = true,
        help = "Tokenized documents (`.txt` or `.txt.gz`)",
        long_help = "Tokenized documents (`.txt` or `.txt.gz`).\n\
		     One document per line, whitespace-separated integer token ids.\n\
		     Lines starting with `#` are skipped; blank lines are empty documents."
    )]
    data_file: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header. Writes:\n\
		     {out}.assignments.tsv.gz (document, cluster),\n\
		     {out}.distribution.tsv.gz (token, cluster, count),\n\
		     {out}.summary.json"
    )]
    out: Box<str>,

    #[arg(long, short = 'k', default_value_t = 8, help = "Maximum number of clusters")]
    num_clusters: usize,

    #[arg(long, short = 'i', default_value_t = 50, help = "Maximum number of sweeps")]
    max_sweeps: usize,

    #[arg(long, short = 'a', default_value_t = 0.1, help = "Prior on cluster sizes")]
    alpha: f64,

    #[arg(long, short = 'b', default_value_t = 0.1, help = "Prior on cluster token counts")]
    beta: f64,

    #[arg(
        long,
        help = "Vocabulary size",
        long_help = "Vocabulary size. Every token id must be below it.\n\
		     Default: one more than the largest id in the data."
    )]
    vocab_size: Option<usize>,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    seed: u64,

    #[arg(
        long,
        default_value_t = 25,
        help = "Sweeps before the convergence check starts"
    )]
    warmup: usize,

    #[arg(
        long,
        default_value_t = 64,
        help = "Compute cluster weights in parallel from this many clusters on"
    )]
    parallel_min_clusters: usize,

    #[arg(long, help = "Number of threads (default: all cores)")]
    threads: Option<usize>,

    #[arg(long, default_value_t = false, help = "Show a progress bar")]
    progress: bool,

    #[arg(long, default_value_t = 10, help = "Log the cluster count every this many sweeps")]
    log_every: usize,

    #[arg(
        long,
        default_value_t = 10,
        help = "Top tokens per cluster to list in the summary"
    )]
    top_n: usize,
}

#[derive(Serialize)]
struct ClusterSummary {
    cluster: usize,
    size: usize,
    top_tokens: Vec<(usize, usize)>,
}

#[derive(Serialize)]
struct FitSummary<'a> {
    data_file: &'a str,
    num_documents: usize,
    termination: Termination,
    sweeps: usize,
    converged: bool,
    active_clusters: usize,
    clusters: Vec<ClusterSummary>,
    options: &'a GsdmmOptions,
}

pub fn fit_gsdmm(args: &FitArgs) -> anyhow::Result<()> {
    let num_threads = args.threads.unwrap_or_else(num_cpus::get).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()?;
    info!("using {} threads", num_threads);

    mkdir(&args.out)?;

    let raw = read_token_lines(&args.data_file)?;
    let vocab_size = args
        .vocab_size
        .unwrap_or_else(|| implied_vocab_size(&raw));
    if vocab_size == 0 {
        anyhow::bail!(
            "no token ids found in {}; pass --vocab-size to cluster empty documents",
            args.data_file
        );
    }
    let documents = to_token_ids(&raw, vocab_size)?;
    info!(
        "read {} documents over {} token types from {}",
        documents.len(),
        vocab_size,
        args.data_file
    );

    let options = GsdmmOptions {
        max_sweeps: args.max_sweeps,
        num_clusters: args.num_clusters,
        alpha: args.alpha,
        beta: args.beta,
        vocab_size,
        seed: args.seed,
        show_progress: args.progress,
        warmup_sweeps: args.warmup,
        parallel_min_clusters: args.parallel_min_clusters,
        ..Default::default()
    };

    let flag = CancelFlag::new();
    {
        let flag = flag.clone();
        ctrlc::set_handler(move || {
            warn!("interrupted; stopping at the next cancellation check");
            flag.cancel();
        })?;
    }

    let handler = (flag, LogProgress::new(args.log_every));
    let fit = pool.install(|| fit_with_handler(&documents, &options, handler))?;
    info!("GSDMM {}", fit.termination);

    write_fit(&fit, args)?;
    Ok(())
}

fn write_fit(fit: &GsdmmFit, args: &FitArgs) -> anyhow::Result<()> {
    let assignments_file = format!("{}.assignments.tsv.gz", args.out);
    let lines: Vec<String> = std::iter::once("document\tcluster".to_string())
        .chain(
            fit.assignments
                .iter()
                .enumerate()
                .map(|(d, z)| format!("{}\t{}", d, z)),
        )
        .collect();
    write_types(&lines, &assignments_file)?;
    info!("wrote {}", assignments_file);

    let distribution_file = format!("{}.distribution.tsv.gz", args.out);
    let lines: Vec<String> = std::iter::once("token\tcluster\tcount".to_string())
        .chain(
            fit.distribution
                .iter()
                .map(|t| format!("{}\t{}\t{}", t.token, t.cluster, t.count)),
        )
        .collect();
    write_types(&lines, &distribution_file)?;
    info!("wrote {}", distribution_file);

    let clusters = fit
        .cluster_sizes()
        .iter()
        .enumerate()
        .filter(|(_, size)| **size > 0)
        .map(|(cluster, &size)| ClusterSummary {
            cluster,
            size,
            top_tokens: fit.top_tokens(cluster, args.top_n),
        })
        .collect();

    let summary = FitSummary {
        data_file: &args.data_file,
        num_documents: fit.assignments.len(),
        termination: fit.termination,
        sweeps: fit.sweeps(),
        converged: fit.converged(),
        active_clusters: fit.num_active_clusters(),
        clusters,
        options: fit.options(),
    };

    let summary_file = format!("{}.summary.json", args.out);
    let mut buf = open_buf_writer(&summary_file)?;
    serde_json::to_writer_pretty(&mut buf, &summary)?;
    buf.flush()?;
    info!("wrote {}", summary_file);
    Ok(())
}
