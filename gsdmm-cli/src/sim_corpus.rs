use crate::common_io::*;

use gsdmm::simulate::{simulate_corpus, SimArgs};

use clap::Args;
use log::info;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header. Writes:\n\
		     {out}.docs.txt.gz (one document per line),\n\
		     {out}.labels.txt.gz (planted cluster per document)"
    )]
    out: Box<str>,

    #[arg(long, short = 'n', default_value_t = 200, help = "Number of documents")]
    num_documents: usize,

    #[arg(long, short = 'k', default_value_t = 4, help = "Number of planted clusters")]
    num_clusters: usize,

    #[arg(long, default_value_t = 100, help = "Vocabulary size")]
    vocab_size: usize,

    #[arg(long, default_value_t = 8.0, help = "Average document length")]
    mean_length: f64,

    #[arg(
        long,
        default_value_t = 0.9,
        help = "Probability that a token comes from its cluster's block"
    )]
    purity: f64,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    rseed: u64,
}

pub fn simulate_corpus_files(args: &SimulateArgs) -> anyhow::Result<()> {
    mkdir(&args.out)?;

    let sim = simulate_corpus(&SimArgs {
        num_documents: args.num_documents,
        num_clusters: args.num_clusters,
        vocab_size: args.vocab_size,
        mean_length: args.mean_length,
        purity: args.purity,
        rseed: args.rseed,
    })?;

    let docs_file = format!("{}.docs.txt.gz", args.out);
    let lines: Vec<String> = sim
        .documents
        .iter()
        .map(|doc| {
            doc.iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    write_types(&lines, &docs_file)?;
    info!("wrote {} documents to {}", lines.len(), docs_file);

    let labels_file = format!("{}.labels.txt.gz", args.out);
    write_types(&sim.labels, &labels_file)?;
    info!("wrote {}", labels_file);

    Ok(())
}
