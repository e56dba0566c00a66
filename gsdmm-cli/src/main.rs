mod common_io;
mod fit_gsdmm;
mod sim_corpus;

use fit_gsdmm::*;
use sim_corpus::*;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

#[derive(Parser, Debug)]
#[command(
    name = "gsdmm",
    version,
    about = "GSDMM",
    long_about = "Gibbs Sampling Dirichlet Multinomial Mixture for short texts.\n\
		  Documents are given as one line of whitespace-separated\n\
		  integer token ids each (plain text or `.gz`)."
)]
struct Cli {
    #[arg(short = 'v', long, global = true, help = "Log progress at info level")]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Cluster tokenized documents",
        long_about = "Cluster tokenized documents by collapsed Gibbs sampling:\n\
		      (1) Assign every document to one of K clusters at random\n\
		      (2) Resample each document's cluster, sweep after sweep\n\
		      (3) Stop once the number of occupied clusters settles.\n"
    )]
    Fit(FitArgs),

    #[command(
        about = "Simulate a planted short-text corpus",
        long_about = "Simulate documents from K planted clusters, each of which\n\
		      prefers its own contiguous block of the vocabulary.\n"
    )]
    Simulate(SimulateArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    match &cli.commands {
        Commands::Fit(args) => {
            fit_gsdmm(args)?;
        }
        Commands::Simulate(args) => {
            simulate_corpus_files(args)?;
        }
    }

    info!("Done");
    Ok(())
}
