//! Crest command-line interface.
//!
//! Run wavefront sweeps, compare result files, and benchmark strategies:
//! ```sh
//! crest run sequential 1024
//! crest run farm 1024 --units 8
//! crest compare outputs/sequential_1024.txt outputs/farm_1024.txt
//! crest bench sweep.toml
//! ```

mod config;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::StrategyChoice;

#[derive(Parser)]
#[command(name = "crest")]
#[command(about = "Crest: wavefront matrix computation engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sweep and write its result file.
    Run {
        /// Execution strategy.
        #[arg(value_enum)]
        strategy: StrategyChoice,
        /// Matrix dimension n.
        n: usize,
        /// Worker threads for the farm, ranks for cluster strategies.
        /// Ignored by the sequential strategy.
        #[arg(short, long, default_value_t = 1)]
        units: usize,
        /// Directory result files are written to.
        #[arg(short, long, default_value = "outputs")]
        output: PathBuf,
    },
    /// Compare result files cell by cell for exact equality.
    Compare {
        /// Result files to compare.
        #[arg(num_args = 2.., required = true)]
        files: Vec<PathBuf>,
    },
    /// Run a timing sweep from a TOML configuration file.
    Bench {
        /// Path to the sweep configuration file.
        config: PathBuf,
        /// Output directory (overrides the config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            strategy,
            n,
            units,
            output,
        } => runner::run(strategy, n, units, &output),
        Commands::Compare { files } => {
            if runner::compare(&files)? {
                println!("The matrices are equal.");
                Ok(())
            } else {
                println!("The matrices are not equal.");
                std::process::exit(1);
            }
        }
        Commands::Bench { config, output } => {
            let sweep = config::load_config(&config)?;
            println!("Sweep configuration: {}", config.display());
            runner::bench(&sweep, output)
        }
    }
}
