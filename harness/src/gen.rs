use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod setup;
use crate::setup::{init_tracing, load_config, write_program};

#[derive(Parser, Debug)]
#[command(name = "phpsmith")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one generated program into a directory
    Generate {
        /// Seed for the generator
        #[arg(long)]
        seed: u64,
        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,
        /// Path to .toml generator configuration
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate { seed, out, config } => {
            let config = load_config(config.as_deref())?;
            let program = phpsmith::generate(seed, &config);
            write_program(&out, &program)?;
            info!(seed, dir = %out.display(), "wrote program");
        }
    }
    Ok(())
}
