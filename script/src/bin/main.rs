//! Local utility CLI for the shielded mining client.
//!
//! ```shell
//! sacred-miner note new --instance 0x...
//! sacred-miner note parse <note> --instance 0x... --deposit-block 100
//! sacred-miner account new
//! sacred-miner account decode <base64>
//! sacred-miner account unseal --key 0x... <payload>
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

use sacred_mining_client::commands::{AccountCommand, NoteCommand};

#[derive(Parser)]
#[command(
    name = "sacred-miner",
    about = "Shielded account and note utilities for the anonymity mining pools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and inspect deposit notes
    Note(NoteCommand),
    /// Create and inspect shielded accounts
    Account(AccountCommand),
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Note(cmd) => cmd.execute().await,
        Commands::Account(cmd) => cmd.execute().await,
    };

    if let Err(err) = result {
        eprintln!("{} {err:#}", "error:".bright_red().bold());
        process::exit(1);
    }
}
