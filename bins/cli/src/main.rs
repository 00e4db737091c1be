//! `embranch` entry point.

use clap::{Parser, Subcommand};

mod commands;

/// Versioned document-and-embedding store bridging Dolt and a vector store.
#[derive(Debug, Parser)]
#[command(name = "embranch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective configuration.
    Config {
        /// Emit JSON instead of pretty text.
        #[arg(long)]
        json: bool,
    },
    /// Report repository and sync status.
    Status,
    /// Run the startup initializer once and report the outcome.
    Init,
    /// Serve tools over stdin/stdout (one JSON object per line).
    Serve,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Command::Config { json } => commands::config::run(json),
            Command::Status => commands::status::run().await,
            Command::Init => commands::init::run().await,
            Command::Serve => commands::serve::run().await,
        }
    })
}
