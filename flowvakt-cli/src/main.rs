//! ## flowvakt-cli
//! **Per-flow traffic telemetry for one network interface**
//!
//! `flowvakt run` observes both directions of an interface and keeps a flow
//! table; `flowvakt interfaces` lists what can be captured.

use clap::Parser;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run_args) => commands::run(run_args).await,
        Commands::Interfaces => commands::interfaces(),
    }
}
