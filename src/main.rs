// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = aurora_config::load(cli.config.as_deref())?;
            aurora_gateway::gateway::run(config).await
        }
        Commands::RegenerateToken => aurora_gateway::gateway::regenerate_token(),
        Commands::ShowConfig => {
            let config = aurora_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Completions { shell } => {
            cli::print_completions(shell);
            Ok(())
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
