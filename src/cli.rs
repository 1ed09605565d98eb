// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "aurora-server",
    about = "Agentic incident-response and remediation platform for SREs",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the config file (overrides auto-discovery).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway: webhook ingress, live-session WebSocket endpoint,
    /// and the background RCA worker pool.
    ///
    /// Runs until the process receives SIGINT/SIGTERM. A bearer token is
    /// generated on first run and printed once; see `regenerate-token` to
    /// rotate it.
    Serve,

    /// Regenerate the HTTP bearer token. The new token is printed once; the
    /// old token is immediately invalidated.
    RegenerateToken,

    /// Print the effective configuration (YAML) and exit.
    ShowConfig,

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "aurora-server", &mut std::io::stdout());
}
