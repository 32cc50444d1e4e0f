// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "zen",
    about = "MCP server giving coding agents access to multiple AI models for chat, review, debugging and analysis",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase log verbosity (-v debug, -vv trace); logs go to stderr
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve MCP on stdin/stdout (the default when no subcommand is given)
    Serve,
    /// List the models available under the current configuration
    ListModels {
        /// Only show models of this provider
        #[arg(long)]
        provider: Option<String>,
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// List the tools the server would expose
    ListTools {
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration (credentials redacted)
    ShowConfig,
}
