//! Argument parsing for the two subcommands the binary exposes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ralph", about = "Drive the Super-Ralph-Lite execution engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a fresh run against a config file and an already-written
    /// natural-language prompt file.
    Run {
        /// Path to the `config.toml`.
        config: PathBuf,
        /// Path to the prompt file describing the work to perform.
        prompt: PathBuf,
    },
    /// Re-attach to durable state from a previous run.
    Resume {
        /// Path to the `config.toml`.
        config: PathBuf,
        /// The run id to resume as (a fresh run id — durable state is
        /// found by scanning every prior run's output rows, not by
        /// reopening the old run id).
        run_id: String,
    },
}
