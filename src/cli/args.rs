//! Command-line argument parsing for ragtrace
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ragtrace - Retrieve knowledge-base context for a question, with a timed trace
#[derive(Parser, Debug)]
#[command(name = "ragtrace")]
#[command(version)]
#[command(about = "Retrieve knowledge-base context for a question, with a timed trace", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.ragtrace/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress logs and progress)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve chunks for a question
    Query {
        /// The question to retrieve context for
        #[arg(value_name = "TEXT")]
        text: String,

        /// Print the step-by-step trace (also enabled by RAG_DEBUG=1)
        #[arg(long)]
        trace: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Number of chunks to return
        #[arg(long)]
        top_k: Option<usize>,

        /// Overall deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print the formatted context block that would be sent to the model
    Context {
        /// The question to retrieve context for
        #[arg(value_name = "TEXT")]
        text: String,

        /// Number of chunks to include
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Default log filter when RUST_LOG is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "ragtrace=debug,warn",
            Verbosity::VeryVerbose => "debug",
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
