//! CLI argument definitions using clap
//!
//! Commands:
//! - surveylens parse --surveys <path>
//! - surveylens plan --surveys <path>
//! - surveylens query --surveys <path> --responses <path>
//! - surveylens estimate --surveys <path> --responses <path>
//! - surveylens next --surveys <path>
//! - surveylens suggest --surveys <path>
//!
//! The request itself is one JSON object on stdin.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// SurveyLens - natural-language analytics over survey responses
#[derive(Parser, Debug)]
#[command(name = "surveylens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Survey definition file, or a directory of them
    #[arg(long, default_value = "./surveys")]
    pub surveys: PathBuf,

    /// Path to configuration file; defaults apply when absent
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Options for commands that run against responses
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// JSON array of responses
    #[arg(long)]
    pub responses: PathBuf,

    /// Append audit records to this file instead of keeping them in memory
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a question into an intent
    Parse {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Build and explain the plan for a question
    Plan {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Answer a question with aggregated rows
    Query {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        data: DataArgs,
    },

    /// Estimate a question's target field with a confidence interval
    Estimate {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        data: DataArgs,
    },

    /// Choose the next field to ask
    Next {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Suggest questions for a partial input
    Suggest {
        #[command(flatten)]
        common: CommonArgs,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
