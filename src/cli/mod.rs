//! CLI module for SurveyLens
//!
//! Provides command-line access to the analytics core:
//! - parse: Question to intent
//! - plan: Intent to explained plan
//! - query: Checked execution over a responses file
//! - estimate: Design-based estimate over a responses file
//! - next: Adaptive field selection
//! - suggest: Question suggestions

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, CommonArgs, Command, DataArgs};
pub use commands::{
    estimate, next, parse, plan, query, run, run_command, suggest_questions, Environment,
    EstimateRequest, NextRequest, QuestionRequest, Reply, SuggestRequest,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_request, read_request, write_error, write_response};
