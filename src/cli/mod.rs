//! CLI module for the `tokendeploy` tool.
//!
//! This module provides the command-line interface for running
//! deployment actions against a configured network.

mod commands;
mod output;

pub use commands::{Cli, Commands, LAMPORTS_PER_SOL, OutputFormat, sol_to_lamports};
pub use output::OutputFormatter;
