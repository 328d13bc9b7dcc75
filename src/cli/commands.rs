//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::planner::ActionRequest;

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// tokendeploy - Configuration-driven token deployment orchestrator.
#[derive(Parser, Debug)]
#[command(name = "tokendeploy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Network to deploy to (key under `networks`).
    #[arg(short, long, global = true, default_value = "devnet", env = "TOKEN_DEPLOY_NETWORK")]
    pub network: String,

    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "TOKEN_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Compute and display the plan without executing it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Directory holding credential files.
    #[arg(long, global = true)]
    pub credentials_dir: Option<PathBuf>,

    /// Directory receiving deployment records.
    #[arg(long, global = true)]
    pub deployments_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the token mint.
    CreateMint,

    /// Attach name, symbol and URI metadata to the mint.
    Metadata,

    /// Mint the configured allocations to their recipients.
    Mint {
        /// Mint this many tokens to the payer instead of the allocations.
        #[arg(long)]
        amount: Option<u64>,
    },

    /// Create the liquidity pool and add liquidity.
    Pool {
        /// SOL to pair with the liquidity allocation (overrides config).
        #[arg(long)]
        sol_amount: Option<Decimal>,
    },

    /// Revoke the mint authority (and freeze authority if configured).
    Revoke,

    /// Validate the deployment configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    /// Maps a deployment command to its action request.
    ///
    /// Returns `Ok(None)` for commands that deploy nothing.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `--sol-amount` is negative or too large.
    pub fn action_request(&self) -> Result<Option<ActionRequest>> {
        let request = match self {
            Self::CreateMint => ActionRequest::CreateMint,
            Self::Metadata => ActionRequest::Metadata,
            Self::Mint { amount } => ActionRequest::Mint { amount: *amount },
            Self::Pool { sol_amount } => ActionRequest::Pool {
                sol_lamports: sol_amount.map(sol_to_lamports).transpose()?,
            },
            Self::Revoke => ActionRequest::Revoke,
            Self::Validate { .. } => return Ok(None),
        };

        Ok(Some(request))
    }
}

/// Converts a SOL amount to lamports, truncating sub-lamport digits.
///
/// # Errors
///
/// Returns a validation error for negative amounts or amounts that do not
/// fit in a `u64`.
pub fn sol_to_lamports(sol: Decimal) -> Result<u64> {
    if sol.is_sign_negative() {
        return Err(ConfigError::validation(format!("SOL amount must not be negative: {sol}"), "--sol-amount").into());
    }

    sol.checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .map(|lamports| lamports.floor())
        .and_then(|lamports| lamports.to_u64())
        .ok_or_else(|| ConfigError::validation(format!("SOL amount is too large: {sol}"), "--sol-amount").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tokendeploy", "create-mint"]).unwrap();
        assert_eq!(cli.network, "devnet");
        assert!(!cli.dry_run);
        assert_eq!(cli.output, OutputFormat::Text);
        assert_eq!(cli.command, Commands::CreateMint);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tokendeploy",
            "mint",
            "--amount",
            "500",
            "--network",
            "local",
            "--dry-run",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.network, "local");
        assert!(cli.dry_run);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.command, Commands::Mint { amount: Some(500) });
    }

    #[test]
    fn test_action_requests() {
        assert_eq!(
            Commands::Mint { amount: None }.action_request().unwrap(),
            Some(ActionRequest::Mint { amount: None })
        );
        assert_eq!(Commands::Revoke.action_request().unwrap(), Some(ActionRequest::Revoke));
        assert_eq!(Commands::Validate { warnings: false }.action_request().unwrap(), None);
    }

    #[test]
    fn test_pool_sol_amount_converts_to_lamports() {
        let cli = Cli::try_parse_from(["tokendeploy", "pool", "--sol-amount", "2.5"]).unwrap();
        assert_eq!(
            cli.command.action_request().unwrap(),
            Some(ActionRequest::Pool {
                sol_lamports: Some(2_500_000_000)
            })
        );
    }

    #[test]
    fn test_sol_to_lamports_truncates() {
        let sol = Decimal::from_str("0.0000000019").unwrap();
        assert_eq!(sol_to_lamports(sol).unwrap(), 1);
    }

    #[test]
    fn test_sol_to_lamports_rejects_negative() {
        let sol = Decimal::from_str("-1").unwrap();
        assert!(sol_to_lamports(sol).is_err());
    }

    #[test]
    fn test_invalid_output_format_is_rejected() {
        assert!(Cli::try_parse_from(["tokendeploy", "revoke", "--output", "yaml"]).is_err());
    }
}
