// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Token Deployer
//!
//! A configuration-driven, idempotent orchestrator for fungible token launches.
//!
//! ## Overview
//!
//! Each invocation runs one action against one network:
//!
//! - `create-mint`: create the token mint
//! - `metadata`: attach name, symbol and URI metadata
//! - `mint`: distribute the configured allocations (or a single amount)
//! - `pool`: create the liquidity pool, add liquidity, optionally lock it
//! - `revoke`: give up the mint (and freeze) authority
//!
//! ## Architecture
//!
//! Every action follows the same pipeline:
//!
//! 1. **Plan**: computed deterministically from `token.deploy.yaml`
//! 2. **Dry run**: rendered and returned without touching the chain
//! 3. **Execute**: credentials loaded, prerequisites checked, steps run in order
//! 4. **Record**: results written to a timestamped JSON file that is never overwritten
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing, validation and hashing
//! - [`credentials`]: Keypair file loading
//! - [`chain`]: Chain collaborator traits, JSON-RPC client and simulated ledger
//! - [`planner`]: Allocation arithmetic, plans and plan execution
//! - [`prerequisites`]: Pre-execution checks
//! - [`record`]: Deployment records and run locks
//! - [`orchestrator`]: The per-action pipeline
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! token:
//!   name: Example
//!   symbol: EXM
//!   decimals: 6
//!   total_supply: 100000000
//!   metadata_uri: https://example.com/meta.json
//!
//! networks:
//!   devnet:
//!     endpoint: https://api.devnet.solana.com
//!   rehearsal:
//!     endpoint: sim://rehearsal
//!
//! allocations:
//!   - { name: liquidity, fraction: 0.4, recipient: { credential: payer } }
//!   - { name: team, fraction: 0.15, recipient: { credential: team } }
//!   - { name: community, fraction: 0.45, recipient: { address: 9f3c... } }
//!
//! pool:
//!   sol_lamports: 2000000000
//!   lock_days: 30
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod chain;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod prerequisites;
pub mod record;

// ============================================================================
// Re-exports
// ============================================================================

pub use chain::{ChainBackend, ChainClients, RpcChain, SimulatedLedger};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, DeploymentConfig};
pub use credentials::{Credentials, load_credentials};
pub use error::{DeployError, Result};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport};
pub use planner::{ActionRequest, DeployAction, ExecutionPlan, PlanExecutor, compute_allocations};
pub use prerequisites::{PrerequisiteChecker, PrerequisiteReport, Requirements};
pub use record::{DeploymentRecord, LocalRecordStore, RecordStore, StepResult};
