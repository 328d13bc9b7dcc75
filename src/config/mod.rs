//! Configuration module for the token deployment orchestrator.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `token.deploy.yaml`
//! - Validation of configuration values
//! - Computing configuration hashes for audit records

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    AllocationConfig, DeploymentConfig, ExecutionConfig, FeeSchedule, NetworkConfig, PoolConfig,
    ProgramAddresses, Recipient, RemainderPolicy, TokenConfig,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file, select_network};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::ConfigHasher;
