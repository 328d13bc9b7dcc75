//! Error types for the token deployment orchestrator.
//!
//! This module provides the error hierarchy for every phase of a run:
//! configuration, credentials, prerequisites, chain calls, plan steps, and
//! record persistence.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the deployment orchestrator.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential loading errors.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// A prerequisite check failed.
    #[error("Prerequisite failed: {0}")]
    Prerequisite(#[from] PrerequisiteError),

    /// Chain collaborator errors.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// A plan step failed under a stop-on-first-error policy.
    #[error("Step failed: {0}")]
    Step(#[from] StepError),

    /// Deployment record persistence errors.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The run was cancelled before all steps executed.
    #[error("Run cancelled after {completed} of {total} steps")]
    Cancelled {
        /// Steps attempted before cancellation.
        completed: usize,
        /// Steps in the plan.
        total: usize,
    },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// The requested network is not defined.
    #[error("Network '{network}' is not defined (available: {available})")]
    UnknownNetwork {
        /// Requested network name.
        network: String,
        /// Comma-separated list of configured networks.
        available: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate allocation definition.
    #[error("Duplicate allocation name: {name}")]
    DuplicateAllocation {
        /// The duplicated name.
        name: String,
    },
}

/// Credential loading errors.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A credential name would resolve outside the credential directory.
    #[error("Invalid credential name '{name}': must not contain path separators or '..'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A credential file exists but could not be read.
    #[error("Failed to read credential '{name}' from {path}: {message}")]
    Unreadable {
        /// Credential name.
        name: String,
        /// Path to the credential file.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },

    /// A credential file exists but is not a valid keypair.
    #[error("Malformed credential '{name}' at {path}: {message}")]
    Malformed {
        /// Credential name.
        name: String,
        /// Path to the credential file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },
}

/// Prerequisite check failures.
#[derive(Debug, Error)]
pub enum PrerequisiteError {
    /// The network endpoint did not answer.
    #[error("Endpoint {endpoint} is unreachable: {message}")]
    EndpointUnreachable {
        /// Endpoint URL.
        endpoint: String,
        /// Underlying error.
        message: String,
    },

    /// A required credential was not loaded.
    #[error("Missing required credential '{name}' (expected {path})")]
    MissingCredential {
        /// Credential name.
        name: String,
        /// Where the credential file was expected.
        path: PathBuf,
    },

    /// The mint does not exist on chain.
    #[error("Mint {address} does not exist on {network}; run create-mint first")]
    MintMissing {
        /// Mint address.
        address: String,
        /// Network name.
        network: String,
    },

    /// The mint already exists on chain.
    #[error("Mint {address} already exists on {network}")]
    MintAlreadyExists {
        /// Mint address.
        address: String,
        /// Network name.
        network: String,
    },

    /// The configured mint address is not the one `create-mint` would create.
    #[error("Configured mint address {configured} does not match the mint credential {credential}")]
    MintAddressMismatch {
        /// `token.mint_address`.
        configured: String,
        /// Address of the `mint` credential.
        credential: String,
    },

    /// An account balance is below what the plan needs.
    #[error("Insufficient {asset} balance for {account}: have {current}, need {required}")]
    InsufficientBalance {
        /// Account that was checked.
        account: String,
        /// Asset being measured (lamports or token units).
        asset: String,
        /// Current balance.
        current: u64,
        /// Required balance.
        required: u64,
    },

    /// No token account for the given owner and mint.
    #[error("No token account for owner {owner} and mint {mint}")]
    TokenAccountMissing {
        /// Owner address.
        owner: String,
        /// Mint address.
        mint: String,
    },

    /// A chain query failed while checking a prerequisite.
    #[error("Check '{check}' could not complete: {message}")]
    CheckFailed {
        /// Name of the check.
        check: String,
        /// Underlying error.
        message: String,
    },
}

/// Errors from chain collaborators (connection, token, metadata, pool).
#[derive(Debug, Error)]
pub enum ChainError {
    /// The endpoint returned a non-success HTTP status.
    #[error("Request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body or error text.
        message: String,
    },

    /// The endpoint returned a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the endpoint.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The requested account does not exist.
    #[error("Account not found: {address}")]
    AccountNotFound {
        /// Missing account address.
        address: String,
    },

    /// The operation was rejected by the program.
    #[error("Rejected: {message}")]
    Rejected {
        /// Rejection reason.
        message: String,
    },
}

/// Failure of a single plan step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The external call failed.
    #[error("Step {index} '{name}' failed: {message}")]
    Failed {
        /// Step index in the plan.
        index: usize,
        /// Step name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The step exceeded its timeout.
    #[error("Step {index} '{name}' timed out after {timeout_secs}s")]
    TimedOut {
        /// Step index in the plan.
        index: usize,
        /// Step name.
        name: String,
        /// Configured timeout.
        timeout_secs: u64,
    },

    /// The step needs an input an earlier step should have produced.
    #[error("Step {index} '{name}' is missing input: {input}")]
    MissingInput {
        /// Step index in the plan.
        index: usize,
        /// Step name.
        name: String,
        /// Description of the missing input.
        input: String,
    },
}

/// Deployment record persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The record directory could not be created.
    #[error("Failed to create directory {path}: {message}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },

    /// The record could not be written.
    #[error("Failed to write {path}: {message}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },

    /// The record could not be serialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// Another run holds the lock for this network.
    #[error("Network '{network}' is locked by {holder} since {since}")]
    LockedByOther {
        /// Network name.
        network: String,
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// The lock file could not be read or written.
    #[error("Lock error: {message}")]
    Lock {
        /// Description of the lock failure.
        message: String,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Chain(ChainError::RateLimited { .. } | ChainError::NetworkError { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Chain(ChainError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Chain(ChainError::NetworkError { .. }) => Some(1),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ChainError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

impl PersistenceError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = DeployError::Chain(ChainError::RateLimited { retry_after_secs: 7 });
        assert!(err.is_retryable());
        assert_eq!(err.retry_delay_secs(), Some(7));
    }

    #[test]
    fn test_prerequisite_is_not_retryable() {
        let err = DeployError::Prerequisite(PrerequisiteError::InsufficientBalance {
            account: String::from("payer"),
            asset: String::from("lamports"),
            current: 1,
            required: 2,
        });
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("have 1, need 2"));
    }
}
