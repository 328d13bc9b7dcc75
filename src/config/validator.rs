//! Configuration validation for deployment configs.
//!
//! This module validates a parsed configuration before any credential is
//! read or any network call is made, so a bad allocation table fails fast.

use crate::credentials::is_valid_credential_name;
use crate::error::{ConfigError, DeployError, Result};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

use super::spec::{AllocationConfig, DeploymentConfig, NetworkConfig, Recipient, TokenConfig};

/// URL schemes accepted for network endpoints.
const ENDPOINT_SCHEMES: &[&str] = &["http://", "https://", "sim://"];

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a deployment configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &DeploymentConfig) -> Result<ValidationResult> {
        let result = self.collect(config);

        if let Some(first_error) = result.errors.first() {
            return Err(DeployError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Runs every check and collects errors and warnings without failing.
    #[must_use]
    pub fn collect(&self, config: &DeploymentConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_token(&config.token, &mut result);
        Self::validate_networks(config, &mut result);
        Self::validate_allocations(&config.allocations, &mut result);
        Self::validate_pool(config, &mut result);

        if config.execution.step_timeout_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("execution.step_timeout_secs"),
                message: String::from("Step timeout must be greater than zero"),
            });
        }

        result
    }

    /// Validates token configuration.
    fn validate_token(token: &TokenConfig, result: &mut ValidationResult) {
        if token.name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("token.name"),
                message: String::from("Token name cannot be empty"),
            });
        }

        if token.symbol.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("token.symbol"),
                message: String::from("Token symbol cannot be empty"),
            });
        } else if token.symbol.len() > 10 {
            result.errors.push(ValidationError {
                field: String::from("token.symbol"),
                message: format!("Token symbol '{}' exceeds 10 characters", token.symbol),
            });
        }

        if token.total_supply == 0 {
            result.errors.push(ValidationError {
                field: String::from("token.total_supply"),
                message: String::from("Total supply must be greater than zero"),
            });
        } else if token.to_base_units(token.total_supply).is_none() {
            result.errors.push(ValidationError {
                field: String::from("token.total_supply"),
                message: format!(
                    "Total supply {} with {} decimals does not fit in 64-bit base units",
                    token.total_supply, token.decimals
                ),
            });
        }

        if token.seller_fee_basis_points > 10_000 {
            result.errors.push(ValidationError {
                field: String::from("token.seller_fee_basis_points"),
                message: String::from("Seller fee cannot exceed 10000 basis points"),
            });
        }

        if token.metadata_uri.is_none() {
            result
                .warnings
                .push(String::from("token.metadata_uri is not set; the metadata action will fail"));
        }
    }

    /// Validates network configuration.
    fn validate_networks(config: &DeploymentConfig, result: &mut ValidationResult) {
        if config.networks.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("networks"),
                message: String::from("At least one network must be defined"),
            });
            return;
        }

        for (name, network) in &config.networks {
            Self::validate_network(name, network, result);
        }
    }

    fn validate_network(name: &str, network: &NetworkConfig, result: &mut ValidationResult) {
        let field = format!("networks.{name}.endpoint");

        if network.endpoint.trim().is_empty() {
            result.errors.push(ValidationError {
                field,
                message: format!("Network '{name}' has an empty endpoint"),
            });
        } else if !ENDPOINT_SCHEMES
            .iter()
            .any(|scheme| network.endpoint.starts_with(scheme))
        {
            result.errors.push(ValidationError {
                field,
                message: format!(
                    "Network '{name}' endpoint '{}' must start with http://, https:// or sim://",
                    network.endpoint
                ),
            });
        }
    }

    /// Validates the allocation table.
    fn validate_allocations(allocations: &[AllocationConfig], result: &mut ValidationResult) {
        if allocations.is_empty() {
            result
                .warnings
                .push(String::from("No allocations defined; the mint action needs --amount"));
            return;
        }

        let mut seen_names = HashSet::new();
        let mut total = Decimal::ZERO;

        for (i, allocation) in allocations.iter().enumerate() {
            let prefix = format!("allocations[{i}]");

            if allocation.name.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: String::from("Allocation name cannot be empty"),
                });
            } else if !seen_names.insert(allocation.name.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: ConfigError::DuplicateAllocation {
                        name: allocation.name.clone(),
                    }
                    .to_string(),
                });
            }

            if allocation.fraction <= Decimal::ZERO || allocation.fraction > Decimal::ONE {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.fraction"),
                    message: format!(
                        "Allocation '{}' fraction {} must be in (0, 1]",
                        allocation.name, allocation.fraction
                    ),
                });
            }

            let recipient_empty = match &allocation.recipient {
                Recipient::Credential(name) | Recipient::Address(name) => name.trim().is_empty(),
            };
            if recipient_empty {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.recipient"),
                    message: format!("Allocation '{}' has an empty recipient", allocation.name),
                });
            } else if let Recipient::Credential(name) = &allocation.recipient
                && !is_valid_credential_name(name)
            {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.recipient.credential"),
                    message: format!(
                        "Credential name '{name}' must not contain path separators or '..'"
                    ),
                });
            }

            total += allocation.fraction;
        }

        if total > Decimal::ONE {
            result.errors.push(ValidationError {
                field: String::from("allocations"),
                message: format!("Allocation fractions sum to {total}, which exceeds 1"),
            });
        } else if total < Decimal::ONE {
            result.warnings.push(format!(
                "Allocation fractions sum to {total}; {} of supply stays unminted",
                Decimal::ONE - total
            ));
        }
    }

    /// Validates pool configuration.
    fn validate_pool(config: &DeploymentConfig, result: &mut ValidationResult) {
        if !config.allocations.is_empty() && config.allocation(&config.pool.token_allocation).is_none()
        {
            result.warnings.push(format!(
                "pool.token_allocation '{}' does not match any allocation",
                config.pool.token_allocation
            ));
        }

        if config.pool.lock && config.pool.lock_days == 0 {
            result.errors.push(ValidationError {
                field: String::from("pool.lock_days"),
                message: String::from("Lock duration must be at least one day when lock is enabled"),
            });
        }
    }
}

impl ValidationResult {
    /// Returns true if there are no errors.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
