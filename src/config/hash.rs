//! Configuration hashing for audit records.
//!
//! Every deployment record carries the hash of the configuration it ran
//! with, so a record can be tied back to the exact allocation table used.

use sha2::{Digest, Sha256};

use super::spec::{AllocationConfig, DeploymentConfig, Recipient};

/// Hasher for computing configuration hashes.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire deployment configuration.
    ///
    /// This hash changes when any part of the configuration changes.
    #[must_use]
    pub fn hash_config(&self, config: &DeploymentConfig) -> String {
        let mut hasher = Sha256::new();

        // Token parameters
        hasher.update(config.token.name.as_bytes());
        hasher.update(config.token.symbol.as_bytes());
        hasher.update([config.token.decimals]);
        hasher.update(config.token.total_supply.to_be_bytes());
        if let Some(uri) = &config.token.metadata_uri {
            hasher.update(uri.as_bytes());
        }
        if let Some(mint) = &config.token.mint_address {
            hasher.update(mint.as_bytes());
        }

        // Networks (BTreeMap iteration is sorted)
        for (name, network) in &config.networks {
            hasher.update(name.as_bytes());
            hasher.update(network.endpoint.as_bytes());
        }

        // Allocations in declaration order
        for allocation in &config.allocations {
            hasher.update(self.hash_allocation(allocation).as_bytes());
        }

        // Pool
        hasher.update(config.pool.sol_lamports.to_be_bytes());
        hasher.update(config.pool.token_allocation.as_bytes());
        hasher.update([u8::from(config.pool.lock)]);
        hasher.update(config.pool.lock_days.to_be_bytes());

        hasher.update(config.execution.remainder.to_string().as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for a single allocation.
    #[must_use]
    pub fn hash_allocation(&self, allocation: &AllocationConfig) -> String {
        let mut hasher = Sha256::new();

        hasher.update(allocation.name.as_bytes());
        // Normalised so that 0.40 and 0.4 hash identically.
        hasher.update(allocation.fraction.normalize().to_string().as_bytes());
        match &allocation.recipient {
            Recipient::Credential(name) => {
                hasher.update(b"credential:");
                hasher.update(name.as_bytes());
            }
            Recipient::Address(address) => {
                hasher.update(b"address:");
                hasher.update(address.as_bytes());
            }
        }

        hex::encode(hasher.finalize())
    }

    /// Returns true if two configurations hash identically.
    #[must_use]
    pub fn configs_equal(&self, a: &DeploymentConfig, b: &DeploymentConfig) -> bool {
        self.hash_config(a) == self.hash_config(b)
    }
}
