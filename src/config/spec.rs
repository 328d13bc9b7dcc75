//! Configuration specification types for the deployment system.
//!
//! This module defines all the structs that map to the `token.deploy.yaml` file.
//! A configuration is loaded once per run and never mutated afterwards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The root configuration structure for a token deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// Token parameters.
    pub token: TokenConfig,
    /// Network name to endpoint and program mapping.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Fee schedule used for balance prerequisites.
    #[serde(default)]
    pub fees: FeeSchedule,
    /// Allocation table for the distribution action.
    #[serde(default)]
    pub allocations: Vec<AllocationConfig>,
    /// Liquidity pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Execution settings.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Token-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenConfig {
    /// Human-readable token name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Number of decimal places.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Total supply in whole tokens.
    pub total_supply: u64,
    /// Off-chain metadata JSON URI.
    #[serde(default)]
    pub metadata_uri: Option<String>,
    /// Seller fee in basis points recorded in the metadata account.
    #[serde(default)]
    pub seller_fee_basis_points: u16,
    /// Whether the metadata account stays mutable after creation.
    #[serde(default = "default_true")]
    pub metadata_mutable: bool,
    /// Explicit mint address; derived from the `mint` credential when absent.
    #[serde(default)]
    pub mint_address: Option<String>,
    /// Whether `create-mint` sets a freeze authority.
    #[serde(default)]
    pub freeze_authority: bool,
}

/// Per-network settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// RPC endpoint URL (`sim://` selects the in-memory ledger).
    pub endpoint: String,
    /// Program addresses on this network.
    #[serde(default)]
    pub programs: ProgramAddresses,
}

/// Program addresses for one network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProgramAddresses {
    /// Token program.
    #[serde(default)]
    pub token: Option<String>,
    /// Metadata program.
    #[serde(default)]
    pub metadata: Option<String>,
    /// Liquidity pool program.
    #[serde(default)]
    pub pool: Option<String>,
}

/// Fee schedule in lamports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Estimated fee for each submitted step.
    #[serde(default = "default_step_fee")]
    pub per_step: u64,
    /// Rent for creating the mint account.
    #[serde(default = "default_mint_rent")]
    pub mint_rent: u64,
    /// Rent for creating the metadata account.
    #[serde(default = "default_metadata_rent")]
    pub metadata_rent: u64,
    /// Rent for creating each associated token account.
    #[serde(default = "default_account_rent")]
    pub account_rent: u64,
    /// Pool creation fee charged by the pool program.
    #[serde(default = "default_pool_fee")]
    pub pool_creation: u64,
    /// Balance the payer must keep after all fees.
    #[serde(default)]
    pub reserve: u64,
}

/// One allocation bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationConfig {
    /// Bucket name (e.g. `liquidity`, `team`).
    pub name: String,
    /// Fraction of total supply, in (0, 1].
    pub fraction: Decimal,
    /// Who receives the bucket, written `{ credential: name }` or `{ address: addr }`.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub recipient: Recipient,
    /// Human-readable purpose.
    #[serde(default)]
    pub purpose: String,
}

/// Recipient of an allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// Owner address taken from a named credential.
    Credential(String),
    /// Literal owner address.
    Address(String),
}

/// Liquidity pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Native currency seed in lamports.
    #[serde(default = "default_pool_lamports")]
    pub sol_lamports: u64,
    /// Allocation whose amount seeds the token side of the pool.
    #[serde(default = "default_pool_allocation")]
    pub token_allocation: String,
    /// Whether to lock the liquidity after adding it.
    #[serde(default = "default_true")]
    pub lock: bool,
    /// Lock duration in days.
    #[serde(default = "default_lock_days")]
    pub lock_days: u32,
}

/// Execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Delay between successive steps, in milliseconds.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Timeout for a single step, in seconds.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// HTTP request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where flooring remainders go.
    #[serde(default)]
    pub remainder: RemainderPolicy,
    /// Directory holding `<name>.json` keypair files.
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: String,
    /// Directory receiving deployment records.
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: String,
}

/// Policy for the units lost when flooring each allocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemainderPolicy {
    /// Leave the remainder unminted.
    #[default]
    Forfeit,
    /// Add the remainder to the first bucket in plan order.
    First,
    /// Add the remainder to the last bucket in plan order.
    Last,
}

// Default value functions

const fn default_decimals() -> u8 {
    9
}

const fn default_true() -> bool {
    true
}

const fn default_step_fee() -> u64 {
    5_000
}

const fn default_mint_rent() -> u64 {
    1_461_600
}

const fn default_metadata_rent() -> u64 {
    15_115_600
}

const fn default_account_rent() -> u64 {
    2_039_280
}

const fn default_pool_fee() -> u64 {
    400_000_000
}

const fn default_pool_lamports() -> u64 {
    1_000_000_000
}

const fn default_lock_days() -> u32 {
    365
}

const fn default_step_delay_ms() -> u64 {
    1_000
}

const fn default_step_timeout_secs() -> u64 {
    120
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_pool_allocation() -> String {
    String::from("liquidity")
}

fn default_credentials_dir() -> String {
    String::from("keys")
}

fn default_deployments_dir() -> String {
    String::from("deployments")
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            per_step: default_step_fee(),
            mint_rent: default_mint_rent(),
            metadata_rent: default_metadata_rent(),
            account_rent: default_account_rent(),
            pool_creation: default_pool_fee(),
            reserve: 0,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sol_lamports: default_pool_lamports(),
            token_allocation: default_pool_allocation(),
            lock: true,
            lock_days: default_lock_days(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            step_timeout_secs: default_step_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            remainder: RemainderPolicy::default(),
            credentials_dir: default_credentials_dir(),
            deployments_dir: default_deployments_dir(),
        }
    }
}

impl DeploymentConfig {
    /// Returns network names in sorted order.
    #[must_use]
    pub fn network_names(&self) -> Vec<&str> {
        self.networks.keys().map(String::as_str).collect()
    }

    /// Returns the sum of all allocation fractions.
    #[must_use]
    pub fn allocated_fraction(&self) -> Decimal {
        self.allocations.iter().map(|a| a.fraction).sum()
    }

    /// Finds an allocation by name.
    #[must_use]
    pub fn allocation(&self, name: &str) -> Option<&AllocationConfig> {
        self.allocations.iter().find(|a| a.name == name)
    }

    /// Returns the names of credentials referenced by allocation recipients.
    #[must_use]
    pub fn recipient_credentials(&self) -> Vec<&str> {
        self.allocations
            .iter()
            .filter_map(|a| match &a.recipient {
                Recipient::Credential(name) => Some(name.as_str()),
                Recipient::Address(_) => None,
            })
            .collect()
    }
}

impl TokenConfig {
    /// Returns `10^decimals`, or `None` if it overflows.
    #[must_use]
    pub fn unit_scale(&self) -> Option<u64> {
        10u64.checked_pow(u32::from(self.decimals))
    }

    /// Converts whole tokens to base units, or `None` on overflow.
    #[must_use]
    pub fn to_base_units(&self, tokens: u64) -> Option<u64> {
        self.unit_scale().and_then(|scale| tokens.checked_mul(scale))
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credential(name) => write!(f, "credential:{name}"),
            Self::Address(address) => write!(f, "{address}"),
        }
    }
}

impl std::fmt::Display for RemainderPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Forfeit => "forfeit",
            Self::First => "first",
            Self::Last => "last",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(decimals: u8) -> TokenConfig {
        TokenConfig {
            name: String::from("Test"),
            symbol: String::from("TST"),
            decimals,
            total_supply: 1_000,
            metadata_uri: None,
            seller_fee_basis_points: 0,
            metadata_mutable: true,
            mint_address: None,
            freeze_authority: false,
        }
    }

    #[test]
    fn test_base_units() {
        assert_eq!(token(9).to_base_units(5), Some(5_000_000_000));
        assert_eq!(token(0).to_base_units(5), Some(5));
    }

    #[test]
    fn test_base_units_overflow() {
        assert_eq!(token(20).unit_scale(), None);
        assert_eq!(token(9).to_base_units(u64::MAX), None);
    }

    #[test]
    fn test_recipient_map_forms() {
        let flow: AllocationConfig = serde_yaml::from_str(
            "{ name: team, fraction: 0.15, recipient: { credential: team } }",
        )
        .unwrap();
        assert_eq!(flow.recipient, Recipient::Credential(String::from("team")));
        assert_eq!(flow.fraction, Decimal::new(15, 2));

        let block: AllocationConfig =
            serde_yaml::from_str("name: community\nfraction: 0.3\nrecipient:\n  address: c0ffee\n")
                .unwrap();
        assert_eq!(block.recipient, Recipient::Address(String::from("c0ffee")));
    }

    #[test]
    fn test_recipient_round_trips_through_yaml() {
        let allocation = AllocationConfig {
            name: String::from("team"),
            fraction: Decimal::new(1, 1),
            recipient: Recipient::Credential(String::from("team")),
            purpose: String::new(),
        };
        let yaml = serde_yaml::to_string(&allocation).unwrap();
        assert!(yaml.contains("credential: team"));
        let parsed: AllocationConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, allocation);
    }

    #[test]
    fn test_recipient_display() {
        assert_eq!(Recipient::Credential(String::from("team")).to_string(), "credential:team");
        assert_eq!(Recipient::Address(String::from("abc")).to_string(), "abc");
    }
}
