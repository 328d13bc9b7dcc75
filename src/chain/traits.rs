//! Capability traits for the chain collaborators.
//!
//! The orchestrator only ever talks to the network through these traits.
//! Each call is awaited before the next one is issued.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{
    AddLiquidityRequest, AssociatedAccountRequest, CreateMetadataRequest, CreateMintRequest,
    CreatePoolRequest, CreatedPool, LockLiquidityRequest, MintToRequest, SetAuthorityRequest,
};

/// Read-only view of the network.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// Returns the node software version.
    async fn get_version(&self) -> Result<String>;

    /// Returns the current slot.
    async fn get_slot(&self) -> Result<u64>;

    /// Returns the native balance of an address, in lamports.
    async fn get_balance(&self, address: &str) -> Result<u64>;

    /// Returns the balance of a token account, in base units.
    async fn get_token_account_balance(&self, account: &str) -> Result<u64>;

    /// Returns true if an account exists at the address.
    async fn account_exists(&self, address: &str) -> Result<bool>;

    /// Finds the first token account of `owner` for `mint`.
    async fn find_token_account(&self, owner: &str, mint: &str) -> Result<Option<String>>;
}

/// Token program operations.
#[async_trait]
pub trait TokenProgram: Send + Sync {
    /// Creates a mint and returns the transaction signature.
    async fn create_mint(&self, request: &CreateMintRequest) -> Result<String>;

    /// Returns the associated token account address, creating it if needed.
    async fn get_or_create_associated_account(
        &self,
        request: &AssociatedAccountRequest,
    ) -> Result<String>;

    /// Mints tokens and returns the transaction signature.
    async fn mint_to(&self, request: &MintToRequest) -> Result<String>;

    /// Changes or revokes an authority and returns the transaction signature.
    async fn set_authority(&self, request: &SetAuthorityRequest) -> Result<String>;
}

/// Metadata program operations.
#[async_trait]
pub trait MetadataProgram: Send + Sync {
    /// Creates the metadata account and returns the transaction signature.
    async fn create_metadata_account_v3(&self, request: &CreateMetadataRequest) -> Result<String>;
}

/// Liquidity pool program operations.
#[async_trait]
pub trait PoolProgram: Send + Sync {
    /// Creates a pool.
    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<CreatedPool>;

    /// Adds liquidity and returns the transaction signature.
    async fn add_liquidity(&self, request: &AddLiquidityRequest) -> Result<String>;

    /// Locks liquidity and returns the transaction signature.
    async fn lock_liquidity(&self, request: &LockLiquidityRequest) -> Result<String>;
}

/// Borrowed set of collaborators used for one run.
#[derive(Clone, Copy)]
pub struct ChainClients<'a> {
    /// Network connection.
    pub connection: &'a dyn ChainConnection,
    /// Token program client.
    pub token: &'a dyn TokenProgram,
    /// Metadata program client.
    pub metadata: &'a dyn MetadataProgram,
    /// Pool program client.
    pub pool: &'a dyn PoolProgram,
}

impl std::fmt::Debug for ChainClients<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClients").finish_non_exhaustive()
    }
}
