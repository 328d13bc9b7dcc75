//! Chain collaborator module.
//!
//! This module defines the capability traits the orchestrator calls, and
//! the two backends implementing them: a JSON-RPC client for real
//! endpoints and an in-memory ledger for `sim://` rehearsals.

mod traits;
mod types;
mod rpc;
mod simulated;

pub use traits::{ChainClients, ChainConnection, MetadataProgram, PoolProgram, TokenProgram};
pub use types::{
    AddLiquidityRequest, AssociatedAccountRequest, AuthorityType, CreateMetadataRequest,
    CreateMintRequest, CreatePoolRequest, CreatedPool, LockLiquidityRequest, MintToRequest,
    SetAuthorityRequest,
};
pub use rpc::RpcChain;
pub use simulated::{DEFAULT_AIRDROP_LAMPORTS, PoolSnapshot, SimulatedLedger};

use tracing::info;

use crate::config::NetworkConfig;
use crate::error::Result;

/// Endpoint scheme selecting the in-memory ledger.
pub const SIMULATED_SCHEME: &str = "sim://";

/// The backend serving one network.
#[derive(Debug)]
pub enum ChainBackend {
    /// JSON-RPC endpoint.
    Rpc(RpcChain),
    /// In-memory ledger.
    Simulated(SimulatedLedger),
}

impl ChainBackend {
    /// Creates the backend for a network endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn connect(network: &NetworkConfig, timeout_secs: u64) -> Result<Self> {
        if let Some(name) = network.endpoint.strip_prefix(SIMULATED_SCHEME) {
            info!("Using simulated ledger '{name}'");
            return Ok(Self::Simulated(SimulatedLedger::new(name)));
        }

        info!("Connecting to {}", network.endpoint);
        Ok(Self::Rpc(RpcChain::with_timeout(&network.endpoint, timeout_secs)?))
    }

    /// Borrows the backend as a set of collaborators.
    #[must_use]
    pub fn clients(&self) -> ChainClients<'_> {
        match self {
            Self::Rpc(rpc) => ChainClients {
                connection: rpc,
                token: rpc,
                metadata: rpc,
                pool: rpc,
            },
            Self::Simulated(ledger) => ChainClients {
                connection: ledger,
                token: ledger,
                metadata: ledger,
                pool: ledger,
            },
        }
    }

    /// Returns true for the in-memory ledger.
    #[must_use]
    pub const fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }
}
