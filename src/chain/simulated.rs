//! In-memory ledger for rehearsing deployments.
//!
//! Selected by `sim://` endpoints. The ledger starts with a configurable
//! native balance per address and applies every write to its own state, so
//! a rehearsal run exercises the same prerequisite checks and step ordering
//! as a live one.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{ChainError, DeployError, Result};

use super::traits::{ChainConnection, MetadataProgram, PoolProgram, TokenProgram};
use super::types::{
    AddLiquidityRequest, AssociatedAccountRequest, AuthorityType, CreateMetadataRequest,
    CreateMintRequest, CreatePoolRequest, CreatedPool, LockLiquidityRequest, MintToRequest,
    SetAuthorityRequest,
};

/// Native balance every unknown address starts with (1000 SOL).
pub const DEFAULT_AIRDROP_LAMPORTS: u64 = 1_000_000_000_000;

/// Simulated mint state.
#[derive(Debug, Clone)]
struct SimMint {
    mint_authority: Option<String>,
    freeze_authority: Option<String>,
    supply: u64,
    metadata: bool,
}

/// Snapshot of a simulated pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Token reserve in base units.
    pub tokens: u64,
    /// Native reserve in lamports.
    pub lamports: u64,
    /// Lock duration, once locked.
    pub locked_days: Option<u32>,
}

#[derive(Debug, Default)]
struct LedgerState {
    slot: u64,
    sequence: u64,
    balances: HashMap<String, u64>,
    mints: HashMap<String, SimMint>,
    /// (owner, mint) -> token account address.
    token_accounts: BTreeMap<(String, String), String>,
    /// token account address -> balance.
    token_balances: HashMap<String, u64>,
    pools: HashMap<String, PoolSnapshot>,
}

/// In-memory ledger implementing every chain capability.
#[derive(Debug)]
pub struct SimulatedLedger {
    /// Name shown as the node version.
    name: String,
    /// Starting balance for unseen addresses.
    airdrop: u64,
    state: Mutex<LedgerState>,
}

impl SimulatedLedger {
    /// Creates a ledger identified by `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            airdrop: DEFAULT_AIRDROP_LAMPORTS,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Sets the starting native balance for unseen addresses.
    #[must_use]
    pub const fn with_airdrop(mut self, lamports: u64) -> Self {
        self.airdrop = lamports;
        self
    }

    /// Returns the total supply of a mint, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger lock is poisoned.
    pub fn mint_supply(&self, mint: &str) -> Result<Option<u64>> {
        Ok(self.lock()?.mints.get(mint).map(|m| m.supply))
    }

    /// Returns true if a mint still has a mint authority.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger lock is poisoned.
    pub fn has_mint_authority(&self, mint: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .mints
            .get(mint)
            .is_some_and(|m| m.mint_authority.is_some()))
    }

    /// Returns a snapshot of a pool, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger lock is poisoned.
    pub fn pool(&self, pool: &str) -> Result<Option<PoolSnapshot>> {
        Ok(self.lock()?.pools.get(pool).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| DeployError::internal("simulated ledger lock poisoned"))
    }

    /// Produces a deterministic signature and advances the slot.
    fn sign(state: &mut LedgerState, operation: &str, subject: &str) -> String {
        state.sequence += 1;
        state.slot += 1;

        let mut hasher = Sha256::new();
        hasher.update(state.sequence.to_be_bytes());
        hasher.update(operation.as_bytes());
        hasher.update(subject.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Debits a fee payer.
    fn charge(&self, state: &mut LedgerState, payer: &str, lamports: u64) -> Result<()> {
        let balance = state.balances.entry(payer.to_string()).or_insert(self.airdrop);
        *balance = balance.checked_sub(lamports).ok_or_else(|| {
            ChainError::rejected(format!("payer {payer} cannot cover {lamports} lamports"))
        })?;
        Ok(())
    }

    fn check_authority(actual: Option<&String>, signer: &str, kind: &str) -> Result<()> {
        match actual {
            Some(authority) if authority == signer => Ok(()),
            Some(authority) => Err(ChainError::rejected(format!(
                "{signer} is not the {kind} authority ({authority} is)"
            ))
            .into()),
            None => Err(ChainError::rejected(format!("{kind} authority has been revoked")).into()),
        }
    }
}

/// Lamports charged per simulated transaction.
const SIM_FEE: u64 = 5_000;

#[async_trait]
impl ChainConnection for SimulatedLedger {
    async fn get_version(&self) -> Result<String> {
        Ok(format!("simulated-{}", self.name))
    }

    async fn get_slot(&self) -> Result<u64> {
        Ok(self.lock()?.slot)
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        Ok(self
            .lock()?
            .balances
            .get(address)
            .copied()
            .unwrap_or(self.airdrop))
    }

    async fn get_token_account_balance(&self, account: &str) -> Result<u64> {
        self.lock()?
            .token_balances
            .get(account)
            .copied()
            .ok_or_else(|| {
                DeployError::Chain(ChainError::AccountNotFound {
                    address: account.to_string(),
                })
            })
    }

    async fn account_exists(&self, address: &str) -> Result<bool> {
        let state = self.lock()?;
        Ok(state.mints.contains_key(address)
            || state.token_balances.contains_key(address)
            || state.pools.contains_key(address))
    }

    async fn find_token_account(&self, owner: &str, mint: &str) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .token_accounts
            .get(&(owner.to_string(), mint.to_string()))
            .cloned())
    }
}

#[async_trait]
impl TokenProgram for SimulatedLedger {
    async fn create_mint(&self, request: &CreateMintRequest) -> Result<String> {
        let mut state = self.lock()?;
        if state.mints.contains_key(&request.mint) {
            return Err(ChainError::rejected(format!("mint {} already exists", request.mint)).into());
        }
        self.charge(&mut state, &request.payer, SIM_FEE)?;

        state.mints.insert(
            request.mint.clone(),
            SimMint {
                mint_authority: Some(request.mint_authority.clone()),
                freeze_authority: request.freeze_authority.clone(),
                supply: 0,
                metadata: false,
            },
        );
        debug!("Simulated mint created: {}", request.mint);
        Ok(Self::sign(&mut state, "create_mint", &request.mint))
    }

    async fn get_or_create_associated_account(
        &self,
        request: &AssociatedAccountRequest,
    ) -> Result<String> {
        let mut state = self.lock()?;
        if !state.mints.contains_key(&request.mint) {
            return Err(ChainError::AccountNotFound {
                address: request.mint.clone(),
            }
            .into());
        }

        let key = (request.owner.clone(), request.mint.clone());
        if let Some(existing) = state.token_accounts.get(&key) {
            return Ok(existing.clone());
        }

        self.charge(&mut state, &request.payer, SIM_FEE)?;
        let mut hasher = Sha256::new();
        hasher.update(request.owner.as_bytes());
        hasher.update(request.mint.as_bytes());
        let address = hex::encode(hasher.finalize());

        state.token_accounts.insert(key, address.clone());
        state.token_balances.insert(address.clone(), 0);
        Ok(address)
    }

    async fn mint_to(&self, request: &MintToRequest) -> Result<String> {
        let mut state = self.lock()?;
        let mint = state.mints.get(&request.mint).cloned().ok_or_else(|| {
            DeployError::Chain(ChainError::AccountNotFound {
                address: request.mint.clone(),
            })
        })?;
        Self::check_authority(mint.mint_authority.as_ref(), &request.authority, "mint")?;

        if !state.token_balances.contains_key(&request.destination) {
            return Err(ChainError::AccountNotFound {
                address: request.destination.clone(),
            }
            .into());
        }
        let supply = mint
            .supply
            .checked_add(request.amount)
            .ok_or_else(|| ChainError::rejected("supply overflow"))?;

        self.charge(&mut state, &request.payer, SIM_FEE)?;
        if let Some(m) = state.mints.get_mut(&request.mint) {
            m.supply = supply;
        }
        if let Some(balance) = state.token_balances.get_mut(&request.destination) {
            *balance += request.amount;
        }
        Ok(Self::sign(&mut state, "mint_to", &request.destination))
    }

    async fn set_authority(&self, request: &SetAuthorityRequest) -> Result<String> {
        let mut state = self.lock()?;
        let mint = state.mints.get(&request.mint).cloned().ok_or_else(|| {
            DeployError::Chain(ChainError::AccountNotFound {
                address: request.mint.clone(),
            })
        })?;

        let current = match request.authority_type {
            AuthorityType::MintTokens => mint.mint_authority.as_ref(),
            AuthorityType::FreezeAccount => mint.freeze_authority.as_ref(),
        };
        Self::check_authority(
            current,
            &request.current_authority,
            &request.authority_type.to_string(),
        )?;

        self.charge(&mut state, &request.payer, SIM_FEE)?;
        if let Some(m) = state.mints.get_mut(&request.mint) {
            match request.authority_type {
                AuthorityType::MintTokens => m.mint_authority.clone_from(&request.new_authority),
                AuthorityType::FreezeAccount => {
                    m.freeze_authority.clone_from(&request.new_authority);
                }
            }
        }
        Ok(Self::sign(&mut state, "set_authority", &request.mint))
    }
}

#[async_trait]
impl MetadataProgram for SimulatedLedger {
    async fn create_metadata_account_v3(&self, request: &CreateMetadataRequest) -> Result<String> {
        let mut state = self.lock()?;
        let mint = state.mints.get(&request.mint).cloned().ok_or_else(|| {
            DeployError::Chain(ChainError::AccountNotFound {
                address: request.mint.clone(),
            })
        })?;
        if mint.metadata {
            return Err(ChainError::rejected(format!(
                "metadata for {} already exists",
                request.mint
            ))
            .into());
        }
        Self::check_authority(mint.mint_authority.as_ref(), &request.mint_authority, "mint")?;

        self.charge(&mut state, &request.payer, SIM_FEE)?;
        if let Some(m) = state.mints.get_mut(&request.mint) {
            m.metadata = true;
        }
        Ok(Self::sign(&mut state, "create_metadata", &request.mint))
    }
}

#[async_trait]
impl PoolProgram for SimulatedLedger {
    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<CreatedPool> {
        let mut state = self.lock()?;
        if !state.mints.contains_key(&request.mint) {
            return Err(ChainError::AccountNotFound {
                address: request.mint.clone(),
            }
            .into());
        }
        self.charge(&mut state, &request.payer, SIM_FEE)?;

        let signature = Self::sign(&mut state, "create_pool", &request.mint);
        let pool = format!("pool-{}", &signature[..16]);
        state.pools.insert(pool.clone(), PoolSnapshot::default());
        Ok(CreatedPool { signature, pool })
    }

    async fn add_liquidity(&self, request: &AddLiquidityRequest) -> Result<String> {
        let mut state = self.lock()?;
        if !state.pools.contains_key(&request.pool) {
            return Err(ChainError::AccountNotFound {
                address: request.pool.clone(),
            }
            .into());
        }

        let fee = SIM_FEE
            .checked_add(request.lamports)
            .ok_or_else(|| ChainError::rejected("lamport overflow"))?;
        self.charge(&mut state, &request.payer, fee)?;

        if let Some(pool) = state.pools.get_mut(&request.pool) {
            pool.tokens += request.token_amount;
            pool.lamports += request.lamports;
        }
        Ok(Self::sign(&mut state, "add_liquidity", &request.pool))
    }

    async fn lock_liquidity(&self, request: &LockLiquidityRequest) -> Result<String> {
        let mut state = self.lock()?;
        let pool = state.pools.get(&request.pool).cloned().ok_or_else(|| {
            DeployError::Chain(ChainError::AccountNotFound {
                address: request.pool.clone(),
            })
        })?;
        if pool.lamports == 0 {
            return Err(ChainError::rejected("cannot lock an empty pool").into());
        }

        self.charge(&mut state, &request.payer, SIM_FEE)?;
        if let Some(p) = state.pools.get_mut(&request.pool) {
            p.locked_days = Some(request.duration_days);
        }
        Ok(Self::sign(&mut state, "lock_liquidity", &request.pool))
    }
}
