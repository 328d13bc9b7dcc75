//! Request and response types exchanged with chain collaborators.

use serde::{Deserialize, Serialize};

/// Request to create a new mint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateMintRequest {
    /// Fee payer address.
    pub payer: String,
    /// Address of the new mint account.
    pub mint: String,
    /// Decimal places.
    pub decimals: u8,
    /// Initial mint authority.
    pub mint_authority: String,
    /// Optional freeze authority.
    pub freeze_authority: Option<String>,
}

/// Request to fetch or create an associated token account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedAccountRequest {
    /// Fee payer address.
    pub payer: String,
    /// Mint address.
    pub mint: String,
    /// Owner of the token account.
    pub owner: String,
}

/// Request to mint tokens into an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MintToRequest {
    /// Fee payer address.
    pub payer: String,
    /// Mint address.
    pub mint: String,
    /// Destination token account.
    pub destination: String,
    /// Mint authority signing the instruction.
    pub authority: String,
    /// Amount in base units.
    pub amount: u64,
}

/// Authority kinds that can be changed on a mint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthorityType {
    /// Authority to mint new tokens.
    MintTokens,
    /// Authority to freeze token accounts.
    FreezeAccount,
}

/// Request to change or revoke an authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetAuthorityRequest {
    /// Fee payer address.
    pub payer: String,
    /// Mint whose authority changes.
    pub mint: String,
    /// Current authority.
    pub current_authority: String,
    /// Which authority.
    pub authority_type: AuthorityType,
    /// New authority; `None` revokes it permanently.
    pub new_authority: Option<String>,
}

/// Request to create a token metadata account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetadataRequest {
    /// Fee payer address.
    pub payer: String,
    /// Mint address.
    pub mint: String,
    /// Mint authority.
    pub mint_authority: String,
    /// Update authority of the metadata account.
    pub update_authority: String,
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Off-chain metadata URI.
    pub uri: String,
    /// Seller fee in basis points.
    pub seller_fee_basis_points: u16,
    /// Whether the metadata stays mutable.
    pub is_mutable: bool,
    /// Metadata program address, when the network overrides it.
    pub program: Option<String>,
}

/// Request to create a liquidity pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolRequest {
    /// Fee payer address.
    pub payer: String,
    /// Token mint paired against the native currency.
    pub mint: String,
    /// Pool program address, when the network overrides it.
    pub program: Option<String>,
}

/// Result of creating a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPool {
    /// Transaction signature.
    pub signature: String,
    /// Address of the new pool.
    pub pool: String,
}

/// Request to add liquidity to a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddLiquidityRequest {
    /// Fee payer and liquidity provider.
    pub payer: String,
    /// Pool address.
    pub pool: String,
    /// Token amount in base units.
    pub token_amount: u64,
    /// Native amount in lamports.
    pub lamports: u64,
}

/// Request to lock the provider's liquidity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockLiquidityRequest {
    /// Liquidity provider.
    pub payer: String,
    /// Pool address.
    pub pool: String,
    /// Lock duration in days.
    pub duration_days: u32,
}

impl std::fmt::Display for AuthorityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MintTokens => "mint",
            Self::FreezeAccount => "freeze",
        };
        write!(f, "{s}")
    }
}
