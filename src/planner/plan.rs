//! Execution plan types and construction.
//!
//! A plan is an ordered list of steps for one action. Plans are pure
//! functions of the configuration and the action arguments: building the
//! same plan twice yields identical values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::AuthorityType;
use crate::config::{DeploymentConfig, Recipient};
use crate::credentials::PAYER;
use crate::error::{ConfigError, DeployError, Result};

use super::allocation::compute_allocations;

/// Deployment action selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployAction {
    /// Create the mint account.
    CreateMint,
    /// Create the metadata account.
    Metadata,
    /// Mint and distribute supply.
    Mint,
    /// Create and seed the liquidity pool.
    Pool,
    /// Revoke supply authorities.
    Revoke,
}

/// What happens to the remaining steps after one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Attempt every step; failures are recorded.
    ContinueOnError,
    /// Abort at the first failure; later steps are not attempted.
    StopOnFirstError,
}

/// What a step does on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Create the mint.
    CreateMint {
        /// Decimal places.
        decimals: u8,
        /// Whether the payer becomes freeze authority.
        freeze_authority: bool,
    },
    /// Create the metadata account.
    CreateMetadata {
        /// Token name.
        name: String,
        /// Token symbol.
        symbol: String,
        /// Metadata URI.
        uri: String,
    },
    /// Mint tokens to a recipient's associated account.
    MintTo {
        /// Who receives the tokens.
        recipient: Recipient,
    },
    /// Revoke one authority of the mint.
    RevokeAuthority {
        /// Authority being revoked.
        authority: AuthorityType,
    },
    /// Create the liquidity pool.
    CreatePool,
    /// Seed the pool with tokens and native currency.
    AddLiquidity {
        /// Native currency amount in lamports.
        lamports: u64,
    },
    /// Lock the pool liquidity.
    LockLiquidity {
        /// Lock duration.
        days: u32,
    },
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    /// Position in the plan, starting at 0.
    pub index: usize,
    /// Identifying name.
    pub name: String,
    /// Operation to perform.
    pub kind: StepKind,
    /// Token amount in whole tokens; 0 when the step moves no tokens.
    pub amount: u64,
    /// Recipient or target, for display.
    pub target: String,
    /// Share of total supply, when the step moves tokens.
    pub fraction: Option<Decimal>,
}

/// Ordered steps for one action on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// Action this plan implements.
    pub action: DeployAction,
    /// Network name.
    pub network: String,
    /// Token symbol.
    pub symbol: String,
    /// Total supply in whole tokens.
    pub total_supply: u64,
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
    /// Tokens left unassigned by allocation flooring.
    pub unallocated: u64,
}

/// Arguments selecting and tuning an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRequest {
    /// `create-mint`.
    CreateMint,
    /// `metadata`.
    Metadata,
    /// `mint`, optionally a single amount to the payer.
    Mint {
        /// Whole tokens to mint to the payer instead of distributing.
        amount: Option<u64>,
    },
    /// `pool`, optionally overriding the native seed.
    Pool {
        /// Native seed in lamports.
        sol_lamports: Option<u64>,
    },
    /// `revoke`.
    Revoke,
}

impl DeployAction {
    /// Returns the command-line name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateMint => "create-mint",
            Self::Metadata => "metadata",
            Self::Mint => "mint",
            Self::Pool => "pool",
            Self::Revoke => "revoke",
        }
    }

    /// Returns the failure policy for the action.
    ///
    /// Distribution keeps going so one bad recipient does not block the
    /// rest; every other action is a dependent pipeline.
    #[must_use]
    pub const fn failure_policy(self) -> FailurePolicy {
        match self {
            Self::Mint => FailurePolicy::ContinueOnError,
            Self::CreateMint | Self::Metadata | Self::Pool | Self::Revoke => {
                FailurePolicy::StopOnFirstError
            }
        }
    }

    /// Returns true if the action requires the mint to exist beforehand.
    #[must_use]
    pub const fn requires_existing_mint(self) -> bool {
        !matches!(self, Self::CreateMint)
    }
}

impl ActionRequest {
    /// Returns the action this request selects.
    #[must_use]
    pub const fn action(self) -> DeployAction {
        match self {
            Self::CreateMint => DeployAction::CreateMint,
            Self::Metadata => DeployAction::Metadata,
            Self::Mint { .. } => DeployAction::Mint,
            Self::Pool { .. } => DeployAction::Pool,
            Self::Revoke => DeployAction::Revoke,
        }
    }
}

fn share(amount: u64, total: u64) -> Option<Decimal> {
    if total == 0 {
        return None;
    }
    Decimal::from(amount).checked_div(Decimal::from(total))
}

impl ExecutionPlan {
    /// Builds the plan for a request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the action cannot be planned from
    /// the configuration (no allocations, no metadata URI, unknown pool
    /// allocation, zero amount).
    pub fn for_action(
        config: &DeploymentConfig,
        network: &str,
        request: ActionRequest,
    ) -> Result<Self> {
        match request {
            ActionRequest::CreateMint => Ok(Self::create_mint(config, network)),
            ActionRequest::Metadata => Self::metadata(config, network),
            ActionRequest::Mint { amount: None } => Self::distribution(config, network),
            ActionRequest::Mint {
                amount: Some(amount),
            } => Self::single_mint(config, network, amount),
            ActionRequest::Pool { sol_lamports } => Self::pool(config, network, sol_lamports),
            ActionRequest::Revoke => Ok(Self::revoke(config, network)),
        }
    }

    fn empty(config: &DeploymentConfig, network: &str, action: DeployAction) -> Self {
        Self {
            action,
            network: network.to_string(),
            symbol: config.token.symbol.clone(),
            total_supply: config.token.total_supply,
            steps: Vec::new(),
            unallocated: 0,
        }
    }

    fn push(&mut self, name: impl Into<String>, kind: StepKind, amount: u64, target: impl Into<String>) {
        let fraction = if amount > 0 {
            share(amount, self.total_supply)
        } else {
            None
        };
        self.steps.push(PlanStep {
            index: self.steps.len(),
            name: name.into(),
            kind,
            amount,
            target: target.into(),
            fraction,
        });
    }

    /// Plan for `create-mint`.
    #[must_use]
    pub fn create_mint(config: &DeploymentConfig, network: &str) -> Self {
        let mut plan = Self::empty(config, network, DeployAction::CreateMint);
        plan.push(
            "create mint",
            StepKind::CreateMint {
                decimals: config.token.decimals,
                freeze_authority: config.token.freeze_authority,
            },
            0,
            "credential:mint",
        );
        plan
    }

    /// Plan for `metadata`.
    ///
    /// # Errors
    ///
    /// Returns an error if `token.metadata_uri` is not configured.
    pub fn metadata(config: &DeploymentConfig, network: &str) -> Result<Self> {
        let uri = config.token.metadata_uri.clone().ok_or_else(|| {
            DeployError::Config(ConfigError::validation(
                "metadata action requires a metadata URI",
                "token.metadata_uri",
            ))
        })?;

        let mut plan = Self::empty(config, network, DeployAction::Metadata);
        plan.push(
            "create metadata",
            StepKind::CreateMetadata {
                name: config.token.name.clone(),
                symbol: config.token.symbol.clone(),
                uri: uri.clone(),
            },
            0,
            uri,
        );
        Ok(plan)
    }

    /// Plan for `mint` without `--amount`: one mint-to per allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if no allocations are configured.
    pub fn distribution(config: &DeploymentConfig, network: &str) -> Result<Self> {
        if config.allocations.is_empty() {
            return Err(DeployError::Config(ConfigError::validation(
                "no allocations configured; use --amount for a single mint",
                "allocations",
            )));
        }

        let table = compute_allocations(config)?;
        let mut plan = Self::empty(config, network, DeployAction::Mint);
        for allocation in &table.allocations {
            plan.push(
                &allocation.name,
                StepKind::MintTo {
                    recipient: allocation.recipient.clone(),
                },
                allocation.amount,
                allocation.recipient.to_string(),
            );
        }
        if !table.remainder_assigned {
            plan.unallocated = table.rounding_remainder;
        }
        Ok(plan)
    }

    /// Plan for `mint --amount n`: a single mint-to the payer.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is zero.
    pub fn single_mint(config: &DeploymentConfig, network: &str, amount: u64) -> Result<Self> {
        if amount == 0 {
            return Err(DeployError::Config(ConfigError::validation(
                "mint amount must be greater than 0",
                "amount",
            )));
        }

        let recipient = Recipient::Credential(PAYER.to_string());
        let mut plan = Self::empty(config, network, DeployAction::Mint);
        plan.push(
            "mint",
            StepKind::MintTo {
                recipient: recipient.clone(),
            },
            amount,
            recipient.to_string(),
        );
        Ok(plan)
    }

    /// Plan for `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool token allocation is not configured or
    /// the native seed is zero.
    pub fn pool(config: &DeploymentConfig, network: &str, sol_lamports: Option<u64>) -> Result<Self> {
        let pool = &config.pool;
        let lamports = sol_lamports.unwrap_or(pool.sol_lamports);
        if lamports == 0 {
            return Err(DeployError::Config(ConfigError::validation(
                "pool native seed must be greater than 0",
                "pool.sol_lamports",
            )));
        }

        let table = compute_allocations(config)?;
        let tokens = table
            .get(&pool.token_allocation)
            .map(|a| a.amount)
            .ok_or_else(|| {
                DeployError::Config(ConfigError::validation(
                    format!("pool allocation '{}' is not configured", pool.token_allocation),
                    "pool.token_allocation",
                ))
            })?;

        let mut plan = Self::empty(config, network, DeployAction::Pool);
        plan.push("create pool", StepKind::CreatePool, 0, "pool");
        plan.push(
            "add liquidity",
            StepKind::AddLiquidity { lamports },
            tokens,
            format!("pool ({lamports} lamports)"),
        );
        if pool.lock {
            plan.push(
                "lock liquidity",
                StepKind::LockLiquidity {
                    days: pool.lock_days,
                },
                0,
                format!("{} days", pool.lock_days),
            );
        }
        Ok(plan)
    }

    /// Plan for `revoke`.
    #[must_use]
    pub fn revoke(config: &DeploymentConfig, network: &str) -> Self {
        let mut plan = Self::empty(config, network, DeployAction::Revoke);
        plan.push(
            "revoke mint authority",
            StepKind::RevokeAuthority {
                authority: AuthorityType::MintTokens,
            },
            0,
            "mint",
        );
        if config.token.freeze_authority {
            plan.push(
                "revoke freeze authority",
                StepKind::RevokeAuthority {
                    authority: AuthorityType::FreezeAccount,
                },
                0,
                "mint",
            );
        }
        plan
    }

    /// Returns the failure policy of the plan's action.
    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        self.action.failure_policy()
    }

    /// Sum of token amounts across all steps.
    #[must_use]
    pub fn total_amount(&self) -> u64 {
        self.steps.iter().map(|s| s.amount).sum()
    }

    /// Returns the credentials referenced by mint-to recipients.
    #[must_use]
    pub fn recipient_credentials(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                StepKind::MintTo {
                    recipient: Recipient::Credential(name),
                } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl PlanStep {
    /// Returns the share of total supply as a percentage.
    #[must_use]
    pub fn percentage(&self) -> Option<Decimal> {
        self.fraction
            .map(|f| (f * Decimal::ONE_HUNDRED).round_dp(4).normalize())
    }
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ContinueOnError => "continue-on-error",
            Self::StopOnFirstError => "stop-on-first-error",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.name, self.target)?;
        if self.amount > 0 {
            write!(f, " ({} tokens", self.amount)?;
            if let Some(pct) = self.percentage() {
                write!(f, ", {pct}%")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} plan on {} ({} steps):",
            self.action,
            self.network,
            self.steps.len()
        )?;
        for step in &self.steps {
            writeln!(f, "  {}. {step}", step.index + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared configuration fixtures.

    use crate::config::{ConfigParser, DeploymentConfig};

    pub const STANDARD: &str = r"
token:
  name: Example
  symbol: EXM
  decimals: 6
  total_supply: 100000000
  metadata_uri: https://example.com/meta.json
networks:
  devnet:
    endpoint: https://api.devnet.example.com
  local:
    endpoint: sim://local
allocations:
  - { name: reserve, fraction: 0.05, recipient: { credential: reserve } }
  - { name: team, fraction: 0.15, recipient: { credential: team } }
  - { name: liquidity, fraction: 0.4, recipient: { credential: payer } }
  - { name: community, fraction: 0.3, recipient: { address: c0ffee } }
  - { name: marketing, fraction: 0.1, recipient: { credential: marketing } }
pool:
  sol_lamports: 2000000000
  lock_days: 30
execution:
  step_delay_ms: 0
";

    pub fn standard() -> DeploymentConfig {
        ConfigParser::new().parse_str(STANDARD, None).unwrap()
    }
}
