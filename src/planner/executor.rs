//! Plan executor.
//!
//! Steps run strictly in plan order, one external call in flight at a
//! time. A failing step never propagates its error: it becomes a
//! `StepResult` and the action's failure policy decides whether the
//! remaining steps run.

use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::{
    AddLiquidityRequest, AssociatedAccountRequest, ChainClients, CreateMetadataRequest,
    CreateMintRequest, CreatePoolRequest, LockLiquidityRequest, MintToRequest, SetAuthorityRequest,
};
use crate::config::{DeploymentConfig, NetworkConfig, Recipient};
use crate::credentials::{Credentials, MINT, PAYER};
use crate::error::{DeployError, Result, StepError};
use crate::record::StepResult;

use super::plan::{ExecutionPlan, FailurePolicy, PlanStep, StepKind};

/// Default pause between steps.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(1000);

/// Default per-step timeout.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(120);

/// Executor for execution plans.
#[derive(Debug)]
pub struct PlanExecutor<'a> {
    /// Chain collaborators.
    clients: ChainClients<'a>,
    /// Deployment configuration.
    config: &'a DeploymentConfig,
    /// Selected network.
    network: &'a NetworkConfig,
    /// Loaded credentials.
    credentials: &'a Credentials,
    /// Mint address the steps operate on.
    mint: String,
    /// Pause between steps.
    step_delay: Duration,
    /// Upper bound on a single step.
    step_timeout: Duration,
    /// Cancellation signal.
    cancel: CancellationToken,
}

/// Result of executing a plan.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Outcomes of attempted steps, in order.
    pub results: Vec<StepResult>,
    /// Whether execution stopped because of cancellation.
    pub cancelled: bool,
    /// Whether execution stopped at a failed step.
    pub stopped_early: bool,
}

/// Values produced by earlier steps of the same plan.
#[derive(Debug, Default)]
struct PipelineState {
    pool: Option<String>,
}

/// Successful output of one step.
struct StepOutput {
    signature: String,
    address: Option<String>,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub fn new(
        clients: ChainClients<'a>,
        config: &'a DeploymentConfig,
        network: &'a NetworkConfig,
        credentials: &'a Credentials,
        mint: impl Into<String>,
    ) -> Self {
        Self {
            clients,
            config,
            network,
            credentials,
            mint: mint.into(),
            step_delay: DEFAULT_STEP_DELAY,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the pause between steps.
    #[must_use]
    pub const fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Sets the per-step timeout.
    #[must_use]
    pub const fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Executes a plan.
    ///
    /// Cancellation is checked before each step and raced against the
    /// inter-step delay; a step already submitted is allowed to finish.
    pub async fn execute(&self, plan: &ExecutionPlan) -> ExecutionResult {
        let policy = plan.failure_policy();
        info!(
            "Executing {} plan with {} steps ({policy})",
            plan.action,
            plan.steps.len()
        );

        let mut results = Vec::with_capacity(plan.steps.len());
        let mut state = PipelineState::default();
        let mut cancelled = false;
        let mut stopped_early = false;

        for (position, step) in plan.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if position > 0 && !self.step_delay.is_zero() {
                debug!("Waiting {:?} before step {}", self.step_delay, step.index);
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    () = tokio::time::sleep(self.step_delay) => {}
                }
            }

            let result = self.execute_step(step, &mut state).await;
            let failed = !result.success;
            results.push(result);

            if failed && policy == FailurePolicy::StopOnFirstError {
                warn!("Stopping after failed step '{}'", step.name);
                stopped_early = true;
                break;
            }
        }

        if cancelled {
            warn!(
                "Execution cancelled after {} of {} steps",
                results.len(),
                plan.steps.len()
            );
        }

        ExecutionResult {
            results,
            cancelled,
            stopped_early,
        }
    }

    /// Executes one step, bounded by the step timeout.
    ///
    /// Never fails: errors are captured in the returned result.
    async fn execute_step(&self, step: &PlanStep, state: &mut PipelineState) -> StepResult {
        let started_at = Utc::now();
        info!("Step {}: {step}", step.index + 1);

        let outcome = match tokio::time::timeout(self.step_timeout, self.run_step(step, state)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(DeployError::Step(StepError::TimedOut {
                index: step.index,
                name: step.name.clone(),
                timeout_secs: self.step_timeout.as_secs(),
            })),
        };

        match outcome {
            Ok(output) => {
                info!("Step '{}' confirmed: {}", step.name, output.signature);
                StepResult::succeeded(step, output.signature, output.address, started_at)
            }
            Err(e) => {
                error!("Step '{}' failed: {e}", step.name);
                StepResult::failed(step, e.to_string(), started_at)
            }
        }
    }

    /// Performs the external calls of one step.
    async fn run_step(&self, step: &PlanStep, state: &mut PipelineState) -> Result<StepOutput> {
        let payer = self.credentials.require(PAYER)?.address();

        match &step.kind {
            StepKind::CreateMint {
                decimals,
                freeze_authority,
            } => {
                let mint = self.credentials.require(MINT)?.address();
                let request = CreateMintRequest {
                    payer: payer.clone(),
                    mint: mint.clone(),
                    decimals: *decimals,
                    mint_authority: payer.clone(),
                    freeze_authority: freeze_authority.then(|| payer.clone()),
                };
                let signature = self.clients.token.create_mint(&request).await?;
                Ok(StepOutput {
                    signature,
                    address: Some(mint),
                })
            }

            StepKind::CreateMetadata { name, symbol, uri } => {
                let request = CreateMetadataRequest {
                    payer: payer.clone(),
                    mint: self.mint.clone(),
                    mint_authority: payer.clone(),
                    update_authority: payer,
                    name: name.clone(),
                    symbol: symbol.clone(),
                    uri: uri.clone(),
                    seller_fee_basis_points: self.config.token.seller_fee_basis_points,
                    is_mutable: self.config.token.metadata_mutable,
                    program: self.network.programs.metadata.clone(),
                };
                let signature = self.clients.metadata.create_metadata_account_v3(&request).await?;
                Ok(StepOutput {
                    signature,
                    address: None,
                })
            }

            StepKind::MintTo { recipient } => {
                let owner = match recipient {
                    Recipient::Credential(name) => self.credentials.require(name)?.address(),
                    Recipient::Address(address) => address.clone(),
                };
                let account = self
                    .clients
                    .token
                    .get_or_create_associated_account(&AssociatedAccountRequest {
                        payer: payer.clone(),
                        mint: self.mint.clone(),
                        owner,
                    })
                    .await?;
                debug!("Destination token account: {account}");

                let request = MintToRequest {
                    payer: payer.clone(),
                    mint: self.mint.clone(),
                    destination: account.clone(),
                    authority: payer,
                    amount: self.base_units(step)?,
                };
                let signature = self.clients.token.mint_to(&request).await?;
                Ok(StepOutput {
                    signature,
                    address: Some(account),
                })
            }

            StepKind::RevokeAuthority { authority } => {
                let request = SetAuthorityRequest {
                    payer: payer.clone(),
                    mint: self.mint.clone(),
                    current_authority: payer,
                    authority_type: *authority,
                    new_authority: None,
                };
                let signature = self.clients.token.set_authority(&request).await?;
                Ok(StepOutput {
                    signature,
                    address: None,
                })
            }

            StepKind::CreatePool => {
                let request = CreatePoolRequest {
                    payer,
                    mint: self.mint.clone(),
                    program: self.network.programs.pool.clone(),
                };
                let created = self.clients.pool.create_pool(&request).await?;
                state.pool = Some(created.pool.clone());
                Ok(StepOutput {
                    signature: created.signature,
                    address: Some(created.pool),
                })
            }

            StepKind::AddLiquidity { lamports } => {
                let pool = Self::require_pool(step, state)?;
                let request = AddLiquidityRequest {
                    payer,
                    pool: pool.clone(),
                    token_amount: self.base_units(step)?,
                    lamports: *lamports,
                };
                let signature = self.clients.pool.add_liquidity(&request).await?;
                Ok(StepOutput {
                    signature,
                    address: Some(pool),
                })
            }

            StepKind::LockLiquidity { days } => {
                let pool = Self::require_pool(step, state)?;
                let request = LockLiquidityRequest {
                    payer,
                    pool: pool.clone(),
                    duration_days: *days,
                };
                let signature = self.clients.pool.lock_liquidity(&request).await?;
                Ok(StepOutput {
                    signature,
                    address: Some(pool),
                })
            }
        }
    }

    /// Converts a step's whole-token amount to base units.
    fn base_units(&self, step: &PlanStep) -> Result<u64> {
        self.config.token.to_base_units(step.amount).ok_or_else(|| {
            DeployError::Step(StepError::Failed {
                index: step.index,
                name: step.name.clone(),
                message: format!(
                    "{} tokens overflow base units at {} decimals",
                    step.amount, self.config.token.decimals
                ),
            })
        })
    }

    /// Returns the pool created by an earlier step.
    fn require_pool(step: &PlanStep, state: &PipelineState) -> Result<String> {
        state.pool.clone().ok_or_else(|| {
            DeployError::Step(StepError::MissingInput {
                index: step.index,
                name: step.name.clone(),
                input: String::from("pool address from the create pool step"),
            })
        })
    }
}

impl ExecutionResult {
    /// Number of successful steps.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Number of failed steps.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Executed {} steps: {} successful, {} failed",
            self.results.len(),
            self.succeeded(),
            self.failed()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CreatedPool;
    use crate::chain::testing::Mocks;
    use crate::credentials::KeyMaterial;
    use crate::error::ChainError;
    use crate::planner::fixtures;
    use mockall::Sequence;

    fn key(name: &str, seed: u8) -> KeyMaterial {
        let mut bytes = [seed; 64];
        bytes[63] = seed.wrapping_add(1);
        KeyMaterial::from_bytes(name, bytes)
    }

    fn credentials() -> Credentials {
        let mut credentials = Credentials::empty("keys");
        for (i, name) in ["payer", "mint", "team", "marketing", "reserve"].iter().enumerate() {
            credentials.insert(key(name, u8::try_from(i + 1).unwrap()));
        }
        credentials
    }

    fn network() -> NetworkConfig {
        fixtures::standard().networks["devnet"].clone()
    }

    #[tokio::test]
    async fn test_distribution_continues_after_failure() {
        let config = fixtures::standard();
        let network = network();
        let credentials = credentials();
        let plan = ExecutionPlan::distribution(&config, "devnet").unwrap();

        let mut mocks = Mocks::new();
        mocks
            .token
            .expect_get_or_create_associated_account()
            .times(5)
            .returning(|r| Ok(format!("ata-{}", r.owner)));
        let mut seq = Sequence::new();
        mocks
            .token
            .expect_mint_to()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|r| Ok(format!("sig-{}", r.amount)));
        mocks
            .token
            .expect_mint_to()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ChainError::rejected("blockhash expired").into()));
        mocks
            .token
            .expect_mint_to()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|r| Ok(format!("sig-{}", r.amount)));

        let executor = PlanExecutor::new(mocks.clients(), &config, &network, &credentials, "mint-addr")
            .with_step_delay(Duration::ZERO);
        let result = executor.execute(&plan).await;

        assert_eq!(result.results.len(), 5);
        assert_eq!(result.failed(), 1);
        assert!(!result.results[2].success);
        assert!(result.results[2].error.as_deref().unwrap().contains("blockhash expired"));
        assert!(!result.cancelled);
        assert!(!result.stopped_early);
    }

    #[tokio::test]
    async fn test_mint_uses_base_units() {
        let config = fixtures::standard();
        let network = network();
        let credentials = credentials();
        let plan = ExecutionPlan::single_mint(&config, "devnet", 500).unwrap();

        let mut mocks = Mocks::new();
        mocks
            .token
            .expect_get_or_create_associated_account()
            .times(1)
            .returning(|_| Ok(String::from("ata-payer")));
        mocks
            .token
            .expect_mint_to()
            .withf(|r| r.amount == 500_000_000 && r.destination == "ata-payer" && r.mint == "mint-addr")
            .times(1)
            .returning(|_| Ok(String::from("sig")));

        let executor = PlanExecutor::new(mocks.clients(), &config, &network, &credentials, "mint-addr")
            .with_step_delay(Duration::ZERO);
        let result = executor.execute(&plan).await;

        assert_eq!(result.results.len(), 1);
        assert!(result.results[0].success);
        assert_eq!(result.results[0].amount, 500);
        assert_eq!(result.results[0].address.as_deref(), Some("ata-payer"));
    }

    #[tokio::test]
    async fn test_pool_stops_on_first_error() {
        let config = fixtures::standard();
        let network = network();
        let credentials = credentials();
        let plan = ExecutionPlan::pool(&config, "devnet", None).unwrap();

        let mut mocks = Mocks::new();
        mocks.pool.expect_create_pool().times(1).returning(|_| {
            Ok(CreatedPool {
                signature: String::from("sig-pool"),
                pool: String::from("pool-1"),
            })
        });
        mocks
            .pool
            .expect_add_liquidity()
            .withf(|r| r.pool == "pool-1")
            .times(1)
            .returning(|_| Err(ChainError::rejected("slippage").into()));
        mocks.pool.expect_lock_liquidity().never();

        let executor = PlanExecutor::new(mocks.clients(), &config, &network, &credentials, "mint-addr")
            .with_step_delay(Duration::ZERO);
        let result = executor.execute(&plan).await;

        assert_eq!(result.results.len(), 2);
        assert!(result.results[0].success);
        assert!(!result.results[1].success);
        assert!(result.stopped_early);
    }

    #[tokio::test]
    async fn test_missing_recipient_credential_fails_step_only() {
        let config = fixtures::standard();
        let network = network();
        let mut credentials = Credentials::empty("keys");
        credentials.insert(key("payer", 1));
        let plan = ExecutionPlan::distribution(&config, "devnet").unwrap();

        let mut mocks = Mocks::new();
        mocks
            .token
            .expect_get_or_create_associated_account()
            .times(2)
            .returning(|_| Ok(String::from("ata")));
        mocks
            .token
            .expect_mint_to()
            .times(2)
            .returning(|_| Ok(String::from("sig")));

        let executor = PlanExecutor::new(mocks.clients(), &config, &network, &credentials, "mint-addr")
            .with_step_delay(Duration::ZERO);
        let result = executor.execute(&plan).await;

        // liquidity (payer) and community (literal address) succeed.
        assert_eq!(result.results.len(), 5);
        assert_eq!(result.succeeded(), 2);
        assert!(result.results[2].error.as_deref().unwrap().contains("team"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let config = fixtures::standard();
        let network = network();
        let credentials = credentials();
        let plan = ExecutionPlan::distribution(&config, "devnet").unwrap();
        let mocks = Mocks::new();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = PlanExecutor::new(mocks.clients(), &config, &network, &credentials, "mint-addr")
            .with_cancellation(cancel);
        let result = executor.execute(&plan).await;

        assert!(result.cancelled);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let config = fixtures::standard();
        let network = network();
        let credentials = credentials();
        let plan = ExecutionPlan::distribution(&config, "devnet").unwrap();

        let mut mocks = Mocks::new();
        mocks
            .token
            .expect_get_or_create_associated_account()
            .times(1)
            .returning(|_| Ok(String::from("ata")));
        mocks
            .token
            .expect_mint_to()
            .times(1)
            .returning(|_| Ok(String::from("sig")));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let executor = PlanExecutor::new(mocks.clients(), &config, &network, &credentials, "mint-addr")
            .with_step_delay(Duration::from_secs(3600))
            .with_cancellation(cancel);
        let result = executor.execute(&plan).await;

        assert!(result.cancelled);
        assert_eq!(result.results.len(), 1);
        assert!(result.results[0].success);
    }

    struct StalledToken;

    #[async_trait::async_trait]
    impl crate::chain::TokenProgram for StalledToken {
        async fn create_mint(&self, _request: &CreateMintRequest) -> Result<String> {
            std::future::pending().await
        }

        async fn get_or_create_associated_account(
            &self,
            _request: &AssociatedAccountRequest,
        ) -> Result<String> {
            std::future::pending().await
        }

        async fn mint_to(&self, _request: &MintToRequest) -> Result<String> {
            std::future::pending().await
        }

        async fn set_authority(&self, _request: &SetAuthorityRequest) -> Result<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_step_timeout_records_error() {
        let config = fixtures::standard();
        let network = network();
        let credentials = credentials();
        let plan = ExecutionPlan::revoke(&config, "devnet");

        let mocks = Mocks::new();
        let clients = ChainClients {
            token: &StalledToken,
            ..mocks.clients()
        };

        let executor = PlanExecutor::new(clients, &config, &network, &credentials, "mint-addr")
            .with_step_delay(Duration::ZERO)
            .with_step_timeout(Duration::from_millis(20));
        let result = executor.execute(&plan).await;

        assert_eq!(result.results.len(), 1);
        assert!(!result.results[0].success);
        assert!(result.results[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_create_mint_reports_mint_address() {
        let mut config = fixtures::standard();
        config.token.freeze_authority = true;
        let network = network();
        let credentials = credentials();
        let plan = ExecutionPlan::create_mint(&config, "devnet");
        let mint_address = credentials.get("mint").unwrap().address();
        let payer_address = credentials.get("payer").unwrap().address();

        let mut mocks = Mocks::new();
        let expected_mint = mint_address.clone();
        mocks
            .token
            .expect_create_mint()
            .withf(move |r| {
                r.mint == expected_mint
                    && r.decimals == 6
                    && r.freeze_authority.as_deref() == Some(payer_address.as_str())
            })
            .times(1)
            .returning(|_| Ok(String::from("sig-mint")));

        let executor = PlanExecutor::new(mocks.clients(), &config, &network, &credentials, "")
            .with_step_delay(Duration::ZERO);
        let result = executor.execute(&plan).await;

        assert!(result.results[0].success);
        assert_eq!(result.results[0].address.as_deref(), Some(mint_address.as_str()));
    }
}
