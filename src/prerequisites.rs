//! Prerequisite checks.
//!
//! Before any step is submitted, the orchestrator verifies in a fixed order
//! that the run can succeed: the endpoint answers, the credentials are
//! present, the mint is in the expected state and the payer can cover the
//! fees. The first failing check aborts the run.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::chain::ChainConnection;
use crate::config::DeploymentConfig;
use crate::credentials::{Credentials, MINT, PAYER};
use crate::error::{ConfigError, DeployError, PrerequisiteError, Result};
use crate::planner::{DeployAction, ExecutionPlan, StepKind};

/// Expected state of the mint before the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MintRequirement {
    /// The mint must already exist.
    MustExist,
    /// The mint must not exist yet.
    MustNotExist,
}

/// What a plan needs before it can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirements {
    /// Credential names, payer first.
    pub credentials: Vec<String>,
    /// Expected mint state.
    pub mint: MintRequirement,
    /// Lamports the payer must hold.
    pub lamports: u64,
    /// Token base units the payer must hold, for pool seeding.
    pub token_units: Option<u64>,
}

/// One passed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRecord {
    /// Check name.
    pub name: String,
    /// What was observed.
    pub detail: String,
}

/// Outcome of a passed prerequisite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerequisiteReport {
    /// Node software version.
    pub version: String,
    /// Current slot.
    pub slot: u64,
    /// Payer address.
    pub payer: String,
    /// Payer balance in lamports.
    pub payer_balance: u64,
    /// Lamports the plan requires.
    pub required_lamports: u64,
    /// Mint address the run operates on.
    pub mint: String,
    /// Payer token balance, when checked.
    pub token_balance: Option<u64>,
    /// Passed checks in order.
    pub checks: Vec<CheckRecord>,
}

/// Returns the mint address a run works on.
///
/// An existing mint is the configured address, else the `mint` credential's.
/// A mint about to be created is always the `mint` credential's address, and
/// a configured address must match it.
///
/// # Errors
///
/// Returns `MissingCredential` if the `mint` credential is needed and was not
/// loaded, or `MintAddressMismatch` if the configured address differs from
/// the one `create-mint` would create.
pub fn resolve_mint(
    config: &DeploymentConfig,
    credentials: &Credentials,
    requirement: MintRequirement,
) -> Result<String> {
    match (requirement, &config.token.mint_address) {
        (MintRequirement::MustExist, Some(address)) => Ok(address.clone()),
        (MintRequirement::MustExist, None) => Ok(credentials.require(MINT)?.address()),
        (MintRequirement::MustNotExist, configured) => {
            let address = credentials.require(MINT)?.address();
            if let Some(configured) = configured
                && *configured != address
            {
                return Err(PrerequisiteError::MintAddressMismatch {
                    configured: configured.clone(),
                    credential: address,
                }
                .into());
            }
            Ok(address)
        }
    }
}

impl Requirements {
    /// Derives the requirements of a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool token amount overflows base units.
    pub fn for_plan(config: &DeploymentConfig, plan: &ExecutionPlan) -> Result<Self> {
        let mut credentials = vec![PAYER.to_string()];
        let needs_mint_key =
            plan.action == DeployAction::CreateMint || config.token.mint_address.is_none();
        if needs_mint_key {
            credentials.push(MINT.to_string());
        }
        for name in plan.recipient_credentials() {
            if !credentials.iter().any(|c| c == name) {
                credentials.push(name.to_string());
            }
        }

        let fees = &config.fees;
        let mut lamports = fees.reserve;
        let mut token_tokens: Option<u64> = None;
        for step in &plan.steps {
            let cost = match &step.kind {
                StepKind::CreateMint { .. } => fees.mint_rent,
                StepKind::CreateMetadata { .. } => fees.metadata_rent,
                StepKind::MintTo { .. } => fees.account_rent,
                StepKind::CreatePool => fees.pool_creation,
                StepKind::AddLiquidity { lamports } => {
                    token_tokens = Some(token_tokens.unwrap_or(0).saturating_add(step.amount));
                    *lamports
                }
                StepKind::RevokeAuthority { .. } | StepKind::LockLiquidity { .. } => 0,
            };
            lamports = lamports
                .saturating_add(fees.per_step)
                .saturating_add(cost);
        }

        let token_units = token_tokens
            .map(|tokens| {
                config.token.to_base_units(tokens).ok_or_else(|| {
                    DeployError::Config(ConfigError::validation(
                        format!("{tokens} tokens overflow base units"),
                        "pool.token_allocation",
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            credentials,
            mint: if plan.action.requires_existing_mint() {
                MintRequirement::MustExist
            } else {
                MintRequirement::MustNotExist
            },
            lamports,
            token_units,
        })
    }

    /// Returns the credential names as a set, for loading.
    #[must_use]
    pub fn credential_set(&self) -> BTreeSet<String> {
        self.credentials.iter().cloned().collect()
    }
}

/// Runs the prerequisite checks for one network.
#[derive(Clone, Copy)]
pub struct PrerequisiteChecker<'a> {
    /// Network connection.
    connection: &'a dyn ChainConnection,
    /// Network name.
    network: &'a str,
    /// Endpoint URL, for messages.
    endpoint: &'a str,
}

impl<'a> PrerequisiteChecker<'a> {
    /// Creates a checker.
    #[must_use]
    pub fn new(connection: &'a dyn ChainConnection, network: &'a str, endpoint: &'a str) -> Self {
        Self {
            connection,
            network,
            endpoint,
        }
    }

    /// Runs every check in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns a `PrerequisiteError` naming the first failed check.
    pub async fn check(
        &self,
        config: &DeploymentConfig,
        requirements: &Requirements,
        credentials: &Credentials,
    ) -> Result<PrerequisiteReport> {
        let mut checks = Vec::new();

        // 1. Endpoint
        let version = self
            .connection
            .get_version()
            .await
            .map_err(|e| self.unreachable(&e))?;
        let slot = self
            .connection
            .get_slot()
            .await
            .map_err(|e| self.unreachable(&e))?;
        debug!("Endpoint {} at slot {slot} (version {version})", self.endpoint);
        checks.push(CheckRecord {
            name: String::from("endpoint"),
            detail: format!("version {version}, slot {slot}"),
        });

        // 2. Credentials
        for name in &requirements.credentials {
            credentials.require(name)?;
        }
        checks.push(CheckRecord {
            name: String::from("credentials"),
            detail: requirements.credentials.join(", "),
        });

        // 3. Mint state
        let mint = resolve_mint(config, credentials, requirements.mint)?;
        let exists = self
            .connection
            .account_exists(&mint)
            .await
            .map_err(|e| failed("mint", &e))?;
        match (requirements.mint, exists) {
            (MintRequirement::MustExist, false) => {
                return Err(PrerequisiteError::MintMissing {
                    address: mint,
                    network: self.network.to_string(),
                }
                .into());
            }
            (MintRequirement::MustNotExist, true) => {
                return Err(PrerequisiteError::MintAlreadyExists {
                    address: mint,
                    network: self.network.to_string(),
                }
                .into());
            }
            _ => {}
        }
        checks.push(CheckRecord {
            name: String::from("mint"),
            detail: format!("{mint} ({})", if exists { "exists" } else { "absent" }),
        });

        // 4. Payer balance
        let payer = credentials.require(PAYER)?.address();
        let payer_balance = self
            .connection
            .get_balance(&payer)
            .await
            .map_err(|e| failed("balance", &e))?;
        if payer_balance < requirements.lamports {
            return Err(PrerequisiteError::InsufficientBalance {
                account: payer,
                asset: String::from("lamports"),
                current: payer_balance,
                required: requirements.lamports,
            }
            .into());
        }
        checks.push(CheckRecord {
            name: String::from("balance"),
            detail: format!("{payer_balance} lamports (need {})", requirements.lamports),
        });

        // 5. Pool token balance
        let token_balance = match requirements.token_units {
            Some(required) => {
                let balance = self.token_balance(&payer, &mint, required).await?;
                checks.push(CheckRecord {
                    name: String::from("token balance"),
                    detail: format!("{balance} units (need {required})"),
                });
                Some(balance)
            }
            None => None,
        };

        info!("All {} prerequisite checks passed", checks.len());

        Ok(PrerequisiteReport {
            version,
            slot,
            payer,
            payer_balance,
            required_lamports: requirements.lamports,
            mint,
            token_balance,
            checks,
        })
    }

    async fn token_balance(&self, payer: &str, mint: &str, required: u64) -> Result<u64> {
        let account = self
            .connection
            .find_token_account(payer, mint)
            .await
            .map_err(|e| failed("token balance", &e))?
            .ok_or_else(|| PrerequisiteError::TokenAccountMissing {
                owner: payer.to_string(),
                mint: mint.to_string(),
            })?;

        let balance = self
            .connection
            .get_token_account_balance(&account)
            .await
            .map_err(|e| failed("token balance", &e))?;

        if balance < required {
            return Err(PrerequisiteError::InsufficientBalance {
                account,
                asset: String::from("token units"),
                current: balance,
                required,
            }
            .into());
        }
        Ok(balance)
    }

    fn unreachable(&self, error: &DeployError) -> DeployError {
        PrerequisiteError::EndpointUnreachable {
            endpoint: self.endpoint.to_string(),
            message: error.to_string(),
        }
        .into()
    }
}

fn failed(check: &str, error: &DeployError) -> DeployError {
    PrerequisiteError::CheckFailed {
        check: check.to_string(),
        message: error.to_string(),
    }
    .into()
}

impl std::fmt::Debug for PrerequisiteChecker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrerequisiteChecker")
            .field("network", &self.network)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::MockConnection;
    use crate::credentials::KeyMaterial;
    use crate::error::ChainError;
    use crate::planner::{ActionRequest, fixtures};

    fn credentials(names: &[&str]) -> Credentials {
        let mut credentials = Credentials::empty("keys");
        for (i, name) in names.iter().enumerate() {
            let mut bytes = [u8::try_from(i + 1).unwrap(); 64];
            bytes[40] = 0xAA;
            credentials.insert(KeyMaterial::from_bytes(name, bytes));
        }
        credentials
    }

    fn reachable() -> MockConnection {
        let mut connection = MockConnection::new();
        connection
            .expect_get_version()
            .returning(|| Ok(String::from("1.18.0")));
        connection.expect_get_slot().returning(|| Ok(42));
        connection
    }

    fn requirements(request: ActionRequest) -> (DeploymentConfig, Requirements) {
        let config = fixtures::standard();
        let plan = ExecutionPlan::for_action(&config, "devnet", request).unwrap();
        let requirements = Requirements::for_plan(&config, &plan).unwrap();
        (config, requirements)
    }

    #[test]
    fn test_distribution_requirements() {
        let (config, req) = requirements(ActionRequest::Mint { amount: None });
        assert_eq!(req.credentials, vec!["payer", "mint", "team", "marketing", "reserve"]);
        assert_eq!(req.mint, MintRequirement::MustExist);
        assert_eq!(
            req.lamports,
            5 * (config.fees.per_step + config.fees.account_rent)
        );
        assert_eq!(req.token_units, None);
    }

    #[test]
    fn test_pool_requirements() {
        let (config, req) = requirements(ActionRequest::Pool { sol_lamports: None });
        assert_eq!(
            req.lamports,
            3 * config.fees.per_step + config.fees.pool_creation + 2_000_000_000
        );
        assert_eq!(req.token_units, Some(40_000_000 * 1_000_000));
    }

    #[test]
    fn test_create_mint_requirements() {
        let (config, req) = requirements(ActionRequest::CreateMint);
        assert_eq!(req.credentials, vec!["payer", "mint"]);
        assert_eq!(req.mint, MintRequirement::MustNotExist);
        assert_eq!(req.lamports, config.fees.per_step + config.fees.mint_rent);
    }

    #[test]
    fn test_configured_mint_address_skips_mint_key() {
        let mut config = fixtures::standard();
        config.token.mint_address = Some(String::from("fixed-mint"));
        let plan = ExecutionPlan::revoke(&config, "devnet");
        let req = Requirements::for_plan(&config, &plan).unwrap();
        assert_eq!(req.credentials, vec!["payer"]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_aborts_first() {
        let (config, req) = requirements(ActionRequest::Revoke);
        let mut connection = MockConnection::new();
        connection
            .expect_get_version()
            .times(1)
            .returning(|| Err(ChainError::network("connection refused").into()));

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let err = checker
            .check(&config, &req, &Credentials::empty("keys"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::Prerequisite(PrerequisiteError::EndpointUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_is_named() {
        let (config, req) = requirements(ActionRequest::Mint { amount: None });
        let connection = reachable();
        let credentials = credentials(&["payer", "mint", "team", "reserve"]);

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let err = checker.check(&config, &req, &credentials).await.unwrap_err();

        match err {
            DeployError::Prerequisite(PrerequisiteError::MissingCredential { name, path }) => {
                assert_eq!(name, "marketing");
                assert!(path.ends_with("marketing.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_mint_must_exist() {
        let (config, req) = requirements(ActionRequest::Metadata);
        let mut connection = reachable();
        connection.expect_account_exists().returning(|_| Ok(false));
        let credentials = credentials(&["payer", "mint"]);

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let err = checker.check(&config, &req, &credentials).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Prerequisite(PrerequisiteError::MintMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_mint_must_not_exist() {
        let (config, req) = requirements(ActionRequest::CreateMint);
        let mut connection = reachable();
        connection.expect_account_exists().returning(|_| Ok(true));
        let credentials = credentials(&["payer", "mint"]);

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let err = checker.check(&config, &req, &credentials).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Prerequisite(PrerequisiteError::MintAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_insufficient_balance_reports_values() {
        let (config, req) = requirements(ActionRequest::CreateMint);
        let mut connection = reachable();
        connection.expect_account_exists().returning(|_| Ok(false));
        connection.expect_get_balance().returning(|_| Ok(1_000));
        let credentials = credentials(&["payer", "mint"]);

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let err = checker.check(&config, &req, &credentials).await.unwrap_err();

        let required = config.fees.per_step + config.fees.mint_rent;
        assert!(err.to_string().contains(&format!("have 1000, need {required}")));
    }

    #[tokio::test]
    async fn test_pool_token_account_missing() {
        let (config, req) = requirements(ActionRequest::Pool { sol_lamports: None });
        let mut connection = reachable();
        connection.expect_account_exists().returning(|_| Ok(true));
        connection.expect_get_balance().returning(|_| Ok(u64::MAX));
        connection.expect_find_token_account().returning(|_, _| Ok(None));
        let credentials = credentials(&["payer", "mint"]);

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let err = checker.check(&config, &req, &credentials).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Prerequisite(PrerequisiteError::TokenAccountMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_all_checks_pass() {
        let (config, req) = requirements(ActionRequest::Pool { sol_lamports: None });
        let mut connection = reachable();
        connection.expect_account_exists().returning(|_| Ok(true));
        connection.expect_get_balance().returning(|_| Ok(10_000_000_000));
        connection
            .expect_find_token_account()
            .returning(|_, _| Ok(Some(String::from("ata"))));
        connection
            .expect_get_token_account_balance()
            .returning(|_| Ok(u64::MAX));
        let credentials = credentials(&["payer", "mint"]);

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let report = checker.check(&config, &req, &credentials).await.unwrap();

        assert_eq!(report.slot, 42);
        assert_eq!(report.mint, credentials.get("mint").unwrap().address());
        assert_eq!(report.token_balance, Some(u64::MAX));
        let names: Vec<&str> = report.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["endpoint", "credentials", "mint", "balance", "token balance"]);
    }

    #[test]
    fn test_resolve_existing_mint_prefers_configured_address() {
        let mut config = fixtures::standard();
        config.token.mint_address = Some(String::from("fixed-mint"));

        let mint = resolve_mint(&config, &Credentials::empty("keys"), MintRequirement::MustExist);
        assert_eq!(mint.unwrap(), "fixed-mint");
    }

    #[test]
    fn test_new_mint_always_uses_mint_credential() {
        let credentials = credentials(&["payer", "mint"]);
        let expected = credentials.get("mint").unwrap().address();

        let mut config = fixtures::standard();
        let mint = resolve_mint(&config, &credentials, MintRequirement::MustNotExist).unwrap();
        assert_eq!(mint, expected);

        config.token.mint_address = Some(expected.clone());
        let mint = resolve_mint(&config, &credentials, MintRequirement::MustNotExist).unwrap();
        assert_eq!(mint, expected);
    }

    #[tokio::test]
    async fn test_create_mint_rejects_configured_address_mismatch() {
        let (mut config, req) = requirements(ActionRequest::CreateMint);
        config.token.mint_address = Some(String::from("configured-mint"));
        let connection = reachable();
        let credentials = credentials(&["payer", "mint"]);

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let err = checker.check(&config, &req, &credentials).await.unwrap_err();

        match err {
            DeployError::Prerequisite(PrerequisiteError::MintAddressMismatch {
                configured,
                credential,
            }) => {
                assert_eq!(configured, "configured-mint");
                assert_eq!(credential, credentials.get("mint").unwrap().address());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_mint_checks_the_address_it_creates() {
        let (mut config, req) = requirements(ActionRequest::CreateMint);
        let credentials = credentials(&["payer", "mint"]);
        let mint = credentials.get("mint").unwrap().address();
        config.token.mint_address = Some(mint.clone());

        let mut connection = reachable();
        let checked = mint.clone();
        connection
            .expect_account_exists()
            .withf(move |address| address == checked)
            .times(1)
            .returning(|_| Ok(false));
        connection.expect_get_balance().returning(|_| Ok(u64::MAX));

        let checker = PrerequisiteChecker::new(&connection, "devnet", "https://rpc");
        let report = checker.check(&config, &req, &credentials).await.unwrap();

        assert_eq!(report.mint, mint);
    }
}
