//! Deployment orchestrator.
//!
//! Runs one action through the fixed pipeline: compute plan, then either
//! return it (dry run) or load credentials, check prerequisites, execute
//! and persist the record. Fatal errors from any pre-execution phase
//! propagate; step failures are recorded and judged by the action's
//! failure policy.

use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chain::ChainClients;
use crate::config::{ConfigHasher, DeploymentConfig, NetworkConfig};
use crate::credentials::{Credentials, load_credentials};
use crate::error::{DeployError, Result, StepError};
use crate::planner::{ActionRequest, ExecutionPlan, FailurePolicy, PlanExecutor};
use crate::prerequisites::{PrerequisiteChecker, PrerequisiteReport, Requirements};
use crate::record::{DeploymentRecord, RecordStore, generate_holder_id};

/// Orchestrator for one network.
pub struct Orchestrator<'a, S: RecordStore> {
    /// Configuration.
    config: &'a DeploymentConfig,
    /// Network name.
    network_name: &'a str,
    /// Network settings.
    network: &'a NetworkConfig,
    /// Record store.
    store: &'a S,
    /// Directory holding credential files.
    credentials_dir: PathBuf,
    /// Configuration hasher.
    hasher: ConfigHasher,
    /// Compute and return the plan only.
    dry_run: bool,
    /// Cancellation signal for execution.
    cancel: CancellationToken,
}

/// Outcome of a run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The plan was computed and not executed.
    DryRun(ExecutionPlan),
    /// The plan was executed.
    Executed(Box<RunReport>),
}

/// Everything an executed run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Executed plan.
    pub plan: ExecutionPlan,
    /// Passed prerequisite checks.
    pub prerequisites: PrerequisiteReport,
    /// Deployment record.
    pub record: DeploymentRecord,
    /// Where the record was written, if persisting succeeded.
    pub record_path: Option<PathBuf>,
}

impl<'a, S: RecordStore> Orchestrator<'a, S> {
    /// Creates a new orchestrator.
    #[must_use]
    pub fn new(
        config: &'a DeploymentConfig,
        network_name: &'a str,
        network: &'a NetworkConfig,
        store: &'a S,
    ) -> Self {
        Self {
            config,
            network_name,
            network,
            store,
            credentials_dir: PathBuf::from(&config.execution.credentials_dir),
            hasher: ConfigHasher::new(),
            dry_run: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Overrides the credentials directory.
    #[must_use]
    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = dir.into();
        self
    }

    /// Enables dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Computes the plan for a request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the action cannot be planned.
    pub fn plan(&self, request: ActionRequest) -> Result<ExecutionPlan> {
        ExecutionPlan::for_action(self.config, self.network_name, request)
    }

    /// Runs an action.
    ///
    /// In dry-run mode no collaborator is called and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if planning, credential loading, locking or a
    /// prerequisite check fails. Step failures do not produce an error here.
    pub async fn run(&self, request: ActionRequest, clients: ChainClients<'_>) -> Result<RunOutcome> {
        let plan = self.plan(request)?;

        if self.dry_run {
            info!(
                "Dry run: {} plan with {} steps on {}",
                plan.action,
                plan.steps.len(),
                self.network_name
            );
            return Ok(RunOutcome::DryRun(plan));
        }

        let requirements = Requirements::for_plan(self.config, &plan)?;
        let credentials = load_credentials(&self.credentials_dir, &requirements.credential_set())?;

        let lock = self
            .store
            .acquire_lock(self.network_name, &generate_holder_id())
            .await?;

        let outcome = self
            .execute(plan, &requirements, &credentials, clients)
            .await;

        if let Err(e) = self.store.release_lock(self.network_name, &lock.lock_id).await {
            warn!("Failed to release run lock: {e}");
        }

        outcome
    }

    /// Checks prerequisites, executes the plan and persists the record.
    async fn execute(
        &self,
        plan: ExecutionPlan,
        requirements: &Requirements,
        credentials: &Credentials,
        clients: ChainClients<'_>,
    ) -> Result<RunOutcome> {
        let started_at = Utc::now();

        let checker =
            PrerequisiteChecker::new(clients.connection, self.network_name, &self.network.endpoint);
        let prerequisites = checker.check(self.config, requirements, credentials).await?;

        let execution = &self.config.execution;
        let executor = PlanExecutor::new(
            clients,
            self.config,
            self.network,
            credentials,
            prerequisites.mint.clone(),
        )
        .with_step_delay(Duration::from_millis(execution.step_delay_ms))
        .with_step_timeout(Duration::from_secs(execution.step_timeout_secs))
        .with_cancellation(self.cancel.clone());

        let result = executor.execute(&plan).await;
        info!("{result}");

        let record = DeploymentRecord::new(
            &plan,
            &self.network.endpoint,
            &self.hasher.hash_config(self.config),
            Some(prerequisites.mint.clone()),
            started_at,
            result.results,
            result.cancelled,
        );

        let record_path = match self.store.persist(&record).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!(
                    "Failed to persist deployment record via {} store: {e}",
                    self.store.backend_type()
                );
                None
            }
        };

        Ok(RunOutcome::Executed(Box::new(RunReport {
            plan,
            prerequisites,
            record,
            record_path,
        })))
    }
}

impl RunReport {
    /// Returns the error that makes this run unsuccessful, if any.
    ///
    /// Cancelled runs and failed pipeline steps are failures; failed
    /// distribution steps are not.
    #[must_use]
    pub fn failure(&self) -> Option<DeployError> {
        if self.record.cancelled {
            return Some(DeployError::Cancelled {
                completed: self.record.summary.attempted,
                total: self.record.summary.planned,
            });
        }

        if self.record.policy == FailurePolicy::StopOnFirstError {
            return self.record.first_failure().map(|step| {
                DeployError::Step(StepError::Failed {
                    index: step.index,
                    name: step.name.clone(),
                    message: step.error.clone().unwrap_or_default(),
                })
            });
        }

        None
    }

    /// Returns true if the run should exit successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }
}

impl RunOutcome {
    /// Returns true if the run should exit successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::DryRun(_) => true,
            Self::Executed(report) => report.is_success(),
        }
    }
}

impl<S: RecordStore> std::fmt::Debug for Orchestrator<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("network", &self.network_name)
            .field("credentials_dir", &self.credentials_dir)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
