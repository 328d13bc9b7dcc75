//! Deployment record types.
//!
//! A `StepResult` is created once per attempted step and a
//! `DeploymentRecord` once per run; neither is modified after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::planner::{DeployAction, ExecutionPlan, FailurePolicy, PlanStep};

/// Current record format version.
pub const RECORD_VERSION: u32 = 1;

/// Outcome of one attempted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step index in the plan.
    pub index: usize,
    /// Step name.
    pub name: String,
    /// Whether the step succeeded.
    pub success: bool,
    /// Transaction signature, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Address produced by the step (mint, token account, pool).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Error message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Token amount in whole tokens.
    pub amount: u64,
    /// When the step started.
    pub started_at: DateTime<Utc>,
    /// When the step finished.
    pub finished_at: DateTime<Utc>,
}

/// Totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Steps in the plan.
    pub planned: usize,
    /// Steps attempted.
    pub attempted: usize,
    /// Steps that succeeded.
    pub succeeded: usize,
    /// Steps that failed.
    pub failed: usize,
    /// Steps never attempted.
    pub skipped: usize,
    /// Tokens the plan intended to move.
    pub tokens_planned: u64,
    /// Tokens moved by successful steps.
    pub tokens_delivered: u64,
}

/// Durable audit record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Record format version.
    pub version: u32,
    /// Unique run identifier.
    pub run_id: String,
    /// Action performed.
    pub action: DeployAction,
    /// Failure policy the run used.
    pub policy: FailurePolicy,
    /// Network name.
    pub network: String,
    /// Endpoint the run talked to.
    pub endpoint: String,
    /// Mint address, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<String>,
    /// Hash of the configuration used.
    pub config_hash: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Step outcomes in execution order.
    pub results: Vec<StepResult>,
    /// Totals.
    pub summary: RecordSummary,
    /// Whether the run was cancelled before completing.
    pub cancelled: bool,
}

impl StepResult {
    /// Creates a successful result.
    #[must_use]
    pub fn succeeded(
        step: &PlanStep,
        signature: String,
        address: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            index: step.index,
            name: step.name.clone(),
            success: true,
            signature: Some(signature),
            address,
            error: None,
            amount: step.amount,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(step: &PlanStep, error: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            index: step.index,
            name: step.name.clone(),
            success: false,
            signature: None,
            address: None,
            error: Some(error.into()),
            amount: step.amount,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

impl RecordSummary {
    /// Computes totals for a plan and its results.
    #[must_use]
    pub fn compute(plan: &ExecutionPlan, results: &[StepResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            planned: plan.steps.len(),
            attempted: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            skipped: plan.steps.len().saturating_sub(results.len()),
            tokens_planned: plan.total_amount(),
            tokens_delivered: results.iter().filter(|r| r.success).map(|r| r.amount).sum(),
        }
    }
}

impl DeploymentRecord {
    /// Creates the record of a finished run.
    #[must_use]
    pub fn new(
        plan: &ExecutionPlan,
        endpoint: &str,
        config_hash: &str,
        mint: Option<String>,
        started_at: DateTime<Utc>,
        results: Vec<StepResult>,
        cancelled: bool,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            run_id: Uuid::new_v4().to_string(),
            action: plan.action,
            policy: plan.failure_policy(),
            network: plan.network.clone(),
            endpoint: endpoint.to_string(),
            mint,
            config_hash: config_hash.to_string(),
            started_at,
            finished_at: Utc::now(),
            summary: RecordSummary::compute(plan, &results),
            results,
            cancelled,
        }
    }

    /// Returns the first failed step.
    #[must_use]
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.results.iter().find(|r| !r.success)
    }

    /// Returns true if every planned step ran and succeeded.
    #[must_use]
    pub const fn is_complete_success(&self) -> bool {
        !self.cancelled && self.summary.failed == 0 && self.summary.skipped == 0
    }

    /// Returns the file name for this record with a unique suffix.
    #[must_use]
    pub fn file_name(&self, suffix: &str) -> String {
        format!(
            "{}-{}-{suffix}.json",
            self.network,
            self.started_at.format("%Y%m%dT%H%M%SZ")
        )
    }
}

impl std::fmt::Display for RecordSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} steps succeeded, {} failed, {} skipped",
            self.succeeded, self.planned, self.failed, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::fixtures;

    fn record(results: Vec<StepResult>, cancelled: bool) -> DeploymentRecord {
        let plan = ExecutionPlan::distribution(&fixtures::standard(), "devnet").unwrap();
        DeploymentRecord::new(&plan, "sim://devnet", "abc", None, Utc::now(), results, cancelled)
    }

    fn steps() -> Vec<PlanStep> {
        ExecutionPlan::distribution(&fixtures::standard(), "devnet")
            .unwrap()
            .steps
    }

    #[test]
    fn test_summary_counts() {
        let steps = steps();
        let now = Utc::now();
        let results = vec![
            StepResult::succeeded(&steps[0], String::from("sig0"), None, now),
            StepResult::failed(&steps[1], "boom", now),
            StepResult::succeeded(&steps[2], String::from("sig2"), None, now),
        ];
        let record = record(results, false);

        assert_eq!(record.summary.planned, 5);
        assert_eq!(record.summary.attempted, 3);
        assert_eq!(record.summary.succeeded, 2);
        assert_eq!(record.summary.failed, 1);
        assert_eq!(record.summary.skipped, 2);
        assert_eq!(record.summary.tokens_planned, 100_000_000);
        assert_eq!(record.summary.tokens_delivered, 55_000_000);
        assert_eq!(record.first_failure().unwrap().name, "community");
        assert!(!record.is_complete_success());
    }

    #[test]
    fn test_file_name_format() {
        let record = record(vec![], false);
        let name = record.file_name("1a2b3c4d");
        assert!(name.starts_with("devnet-"));
        assert!(name.ends_with("Z-1a2b3c4d.json"));
    }

    #[test]
    fn test_failed_result_has_no_signature() {
        let steps = steps();
        let result = StepResult::failed(&steps[0], "rejected", Utc::now());
        assert!(!result.success);
        assert!(result.signature.is_none());
        assert_eq!(result.error.as_deref(), Some("rejected"));
        assert_eq!(result.amount, 40_000_000);
    }

    #[test]
    fn test_record_serializes_action_name() {
        let record = record(vec![], true);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "mint");
        assert_eq!(json["policy"], "continue-on-error");
        assert_eq!(json["cancelled"], true);
    }
}
