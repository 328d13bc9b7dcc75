//! Planning module for deployment actions.
//!
//! This module turns the configuration and an action request into an
//! ordered execution plan, and executes plans step by step against the
//! chain collaborators.

mod allocation;
mod plan;
mod executor;

pub use allocation::{Allocation, AllocationTable, BUCKET_ORDER, compute_allocations, floor_share};
pub use plan::{ActionRequest, DeployAction, ExecutionPlan, FailurePolicy, PlanStep, StepKind};
pub use executor::{DEFAULT_STEP_DELAY, DEFAULT_STEP_TIMEOUT, ExecutionResult, PlanExecutor};

#[cfg(test)]
pub(crate) use plan::fixtures;
