//! Record store trait definition.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

use super::lock::LockInfo;
use super::types::DeploymentRecord;

/// Storage backend for deployment records and run locks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes a record under a fresh name and returns where it went.
    ///
    /// Never overwrites an existing record.
    async fn persist(&self, record: &DeploymentRecord) -> Result<PathBuf>;

    /// Acquires the run lock for a network.
    async fn acquire_lock(&self, network: &str, holder: &str) -> Result<LockInfo>;

    /// Releases the run lock for a network if `lock_id` still holds it.
    async fn release_lock(&self, network: &str, lock_id: &str) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
