//! Deployment record module.
//!
//! Every non-dry run produces one immutable `DeploymentRecord` holding the
//! outcome of each attempted step. Records are written once and never
//! updated.

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalRecordStore;
pub use lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
pub use store::RecordStore;
pub use types::{DeploymentRecord, RECORD_VERSION, RecordSummary, StepResult};

#[cfg(test)]
pub(crate) mod testing {
    //! Mock record store for unit tests.

    use async_trait::async_trait;
    use mockall::mock;
    use std::path::PathBuf;

    use super::{DeploymentRecord, LockInfo, RecordStore};
    use crate::error::Result;

    mock! {
        pub Store {}

        #[async_trait]
        impl RecordStore for Store {
            async fn persist(&self, record: &DeploymentRecord) -> Result<PathBuf>;
            async fn acquire_lock(&self, network: &str, holder: &str) -> Result<LockInfo>;
            async fn release_lock(&self, network: &str, lock_id: &str) -> Result<()>;
            fn backend_type(&self) -> &'static str;
        }
    }
}
