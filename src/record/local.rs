//! Local file-based record storage.
//!
//! Records land in the deployments directory as pretty JSON, one file per
//! run. Files are opened with create-new semantics and never rewritten.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DeployError, PersistenceError, Result};

use super::lock::{LockInfo, generate_holder_id};
use super::store::RecordStore;
use super::types::DeploymentRecord;

/// Attempts at finding an unused record file name.
const MAX_NAME_ATTEMPTS: usize = 5;

/// Local file-based record store.
#[derive(Debug, Clone)]
pub struct LocalRecordStore {
    /// Directory holding records and lock files.
    base_dir: PathBuf,
}

impl LocalRecordStore {
    /// Creates a store rooted at a directory. Nothing is created until the
    /// first write.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the store directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the lock file path for a network.
    #[must_use]
    pub fn lock_path(&self, network: &str) -> PathBuf {
        self.base_dir.join(format!(".{network}.lock"))
    }

    /// Ensures the directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating deployments directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                DeployError::Persistence(PersistenceError::CreateDir {
                    path: self.base_dir.clone(),
                    message: e.to_string(),
                })
            })?;
        }
        Ok(())
    }

    /// Writes `content` to a new file, failing if it already exists.
    async fn write_new(path: &Path, content: &[u8]) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(content).await?;
        file.sync_all().await
    }

    /// Reads the lock file for a network if it exists.
    async fn read_lock_file(&self, network: &str) -> Result<Option<LockInfo>> {
        let path = self.lock_path(network);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            DeployError::Persistence(PersistenceError::Lock {
                message: format!("Failed to read lock file {}: {e}", path.display()),
            })
        })?;

        let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
            DeployError::Persistence(PersistenceError::Lock {
                message: format!("Failed to parse lock file {}: {e}", path.display()),
            })
        })?;

        Ok(Some(lock_info))
    }

    /// Deletes the lock file for a network.
    async fn delete_lock_file(&self, network: &str) -> Result<()> {
        let path = self.lock_path(network);
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                DeployError::Persistence(PersistenceError::Lock {
                    message: format!("Failed to delete lock file {}: {e}", path.display()),
                })
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn persist(&self, record: &DeploymentRecord) -> Result<PathBuf> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(record).map_err(|e| {
            DeployError::Persistence(PersistenceError::serialization(format!(
                "Failed to serialize record: {e}"
            )))
        })?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string();
            let path = self.base_dir.join(record.file_name(&suffix[..8]));

            match Self::write_new(&path, content.as_bytes()).await {
                Ok(()) => {
                    info!("Deployment record written to {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Record name {} taken, retrying", path.display());
                }
                Err(e) => {
                    return Err(DeployError::Persistence(PersistenceError::Write {
                        path,
                        message: e.to_string(),
                    }));
                }
            }
        }

        Err(DeployError::Persistence(PersistenceError::Write {
            path: self.base_dir.clone(),
            message: String::from("could not find an unused record file name"),
        }))
    }

    async fn acquire_lock(&self, network: &str, holder: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file(network).await? {
            if !existing.is_expired() {
                return Err(DeployError::Persistence(PersistenceError::LockedByOther {
                    network: network.to_string(),
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }));
            }
            debug!("Expired lock on {network} found, taking over");
            self.delete_lock_file(network).await?;
        }

        self.ensure_dir().await?;

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };
        let lock_info = LockInfo::new(network, &holder_id);

        let content = serde_json::to_string_pretty(&lock_info).map_err(|e| {
            DeployError::Persistence(PersistenceError::serialization(format!(
                "Failed to serialize lock: {e}"
            )))
        })?;

        let path = self.lock_path(network);
        Self::write_new(&path, content.as_bytes()).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                DeployError::Persistence(PersistenceError::LockedByOther {
                    network: network.to_string(),
                    holder: String::from("another process"),
                    since: String::from("just now"),
                })
            } else {
                DeployError::Persistence(PersistenceError::Lock {
                    message: format!("Failed to create lock file {}: {e}", path.display()),
                })
            }
        })?;

        info!(
            "Acquired run lock on {network}: {} (expires in {}s)",
            lock_info.lock_id,
            lock_info.remaining_secs()
        );
        Ok(lock_info)
    }

    async fn release_lock(&self, network: &str, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file(network).await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file(network).await?;
                info!("Released run lock on {network}");
            } else {
                debug!(
                    "Lock ID mismatch on {network}: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
