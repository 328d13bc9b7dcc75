//! Credential directory loader.
//!
//! Loads `<dir>/<name>.json` for each requested name. A missing file is not
//! an error here: the name is simply absent from the returned map and the
//! prerequisite check reports it by name.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{CredentialError, DeployError, PrerequisiteError, Result};

use super::key::KeyMaterial;

/// Credential name of the fee payer (also mint and update authority).
pub const PAYER: &str = "payer";

/// Credential name of the mint keypair.
pub const MINT: &str = "mint";

/// Credentials loaded for one run.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Directory the credentials were loaded from.
    directory: PathBuf,
    /// Loaded keys by name.
    keys: BTreeMap<String, KeyMaterial>,
}

impl Credentials {
    /// Creates an empty credential set rooted at `directory`.
    #[must_use]
    pub fn empty(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            keys: BTreeMap::new(),
        }
    }

    /// Adds a key.
    pub fn insert(&mut self, key: KeyMaterial) {
        self.keys.insert(key.name().to_string(), key);
    }

    /// Returns a key by name if it was loaded.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&KeyMaterial> {
        self.keys.get(name)
    }

    /// Returns a key by name or a prerequisite error naming it.
    ///
    /// # Errors
    ///
    /// Returns `PrerequisiteError::MissingCredential` if the key is absent.
    pub fn require(&self, name: &str) -> Result<&KeyMaterial> {
        self.keys.get(name).ok_or_else(|| {
            DeployError::Prerequisite(PrerequisiteError::MissingCredential {
                name: name.to_string(),
                path: credential_path(&self.directory, name),
            })
        })
    }

    /// Returns loaded key names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.keys.keys().map(String::as_str).collect()
    }
}

/// Returns true if `name` refers to a file directly inside the credential
/// directory: no path separators and no `..`.
#[must_use]
pub fn is_valid_credential_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

/// Returns the file path for a credential name.
#[must_use]
pub fn credential_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{name}.json"))
}

/// Loads the named credentials from a directory.
///
/// Names whose file does not exist are omitted from the result.
///
/// # Errors
///
/// Returns `CredentialError` if a file exists but cannot be read or parsed.
pub fn load_credentials(directory: &Path, required: &BTreeSet<String>) -> Result<Credentials> {
    info!("Loading credentials from: {}", directory.display());

    let mut credentials = Credentials::empty(directory);

    for name in required {
        if !is_valid_credential_name(name) {
            return Err(CredentialError::InvalidName { name: name.clone() }.into());
        }
        let path = credential_path(directory, name);

        if !path.exists() {
            debug!("Credential '{name}' not found at {}", path.display());
            continue;
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            DeployError::Credential(CredentialError::Unreadable {
                name: name.clone(),
                path: path.clone(),
                message: e.to_string(),
            })
        })?;

        let key = KeyMaterial::from_json(name, &content).map_err(|message| {
            DeployError::Credential(CredentialError::Malformed {
                name: name.clone(),
                path: path.clone(),
                message,
            })
        })?;

        debug!("Loaded credential '{name}' ({})", key.address());
        credentials.insert(key);
    }

    let loaded = credentials.names();
    info!(
        "Loaded {}/{} credentials: {}",
        loaded.len(),
        required.len(),
        loaded.join(", ")
    );

    Ok(credentials)
}
