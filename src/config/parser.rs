//! Configuration parser for loading deployment configuration.
//!
//! This module handles loading configuration from YAML (or JSON) files and
//! environment variables, with proper precedence and error handling.

use crate::error::{ConfigError, DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{DeploymentConfig, NetworkConfig};

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeploymentConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(DeployError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_str(&content, Some(path))
    }

    /// Parses configuration from a string.
    ///
    /// JSON documents are accepted since JSON is a subset of YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid.
    pub fn parse_str(&self, content: &str, source: Option<&Path>) -> Result<DeploymentConfig> {
        debug!("Parsing configuration document");

        let config: DeploymentConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            DeployError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration for token {} ({} networks, {} allocations)",
            config.token.symbol,
            config.networks.len(),
            config.allocations.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognised variables: `TOKEN_DEPLOY_RPC_URL` (endpoint of the selected
    /// network), `TOKEN_DEPLOY_CREDENTIALS_DIR`, `TOKEN_DEPLOY_DEPLOYMENTS_DIR`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// network is not defined.
    pub fn load_with_env(
        &self,
        path: impl AsRef<Path>,
        network: &str,
    ) -> Result<(DeploymentConfig, NetworkConfig)> {
        let mut config = self.load_file(path)?;

        Self::apply_env_overrides(&mut config, network);

        let selected = select_network(&config, network)?;
        Ok((config, selected))
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut DeploymentConfig, network: &str) {
        if let Ok(url) = std::env::var("TOKEN_DEPLOY_RPC_URL")
            && let Some(net) = config.networks.get_mut(network)
        {
            debug!("Overriding networks.{network}.endpoint from environment");
            net.endpoint = url;
        }

        if let Ok(dir) = std::env::var("TOKEN_DEPLOY_CREDENTIALS_DIR") {
            debug!("Overriding execution.credentials_dir from environment");
            config.execution.credentials_dir = dir;
        }

        if let Ok(dir) = std::env::var("TOKEN_DEPLOY_DEPLOYMENTS_DIR") {
            debug!("Overriding execution.deployments_dir from environment");
            config.execution.deployments_dir = dir;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                DeployError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Looks up a network by name.
///
/// # Errors
///
/// Returns `ConfigError::UnknownNetwork` if the name is not a key in `networks`.
pub fn select_network(config: &DeploymentConfig, network: &str) -> Result<NetworkConfig> {
    config.networks.get(network).cloned().ok_or_else(|| {
        DeployError::Config(ConfigError::UnknownNetwork {
            network: network.to_string(),
            available: config.network_names().join(", "),
        })
    })
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "token.deploy.yaml",
    "token.deploy.yml",
    "token.deploy.json",
    "deploy.yaml",
];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(DeployError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    use crate::config::spec::{Recipient, RemainderPolicy};

    const FULL_CONFIG: &str = r#"
token:
  name: Example Token
  symbol: EXT
  decimals: 6
  total_supply: 100000000
  metadata_uri: https://example.com/ext.json

networks:
  devnet:
    endpoint: https://api.devnet.solana.com
    programs:
      token: TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA
  localnet:
    endpoint: sim://local

allocations:
  - name: liquidity
    fraction: 0.4
    recipient:
      credential: payer
    purpose: Initial pool
  - name: team
    fraction: 0.15
    recipient:
      address: 7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU

execution:
  step_delay_ms: 0
  remainder: last
"#;

    #[test]
    fn test_parse_full_config() {
        let parser = ConfigParser::new();
        let config = parser.parse_str(FULL_CONFIG, None).unwrap();

        assert_eq!(config.token.symbol, "EXT");
        assert_eq!(config.token.decimals, 6);
        assert_eq!(config.networks.len(), 2);
        assert_eq!(config.allocations.len(), 2);
        assert_eq!(config.allocations[0].fraction, Decimal::new(4, 1));
        assert_eq!(
            config.allocations[0].recipient,
            Recipient::Credential(String::from("payer"))
        );
        assert_eq!(config.execution.remainder, RemainderPolicy::Last);
        assert_eq!(config.execution.step_delay_ms, 0);
        assert_eq!(config.execution.credentials_dir, "keys");
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{
            "token": {"name": "T", "symbol": "T", "total_supply": 10},
            "networks": {"devnet": {"endpoint": "sim://dev"}}
        }"#;
        let config = ConfigParser::new().parse_str(json, None).unwrap();
        assert_eq!(config.token.decimals, 9);
        assert!(config.allocations.is_empty());
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = ConfigParser::new().parse_str("token: [", None);
        assert!(matches!(
            result,
            Err(DeployError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigParser::new().load_file("/nonexistent/token.deploy.yaml");
        assert!(matches!(
            result,
            Err(DeployError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_unknown_network() {
        let config = ConfigParser::new().parse_str(FULL_CONFIG, None).unwrap();
        let err = select_network(&config, "mainnet").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("mainnet"));
        assert!(message.contains("devnet, localnet"));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("token.deploy.yaml"), FULL_CONFIG).unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("token.deploy.yaml"));
    }
}
