//! Controller connections
//!
//! `ConfigureProvider` resolves the configuration, asks a [`Connector`] for
//! a client and hands the result to every resource as [`ProviderData`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use juju_common::{JujuClient, LocalController};
use tracing::info;

use crate::config::ProviderConfig;

/// What a configured resource needs to talk to the controller
#[derive(Clone)]
pub struct ProviderData {
    pub client: Arc<dyn JujuClient>,
    /// The controller is JAAS; group and role resources need this
    pub is_jaas: bool,
    pub config: ProviderConfig,
}

impl std::fmt::Debug for ProviderData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderData")
            .field("is_jaas", &self.is_jaas)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Opens a controller connection for a resolved configuration
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ProviderConfig) -> Result<ProviderData>;
}

/// Connects to a local controller persisted under `state_dir`, one state
/// file per controller address.
pub struct LocalConnector {
    state_dir: PathBuf,
}

impl LocalConnector {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn state_file(&self, address: &str) -> PathBuf {
        let sanitized: String = address
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.state_dir.join(format!("{sanitized}.json"))
    }
}

impl Default for LocalConnector {
    fn default() -> Self {
        Self::new(juju_common::default_state_dir())
    }
}

impl Connector for LocalConnector {
    fn connect(&self, config: &ProviderConfig) -> Result<ProviderData> {
        let Some(address) = config.controller_addresses.first() else {
            bail!("no controller addresses configured");
        };
        let login = config.login().map_err(anyhow::Error::msg)?;
        let path = self.state_file(address);
        info!(address = %address, state = %path.display(), "Connecting to controller");

        let controller = LocalController::open(&path, login)?;
        Ok(ProviderData {
            is_jaas: controller.is_jaas(),
            client: Arc::new(controller),
            config: config.clone(),
        })
    }
}

/// Hands out one existing client regardless of configuration
pub struct StaticConnector {
    client: Arc<dyn JujuClient>,
    is_jaas: bool,
}

impl StaticConnector {
    pub fn new(client: Arc<dyn JujuClient>, is_jaas: bool) -> Self {
        Self { client, is_jaas }
    }
}

impl Connector for StaticConnector {
    fn connect(&self, config: &ProviderConfig) -> Result<ProviderData> {
        Ok(ProviderData {
            client: self.client.clone(),
            is_jaas: self.is_jaas,
            config: config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_connector_persists_per_address() {
        let dir = tempfile::tempdir().unwrap();
        let connector = LocalConnector::new(dir.path());
        let config = ProviderConfig {
            controller_addresses: vec!["10.0.0.1:17070".to_string()],
            username: Some("admin".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        };

        let data = connector.connect(&config).unwrap();
        assert!(!data.is_jaas);
        assert!(dir.path().join("10.0.0.1_17070.json").exists());

        let wrong = ProviderConfig {
            password: Some("other".to_string()),
            ..config
        };
        assert!(connector.connect(&wrong).is_err());
    }

    #[test]
    fn test_service_account_login_is_jaas() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig {
            controller_addresses: vec!["jimm.example.com:443".to_string()],
            client_id: Some("tf".to_string()),
            client_secret: Some("s3cret".to_string()),
            ..Default::default()
        };
        let data = LocalConnector::new(dir.path()).connect(&config).unwrap();
        assert!(data.is_jaas);
    }

    #[test]
    fn test_no_address_is_an_error() {
        let config = ProviderConfig::default();
        assert!(LocalConnector::new("/nonexistent").connect(&config).is_err());
    }
}
