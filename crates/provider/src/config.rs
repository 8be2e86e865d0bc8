//! Provider configuration
//!
//! Values come from the provider block first, then `JUJU_*` environment
//! variables, then the Juju CLI's client store for the current controller.

use std::collections::BTreeMap;
use std::path::Path;

use juju_common::Login;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diag::{AttributePath, Diagnostics};
use crate::schema::{Attribute, Block, Schema};
use crate::state::{get_optional_bool_attr, get_optional_string_attr, Value};

/// Resolved provider configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Controller API endpoints, `host:port`
    pub controller_addresses: Vec<String>,

    pub username: Option<String>,

    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// PEM encoded controller CA certificate
    pub ca_certificate: Option<String>,

    /// JAAS service account
    pub client_id: Option<String>,

    #[serde(skip_serializing)]
    pub client_secret: Option<String>,

    /// Report failed deletions as warnings and drop the resource from state
    pub skip_failed_deletion: bool,
}

pub fn provider_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("The provider for managing Juju controllers, models and applications.")
            .attribute(
                Attribute::string("controller_addresses")
                    .optional()
                    .description("Comma separated controller API addresses (host:port). Can also be set with JUJU_CONTROLLER_ADDRESSES."),
            )
            .attribute(
                Attribute::string("username")
                    .optional()
                    .description("Controller username. Can also be set with JUJU_USERNAME."),
            )
            .attribute(
                Attribute::string("password")
                    .optional()
                    .sensitive()
                    .description("Controller password. Can also be set with JUJU_PASSWORD."),
            )
            .attribute(
                Attribute::string("ca_certificate")
                    .optional()
                    .description("Controller CA certificate in PEM format. Can also be set with JUJU_CA_CERT."),
            )
            .attribute(
                Attribute::string("client_id")
                    .optional()
                    .description("JAAS service account client ID. Can also be set with JUJU_CLIENT_ID."),
            )
            .attribute(
                Attribute::string("client_secret")
                    .optional()
                    .sensitive()
                    .description("JAAS service account client secret. Can also be set with JUJU_CLIENT_SECRET."),
            )
            .attribute(
                Attribute::bool("skip_failed_deletion")
                    .optional()
                    .description("Turn errors on resource deletion into warnings. Can also be set with JUJU_SKIP_FAILED_DELETION."),
            ),
    )
}

fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

#[derive(Debug, Default, Deserialize)]
struct ControllersFile {
    #[serde(default)]
    controllers: BTreeMap<String, ControllerEntry>,
    #[serde(rename = "current-controller")]
    current_controller: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ControllerEntry {
    #[serde(rename = "api-endpoints", default)]
    api_endpoints: Vec<String>,
    #[serde(rename = "ca-cert")]
    ca_cert: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    controllers: BTreeMap<String, AccountEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountEntry {
    user: Option<String>,
    password: Option<String>,
}

impl ProviderConfig {
    /// Read the provider block. Unknown values count as unset.
    pub fn from_value(value: &Value) -> Self {
        Self {
            controller_addresses: get_optional_string_attr(value, "controller_addresses")
                .map(|raw| split_addresses(&raw))
                .unwrap_or_default(),
            username: get_optional_string_attr(value, "username"),
            password: get_optional_string_attr(value, "password"),
            ca_certificate: get_optional_string_attr(value, "ca_certificate"),
            client_id: get_optional_string_attr(value, "client_id"),
            client_secret: get_optional_string_attr(value, "client_secret"),
            skip_failed_deletion: get_optional_bool_attr(value, "skip_failed_deletion").unwrap_or(false),
        }
    }

    /// Fill unset fields from environment variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if self.controller_addresses.is_empty() {
            if let Some(raw) = get("JUJU_CONTROLLER_ADDRESSES") {
                self.controller_addresses = split_addresses(&raw);
            }
        }
        self.ca_certificate = self.ca_certificate.take().or_else(|| get("JUJU_CA_CERT"));

        // The login kind is settled by the block, then by the environment.
        // Only the matching pair is filled from the environment.
        let client_login = if self.has_client_login() || self.has_password_login() {
            self.has_client_login()
        } else {
            get("JUJU_CLIENT_ID").is_some() || get("JUJU_CLIENT_SECRET").is_some()
        };
        if client_login {
            self.client_id = self.client_id.take().or_else(|| get("JUJU_CLIENT_ID"));
            self.client_secret = self.client_secret.take().or_else(|| get("JUJU_CLIENT_SECRET"));
        } else {
            self.username = self.username.take().or_else(|| get("JUJU_USERNAME"));
            self.password = self.password.take().or_else(|| get("JUJU_PASSWORD"));
        }
        if !self.skip_failed_deletion {
            self.skip_failed_deletion = get("JUJU_SKIP_FAILED_DELETION").map_or(false, |v| v == "true" || v == "1");
        }
    }

    /// Fill unset fields from the Juju CLI's `controllers.yaml` and
    /// `accounts.yaml` for the current controller. Missing files are fine.
    pub fn merge_juju_cli(&mut self, data_dir: &Path) -> anyhow::Result<()> {
        let controllers_path = data_dir.join("controllers.yaml");
        if !controllers_path.exists() {
            return Ok(());
        }
        let controllers: ControllersFile = serde_yaml::from_str(&std::fs::read_to_string(&controllers_path)?)?;
        let Some(current) = controllers.current_controller else {
            return Ok(());
        };
        debug!(controller = %current, "Reading Juju CLI client store");

        if let Some(entry) = controllers.controllers.get(&current) {
            if self.controller_addresses.is_empty() {
                self.controller_addresses = entry.api_endpoints.clone();
            }
            if self.ca_certificate.is_none() {
                self.ca_certificate = entry.ca_cert.clone();
            }
        }

        // Service account logins never fall back to CLI user credentials
        if self.has_client_login() {
            return Ok(());
        }
        let accounts_path = data_dir.join("accounts.yaml");
        if !accounts_path.exists() {
            return Ok(());
        }
        let accounts: AccountsFile = serde_yaml::from_str(&std::fs::read_to_string(&accounts_path)?)?;
        if let Some(account) = accounts.controllers.get(&current) {
            if self.username.is_none() {
                self.username = account.user.clone();
            }
            if self.password.is_none() {
                self.password = account.password.clone();
            }
        }
        Ok(())
    }

    fn has_password_login(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }

    fn has_client_login(&self) -> bool {
        self.client_id.is_some() || self.client_secret.is_some()
    }

    /// Check the configuration as written in the provider block.
    pub fn validate(&self, diags: &mut Diagnostics) {
        if self.has_password_login() && self.has_client_login() {
            diags.error(
                "Invalid Provider Configuration",
                "Only one of username/password or client_id/client_secret may be set.",
            );
        }
        for (set, name, other) in [
            (self.client_id.is_some() && self.client_secret.is_none(), "client_id", "client_secret"),
            (self.client_secret.is_some() && self.client_id.is_none(), "client_secret", "client_id"),
        ] {
            if set {
                diags.attribute_error(
                    &AttributePath::root(name),
                    "Invalid Provider Configuration",
                    format!("{name} requires {other} to be set as well."),
                );
            }
        }
    }

    /// The login to use, once every source has been merged.
    pub fn login(&self) -> Result<Login, String> {
        match (&self.client_id, &self.client_secret, &self.username, &self.password) {
            (Some(client_id), Some(client_secret), _, _) => Ok(Login::ClientCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            (None, None, Some(username), Some(password)) => Ok(Login::Password {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(
                "no credentials found: set username and password, or client_id and client_secret, \
                 in the provider block or the environment"
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{make_state, string_value};

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_provider_block_wins_over_environment() {
        let mut config = ProviderConfig::from_value(&make_state(vec![
            ("controller_addresses", string_value("10.0.0.1:17070, 10.0.0.2:17070")),
            ("username", string_value("admin")),
        ]));
        config.apply_env(env(&[
            ("JUJU_CONTROLLER_ADDRESSES", "192.168.1.1:17070"),
            ("JUJU_USERNAME", "bob"),
            ("JUJU_PASSWORD", "secret"),
            ("JUJU_SKIP_FAILED_DELETION", "true"),
        ]));

        assert_eq!(config.controller_addresses, vec!["10.0.0.1:17070", "10.0.0.2:17070"]);
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert!(config.skip_failed_deletion);
    }

    #[test]
    fn test_environment_follows_block_login_kind() {
        let mut config = ProviderConfig::from_value(&make_state(vec![
            ("client_id", string_value("svc")),
            ("client_secret", string_value("shh")),
        ]));
        config.apply_env(env(&[("JUJU_USERNAME", "admin"), ("JUJU_PASSWORD", "pw")]));
        assert_eq!(config.username, None);
        assert_eq!(config.password, None);
        let mut diags = Diagnostics::new();
        config.validate(&mut diags);
        assert!(diags.is_empty());

        let mut config = ProviderConfig::from_value(&make_state(vec![("password", string_value("pw"))]));
        config.apply_env(env(&[
            ("JUJU_USERNAME", "admin"),
            ("JUJU_CLIENT_ID", "svc"),
            ("JUJU_CLIENT_SECRET", "shh"),
        ]));
        assert_eq!(config.client_id, None);
        assert_eq!(config.client_secret, None);
        assert_eq!(
            config.login(),
            Ok(Login::Password {
                username: "admin".to_string(),
                password: "pw".to_string()
            })
        );
    }

    #[test]
    fn test_environment_picks_login_kind_when_block_has_none() {
        let mut config = ProviderConfig::default();
        config.apply_env(env(&[
            ("JUJU_USERNAME", "admin"),
            ("JUJU_PASSWORD", "pw"),
            ("JUJU_CLIENT_ID", "svc"),
            ("JUJU_CLIENT_SECRET", "shh"),
        ]));
        assert_eq!(config.username, None);
        assert_eq!(
            config.login(),
            Ok(Login::ClientCredentials {
                client_id: "svc".to_string(),
                client_secret: "shh".to_string()
            })
        );
    }

    #[test]
    fn test_merge_juju_cli_current_controller() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("controllers.yaml"),
            "controllers:\n  lxd:\n    api-endpoints: ['10.0.0.9:17070']\n    ca-cert: CERT\ncurrent-controller: lxd\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("accounts.yaml"),
            "controllers:\n  lxd:\n    user: admin\n    password: hunter2\n",
        )
        .unwrap();

        let mut config = ProviderConfig::default();
        config.merge_juju_cli(dir.path()).unwrap();
        assert_eq!(config.controller_addresses, vec!["10.0.0.9:17070"]);
        assert_eq!(config.ca_certificate.as_deref(), Some("CERT"));
        assert_eq!(
            config.login(),
            Ok(Login::Password {
                username: "admin".to_string(),
                password: "hunter2".to_string()
            })
        );
    }

    #[test]
    fn test_missing_cli_store_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProviderConfig::default();
        config.merge_juju_cli(dir.path()).unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert!(config.login().is_err());
    }

    #[test]
    fn test_mixed_logins_rejected() {
        let config = ProviderConfig {
            username: Some("admin".into()),
            client_id: Some("svc".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        config.validate(&mut diags);
        assert!(diags.has_error());
        assert_eq!(diags.len(), 2);
    }
}
