//! Juju Terraform Provider Implementation
//!
//! The provider side of every tfplugin6 RPC, in terms of decoded values and
//! diagnostics. `server` translates to and from the wire messages.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn, Instrument};

use crate::client::{Connector, LocalConnector, ProviderData};
use crate::config::{self, ProviderConfig};
use crate::data_sources::{self, DataSource};
use crate::diag::Diagnostics;
use crate::plan::{self, PlanResult};
use crate::resources::{
    access_model::AccessModelResource, access_offer::AccessOfferResource, access_secret::AccessSecretResource,
    application::ApplicationResource, cloud::CloudResource, credential::CredentialResource,
    integration::IntegrationResource, jaas::JaasResource, machine::MachineResource, model::ModelResource,
    offer::OfferResource, secret::SecretResource, ssh_key::SshKeyResource, storage_pool::StoragePoolResource,
    user::UserResource, ListedResource, Resource,
};
use crate::schema::Schema;
use crate::state::Value;
use crate::validate;

pub const PROVIDER_TYPE_NAME: &str = "juju";

pub const RESOURCE_TYPES: &[&str] = &[
    "juju_access_model",
    "juju_access_offer",
    "juju_access_secret",
    "juju_application",
    "juju_cloud",
    "juju_credential",
    "juju_integration",
    "juju_jaas_group",
    "juju_jaas_role",
    "juju_machine",
    "juju_model",
    "juju_offer",
    "juju_secret",
    "juju_ssh_key",
    "juju_storage_pool",
    "juju_user",
];

pub const DATA_SOURCE_TYPES: &[&str] = &[
    "juju_application",
    "juju_machine",
    "juju_model",
    "juju_offer",
    "juju_secret",
];

/// An unconfigured resource of the given type
pub fn new_resource(type_name: &str) -> Option<Box<dyn Resource>> {
    let resource: Box<dyn Resource> = match type_name {
        "juju_access_model" => Box::new(AccessModelResource::new()),
        "juju_access_offer" => Box::new(AccessOfferResource::new()),
        "juju_access_secret" => Box::new(AccessSecretResource::new()),
        "juju_application" => Box::new(ApplicationResource::new()),
        "juju_cloud" => Box::new(CloudResource::new()),
        "juju_credential" => Box::new(CredentialResource::new()),
        "juju_integration" => Box::new(IntegrationResource::new()),
        "juju_jaas_group" => Box::new(JaasResource::group()),
        "juju_jaas_role" => Box::new(JaasResource::role()),
        "juju_machine" => Box::new(MachineResource::new()),
        "juju_model" => Box::new(ModelResource::new()),
        "juju_offer" => Box::new(OfferResource::new()),
        "juju_secret" => Box::new(SecretResource::new()),
        "juju_ssh_key" => Box::new(SshKeyResource::new()),
        "juju_storage_pool" => Box::new(StoragePoolResource::new()),
        "juju_user" => Box::new(UserResource::new()),
        _ => return None,
    };
    Some(resource)
}

/// An unconfigured data source of the given type
pub fn new_data_source(type_name: &str) -> Option<Box<dyn DataSource>> {
    let data_source: Box<dyn DataSource> = match type_name {
        "juju_application" => Box::new(data_sources::application::ApplicationDataSource::new()),
        "juju_machine" => Box::new(data_sources::machine::MachineDataSource::new()),
        "juju_model" => Box::new(data_sources::model::ModelDataSource::new()),
        "juju_offer" => Box::new(data_sources::offer::OfferDataSource::new()),
        "juju_secret" => Box::new(data_sources::secret::SecretDataSource::new()),
        _ => return None,
    };
    Some(data_source)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("unknown {kind} type {name:?}")]
    UnknownType { kind: &'static str, name: String },
}

impl ProviderError {
    fn resource(name: &str) -> Self {
        ProviderError::UnknownType {
            kind: "resource",
            name: name.to_string(),
        }
    }

    fn data_source(name: &str) -> Self {
        ProviderError::UnknownType {
            kind: "data source",
            name: name.to_string(),
        }
    }

    fn list_resource(name: &str) -> Self {
        ProviderError::UnknownType {
            kind: "list resource",
            name: name.to_string(),
        }
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Juju Terraform Provider
pub struct JujuProvider {
    connector: Arc<dyn Connector>,
    juju_data_dir: PathBuf,
    env: EnvLookup,
    /// Set by `configure`
    data: Arc<RwLock<Option<ProviderData>>>,
}

impl Default for JujuProvider {
    fn default() -> Self {
        Self::new(Arc::new(LocalConnector::default()))
    }
}

impl JujuProvider {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            juju_data_dir: juju_common::juju_data_dir(),
            env: Arc::new(|key| std::env::var(key).ok()),
            data: Arc::new(RwLock::new(None)),
        }
    }

    /// Where to look for the Juju CLI's `controllers.yaml` and `accounts.yaml`
    pub fn with_juju_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.juju_data_dir = dir.into();
        self
    }

    /// Replace the environment variable lookup
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Arc::new(lookup);
        self
    }

    async fn resource(&self, type_name: &str) -> Result<Box<dyn Resource>, ProviderError> {
        let mut resource = new_resource(type_name).ok_or_else(|| ProviderError::resource(type_name))?;
        if let Some(data) = self.data.read().await.as_ref() {
            resource.configure(data);
        }
        Ok(resource)
    }

    async fn data_source(&self, type_name: &str) -> Result<Box<dyn DataSource>, ProviderError> {
        let mut data_source = new_data_source(type_name).ok_or_else(|| ProviderError::data_source(type_name))?;
        if let Some(data) = self.data.read().await.as_ref() {
            data_source.configure(data);
        }
        Ok(data_source)
    }

    async fn skip_failed_deletion(&self) -> bool {
        self.data
            .read()
            .await
            .as_ref()
            .map_or(false, |data| data.config.skip_failed_deletion)
    }

    // ------------------------------------------------------------------
    // Schemas
    // ------------------------------------------------------------------

    pub fn provider_schema(&self) -> Schema {
        config::provider_schema()
    }

    pub fn resource_schemas(&self) -> BTreeMap<&'static str, Schema> {
        RESOURCE_TYPES
            .iter()
            .filter_map(|name| new_resource(name).map(|r| (*name, r.schema())))
            .collect()
    }

    pub fn data_source_schemas(&self) -> BTreeMap<&'static str, Schema> {
        DATA_SOURCE_TYPES
            .iter()
            .filter_map(|name| new_data_source(name).map(|d| (*name, d.schema())))
            .collect()
    }

    pub fn list_resource_schemas(&self) -> BTreeMap<&'static str, Schema> {
        RESOURCE_TYPES
            .iter()
            .filter_map(|name| new_resource(name).and_then(|r| r.list_schema()).map(|s| (*name, s)))
            .collect()
    }

    /// Schema of a resource type, for encoding its state
    pub fn resource_schema(&self, type_name: &str) -> Result<Schema, ProviderError> {
        new_resource(type_name)
            .map(|r| r.schema())
            .ok_or_else(|| ProviderError::resource(type_name))
    }

    pub fn data_source_schema(&self, type_name: &str) -> Result<Schema, ProviderError> {
        new_data_source(type_name)
            .map(|d| d.schema())
            .ok_or_else(|| ProviderError::data_source(type_name))
    }

    pub fn list_resource_schema(&self, type_name: &str) -> Result<Schema, ProviderError> {
        new_resource(type_name)
            .and_then(|r| r.list_schema())
            .ok_or_else(|| ProviderError::list_resource(type_name))
    }

    // ------------------------------------------------------------------
    // Provider
    // ------------------------------------------------------------------

    pub fn validate_provider_config(&self, config: &Value) -> Diagnostics {
        let mut diags = validate::validate_config(&self.provider_schema(), config);
        if !diags.has_error() {
            ProviderConfig::from_value(config).validate(&mut diags);
        }
        diags
    }

    /// Resolve the configuration and connect. Resources created afterwards
    /// are configured with the connection.
    pub async fn configure(&self, config: &Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let mut resolved = ProviderConfig::from_value(config);
        resolved.validate(&mut diags);
        if diags.has_error() {
            return diags;
        }

        resolved.apply_env(|key| (self.env)(key));
        if let Err(e) = resolved.merge_juju_cli(&self.juju_data_dir) {
            diags.warning(
                "Unable to Read Juju CLI Configuration",
                format!("Ignoring the Juju client store in {}: {e}", self.juju_data_dir.display()),
            );
        }
        // Sources can disagree; only a consistent result can log in.
        resolved.validate(&mut diags);
        if diags.has_error() {
            return diags;
        }

        match self.connector.connect(&resolved) {
            Ok(data) => {
                info!(
                    addresses = ?resolved.controller_addresses,
                    jaas = data.is_jaas,
                    "Configured Juju provider"
                );
                *self.data.write().await = Some(data);
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to the Juju controller");
                diags.error(
                    "Unable to Create Juju Client",
                    format!("Unable to connect to the Juju controller: {e:#}"),
                );
            }
        }
        diags
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub async fn validate_resource_config(&self, type_name: &str, config: &Value) -> Result<Diagnostics, ProviderError> {
        let resource = self.resource(type_name).await?;
        let mut diags = validate::validate_config(&resource.schema(), config);
        if !diags.has_error() {
            resource.validate_config(config, &mut diags);
        }
        Ok(diags)
    }

    pub async fn upgrade_resource_state(
        &self,
        type_name: &str,
        version: i64,
        state: Value,
    ) -> Result<(Option<Value>, Diagnostics), ProviderError> {
        let resource = self.resource(type_name).await?;
        let mut diags = Diagnostics::new();
        let current = resource.schema().version;
        if version > current {
            diags.error(
                "Unable to Upgrade Resource State",
                format!("State version {version} of {type_name} is newer than the provider's version {current}."),
            );
            return Ok((None, diags));
        }
        let upgraded = if version == current {
            Some(state)
        } else {
            resource.upgrade_state(version, state, &mut diags)
        };
        Ok((upgraded, diags))
    }

    /// Refresh state. `None` removes the resource from state.
    pub async fn read_resource(&self, type_name: &str, state: &Value) -> Result<(Option<Value>, Diagnostics), ProviderError> {
        let resource = self.resource(type_name).await?;
        let mut diags = Diagnostics::new();
        let span = resource.subsystem().clone();
        let new_state = resource.read(state, &mut diags).instrument(span).await;
        if new_state.is_none() && !diags.has_error() {
            debug!(resource = type_name, "Resource no longer exists");
        }
        Ok((new_state, diags))
    }

    pub async fn plan_resource_change(
        &self,
        type_name: &str,
        prior: &Value,
        proposed: &Value,
        config: &Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(type_name).await?;
        let mut result = plan::plan_resource_change(&resource.schema(), prior, proposed, config);
        if !result.planned_state.is_null() && !result.diagnostics.has_error() {
            let _entered = resource.subsystem().enter();
            resource.modify_plan(
                config,
                prior,
                &mut result.planned_state,
                &mut result.requires_replace,
                &mut result.diagnostics,
            );
        }
        Ok(result)
    }

    /// Create, update or delete. Returns the new state; null after a
    /// delete, the prior state when an update or delete failed.
    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior: &Value,
        planned: &Value,
    ) -> Result<(Value, Diagnostics), ProviderError> {
        let resource = self.resource(type_name).await?;
        let mut diags = Diagnostics::new();
        let span = resource.subsystem().clone();

        if planned.is_null() {
            resource.delete(prior, &mut diags).instrument(span).await;
            if !diags.has_error() {
                return Ok((Value::Null, diags));
            }
            if self.skip_failed_deletion().await {
                warn!(resource = type_name, "Ignoring failed deletion");
                return Ok((Value::Null, diags.into_warnings()));
            }
            return Ok((prior.clone(), diags));
        }

        let new_state = if prior.is_null() {
            resource.create(planned, &mut diags).instrument(span).await
        } else {
            resource.update(planned, prior, &mut diags).instrument(span).await
        };
        let mut new_state = match new_state {
            Some(state) => state,
            None if prior.is_null() => Value::Null,
            None => prior.clone(),
        };
        new_state.unknowns_to_null();
        Ok((new_state, diags))
    }

    /// Build state for an existing object from its ID. `None` with no
    /// errors means nothing was found.
    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> Result<(Option<Value>, Diagnostics), ProviderError> {
        let resource = self.resource(type_name).await?;
        let mut diags = Diagnostics::new();
        let Some(initial) = resource.import_state(id, &mut diags) else {
            return Ok((None, diags));
        };
        let span = resource.subsystem().clone();
        let state = resource.read(&initial, &mut diags).instrument(span).await;
        if state.is_none() && !diags.has_error() {
            diags.error(
                "Cannot Import Non-Existent Remote Object",
                format!("While attempting to import an existing object to {type_name}, no object with ID {id:?} was found."),
            );
        }
        Ok((state, diags))
    }

    // ------------------------------------------------------------------
    // Data sources and list resources
    // ------------------------------------------------------------------

    pub async fn validate_data_source_config(&self, type_name: &str, config: &Value) -> Result<Diagnostics, ProviderError> {
        let data_source = self.data_source(type_name).await?;
        let mut diags = validate::validate_config(&data_source.schema(), config);
        if !diags.has_error() {
            data_source.validate_config(config, &mut diags);
        }
        Ok(diags)
    }

    pub async fn read_data_source(&self, type_name: &str, config: &Value) -> Result<(Value, Diagnostics), ProviderError> {
        let data_source = self.data_source(type_name).await?;
        let mut diags = Diagnostics::new();
        let span = data_source.subsystem().clone();
        let state = data_source.read(config, &mut diags).instrument(span).await;
        Ok((state.unwrap_or_default(), diags))
    }

    pub async fn list_resources(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<(Vec<ListedResource>, Diagnostics), ProviderError> {
        let resource = self.resource(type_name).await?;
        if resource.list_schema().is_none() {
            return Err(ProviderError::list_resource(type_name));
        }
        let mut diags = Diagnostics::new();
        let span = resource.subsystem().clone();
        let listed = resource.list(config, &mut diags).instrument(span).await;
        Ok((listed, diags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_type_builds() {
        for name in RESOURCE_TYPES {
            let resource = new_resource(name).unwrap();
            assert_eq!(resource.type_name(), *name);
        }
        for name in DATA_SOURCE_TYPES {
            assert_eq!(new_data_source(name).unwrap().type_name(), *name);
        }
        assert!(new_resource("juju_unknown").is_none());
    }

    #[test]
    fn test_list_resources() {
        let provider = JujuProvider::default();
        let listable: Vec<&str> = provider.list_resource_schemas().into_keys().collect();
        assert_eq!(listable, vec!["juju_application", "juju_machine", "juju_model"]);
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let provider = JujuProvider::default();
        let err = provider.read_resource("juju_bogus", &Value::Null).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::UnknownType {
                kind: "resource",
                name: "juju_bogus".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unconfigured_provider_reports_missing_client() {
        let provider = JujuProvider::default();
        let (state, diags) = provider
            .read_resource("juju_model", &crate::state::make_state(vec![("id", crate::state::string_value("x"))]))
            .await
            .unwrap();
        assert!(state.is_none());
        assert!(diags.has_error());
    }
}
