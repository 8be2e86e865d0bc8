//! Juju client interface
//!
//! One trait per domain object, combined into [`JujuClient`]. The provider
//! only ever holds an `Arc<dyn JujuClient>`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::*;

#[async_trait]
pub trait ModelsApi: Send + Sync {
    async fn create_model(&self, input: CreateModelInput) -> Result<ModelInfo>;
    async fn read_model(&self, uuid: &str) -> Result<ModelInfo>;
    async fn read_model_by_name(&self, name: &str) -> Result<ModelInfo>;
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
    async fn update_model(&self, input: UpdateModelInput) -> Result<()>;
    async fn destroy_model(&self, uuid: &str) -> Result<()>;
}

#[async_trait]
pub trait ApplicationsApi: Send + Sync {
    async fn create_application(&self, input: CreateApplicationInput) -> Result<ApplicationInfo>;
    async fn read_application(&self, model_uuid: &str, name: &str) -> Result<ApplicationInfo>;
    async fn list_applications(&self, model_uuid: &str) -> Result<Vec<ApplicationInfo>>;
    async fn update_application(&self, input: UpdateApplicationInput) -> Result<()>;
    async fn destroy_application(&self, model_uuid: &str, name: &str) -> Result<()>;
}

#[async_trait]
pub trait MachinesApi: Send + Sync {
    async fn create_machine(&self, input: CreateMachineInput) -> Result<CreateMachineResponse>;
    async fn read_machine(&self, model_uuid: &str, machine_id: &str) -> Result<MachineInfo>;
    async fn list_machines(&self, model_uuid: &str) -> Result<Vec<MachineInfo>>;
    async fn destroy_machine(&self, model_uuid: &str, machine_id: &str) -> Result<()>;
}

#[async_trait]
pub trait OffersApi: Send + Sync {
    async fn create_offer(&self, input: CreateOfferInput) -> Result<OfferInfo>;
    async fn read_offer(&self, url: &str) -> Result<OfferInfo>;
    async fn destroy_offer(&self, url: &str, force: bool) -> Result<()>;
    async fn grant_offer_access(&self, url: &str, user: &str, access: OfferAccess) -> Result<()>;
    async fn revoke_offer_access(&self, url: &str, user: &str, access: OfferAccess) -> Result<()>;
}

#[async_trait]
pub trait IntegrationsApi: Send + Sync {
    async fn create_integration(&self, input: CreateIntegrationInput) -> Result<IntegrationInfo>;
    /// `endpoints` holds the two `application:endpoint` pairs.
    async fn read_integration(&self, model_uuid: &str, endpoints: &[String]) -> Result<IntegrationInfo>;
    async fn destroy_integration(&self, model_uuid: &str, endpoints: &[String]) -> Result<()>;
    /// Consume an offer into the model, returning the local (SAAS) name.
    async fn consume_offer(&self, input: ConsumeOfferInput) -> Result<String>;
    async fn remove_remote_application(&self, model_uuid: &str, name: &str) -> Result<()>;
}

#[async_trait]
pub trait SecretsApi: Send + Sync {
    async fn create_secret(&self, input: CreateSecretInput) -> Result<CreateSecretResponse>;
    async fn read_secret(&self, input: ReadSecretInput) -> Result<SecretInfo>;
    async fn update_secret(&self, input: UpdateSecretInput) -> Result<()>;
    async fn delete_secret(&self, model_uuid: &str, secret_id: &str) -> Result<()>;
    async fn grant_secret(&self, model_uuid: &str, secret_id: &str, applications: &[String]) -> Result<()>;
    async fn revoke_secret(&self, model_uuid: &str, secret_id: &str, applications: &[String]) -> Result<()>;
}

#[async_trait]
pub trait CredentialsApi: Send + Sync {
    async fn create_credential(&self, input: CredentialInput) -> Result<()>;
    async fn read_credential(
        &self,
        name: &str,
        cloud: &str,
        client: bool,
        controller: bool,
    ) -> Result<CredentialInfo>;
    async fn update_credential(&self, input: CredentialInput) -> Result<()>;
    async fn destroy_credential(&self, name: &str, cloud: &str, client: bool, controller: bool) -> Result<()>;
}

#[async_trait]
pub trait CloudsApi: Send + Sync {
    async fn add_cloud(&self, input: CloudInput) -> Result<()>;
    async fn read_cloud(&self, name: &str) -> Result<CloudInfo>;
    async fn update_cloud(&self, input: CloudInput) -> Result<()>;
    async fn remove_cloud(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait SshKeysApi: Send + Sync {
    async fn add_ssh_key(&self, model_uuid: &str, payload: &str) -> Result<SshKeyInfo>;
    async fn list_ssh_keys(&self, model_uuid: &str) -> Result<Vec<SshKeyInfo>>;
    async fn delete_ssh_key(&self, model_uuid: &str, fingerprint: &str) -> Result<()>;
}

#[async_trait]
pub trait UsersApi: Send + Sync {
    async fn add_user(&self, input: UserInput) -> Result<UserInfo>;
    async fn read_user(&self, name: &str) -> Result<UserInfo>;
    async fn update_user(&self, input: UserInput) -> Result<()>;
    async fn remove_user(&self, name: &str) -> Result<()>;
    async fn grant_model_access(&self, model_uuid: &str, user: &str, access: ModelAccess) -> Result<()>;
    async fn revoke_model_access(&self, model_uuid: &str, user: &str, access: ModelAccess) -> Result<()>;
    async fn read_model_access(&self, model_uuid: &str) -> Result<BTreeMap<String, ModelAccess>>;
}

#[async_trait]
pub trait StoragePoolsApi: Send + Sync {
    async fn create_storage_pool(&self, input: StoragePoolInput) -> Result<()>;
    async fn read_storage_pool(&self, model_uuid: &str, name: &str) -> Result<StoragePoolInfo>;
    async fn update_storage_pool(&self, input: StoragePoolInput) -> Result<()>;
    async fn remove_storage_pool(&self, model_uuid: &str, name: &str) -> Result<()>;
}

#[async_trait]
pub trait JaasApi: Send + Sync {
    async fn add_group(&self, name: &str) -> Result<JaasEntity>;
    async fn read_group(&self, uuid: &str) -> Result<JaasEntity>;
    async fn rename_group(&self, uuid: &str, new_name: &str) -> Result<()>;
    async fn remove_group(&self, uuid: &str) -> Result<()>;
    async fn add_role(&self, name: &str) -> Result<JaasEntity>;
    async fn read_role(&self, uuid: &str) -> Result<JaasEntity>;
    async fn rename_role(&self, uuid: &str, new_name: &str) -> Result<()>;
    async fn remove_role(&self, uuid: &str) -> Result<()>;
}

/// The complete controller API surface used by the provider
pub trait JujuClient:
    ModelsApi
    + ApplicationsApi
    + MachinesApi
    + OffersApi
    + IntegrationsApi
    + SecretsApi
    + CredentialsApi
    + CloudsApi
    + SshKeysApi
    + UsersApi
    + StoragePoolsApi
    + JaasApi
{
}

impl<T> JujuClient for T where
    T: ModelsApi
        + ApplicationsApi
        + MachinesApi
        + OffersApi
        + IntegrationsApi
        + SecretsApi
        + CredentialsApi
        + CloudsApi
        + SshKeysApi
        + UsersApi
        + StoragePoolsApi
        + JaasApi
{
}
