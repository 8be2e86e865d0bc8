//! Typed inputs and outputs for Juju client operations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Model type as reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Iaas,
    Caas,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Iaas => "iaas",
            ModelType::Caas => "caas",
        }
    }
}

/// Access levels that can be granted on a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelAccess {
    Read,
    Write,
    Admin,
}

impl ModelAccess {
    pub const ALL: &'static [&'static str] = &["read", "write", "admin"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(ModelAccess::Read),
            "write" => Some(ModelAccess::Write),
            "admin" => Some(ModelAccess::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAccess::Read => "read",
            ModelAccess::Write => "write",
            ModelAccess::Admin => "admin",
        }
    }
}

/// Access levels that can be granted on an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferAccess {
    Read,
    Consume,
    Admin,
}

impl OfferAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferAccess::Read => "read",
            OfferAccess::Consume => "consume",
            OfferAccess::Admin => "admin",
        }
    }
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateModelInput {
    pub name: String,
    pub cloud: Option<String>,
    pub cloud_region: Option<String>,
    pub credential: Option<String>,
    pub config: BTreeMap<String, String>,
    pub constraints: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub uuid: String,
    pub name: String,
    pub model_type: ModelType,
    pub owner: String,
    pub cloud: String,
    pub cloud_region: String,
    pub credential: Option<String>,
    pub config: BTreeMap<String, String>,
    /// Canonical constraint string, empty when unset
    pub constraints: String,
    pub users: BTreeMap<String, ModelAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateModelInput {
    pub uuid: String,
    pub config: BTreeMap<String, String>,
    pub unset: Vec<String>,
    pub constraints: Option<String>,
    pub credential: Option<String>,
}

// ============================================================================
// Applications
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmSpec {
    pub name: String,
    pub channel: Option<String>,
    pub revision: Option<i64>,
    pub base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposeSpec {
    pub endpoints: Vec<String>,
    pub spaces: Vec<String>,
    pub cidrs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    pub label: String,
    pub size: String,
    pub pool: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateApplicationInput {
    pub model_uuid: String,
    pub name: String,
    pub charm: CharmSpec,
    pub units: u32,
    /// Placement directives, one unit per machine
    pub machines: Vec<String>,
    pub constraints: Option<String>,
    pub config: BTreeMap<String, String>,
    pub trust: bool,
    pub expose: Option<ExposeSpec>,
    /// Storage directives keyed by storage label, e.g. `files = "10G,2"`
    pub storage_directives: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub model_uuid: String,
    pub name: String,
    pub charm: CharmSpec,
    pub units: u32,
    pub machines: Vec<String>,
    pub constraints: String,
    pub config: BTreeMap<String, String>,
    pub trust: bool,
    pub expose: Option<ExposeSpec>,
    pub storage: Vec<StorageSpec>,
    pub storage_directives: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateApplicationInput {
    pub model_uuid: String,
    pub name: String,
    pub channel: Option<String>,
    pub revision: Option<i64>,
    pub base: Option<String>,
    pub units: Option<u32>,
    /// When set, units are placed on exactly these machines
    pub machines: Option<Vec<String>>,
    pub constraints: Option<String>,
    pub config: BTreeMap<String, String>,
    pub unset_config: Vec<String>,
    pub trust: Option<bool>,
    pub expose: Option<ExposeSpec>,
    pub unexpose: bool,
}

// ============================================================================
// Machines
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMachineInput {
    pub model_uuid: String,
    pub constraints: Option<String>,
    pub disks: Option<String>,
    pub base: Option<String>,
    pub ssh_address: Option<String>,
    pub public_key_file: Option<String>,
    pub private_key_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMachineResponse {
    pub machine_id: String,
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub model_uuid: String,
    pub machine_id: String,
    pub base: String,
    pub constraints: String,
    pub disks: Option<String>,
    pub hostname: String,
    pub status: String,
}

// ============================================================================
// Offers
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOfferInput {
    pub model_uuid: String,
    pub application_name: String,
    pub endpoints: Vec<String>,
    pub offer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferInfo {
    pub url: String,
    pub name: String,
    pub model_uuid: String,
    pub application_name: String,
    pub endpoints: Vec<String>,
    pub users: BTreeMap<String, OfferAccess>,
}

// ============================================================================
// Integrations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntegrationEndpoint {
    pub application: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIntegrationInput {
    pub model_uuid: String,
    /// Endpoints as `application[:endpoint]`
    pub endpoints: Vec<String>,
    pub via: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationInfo {
    pub model_uuid: String,
    pub endpoints: Vec<IntegrationEndpoint>,
    pub via: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeOfferInput {
    pub model_uuid: String,
    pub offer_url: String,
    pub alias: Option<String>,
}

// ============================================================================
// Secrets
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSecretInput {
    pub model_uuid: String,
    pub name: Option<String>,
    /// Base64 encoded values
    pub value: BTreeMap<String, String>,
    pub info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSecretResponse {
    pub secret_id: String,
    pub secret_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSecretInput {
    pub model_uuid: String,
    pub secret_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInfo {
    pub secret_id: String,
    pub secret_uri: String,
    pub name: Option<String>,
    /// Base64 encoded values
    pub value: BTreeMap<String, String>,
    pub info: Option<String>,
    pub revision: u32,
    pub applications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSecretInput {
    pub model_uuid: String,
    pub secret_id: String,
    pub name: Option<String>,
    pub value: Option<BTreeMap<String, String>>,
    pub info: Option<String>,
}

// ============================================================================
// Credentials and clouds
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInput {
    pub name: String,
    pub cloud: String,
    pub auth_type: String,
    pub attributes: BTreeMap<String, String>,
    pub client: bool,
    pub controller: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    pub name: String,
    pub cloud: String,
    pub auth_type: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudRegion {
    pub name: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudInput {
    pub name: String,
    pub cloud_type: String,
    pub auth_types: Vec<String>,
    pub endpoint: Option<String>,
    pub regions: Vec<CloudRegion>,
}

pub type CloudInfo = CloudInput;

// ============================================================================
// SSH keys, users, storage pools
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyInfo {
    pub fingerprint: String,
    pub comment: String,
    pub payload: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub display_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePoolInput {
    pub model_uuid: String,
    pub name: String,
    pub provider: String,
    pub attributes: BTreeMap<String, String>,
}

pub type StoragePoolInfo = StoragePoolInput;

// ============================================================================
// JAAS
// ============================================================================

/// A JAAS group or role; both are a name behind a stable UUID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JaasEntity {
    pub uuid: String,
    pub name: String,
}
