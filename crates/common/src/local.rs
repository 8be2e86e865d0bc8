//! Local in-process controller
//!
//! Implements the full [`JujuClient`](crate::client::JujuClient) surface
//! against an in-memory model of a controller. State can be persisted as
//! JSON so that separate provider processes (plan, then apply) observe the
//! same controller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::*;
use crate::constraints::Constraints;
use crate::error::{Error, Result};
use crate::names::{self, OfferUrl};
use crate::ssh::AuthorizedKey;
use crate::types::*;

const DEFAULT_BASE: &str = "ubuntu@22.04";
const DEFAULT_CHANNEL: &str = "latest/stable";
const DEFAULT_CLOUD: &str = "localhost";

/// How a client authenticates to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    Password { username: String, password: String },
    ClientCredentials { client_id: String, client_secret: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserRecord {
    display_name: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelRecord {
    info: ModelInfo,
    applications: BTreeMap<String, ApplicationInfo>,
    /// Consumed offers: local name -> offer URL
    remote_applications: BTreeMap<String, String>,
    machines: BTreeMap<String, MachineInfo>,
    next_machine: u64,
    integrations: Vec<IntegrationInfo>,
    secrets: BTreeMap<String, SecretInfo>,
    ssh_keys: Vec<SshKeyInfo>,
    storage_pools: BTreeMap<String, StoragePoolInfo>,
}

impl ModelRecord {
    fn has_application(&self, name: &str) -> bool {
        self.applications.contains_key(name) || self.remote_applications.contains_key(name)
    }

    fn add_machine(&mut self, base: &str, constraints: String, disks: Option<String>, hostname: Option<String>) -> String {
        let id = self.next_machine.to_string();
        self.next_machine += 1;
        let short_uuid: String = self.info.uuid.chars().take(6).collect();
        let machine = MachineInfo {
            model_uuid: self.info.uuid.clone(),
            machine_id: id.clone(),
            base: base.to_string(),
            constraints,
            disks,
            hostname: hostname.unwrap_or_else(|| format!("juju-{short_uuid}-{id}")),
            status: "started".to_string(),
        };
        self.machines.insert(id.clone(), machine);
        id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ControllerState {
    users: BTreeMap<String, UserRecord>,
    service_accounts: BTreeMap<String, String>,
    clouds: BTreeMap<String, CloudInfo>,
    models: BTreeMap<String, ModelRecord>,
    offers: BTreeMap<String, OfferInfo>,
    /// Keyed by `cloud/name`
    controller_credentials: BTreeMap<String, CredentialInfo>,
    /// Keyed by `cloud/name`
    client_credentials: BTreeMap<String, CredentialInfo>,
    groups: BTreeMap<String, JaasEntity>,
    roles: BTreeMap<String, JaasEntity>,
}

impl ControllerState {
    fn bootstrap() -> Self {
        let mut state = ControllerState::default();
        state.clouds.insert(
            DEFAULT_CLOUD.to_string(),
            CloudInfo {
                name: DEFAULT_CLOUD.to_string(),
                cloud_type: "lxd".to_string(),
                auth_types: vec!["certificate".to_string(), "interactive".to_string()],
                endpoint: None,
                regions: vec![CloudRegion {
                    name: DEFAULT_CLOUD.to_string(),
                    endpoint: None,
                }],
            },
        );
        state
    }

    fn model(&self, uuid: &str) -> Result<&ModelRecord> {
        self.models.get(uuid).ok_or_else(|| Error::not_found("model", uuid))
    }

    fn model_mut(&mut self, uuid: &str) -> Result<&mut ModelRecord> {
        self.models.get_mut(uuid).ok_or_else(|| Error::not_found("model", uuid))
    }

    fn user_exists(&self, name: &str) -> bool {
        name == "everyone@external" || name.contains('@') || self.users.contains_key(name)
    }
}

/// An in-process Juju controller
pub struct LocalController {
    state: RwLock<ControllerState>,
    path: Option<PathBuf>,
    user: String,
    jaas: bool,
}

impl Default for LocalController {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalController {
    /// An unpersisted controller logged in as `admin`.
    pub fn new() -> Self {
        let mut state = ControllerState::bootstrap();
        state.users.insert("admin".to_string(), UserRecord::default());
        Self {
            state: RwLock::new(state),
            path: None,
            user: "admin".to_string(),
            jaas: false,
        }
    }

    /// An unpersisted controller behaving as JAAS, logged in with a service account.
    pub fn new_jaas() -> Self {
        let mut controller = Self::new();
        controller.jaas = true;
        controller.user = "provider@serviceaccount".to_string();
        controller
    }

    /// Open (or bootstrap) a controller persisted at `path` and log in.
    ///
    /// The first password login to a fresh controller sets that user's
    /// password; later logins must match it.
    pub fn open(path: impl AsRef<Path>, login: Login) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            info!("Bootstrapping local controller at {}", path.display());
            ControllerState::bootstrap()
        };

        let (user, jaas) = match login {
            Login::Password { username, password } => {
                match state.users.get(&username) {
                    Some(UserRecord { password: Some(stored), .. }) if *stored != password => {
                        return Err(Error::Unauthorized(format!("invalid password for user {username:?}")));
                    }
                    Some(UserRecord { password: Some(_), .. }) => {}
                    Some(_) => {
                        return Err(Error::Unauthorized(format!("user {username:?} has no password set")));
                    }
                    None if state.users.is_empty() => {
                        state.users.insert(
                            username.clone(),
                            UserRecord {
                                display_name: None,
                                password: Some(password),
                            },
                        );
                    }
                    None => {
                        return Err(Error::Unauthorized(format!("user {username:?} not found")));
                    }
                }
                (username, false)
            }
            Login::ClientCredentials { client_id, client_secret } => {
                let stored = state
                    .service_accounts
                    .entry(client_id.clone())
                    .or_insert_with(|| client_secret.clone());
                if *stored != client_secret {
                    return Err(Error::Unauthorized(format!("invalid secret for client {client_id:?}")));
                }
                (format!("{client_id}@serviceaccount"), true)
            }
        };

        let controller = Self {
            state: RwLock::new(state),
            path: Some(path),
            user,
            jaas,
        };
        controller.persist(&controller.state.read())?;
        debug!(user = %controller.user, jaas = controller.jaas, "Logged in to local controller");
        Ok(controller)
    }

    /// The authenticated user
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn is_jaas(&self) -> bool {
        self.jaas
    }

    fn persist(&self, state: &ControllerState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&ControllerState) -> Result<T>) -> Result<T> {
        f(&self.state.read())
    }

    /// Apply a mutation and persist the result when it succeeds.
    ///
    /// The write lock is held across the file write, so the file always
    /// matches the last committed state. Each mutation blocks the calling
    /// worker for one small synchronous write.
    fn mutate<T>(&self, f: impl FnOnce(&mut ControllerState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write();
        let mut working = state.clone();
        let out = f(&mut working)?;
        self.persist(&working)?;
        *state = working;
        Ok(out)
    }

    fn require_jaas(&self) -> Result<()> {
        if self.jaas {
            Ok(())
        } else {
            Err(Error::NotSupported("this operation requires a JAAS controller".to_string()))
        }
    }
}

fn canonical_constraints(raw: Option<&str>) -> Result<String> {
    match raw {
        Some(raw) => Ok(Constraints::parse(raw)?.to_string()),
        None => Ok(String::new()),
    }
}

fn credential_key(cloud: &str, name: &str) -> String {
    format!("{cloud}/{name}")
}

/// Parse a storage directive (`pool,count,size` in any order).
fn parse_storage_directive(label: &str, directive: &str) -> Result<StorageSpec> {
    let mut spec = StorageSpec {
        label: label.to_string(),
        size: "1024M".to_string(),
        pool: "rootfs".to_string(),
        count: 1,
    };
    for token in directive.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Ok(count) = token.parse::<i64>() {
            spec.count = count;
        } else if token
            .strip_suffix(['M', 'G', 'T', 'P'])
            .map_or(false, |n| n.parse::<f64>().is_ok())
        {
            let size = Constraints::parse(&format!("root-disk={token}"))?
                .root_disk
                .unwrap_or_default();
            spec.size = format!("{size}M");
        } else {
            spec.pool = token.to_string();
        }
    }
    Ok(spec)
}

fn raise_access<T: Ord + Copy>(users: &mut BTreeMap<String, T>, user: &str, access: T) {
    let entry = users.entry(user.to_string()).or_insert(access);
    if access > *entry {
        *entry = access;
    }
}

#[async_trait]
impl ModelsApi for LocalController {
    async fn create_model(&self, input: CreateModelInput) -> Result<ModelInfo> {
        if !names::is_valid_model_name(&input.name) {
            return Err(Error::InvalidInput(format!("invalid model name {:?}", input.name)));
        }
        let owner = self.user.clone();
        self.mutate(|state| {
            if state
                .models
                .values()
                .any(|m| m.info.name == input.name && m.info.owner == owner)
            {
                return Err(Error::already_exists("model", format!("{owner}/{}", input.name)));
            }
            let cloud_name = input.cloud.clone().unwrap_or_else(|| DEFAULT_CLOUD.to_string());
            let cloud = state
                .clouds
                .get(&cloud_name)
                .ok_or_else(|| Error::not_found("cloud", &cloud_name))?;
            let region = match &input.cloud_region {
                Some(region) if cloud.regions.iter().any(|r| &r.name == region) => region.clone(),
                Some(region) => return Err(Error::not_found("cloud region", format!("{cloud_name}/{region}"))),
                None => cloud.regions.first().map(|r| r.name.clone()).unwrap_or_default(),
            };
            if let Some(credential) = &input.credential {
                if !state
                    .controller_credentials
                    .contains_key(&credential_key(&cloud_name, credential))
                {
                    return Err(Error::not_found("credential", credential_key(&cloud_name, credential)));
                }
            }
            let model_type = if cloud.cloud_type == "kubernetes" {
                ModelType::Caas
            } else {
                ModelType::Iaas
            };

            let uuid = uuid::Uuid::new_v4().to_string();
            let info = ModelInfo {
                uuid: uuid.clone(),
                name: input.name.clone(),
                model_type,
                owner: owner.clone(),
                cloud: cloud_name,
                cloud_region: region,
                credential: input.credential.clone(),
                config: input.config.clone(),
                constraints: canonical_constraints(input.constraints.as_deref())?,
                users: BTreeMap::from([(owner.clone(), ModelAccess::Admin)]),
            };
            state.models.insert(
                uuid.clone(),
                ModelRecord {
                    info: info.clone(),
                    applications: BTreeMap::new(),
                    remote_applications: BTreeMap::new(),
                    machines: BTreeMap::new(),
                    next_machine: 0,
                    integrations: Vec::new(),
                    secrets: BTreeMap::new(),
                    ssh_keys: Vec::new(),
                    storage_pools: BTreeMap::new(),
                },
            );
            info!("Created model {} ({})", info.name, uuid);
            Ok(info)
        })
    }

    async fn read_model(&self, uuid: &str) -> Result<ModelInfo> {
        self.read(|state| Ok(state.model(uuid)?.info.clone()))
    }

    async fn read_model_by_name(&self, name: &str) -> Result<ModelInfo> {
        let (owner, model_name) = match name.split_once('/') {
            Some((owner, model_name)) => (owner.to_string(), model_name),
            None => (self.user.clone(), name),
        };
        self.read(|state| {
            state
                .models
                .values()
                .find(|m| m.info.name == model_name && m.info.owner == owner)
                .map(|m| m.info.clone())
                .ok_or_else(|| Error::not_found("model", format!("{owner}/{model_name}")))
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.read(|state| Ok(state.models.values().map(|m| m.info.clone()).collect()))
    }

    async fn update_model(&self, input: UpdateModelInput) -> Result<()> {
        self.mutate(|state| {
            if let Some(credential) = &input.credential {
                let cloud = state.model(&input.uuid)?.info.cloud.clone();
                if !state.controller_credentials.contains_key(&credential_key(&cloud, credential)) {
                    return Err(Error::not_found("credential", credential_key(&cloud, credential)));
                }
            }
            let model = state.model_mut(&input.uuid)?;
            for key in &input.unset {
                model.info.config.remove(key);
            }
            model.info.config.extend(input.config.clone());
            if let Some(constraints) = &input.constraints {
                model.info.constraints = canonical_constraints(Some(constraints))?;
            }
            if input.credential.is_some() {
                model.info.credential = input.credential.clone();
            }
            Ok(())
        })
    }

    async fn destroy_model(&self, uuid: &str) -> Result<()> {
        self.mutate(|state| {
            state
                .models
                .remove(uuid)
                .ok_or_else(|| Error::not_found("model", uuid))?;
            state.offers.retain(|_, offer| offer.model_uuid != uuid);
            info!("Destroyed model {}", uuid);
            Ok(())
        })
    }
}

#[async_trait]
impl ApplicationsApi for LocalController {
    async fn create_application(&self, input: CreateApplicationInput) -> Result<ApplicationInfo> {
        if !names::is_valid_application_name(&input.name) {
            return Err(Error::InvalidInput(format!("invalid application name {:?}", input.name)));
        }
        if let Some(channel) = &input.charm.channel {
            names::Channel::parse(channel).map_err(Error::InvalidInput)?;
        }
        let constraints = canonical_constraints(input.constraints.as_deref())?;
        let storage = input
            .storage_directives
            .iter()
            .map(|(label, directive)| parse_storage_directive(label, directive))
            .collect::<Result<Vec<_>>>()?;

        self.mutate(|state| {
            let model = state.model_mut(&input.model_uuid)?;
            if model.has_application(&input.name) {
                return Err(Error::already_exists("application", &input.name));
            }

            let base = input.charm.base.clone().unwrap_or_else(|| DEFAULT_BASE.to_string());
            let (units, machines) = if !input.machines.is_empty() {
                if input.units as usize != input.machines.len() {
                    return Err(Error::InvalidInput(format!(
                        "units ({}) must match the number of machines ({})",
                        input.units,
                        input.machines.len()
                    )));
                }
                for machine in &input.machines {
                    if !model.machines.contains_key(machine) {
                        return Err(Error::not_found("machine", machine));
                    }
                }
                (input.units, input.machines.clone())
            } else if model.info.model_type == ModelType::Iaas {
                let placed = (0..input.units)
                    .map(|_| model.add_machine(&base, constraints.clone(), None, None))
                    .collect();
                (input.units, placed)
            } else {
                (input.units, Vec::new())
            };

            let app = ApplicationInfo {
                model_uuid: input.model_uuid.clone(),
                name: input.name.clone(),
                charm: CharmSpec {
                    name: input.charm.name.clone(),
                    channel: Some(input.charm.channel.clone().unwrap_or_else(|| DEFAULT_CHANNEL.to_string())),
                    revision: Some(input.charm.revision.unwrap_or(1)),
                    base: Some(base),
                },
                units,
                machines,
                constraints,
                config: input.config.clone(),
                trust: input.trust,
                expose: input.expose.clone(),
                storage,
                storage_directives: input.storage_directives.clone(),
            };
            model.applications.insert(app.name.clone(), app.clone());
            info!("Deployed application {} ({} units)", app.name, app.units);
            Ok(app)
        })
    }

    async fn read_application(&self, model_uuid: &str, name: &str) -> Result<ApplicationInfo> {
        self.read(|state| {
            state
                .model(model_uuid)?
                .applications
                .get(name)
                .cloned()
                .ok_or_else(|| Error::not_found("application", name))
        })
    }

    async fn list_applications(&self, model_uuid: &str) -> Result<Vec<ApplicationInfo>> {
        self.read(|state| Ok(state.model(model_uuid)?.applications.values().cloned().collect()))
    }

    async fn update_application(&self, input: UpdateApplicationInput) -> Result<()> {
        if let Some(channel) = &input.channel {
            names::Channel::parse(channel).map_err(Error::InvalidInput)?;
        }
        let constraints = match &input.constraints {
            Some(c) => Some(canonical_constraints(Some(c))?),
            None => None,
        };

        self.mutate(|state| {
            let model = state.model_mut(&input.model_uuid)?;
            let mut app = model
                .applications
                .get(&input.name)
                .cloned()
                .ok_or_else(|| Error::not_found("application", &input.name))?;

            if let Some(channel) = &input.channel {
                app.charm.channel = Some(channel.clone());
                if input.revision.is_none() {
                    app.charm.revision = Some(app.charm.revision.unwrap_or(0) + 1);
                }
            }
            if let Some(revision) = input.revision {
                app.charm.revision = Some(revision);
            }
            if let Some(base) = &input.base {
                app.charm.base = Some(base.clone());
            }
            if let Some(constraints) = constraints {
                app.constraints = constraints;
            }

            let base = app.charm.base.clone().unwrap_or_else(|| DEFAULT_BASE.to_string());
            if let Some(machines) = &input.machines {
                for machine in machines {
                    if !model.machines.contains_key(machine) {
                        return Err(Error::not_found("machine", machine));
                    }
                }
                app.machines = machines.clone();
                app.units = machines.len() as u32;
            } else if let Some(units) = input.units {
                if model.info.model_type == ModelType::Iaas {
                    while (app.machines.len() as u32) < units {
                        let id = model.add_machine(&base, app.constraints.clone(), None, None);
                        app.machines.push(id);
                    }
                    app.machines.truncate(units as usize);
                }
                app.units = units;
            }

            for key in &input.unset_config {
                app.config.remove(key);
            }
            app.config.extend(input.config.clone());
            if let Some(trust) = input.trust {
                app.trust = trust;
            }
            if input.unexpose {
                app.expose = None;
            }
            if input.expose.is_some() {
                app.expose = input.expose.clone();
            }

            debug!("Updated application {}", app.name);
            model.applications.insert(app.name.clone(), app);
            Ok(())
        })
    }

    async fn destroy_application(&self, model_uuid: &str, name: &str) -> Result<()> {
        self.mutate(|state| {
            if let Some(offer) = state
                .offers
                .values()
                .find(|o| o.model_uuid == model_uuid && o.application_name == name)
            {
                return Err(Error::InvalidInput(format!(
                    "application {name:?} is offered at {}; remove the offer first",
                    offer.url
                )));
            }
            let model = state.model_mut(model_uuid)?;
            model
                .applications
                .remove(name)
                .ok_or_else(|| Error::not_found("application", name))?;
            model
                .integrations
                .retain(|i| i.endpoints.iter().all(|ep| ep.application != name));
            info!("Removed application {}", name);
            Ok(())
        })
    }
}

#[async_trait]
impl MachinesApi for LocalController {
    async fn create_machine(&self, input: CreateMachineInput) -> Result<CreateMachineResponse> {
        let constraints = canonical_constraints(input.constraints.as_deref())?;
        let hostname = match &input.ssh_address {
            Some(address) => {
                for key_file in [&input.public_key_file, &input.private_key_file] {
                    let key_file = key_file.as_deref().ok_or_else(|| {
                        Error::InvalidInput("manual provisioning requires public and private key files".to_string())
                    })?;
                    std::fs::metadata(key_file)
                        .map_err(|e| Error::InvalidInput(format!("cannot read key file {key_file:?}: {e}")))?;
                }
                let host = address.rsplit_once('@').map_or(address.as_str(), |(_, host)| host);
                Some(host.to_string())
            }
            None => None,
        };

        self.mutate(|state| {
            let model = state.model_mut(&input.model_uuid)?;
            if model.info.model_type == ModelType::Caas {
                return Err(Error::NotSupported("machines cannot be added to a kubernetes model".to_string()));
            }
            let base = input.base.clone().unwrap_or_else(|| DEFAULT_BASE.to_string());
            let machine_id = model.add_machine(&base, constraints, input.disks.clone(), hostname);
            info!("Added machine {} to model {}", machine_id, input.model_uuid);
            Ok(CreateMachineResponse { machine_id, base })
        })
    }

    async fn read_machine(&self, model_uuid: &str, machine_id: &str) -> Result<MachineInfo> {
        self.read(|state| {
            state
                .model(model_uuid)?
                .machines
                .get(machine_id)
                .cloned()
                .ok_or_else(|| Error::not_found("machine", machine_id))
        })
    }

    async fn list_machines(&self, model_uuid: &str) -> Result<Vec<MachineInfo>> {
        self.read(|state| Ok(state.model(model_uuid)?.machines.values().cloned().collect()))
    }

    async fn destroy_machine(&self, model_uuid: &str, machine_id: &str) -> Result<()> {
        self.mutate(|state| {
            let model = state.model_mut(model_uuid)?;
            if let Some(app) = model
                .applications
                .values()
                .find(|a| a.machines.iter().any(|m| m == machine_id))
            {
                return Err(Error::InvalidInput(format!(
                    "machine {machine_id} hosts units of application {:?}",
                    app.name
                )));
            }
            model
                .machines
                .remove(machine_id)
                .ok_or_else(|| Error::not_found("machine", machine_id))?;
            Ok(())
        })
    }
}

impl LocalController {
    /// Normalize an offer URL to `user/model.offer`, defaulting the user.
    fn offer_key(&self, url: &str) -> Result<String> {
        let parsed = OfferUrl::parse(url).map_err(Error::InvalidInput)?;
        Ok(format!(
            "{}/{}.{}",
            parsed.user.unwrap_or_else(|| self.user.clone()),
            parsed.model,
            parsed.application
        ))
    }
}

#[async_trait]
impl OffersApi for LocalController {
    async fn create_offer(&self, input: CreateOfferInput) -> Result<OfferInfo> {
        if input.endpoints.is_empty() {
            return Err(Error::InvalidInput("an offer needs at least one endpoint".to_string()));
        }
        self.mutate(|state| {
            let model = state.model(&input.model_uuid)?;
            if !model.applications.contains_key(&input.application_name) {
                return Err(Error::not_found("application", &input.application_name));
            }
            let name = input
                .offer_name
                .clone()
                .unwrap_or_else(|| input.application_name.clone());
            let url = format!("{}/{}.{}", model.info.owner, model.info.name, name);
            if state.offers.contains_key(&url) {
                return Err(Error::already_exists("offer", &url));
            }
            let offer = OfferInfo {
                url: url.clone(),
                name,
                model_uuid: input.model_uuid.clone(),
                application_name: input.application_name.clone(),
                endpoints: input.endpoints.clone(),
                users: BTreeMap::from([(model.info.owner.clone(), OfferAccess::Admin)]),
            };
            state.offers.insert(url.clone(), offer.clone());
            info!("Created offer {}", url);
            Ok(offer)
        })
    }

    async fn read_offer(&self, url: &str) -> Result<OfferInfo> {
        let key = self.offer_key(url)?;
        self.read(|state| state.offers.get(&key).cloned().ok_or_else(|| Error::not_found("offer", url)))
    }

    async fn destroy_offer(&self, url: &str, force: bool) -> Result<()> {
        let key = self.offer_key(url)?;
        self.mutate(|state| {
            let consumed = state
                .models
                .values()
                .any(|m| m.remote_applications.values().any(|u| *u == key));
            if consumed && !force {
                return Err(Error::InvalidInput(format!("offer {key} has consumers; use force to remove it")));
            }
            state.offers.remove(&key).ok_or_else(|| Error::not_found("offer", url))?;
            Ok(())
        })
    }

    async fn grant_offer_access(&self, url: &str, user: &str, access: OfferAccess) -> Result<()> {
        let key = self.offer_key(url)?;
        self.mutate(|state| {
            if !state.user_exists(user) {
                return Err(Error::not_found("user", user));
            }
            let offer = state.offers.get_mut(&key).ok_or_else(|| Error::not_found("offer", url))?;
            raise_access(&mut offer.users, user, access);
            Ok(())
        })
    }

    async fn revoke_offer_access(&self, url: &str, user: &str, access: OfferAccess) -> Result<()> {
        let key = self.offer_key(url)?;
        self.mutate(|state| {
            let offer = state.offers.get_mut(&key).ok_or_else(|| Error::not_found("offer", url))?;
            // Revoking a level leaves the user with the level below it.
            match access {
                OfferAccess::Read => {
                    offer.users.remove(user);
                }
                OfferAccess::Consume => {
                    offer.users.insert(user.to_string(), OfferAccess::Read);
                }
                OfferAccess::Admin => {
                    offer.users.insert(user.to_string(), OfferAccess::Consume);
                }
            }
            Ok(())
        })
    }
}

fn split_endpoint(raw: &str) -> (String, Option<String>) {
    match raw.split_once(':') {
        Some((app, ep)) if !ep.is_empty() => (app.to_string(), Some(ep.to_string())),
        Some((app, _)) => (app.to_string(), None),
        None => (raw.to_string(), None),
    }
}

fn same_endpoints(a: &[IntegrationEndpoint], b: &[IntegrationEndpoint]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[async_trait]
impl IntegrationsApi for LocalController {
    async fn create_integration(&self, input: CreateIntegrationInput) -> Result<IntegrationInfo> {
        if input.endpoints.len() != 2 {
            return Err(Error::InvalidInput(format!(
                "an integration needs exactly two endpoints, got {}",
                input.endpoints.len()
            )));
        }
        for cidr in &input.via {
            if !cidr.contains('/') {
                return Err(Error::InvalidInput(format!("via {cidr:?} is not a CIDR")));
            }
        }

        self.mutate(|state| {
            let offers = state.offers.clone();
            let model = state.model_mut(&input.model_uuid)?;

            let mut resolved = Vec::with_capacity(2);
            for raw in &input.endpoints {
                let (app, endpoint) = split_endpoint(raw);
                if !model.has_application(&app) {
                    return Err(Error::not_found("application", &app));
                }
                // A consumed offer defaults to its first offered endpoint.
                let endpoint = endpoint.or_else(|| {
                    model
                        .remote_applications
                        .get(&app)
                        .and_then(|url| offers.get(url))
                        .and_then(|offer| offer.endpoints.first().cloned())
                });
                resolved.push((app, endpoint));
            }
            let fallback = resolved.iter().find_map(|(_, ep)| ep.clone()).ok_or_else(|| {
                Error::InvalidInput("cannot infer endpoints; specify at least one endpoint".to_string())
            })?;
            let endpoints: Vec<IntegrationEndpoint> = resolved
                .into_iter()
                .map(|(application, endpoint)| IntegrationEndpoint {
                    application,
                    endpoint: endpoint.unwrap_or_else(|| fallback.clone()),
                })
                .collect();

            if model
                .integrations
                .iter()
                .any(|i| same_endpoints(&i.endpoints, &endpoints))
            {
                return Err(Error::already_exists("integration", input.endpoints.join(" ")));
            }
            let integration = IntegrationInfo {
                model_uuid: input.model_uuid.clone(),
                endpoints,
                via: input.via.clone(),
            };
            model.integrations.push(integration.clone());
            Ok(integration)
        })
    }

    async fn read_integration(&self, model_uuid: &str, endpoints: &[String]) -> Result<IntegrationInfo> {
        let wanted: Vec<IntegrationEndpoint> = endpoints
            .iter()
            .map(|raw| {
                let (application, endpoint) = split_endpoint(raw);
                IntegrationEndpoint {
                    application,
                    endpoint: endpoint.unwrap_or_default(),
                }
            })
            .collect();
        self.read(|state| {
            state
                .model(model_uuid)?
                .integrations
                .iter()
                .find(|i| same_endpoints(&i.endpoints, &wanted))
                .cloned()
                .ok_or_else(|| Error::not_found("integration", endpoints.join(" ")))
        })
    }

    async fn destroy_integration(&self, model_uuid: &str, endpoints: &[String]) -> Result<()> {
        let existing = self.read_integration(model_uuid, endpoints).await?;
        self.mutate(|state| {
            let model = state.model_mut(model_uuid)?;
            model
                .integrations
                .retain(|i| !same_endpoints(&i.endpoints, &existing.endpoints));
            Ok(())
        })
    }

    async fn consume_offer(&self, input: ConsumeOfferInput) -> Result<String> {
        let key = self.offer_key(&input.offer_url)?;
        self.mutate(|state| {
            let offer = state
                .offers
                .get(&key)
                .cloned()
                .ok_or_else(|| Error::not_found("offer", &input.offer_url))?;
            let model = state.model_mut(&input.model_uuid)?;
            let name = input.alias.clone().unwrap_or_else(|| offer.name.clone());
            match model.remote_applications.get(&name) {
                Some(url) if *url == key => return Ok(name),
                Some(_) => return Err(Error::already_exists("remote application", &name)),
                None if model.applications.contains_key(&name) => {
                    return Err(Error::already_exists("application", &name));
                }
                None => {}
            }
            model.remote_applications.insert(name.clone(), key);
            Ok(name)
        })
    }

    async fn remove_remote_application(&self, model_uuid: &str, name: &str) -> Result<()> {
        self.mutate(|state| {
            let model = state.model_mut(model_uuid)?;
            model
                .remote_applications
                .remove(name)
                .ok_or_else(|| Error::not_found("remote application", name))?;
            model
                .integrations
                .retain(|i| i.endpoints.iter().all(|ep| ep.application != name));
            Ok(())
        })
    }
}

fn check_base64_values(value: &BTreeMap<String, String>) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidInput("a secret needs at least one value".to_string()));
    }
    for (key, encoded) in value {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::InvalidInput(format!("secret value {key:?} is not base64 encoded: {e}")))?;
    }
    Ok(())
}

#[async_trait]
impl SecretsApi for LocalController {
    async fn create_secret(&self, input: CreateSecretInput) -> Result<CreateSecretResponse> {
        check_base64_values(&input.value)?;
        self.mutate(|state| {
            let model = state.model_mut(&input.model_uuid)?;
            if let Some(name) = &input.name {
                if model.secrets.values().any(|s| s.name.as_ref() == Some(name)) {
                    return Err(Error::already_exists("secret", name));
                }
            }
            let secret_id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(20).collect();
            let secret_uri = format!("secret:{secret_id}");
            model.secrets.insert(
                secret_id.clone(),
                SecretInfo {
                    secret_id: secret_id.clone(),
                    secret_uri: secret_uri.clone(),
                    name: input.name.clone(),
                    value: input.value.clone(),
                    info: input.info.clone(),
                    revision: 1,
                    applications: Vec::new(),
                },
            );
            Ok(CreateSecretResponse { secret_id, secret_uri })
        })
    }

    async fn read_secret(&self, input: ReadSecretInput) -> Result<SecretInfo> {
        self.read(|state| {
            let model = state.model(&input.model_uuid)?;
            let found = match (&input.secret_id, &input.name) {
                (Some(id), _) => model.secrets.get(id.trim_start_matches("secret:")),
                (None, Some(name)) => model.secrets.values().find(|s| s.name.as_ref() == Some(name)),
                (None, None) => {
                    return Err(Error::InvalidInput("a secret id or name is required".to_string()));
                }
            };
            found.cloned().ok_or_else(|| {
                Error::not_found(
                    "secret",
                    input.secret_id.clone().or(input.name.clone()).unwrap_or_default(),
                )
            })
        })
    }

    async fn update_secret(&self, input: UpdateSecretInput) -> Result<()> {
        if let Some(value) = &input.value {
            check_base64_values(value)?;
        }
        self.mutate(|state| {
            let model = state.model_mut(&input.model_uuid)?;
            if let Some(name) = &input.name {
                if model
                    .secrets
                    .values()
                    .any(|s| s.name.as_ref() == Some(name) && s.secret_id != input.secret_id)
                {
                    return Err(Error::already_exists("secret", name));
                }
            }
            let secret = model
                .secrets
                .get_mut(&input.secret_id)
                .ok_or_else(|| Error::not_found("secret", &input.secret_id))?;
            if let Some(value) = &input.value {
                if *value != secret.value {
                    secret.value = value.clone();
                    secret.revision += 1;
                }
            }
            if input.name.is_some() {
                secret.name = input.name.clone();
            }
            if input.info.is_some() {
                secret.info = input.info.clone();
            }
            Ok(())
        })
    }

    async fn delete_secret(&self, model_uuid: &str, secret_id: &str) -> Result<()> {
        self.mutate(|state| {
            state
                .model_mut(model_uuid)?
                .secrets
                .remove(secret_id)
                .ok_or_else(|| Error::not_found("secret", secret_id))?;
            Ok(())
        })
    }

    async fn grant_secret(&self, model_uuid: &str, secret_id: &str, applications: &[String]) -> Result<()> {
        self.mutate(|state| {
            let model = state.model_mut(model_uuid)?;
            for app in applications {
                if !model.applications.contains_key(app) {
                    return Err(Error::not_found("application", app));
                }
            }
            let secret = model
                .secrets
                .get_mut(secret_id)
                .ok_or_else(|| Error::not_found("secret", secret_id))?;
            for app in applications {
                if !secret.applications.contains(app) {
                    secret.applications.push(app.clone());
                }
            }
            secret.applications.sort();
            Ok(())
        })
    }

    async fn revoke_secret(&self, model_uuid: &str, secret_id: &str, applications: &[String]) -> Result<()> {
        self.mutate(|state| {
            let secret = state
                .model_mut(model_uuid)?
                .secrets
                .get_mut(secret_id)
                .ok_or_else(|| Error::not_found("secret", secret_id))?;
            secret.applications.retain(|a| !applications.contains(a));
            Ok(())
        })
    }
}

#[async_trait]
impl CredentialsApi for LocalController {
    async fn create_credential(&self, input: CredentialInput) -> Result<()> {
        if !input.client && !input.controller {
            return Err(Error::InvalidInput(
                "a credential must be stored on the client, the controller, or both".to_string(),
            ));
        }
        self.mutate(|state| {
            let cloud = state
                .clouds
                .get(&input.cloud)
                .ok_or_else(|| Error::not_found("cloud", &input.cloud))?;
            if !cloud.auth_types.contains(&input.auth_type) {
                return Err(Error::InvalidInput(format!(
                    "auth type {:?} is not supported by cloud {:?}",
                    input.auth_type, input.cloud
                )));
            }
            let key = credential_key(&input.cloud, &input.name);
            let info = CredentialInfo {
                name: input.name.clone(),
                cloud: input.cloud.clone(),
                auth_type: input.auth_type.clone(),
                attributes: input.attributes.clone(),
            };
            if (input.controller && state.controller_credentials.contains_key(&key))
                || (input.client && state.client_credentials.contains_key(&key))
            {
                return Err(Error::already_exists("credential", &key));
            }
            if input.controller {
                state.controller_credentials.insert(key.clone(), info.clone());
            }
            if input.client {
                state.client_credentials.insert(key, info);
            }
            Ok(())
        })
    }

    async fn read_credential(&self, name: &str, cloud: &str, client: bool, controller: bool) -> Result<CredentialInfo> {
        let key = credential_key(cloud, name);
        self.read(|state| {
            let found = if controller {
                state.controller_credentials.get(&key)
            } else if client {
                state.client_credentials.get(&key)
            } else {
                None
            };
            found.cloned().ok_or_else(|| Error::not_found("credential", &key))
        })
    }

    async fn update_credential(&self, input: CredentialInput) -> Result<()> {
        let key = credential_key(&input.cloud, &input.name);
        self.mutate(|state| {
            let info = CredentialInfo {
                name: input.name.clone(),
                cloud: input.cloud.clone(),
                auth_type: input.auth_type.clone(),
                attributes: input.attributes.clone(),
            };
            let mut updated = false;
            if input.controller {
                if let Some(existing) = state.controller_credentials.get_mut(&key) {
                    *existing = info.clone();
                    updated = true;
                }
            }
            if input.client {
                if let Some(existing) = state.client_credentials.get_mut(&key) {
                    *existing = info;
                    updated = true;
                }
            }
            if updated {
                Ok(())
            } else {
                Err(Error::not_found("credential", &key))
            }
        })
    }

    async fn destroy_credential(&self, name: &str, cloud: &str, client: bool, controller: bool) -> Result<()> {
        let key = credential_key(cloud, name);
        self.mutate(|state| {
            let mut removed = false;
            if controller {
                if let Some(model) = state
                    .models
                    .values()
                    .find(|m| m.info.cloud == cloud && m.info.credential.as_deref() == Some(name))
                {
                    return Err(Error::InvalidInput(format!(
                        "credential {key} is used by model {:?}",
                        model.info.name
                    )));
                }
                removed |= state.controller_credentials.remove(&key).is_some();
            }
            if client {
                removed |= state.client_credentials.remove(&key).is_some();
            }
            if removed {
                Ok(())
            } else {
                Err(Error::not_found("credential", &key))
            }
        })
    }
}

#[async_trait]
impl CloudsApi for LocalController {
    async fn add_cloud(&self, input: CloudInput) -> Result<()> {
        if input.auth_types.is_empty() {
            return Err(Error::InvalidInput("a cloud needs at least one auth type".to_string()));
        }
        self.mutate(|state| {
            if state.clouds.contains_key(&input.name) {
                return Err(Error::already_exists("cloud", &input.name));
            }
            let mut cloud = input.clone();
            if cloud.regions.is_empty() {
                cloud.regions.push(CloudRegion {
                    name: "default".to_string(),
                    endpoint: cloud.endpoint.clone(),
                });
            }
            state.clouds.insert(cloud.name.clone(), cloud);
            Ok(())
        })
    }

    async fn read_cloud(&self, name: &str) -> Result<CloudInfo> {
        self.read(|state| state.clouds.get(name).cloned().ok_or_else(|| Error::not_found("cloud", name)))
    }

    async fn update_cloud(&self, input: CloudInput) -> Result<()> {
        self.mutate(|state| {
            let cloud = state
                .clouds
                .get_mut(&input.name)
                .ok_or_else(|| Error::not_found("cloud", &input.name))?;
            if cloud.cloud_type != input.cloud_type {
                return Err(Error::InvalidInput(format!(
                    "cannot change the type of cloud {:?} from {:?} to {:?}",
                    input.name, cloud.cloud_type, input.cloud_type
                )));
            }
            *cloud = input.clone();
            Ok(())
        })
    }

    async fn remove_cloud(&self, name: &str) -> Result<()> {
        self.mutate(|state| {
            if let Some(model) = state.models.values().find(|m| m.info.cloud == name) {
                return Err(Error::InvalidInput(format!(
                    "cloud {name:?} is used by model {:?}",
                    model.info.name
                )));
            }
            state.clouds.remove(name).ok_or_else(|| Error::not_found("cloud", name))?;
            Ok(())
        })
    }
}

#[async_trait]
impl SshKeysApi for LocalController {
    async fn add_ssh_key(&self, model_uuid: &str, payload: &str) -> Result<SshKeyInfo> {
        let key = AuthorizedKey::parse(payload)?;
        let info = SshKeyInfo {
            fingerprint: key.fingerprint(),
            comment: key.comment.clone(),
            payload: payload.trim().to_string(),
        };
        self.mutate(|state| {
            let model = state.model_mut(model_uuid)?;
            if model.ssh_keys.iter().any(|k| k.fingerprint == info.fingerprint) {
                return Err(Error::already_exists("ssh key", &info.fingerprint));
            }
            model.ssh_keys.push(info.clone());
            Ok(info)
        })
    }

    async fn list_ssh_keys(&self, model_uuid: &str) -> Result<Vec<SshKeyInfo>> {
        self.read(|state| Ok(state.model(model_uuid)?.ssh_keys.clone()))
    }

    async fn delete_ssh_key(&self, model_uuid: &str, fingerprint: &str) -> Result<()> {
        self.mutate(|state| {
            let model = state.model_mut(model_uuid)?;
            let before = model.ssh_keys.len();
            model.ssh_keys.retain(|k| k.fingerprint != fingerprint);
            if model.ssh_keys.len() == before {
                return Err(Error::not_found("ssh key", fingerprint));
            }
            Ok(())
        })
    }
}

#[async_trait]
impl UsersApi for LocalController {
    async fn add_user(&self, input: UserInput) -> Result<UserInfo> {
        if !names::is_valid_user_name(&input.name) || input.name.contains('@') {
            return Err(Error::InvalidInput(format!("invalid local user name {:?}", input.name)));
        }
        self.mutate(|state| {
            if state.users.contains_key(&input.name) {
                return Err(Error::already_exists("user", &input.name));
            }
            state.users.insert(
                input.name.clone(),
                UserRecord {
                    display_name: input.display_name.clone(),
                    password: input.password.clone(),
                },
            );
            Ok(UserInfo {
                name: input.name.clone(),
                display_name: input.display_name.clone(),
            })
        })
    }

    async fn read_user(&self, name: &str) -> Result<UserInfo> {
        self.read(|state| {
            state
                .users
                .get(name)
                .map(|record| UserInfo {
                    name: name.to_string(),
                    display_name: record.display_name.clone(),
                })
                .ok_or_else(|| Error::not_found("user", name))
        })
    }

    async fn update_user(&self, input: UserInput) -> Result<()> {
        self.mutate(|state| {
            let record = state
                .users
                .get_mut(&input.name)
                .ok_or_else(|| Error::not_found("user", &input.name))?;
            record.display_name = input.display_name.clone();
            if input.password.is_some() {
                record.password = input.password.clone();
            }
            Ok(())
        })
    }

    async fn remove_user(&self, name: &str) -> Result<()> {
        if name == self.user {
            return Err(Error::InvalidInput("cannot remove the logged in user".to_string()));
        }
        self.mutate(|state| {
            state.users.remove(name).ok_or_else(|| Error::not_found("user", name))?;
            for model in state.models.values_mut() {
                model.info.users.remove(name);
            }
            Ok(())
        })
    }

    async fn grant_model_access(&self, model_uuid: &str, user: &str, access: ModelAccess) -> Result<()> {
        self.mutate(|state| {
            if !state.user_exists(user) {
                return Err(Error::not_found("user", user));
            }
            let model = state.model_mut(model_uuid)?;
            raise_access(&mut model.info.users, user, access);
            Ok(())
        })
    }

    async fn revoke_model_access(&self, model_uuid: &str, user: &str, access: ModelAccess) -> Result<()> {
        self.mutate(|state| {
            let model = state.model_mut(model_uuid)?;
            if user == model.info.owner {
                return Err(Error::InvalidInput("cannot revoke access from the model owner".to_string()));
            }
            match access {
                ModelAccess::Read => {
                    model.info.users.remove(user);
                }
                ModelAccess::Write => {
                    model.info.users.insert(user.to_string(), ModelAccess::Read);
                }
                ModelAccess::Admin => {
                    model.info.users.insert(user.to_string(), ModelAccess::Write);
                }
            }
            Ok(())
        })
    }

    async fn read_model_access(&self, model_uuid: &str) -> Result<BTreeMap<String, ModelAccess>> {
        self.read(|state| Ok(state.model(model_uuid)?.info.users.clone()))
    }
}

#[async_trait]
impl StoragePoolsApi for LocalController {
    async fn create_storage_pool(&self, input: StoragePoolInput) -> Result<()> {
        if input.provider.is_empty() {
            return Err(Error::InvalidInput("a storage pool needs a provider".to_string()));
        }
        self.mutate(|state| {
            let model = state.model_mut(&input.model_uuid)?;
            if model.storage_pools.contains_key(&input.name) {
                return Err(Error::already_exists("storage pool", &input.name));
            }
            model.storage_pools.insert(input.name.clone(), input.clone());
            Ok(())
        })
    }

    async fn read_storage_pool(&self, model_uuid: &str, name: &str) -> Result<StoragePoolInfo> {
        self.read(|state| {
            state
                .model(model_uuid)?
                .storage_pools
                .get(name)
                .cloned()
                .ok_or_else(|| Error::not_found("storage pool", name))
        })
    }

    async fn update_storage_pool(&self, input: StoragePoolInput) -> Result<()> {
        self.mutate(|state| {
            let pool = state
                .model_mut(&input.model_uuid)?
                .storage_pools
                .get_mut(&input.name)
                .ok_or_else(|| Error::not_found("storage pool", &input.name))?;
            pool.provider = input.provider.clone();
            pool.attributes = input.attributes.clone();
            Ok(())
        })
    }

    async fn remove_storage_pool(&self, model_uuid: &str, name: &str) -> Result<()> {
        self.mutate(|state| {
            state
                .model_mut(model_uuid)?
                .storage_pools
                .remove(name)
                .ok_or_else(|| Error::not_found("storage pool", name))?;
            Ok(())
        })
    }
}

fn add_entity(entities: &mut BTreeMap<String, JaasEntity>, kind: &str, name: &str) -> Result<JaasEntity> {
    if entities.values().any(|e| e.name == name) {
        return Err(Error::already_exists(kind, name));
    }
    let entity = JaasEntity {
        uuid: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
    };
    entities.insert(entity.uuid.clone(), entity.clone());
    Ok(entity)
}

fn rename_entity(entities: &mut BTreeMap<String, JaasEntity>, kind: &str, uuid: &str, new_name: &str) -> Result<()> {
    if entities.values().any(|e| e.name == new_name && e.uuid != uuid) {
        return Err(Error::already_exists(kind, new_name));
    }
    let entity = entities.get_mut(uuid).ok_or_else(|| Error::not_found(kind, uuid))?;
    entity.name = new_name.to_string();
    Ok(())
}

#[async_trait]
impl JaasApi for LocalController {
    async fn add_group(&self, name: &str) -> Result<JaasEntity> {
        self.require_jaas()?;
        self.mutate(|state| add_entity(&mut state.groups, "group", name))
    }

    async fn read_group(&self, uuid: &str) -> Result<JaasEntity> {
        self.require_jaas()?;
        self.read(|state| state.groups.get(uuid).cloned().ok_or_else(|| Error::not_found("group", uuid)))
    }

    async fn rename_group(&self, uuid: &str, new_name: &str) -> Result<()> {
        self.require_jaas()?;
        self.mutate(|state| rename_entity(&mut state.groups, "group", uuid, new_name))
    }

    async fn remove_group(&self, uuid: &str) -> Result<()> {
        self.require_jaas()?;
        self.mutate(|state| {
            state.groups.remove(uuid).ok_or_else(|| Error::not_found("group", uuid))?;
            Ok(())
        })
    }

    async fn add_role(&self, name: &str) -> Result<JaasEntity> {
        self.require_jaas()?;
        self.mutate(|state| add_entity(&mut state.roles, "role", name))
    }

    async fn read_role(&self, uuid: &str) -> Result<JaasEntity> {
        self.require_jaas()?;
        self.read(|state| state.roles.get(uuid).cloned().ok_or_else(|| Error::not_found("role", uuid)))
    }

    async fn rename_role(&self, uuid: &str, new_name: &str) -> Result<()> {
        self.require_jaas()?;
        self.mutate(|state| rename_entity(&mut state.roles, "role", uuid, new_name))
    }

    async fn remove_role(&self, uuid: &str) -> Result<()> {
        self.require_jaas()?;
        self.mutate(|state| {
            state.roles.remove(uuid).ok_or_else(|| Error::not_found("role", uuid))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn model(controller: &LocalController, name: &str) -> ModelInfo {
        controller
            .create_model(CreateModelInput {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn charm(name: &str) -> CharmSpec {
        CharmSpec {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_model_lifecycle() {
        let controller = LocalController::new();
        let info = model(&controller, "dev").await;
        assert_eq!(info.cloud, "localhost");
        assert_eq!(info.model_type, ModelType::Iaas);
        assert_eq!(info.users.get("admin"), Some(&ModelAccess::Admin));

        let dup = controller
            .create_model(CreateModelInput {
                name: "dev".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(dup, Err(Error::AlreadyExists { .. })));

        controller
            .update_model(UpdateModelInput {
                uuid: info.uuid.clone(),
                constraints: Some("mem=4G cores=2".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let read = controller.read_model_by_name("admin/dev").await.unwrap();
        assert_eq!(read.constraints, "cores=2 mem=4096M");

        controller.destroy_model(&info.uuid).await.unwrap();
        assert!(controller.read_model(&info.uuid).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_deploy_places_units_on_new_machines() {
        let controller = LocalController::new();
        let m = model(&controller, "dev").await;
        let app = controller
            .create_application(CreateApplicationInput {
                model_uuid: m.uuid.clone(),
                name: "postgresql".into(),
                charm: charm("postgresql"),
                units: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(app.machines, vec!["0", "1"]);
        assert_eq!(app.charm.channel.as_deref(), Some("latest/stable"));

        controller
            .update_application(UpdateApplicationInput {
                model_uuid: m.uuid.clone(),
                name: "postgresql".into(),
                units: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        let app = controller.read_application(&m.uuid, "postgresql").await.unwrap();
        assert_eq!(app.units, 1);
        assert_eq!(app.machines, vec!["0"]);
    }

    #[tokio::test]
    async fn test_deploy_to_existing_machines_requires_matching_units() {
        let controller = LocalController::new();
        let m = model(&controller, "dev").await;
        let machine = controller
            .create_machine(CreateMachineInput {
                model_uuid: m.uuid.clone(),
                ..Default::default()
            })
            .await
            .unwrap();

        let bad = controller
            .create_application(CreateApplicationInput {
                model_uuid: m.uuid.clone(),
                name: "ubuntu".into(),
                charm: charm("ubuntu"),
                units: 2,
                machines: vec![machine.machine_id.clone()],
                ..Default::default()
            })
            .await;
        assert!(matches!(bad, Err(Error::InvalidInput(_))));

        controller
            .create_application(CreateApplicationInput {
                model_uuid: m.uuid.clone(),
                name: "ubuntu".into(),
                charm: charm("ubuntu"),
                units: 1,
                machines: vec![machine.machine_id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        let busy = controller.destroy_machine(&m.uuid, &machine.machine_id).await;
        assert!(matches!(busy, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_offer_consume_and_integrate() {
        let controller = LocalController::new();
        let db = model(&controller, "db").await;
        let web = model(&controller, "web").await;
        for (model_uuid, name) in [(&db.uuid, "postgresql"), (&web.uuid, "wordpress")] {
            controller
                .create_application(CreateApplicationInput {
                    model_uuid: model_uuid.clone(),
                    name: name.into(),
                    charm: charm(name),
                    units: 1,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let offer = controller
            .create_offer(CreateOfferInput {
                model_uuid: db.uuid.clone(),
                application_name: "postgresql".into(),
                endpoints: vec!["database".into()],
                offer_name: None,
            })
            .await
            .unwrap();
        assert_eq!(offer.url, "admin/db.postgresql");

        let saas = controller
            .consume_offer(ConsumeOfferInput {
                model_uuid: web.uuid.clone(),
                offer_url: offer.url.clone(),
                alias: None,
            })
            .await
            .unwrap();
        let integration = controller
            .create_integration(CreateIntegrationInput {
                model_uuid: web.uuid.clone(),
                endpoints: vec![saas.clone(), "wordpress:db".into()],
                via: vec![],
            })
            .await
            .unwrap();
        assert!(integration
            .endpoints
            .contains(&IntegrationEndpoint { application: saas.clone(), endpoint: "database".into() }));

        let still_consumed = controller.destroy_offer(&offer.url, false).await;
        assert!(still_consumed.is_err());
        controller.remove_remote_application(&web.uuid, &saas).await.unwrap();
        controller.destroy_offer("db.postgresql", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_access_levels_step_down_on_revoke() {
        let controller = LocalController::new();
        let m = model(&controller, "dev").await;
        controller
            .add_user(UserInput {
                name: "bob".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        controller.grant_model_access(&m.uuid, "bob", ModelAccess::Admin).await.unwrap();
        controller.revoke_model_access(&m.uuid, "bob", ModelAccess::Admin).await.unwrap();
        let users = controller.read_model_access(&m.uuid).await.unwrap();
        assert_eq!(users.get("bob"), Some(&ModelAccess::Write));
        controller.revoke_model_access(&m.uuid, "bob", ModelAccess::Read).await.unwrap();
        let users = controller.read_model_access(&m.uuid).await.unwrap();
        assert!(!users.contains_key("bob"));
    }

    #[tokio::test]
    async fn test_secret_revision_bumps_on_value_change() {
        let controller = LocalController::new();
        let m = model(&controller, "dev").await;
        let created = controller
            .create_secret(CreateSecretInput {
                model_uuid: m.uuid.clone(),
                name: Some("db-pass".into()),
                value: BTreeMap::from([("password".into(), "aHVudGVyMg==".into())]),
                info: None,
            })
            .await
            .unwrap();
        assert!(created.secret_uri.starts_with("secret:"));

        let not_base64 = controller
            .update_secret(UpdateSecretInput {
                model_uuid: m.uuid.clone(),
                secret_id: created.secret_id.clone(),
                value: Some(BTreeMap::from([("password".into(), "%%%".into())])),
                ..Default::default()
            })
            .await;
        assert!(matches!(not_base64, Err(Error::InvalidInput(_))));

        controller
            .update_secret(UpdateSecretInput {
                model_uuid: m.uuid.clone(),
                secret_id: created.secret_id.clone(),
                value: Some(BTreeMap::from([("password".into(), "c2VjcmV0".into())])),
                ..Default::default()
            })
            .await
            .unwrap();
        let read = controller
            .read_secret(ReadSecretInput {
                model_uuid: m.uuid.clone(),
                name: Some("db-pass".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(read.revision, 2);
    }

    #[tokio::test]
    async fn test_jaas_operations_require_jaas() {
        let controller = LocalController::new();
        assert!(matches!(controller.add_group("devops").await, Err(Error::NotSupported(_))));

        let jaas = LocalController::new_jaas();
        let group = jaas.add_group("devops").await.unwrap();
        jaas.rename_group(&group.uuid, "platform").await.unwrap();
        assert_eq!(jaas.read_group(&group.uuid).await.unwrap().name, "platform");
    }

    #[tokio::test]
    async fn test_persisted_state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("controller.json");
        let login = Login::Password {
            username: "admin".into(),
            password: "hunter2".into(),
        };

        let uuid = {
            let controller = LocalController::open(&path, login.clone()).unwrap();
            model(&controller, "persisted").await.uuid
        };

        let reopened = LocalController::open(&path, login).unwrap();
        assert_eq!(reopened.read_model(&uuid).await.unwrap().name, "persisted");

        let wrong = LocalController::open(
            &path,
            Login::Password {
                username: "admin".into(),
                password: "nope".into(),
            },
        );
        assert!(matches!(wrong, Err(Error::Unauthorized(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_all_reach_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("controller.json");
        let login = Login::Password {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let controller = std::sync::Arc::new(LocalController::open(&path, login.clone()).unwrap());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let controller = controller.clone();
                tokio::spawn(async move { model(&controller, &format!("model-{i}")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let reopened = LocalController::open(&path, login).unwrap();
        assert_eq!(reopened.list_models().await.unwrap().len(), 8);
    }
}
