//! juju_ssh_key

use async_trait::async_trait;
use juju_common::SshKeyInfo;
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, model_uuid_attribute, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::{RequiresReplace, UseStateForUnknown};
use crate::schema::{id_attribute, Attribute, Block, Schema};
use crate::state::{get_string_attr, make_state, string_value, Value};

const ID_PREFIX: &str = "sshkey";
const ID_FORMAT: &str = "sshkey:<model_uuid>:<fingerprint>";

pub struct SshKeyResource {
    common: ResourceCommon,
}

impl SshKeyResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_ssh_key"),
        }
    }
}

impl Default for SshKeyResource {
    fn default() -> Self {
        Self::new()
    }
}

fn ssh_key_to_state(model_uuid: &str, key: &SshKeyInfo) -> Value {
    make_state(vec![
        ("id", string_value(id::encode(&[ID_PREFIX, model_uuid, &key.fingerprint]))),
        ("model_uuid", string_value(model_uuid)),
        ("payload", string_value(&key.payload)),
        ("fingerprint", string_value(&key.fingerprint)),
    ])
}

#[async_trait]
impl Resource for SshKeyResource {
    fn type_name(&self) -> &'static str {
        "juju_ssh_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("Resource representing an SSH key authorized in a model.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("payload")
                        .required()
                        .description("SSH public key in authorized_keys format.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("fingerprint")
                        .computed()
                        .description("SHA-256 fingerprint of the key.")
                        .plan_modifier(UseStateForUnknown),
                ),
        )
    }

    fn configure(&mut self, data: &ProviderData) {
        self.common.configure(data);
    }

    fn subsystem(&self) -> &Span {
        self.common.span()
    }

    async fn create(&self, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let model_uuid = get_string_attr(plan, "model_uuid");
        match client.add_ssh_key(&model_uuid, &get_string_attr(plan, "payload")).await {
            Ok(key) => {
                info!(fingerprint = %key.fingerprint, comment = %key.comment, "added ssh key");
                let mut state = fill_unknowns(plan, &ssh_key_to_state(&model_uuid, &key));
                // Keep the payload exactly as configured; the controller trims it.
                state.set("payload", plan.get("payload").cloned().unwrap_or_default());
                Some(state)
            }
            Err(e) => {
                client_error(diags, "create", "ssh key", &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [model_uuid, fingerprint] =
            match id::decode_prefixed::<2>(&get_string_attr(state, "id"), ID_PREFIX, ID_FORMAT) {
                Ok(fields) => fields,
                Err(e) => {
                    diags.push(e.to_diagnostic());
                    return None;
                }
            };

        let keys = match client.list_ssh_keys(&model_uuid).await {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() => {
                debug!(model = %model_uuid, "model not found, removing ssh key from state");
                return None;
            }
            Err(e) => {
                client_error(diags, "read", "ssh key", &e);
                return None;
            }
        };
        let Some(key) = keys.iter().find(|k| k.fingerprint == fingerprint) else {
            debug!(fingerprint = %fingerprint, "ssh key not found, removing from state");
            return None;
        };

        let mut fresh = ssh_key_to_state(&model_uuid, key);
        if let Some(prior) = state.get("payload").and_then(Value::as_str) {
            if prior.trim() == key.payload {
                fresh.set("payload", string_value(prior));
            }
        }
        Some(fresh)
    }

    async fn update(&self, plan: &Value, prior: &Value, _diags: &mut Diagnostics) -> Option<Value> {
        Some(fill_unknowns(plan, prior))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        let fingerprint = get_string_attr(state, "fingerprint");
        if let Err(e) = client.delete_ssh_key(&model_uuid, &fingerprint).await {
            client_error(diags, "delete", "ssh key", &e);
        }
    }
}
