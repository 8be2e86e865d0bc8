//! juju_access_secret

use async_trait::async_trait;
use juju_common::ReadSecretInput;
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, model_uuid_attribute, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::RequiresReplace;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{get_string_attr, get_string_set_attr, make_state, string_set_value, string_value, Value};
use crate::validators::{self, Each};

const ID_FORMAT: &str = "<model_uuid>:<secret_id>";

pub struct AccessSecretResource {
    common: ResourceCommon,
}

impl AccessSecretResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_access_secret"),
        }
    }
}

impl Default for AccessSecretResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries of `planned` missing from `current`, and the other way round.
pub fn set_diff(planned: &[String], current: &[String]) -> (Vec<String>, Vec<String>) {
    let added = planned.iter().filter(|p| !current.contains(p)).cloned().collect();
    let removed = current.iter().filter(|c| !planned.contains(c)).cloned().collect();
    (added, removed)
}

#[async_trait]
impl Resource for AccessSecretResource {
    fn type_name(&self) -> &'static str {
        "juju_access_secret"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represents access to a Juju secret.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("secret_id")
                        .required()
                        .description("The ID of the secret.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::set("applications", AttrType::String)
                        .required()
                        .description("The list of applications to which the secret is granted.")
                        .validator(Each::new(validators::application_name())),
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
        let secret_id = get_string_attr(plan, "secret_id");
        let applications = get_string_set_attr(plan, "applications");
        if let Err(e) = client.grant_secret(&model_uuid, &secret_id, &applications).await {
            client_error(diags, "grant", "secret access", &e);
            return None;
        }
        info!(secret_id = %secret_id, applications = ?applications, "granted secret access");
        let mut fresh = plan.clone();
        fresh.set("id", string_value(id::encode(&[&model_uuid, &secret_id])));
        Some(fill_unknowns(plan, &fresh))
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [model_uuid, secret_id] = match id::decode::<2>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };

        let input = ReadSecretInput {
            model_uuid: model_uuid.clone(),
            secret_id: Some(secret_id.clone()),
            name: None,
        };
        match client.read_secret(input).await {
            Ok(secret) => Some(make_state(vec![
                ("id", string_value(id::encode(&[&model_uuid, &secret_id]))),
                ("model_uuid", string_value(&model_uuid)),
                ("secret_id", string_value(&secret_id)),
                ("applications", string_set_value(secret.applications)),
            ])),
            Err(e) if e.is_not_found() => {
                debug!(secret_id = %secret_id, "secret not found, removing access from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "secret access", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let model_uuid = get_string_attr(prior, "model_uuid");
        let secret_id = get_string_attr(prior, "secret_id");
        let (granted, revoked) = set_diff(
            &get_string_set_attr(plan, "applications"),
            &get_string_set_attr(prior, "applications"),
        );

        if !granted.is_empty() {
            if let Err(e) = client.grant_secret(&model_uuid, &secret_id, &granted).await {
                client_error(diags, "grant", "secret access", &e);
                return None;
            }
        }
        if !revoked.is_empty() {
            if let Err(e) = client.revoke_secret(&model_uuid, &secret_id, &revoked).await {
                client_error(diags, "revoke", "secret access", &e);
                return None;
            }
        }
        Some(fill_unknowns(plan, prior))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        let secret_id = get_string_attr(state, "secret_id");
        let applications = get_string_set_attr(state, "applications");
        if let Err(e) = client.revoke_secret(&model_uuid, &secret_id, &applications).await {
            client_error(diags, "revoke", "secret access", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_diff() {
        let planned = vec!["a".to_string(), "b".to_string()];
        let current = vec!["b".to_string(), "c".to_string()];
        assert_eq!(set_diff(&planned, &current), (vec!["a".to_string()], vec!["c".to_string()]));
        assert_eq!(set_diff(&planned, &planned), (Vec::new(), Vec::new()));
    }
}
