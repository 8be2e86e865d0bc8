//! juju_secret
//!
//! User secrets. Values are base64 encoded on the way to the controller and
//! decoded again on read, so state always holds the plain text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use juju_common::{CreateSecretInput, ReadSecretInput, SecretInfo, UpdateSecretInput};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, model_uuid_attribute, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::UseStateForUnknown;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{
    get_optional_string_attr, get_string_attr, get_string_map_attr, make_state, optional_string_value,
    string_map_value, string_value, Value,
};

const ID_FORMAT: &str = "<model_uuid>:<secret_id>";

pub struct SecretResource {
    common: ResourceCommon,
}

impl SecretResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_secret"),
        }
    }
}

impl Default for SecretResource {
    fn default() -> Self {
        Self::new()
    }
}

pub fn encode_values(values: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), STANDARD.encode(v.as_bytes())))
        .collect()
}

/// Decode controller-side values, reporting the first key that is not
/// base64 encoded UTF-8.
pub fn decode_values(values: &BTreeMap<String, String>, diags: &mut Diagnostics) -> Option<BTreeMap<String, String>> {
    let mut decoded = BTreeMap::new();
    for (key, encoded) in values {
        let plain = STANDARD
            .decode(encoded)
            .map_err(|e| e.to_string())
            .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()));
        match plain {
            Ok(plain) => {
                decoded.insert(key.clone(), plain);
            }
            Err(e) => {
                diags.error(
                    "Invalid Secret Value",
                    format!("Unable to decode secret value {key:?}, got error: {e}"),
                );
                return None;
            }
        }
    }
    Some(decoded)
}

pub fn secret_to_state(model_uuid: &str, secret: &SecretInfo, diags: &mut Diagnostics) -> Option<Value> {
    let value = decode_values(&secret.value, diags)?;
    Some(make_state(vec![
        ("id", string_value(id::encode(&[model_uuid, &secret.secret_id]))),
        ("model_uuid", string_value(model_uuid)),
        ("secret_id", string_value(&secret.secret_id)),
        ("secret_uri", string_value(&secret.secret_uri)),
        ("name", optional_string_value(secret.name.as_deref())),
        ("value", string_map_value(&value)),
        ("info", optional_string_value(secret.info.as_deref())),
    ]))
}

#[async_trait]
impl Resource for SecretResource {
    fn type_name(&self) -> &'static str {
        "juju_secret"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represents a Juju secret.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("name")
                        .optional()
                        .description("The name of the secret."),
                )
                .attribute(
                    Attribute::map("value", AttrType::String)
                        .required()
                        .sensitive()
                        .description("The value map of the secret. There can be more than one key-value pair."),
                )
                .attribute(
                    Attribute::string("info")
                        .optional()
                        .description("The description of the secret."),
                )
                .attribute(
                    Attribute::string("secret_id")
                        .computed()
                        .description("The ID of the secret. E.g. coj8mulh8b41e8nv6p90")
                        .plan_modifier(UseStateForUnknown),
                )
                .attribute(
                    Attribute::string("secret_uri")
                        .computed()
                        .description("The URI of the secret. E.g. secret:coj8mulh8b41e8nv6p90")
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
        let input = CreateSecretInput {
            model_uuid: model_uuid.clone(),
            name: get_optional_string_attr(plan, "name"),
            value: encode_values(&get_string_map_attr(plan, "value")),
            info: get_optional_string_attr(plan, "info"),
        };

        let created = match client.create_secret(input).await {
            Ok(created) => created,
            Err(e) => {
                client_error(diags, "create", "secret", &e);
                return None;
            }
        };
        info!(secret_id = %created.secret_id, "created secret");
        let mut fresh = plan.clone();
        fresh.set("id", string_value(id::encode(&[&model_uuid, &created.secret_id])));
        fresh.set("secret_id", string_value(&created.secret_id));
        fresh.set("secret_uri", string_value(&created.secret_uri));
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
            Ok(secret) => secret_to_state(&model_uuid, &secret, diags),
            Err(e) if e.is_not_found() => {
                debug!(secret_id = %secret_id, "secret not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "secret", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let mut input = UpdateSecretInput {
            model_uuid: get_string_attr(prior, "model_uuid"),
            secret_id: get_string_attr(prior, "secret_id"),
            ..Default::default()
        };
        if plan.get("name") != prior.get("name") {
            input.name = get_optional_string_attr(plan, "name");
        }
        if plan.get("value") != prior.get("value") {
            input.value = Some(encode_values(&get_string_map_attr(plan, "value")));
        }
        if plan.get("info") != prior.get("info") {
            input.info = get_optional_string_attr(plan, "info");
        }

        if let Err(e) = client.update_secret(input).await {
            client_error(diags, "update", "secret", &e);
            return None;
        }
        Some(fill_unknowns(plan, prior))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        let secret_id = get_string_attr(state, "secret_id");
        if let Err(e) = client.delete_secret(&model_uuid, &secret_id).await {
            client_error(diags, "delete", "secret", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_base64_on_the_wire() {
        let plain = BTreeMap::from([("password".to_string(), "s3cret".to_string())]);
        let encoded = encode_values(&plain);
        assert_eq!(encoded["password"], "czNjcmV0");

        let mut diags = Diagnostics::new();
        assert_eq!(decode_values(&encoded, &mut diags), Some(plain));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_undecodable_value_is_reported() {
        let bad = BTreeMap::from([("key".to_string(), "not base64!".to_string())]);
        let mut diags = Diagnostics::new();
        assert_eq!(decode_values(&bad, &mut diags), None);
        assert!(diags.has_error());
    }
}
