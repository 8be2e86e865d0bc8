//! juju_credential

use async_trait::async_trait;
use juju_common::{CredentialInfo, CredentialInput};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::id;
use crate::modifiers::{RequiresReplace, StaticDefault};
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{
    bool_value, get_bool_attr, get_string_attr, get_string_map_attr, make_state, string_map_value, string_value, Value,
};

const ID_FORMAT: &str = "<name>:<cloud>:<client_bool>:<controller_bool>";

pub struct CredentialResource {
    common: ResourceCommon,
}

impl CredentialResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_credential"),
        }
    }
}

impl Default for CredentialResource {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(field: &str, id: &str, diags: &mut Diagnostics) -> Option<bool> {
    match field.parse::<bool>() {
        Ok(flag) => Some(flag),
        Err(_) => {
            diags.error(
                "Invalid ID",
                format!("invalid ID {id:?}: expected true or false in the format {ID_FORMAT:?}, got {field:?}"),
            );
            None
        }
    }
}

fn credential_to_state(info: &CredentialInfo, client: bool, controller: bool, prior: &Value) -> Value {
    let attributes = match prior.get("attributes") {
        Some(Value::Null) | None if info.attributes.is_empty() => Value::Null,
        _ => string_map_value(&info.attributes),
    };
    make_state(vec![
        (
            "id",
            string_value(id::encode(&[&info.name, &info.cloud, &client.to_string(), &controller.to_string()])),
        ),
        ("name", string_value(&info.name)),
        ("cloud", string_value(&info.cloud)),
        ("auth_type", string_value(&info.auth_type)),
        ("attributes", attributes),
        ("client_credential", bool_value(client)),
        ("controller_credential", bool_value(controller)),
    ])
}

fn credential_input(plan: &Value) -> CredentialInput {
    CredentialInput {
        name: get_string_attr(plan, "name"),
        cloud: get_string_attr(plan, "cloud"),
        auth_type: get_string_attr(plan, "auth_type"),
        attributes: get_string_map_attr(plan, "attributes"),
        client: get_bool_attr(plan, "client_credential", false),
        controller: get_bool_attr(plan, "controller_credential", true),
    }
}

#[async_trait]
impl Resource for CredentialResource {
    fn type_name(&self) -> &'static str {
        "juju_credential"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represent a credential for a cloud.")
                .attribute(id_attribute())
                .attribute(
                    Attribute::string("name")
                        .required()
                        .description("The name to be assigned to the credential.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("cloud")
                        .required()
                        .description("The name of the cloud the credential is for.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("auth_type")
                        .required()
                        .description("Credential authorization type, e.g. userpass or access-key."),
                )
                .attribute(
                    Attribute::map("attributes", AttrType::String)
                        .optional()
                        .sensitive()
                        .description("Credential attributes accordingly to the cloud type."),
                )
                .attribute(
                    Attribute::bool("client_credential")
                        .optional()
                        .computed()
                        .description("Add credential to the client.")
                        .plan_modifier(StaticDefault(bool_value(false)))
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::bool("controller_credential")
                        .optional()
                        .computed()
                        .description("Add credential to the controller.")
                        .plan_modifier(StaticDefault(bool_value(true)))
                        .plan_modifier(RequiresReplace),
                ),
        )
    }

    fn configure(&mut self, data: &ProviderData) {
        self.common.configure(data);
    }

    fn subsystem(&self) -> &Span {
        self.common.span()
    }

    fn validate_config(&self, config: &Value, diags: &mut Diagnostics) {
        let flag = |key: &str, default: bool| match config.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::Unknown) => None,
            _ => Some(default),
        };
        if let (Some(false), Some(false)) = (flag("client_credential", false), flag("controller_credential", true)) {
            diags.attribute_error(
                &AttributePath::root("controller_credential"),
                "Invalid Attribute Combination",
                "At least one of client_credential or controller_credential must be true.",
            );
        }
    }

    async fn create(&self, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let input = credential_input(plan);
        if let Err(e) = client.create_credential(input.clone()).await {
            client_error(diags, "create", "credential", &e);
            return None;
        }
        info!(name = %input.name, cloud = %input.cloud, "created credential");
        match client
            .read_credential(&input.name, &input.cloud, input.client, input.controller)
            .await
        {
            Ok(info) => Some(fill_unknowns(
                plan,
                &credential_to_state(&info, input.client, input.controller, plan),
            )),
            Err(e) => {
                client_error(diags, "read", "credential", &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let raw_id = get_string_attr(state, "id");
        let [name, cloud, client_flag, controller_flag] = match id::decode::<4>(&raw_id, ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };
        let client_flag = parse_flag(&client_flag, &raw_id, diags)?;
        let controller_flag = parse_flag(&controller_flag, &raw_id, diags)?;

        match client.read_credential(&name, &cloud, client_flag, controller_flag).await {
            Ok(info) => Some(credential_to_state(&info, client_flag, controller_flag, state)),
            Err(e) if e.is_not_found() => {
                debug!(name = %name, cloud = %cloud, "credential not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "credential", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, _prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let input = credential_input(plan);
        if let Err(e) = client.update_credential(input.clone()).await {
            client_error(diags, "update", "credential", &e);
            return None;
        }
        match client
            .read_credential(&input.name, &input.cloud, input.client, input.controller)
            .await
        {
            Ok(info) => Some(fill_unknowns(
                plan,
                &credential_to_state(&info, input.client, input.controller, plan),
            )),
            Err(e) => {
                client_error(diags, "read", "credential", &e);
                None
            }
        }
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let input = credential_input(state);
        if let Err(e) = client
            .destroy_credential(&input.name, &input.cloud, input.client, input.controller)
            .await
        {
            client_error(diags, "delete", "credential", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(None, None, false; "defaults store on the controller")]
    #[test_case(Some(true), Some(false), false; "client only")]
    #[test_case(Some(false), Some(false), true; "neither")]
    #[test_case(None, Some(false), true; "controller disabled without client")]
    fn test_credential_location(client: Option<bool>, controller: Option<bool>, invalid: bool) {
        let flag = |b: Option<bool>| b.map(bool_value).unwrap_or_default();
        let config = make_state(vec![
            ("client_credential", flag(client)),
            ("controller_credential", flag(controller)),
        ]);
        let mut diags = Diagnostics::new();
        CredentialResource::new().validate_config(&config, &mut diags);
        assert_eq!(diags.has_error(), invalid);
    }

    #[test]
    fn test_id_carries_location_flags() {
        let info = CredentialInfo {
            name: "cred".to_string(),
            cloud: "aws".to_string(),
            auth_type: "access-key".to_string(),
            attributes: Default::default(),
        };
        let state = credential_to_state(&info, false, true, &Value::Null);
        assert_eq!(state.get("id"), Some(&string_value("cred:aws:false:true")));
        assert_eq!(state.get("attributes"), Some(&Value::Null));
    }
}
