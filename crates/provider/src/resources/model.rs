//! juju_model

use async_trait::async_trait;
use juju_common::{CreateModelInput, ModelInfo, UpdateModelInput};
use tracing::{debug, info, Span};

use super::{client_error, constraints_state, fill_unknowns, tracked_map, ListedResource, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::{RequiresReplace, UseStateForUnknown};
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{
    get_optional_string_attr, get_string_attr, get_string_map_attr, make_state, optional_string_value, string_value,
    Value,
};
use crate::types::ConstraintsType;
use crate::validators;

const ID_FORMAT: &str = "<model_uuid>";

pub struct ModelResource {
    common: ResourceCommon,
}

impl ModelResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_model"),
        }
    }
}

impl Default for ModelResource {
    fn default() -> Self {
        Self::new()
    }
}

pub fn model_to_state(model: &ModelInfo, prior: &Value) -> Value {
    make_state(vec![
        ("id", string_value(&model.uuid)),
        ("uuid", string_value(&model.uuid)),
        ("name", string_value(&model.name)),
        ("type", string_value(model.model_type.as_str())),
        ("cloud", string_value(&model.cloud)),
        ("cloud_region", string_value(&model.cloud_region)),
        ("credential", optional_string_value(model.credential.as_deref())),
        ("config", tracked_map(prior.get("config").unwrap_or(&Value::Null), &model.config)),
        (
            "constraints",
            constraints_state(prior.get("constraints").unwrap_or(&Value::Null), &model.constraints),
        ),
    ])
}

#[async_trait]
impl Resource for ModelResource {
    fn type_name(&self) -> &'static str {
        "juju_model"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represents a Juju model.")
                .attribute(id_attribute())
                .attribute(
                    Attribute::string("name")
                        .required()
                        .description("The name to be assigned to the model. Changing this value will cause the model to be destroyed and recreated by terraform.")
                        .validator(validators::model_name())
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("uuid")
                        .computed()
                        .description("The UUID of the model.")
                        .plan_modifier(UseStateForUnknown),
                )
                .attribute(
                    Attribute::string("type")
                        .computed()
                        .description("Type of the model. Set by the Juju's API server.")
                        .plan_modifier(UseStateForUnknown),
                )
                .attribute(
                    Attribute::string("cloud")
                        .optional()
                        .computed()
                        .description("The cloud to host the model on. Defaults to the controller's default cloud.")
                        .plan_modifier(UseStateForUnknown)
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("cloud_region")
                        .optional()
                        .computed()
                        .description("The region of the cloud to host the model in.")
                        .plan_modifier(UseStateForUnknown)
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("credential")
                        .optional()
                        .computed()
                        .description("Credential used to add the model.")
                        .plan_modifier(UseStateForUnknown),
                )
                .attribute(
                    Attribute::map("config", AttrType::String)
                        .optional()
                        .description("Override default model configuration."),
                )
                .attribute(
                    Attribute::string("constraints")
                        .optional()
                        .computed()
                        .custom_type(ConstraintsType)
                        .description("Constraints imposed on this model.")
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
        let input = CreateModelInput {
            name: get_string_attr(plan, "name"),
            cloud: get_optional_string_attr(plan, "cloud"),
            cloud_region: get_optional_string_attr(plan, "cloud_region"),
            credential: get_optional_string_attr(plan, "credential"),
            config: get_string_map_attr(plan, "config"),
            constraints: get_optional_string_attr(plan, "constraints"),
        };

        let model = match client.create_model(input).await {
            Ok(model) => model,
            Err(e) => {
                client_error(diags, "create", "model", &e);
                return None;
            }
        };
        info!(uuid = %model.uuid, name = %model.name, "created model");
        Some(fill_unknowns(plan, &model_to_state(&model, plan)))
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [uuid] = match id::decode::<1>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };

        match client.read_model(&uuid).await {
            Ok(model) => Some(model_to_state(&model, state)),
            Err(e) if e.is_not_found() => {
                debug!(uuid = %uuid, "model not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "model", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let uuid = get_string_attr(prior, "uuid");

        let planned_config = get_string_map_attr(plan, "config");
        let prior_config = get_string_map_attr(prior, "config");
        let mut input = UpdateModelInput {
            uuid: uuid.clone(),
            config: planned_config
                .iter()
                .filter(|(k, v)| prior_config.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            unset: prior_config
                .keys()
                .filter(|k| !planned_config.contains_key(*k))
                .cloned()
                .collect(),
            ..Default::default()
        };
        if plan.get("constraints") != prior.get("constraints") {
            input.constraints = Some(get_string_attr(plan, "constraints"));
        }
        if plan.get("credential") != prior.get("credential") {
            input.credential = get_optional_string_attr(plan, "credential");
        }

        if let Err(e) = client.update_model(input).await {
            client_error(diags, "update", "model", &e);
            return None;
        }
        match client.read_model(&uuid).await {
            Ok(model) => Some(fill_unknowns(plan, &model_to_state(&model, plan))),
            Err(e) => {
                client_error(diags, "read", "model", &e);
                None
            }
        }
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let uuid = get_string_attr(state, "uuid");
        if let Err(e) = client.destroy_model(&uuid).await {
            client_error(diags, "delete", "model", &e);
        }
    }

    fn list_schema(&self) -> Option<Schema> {
        Some(Schema::new(Block::new().description("Lists every model visible to the provider's user.")))
    }

    async fn list(&self, _config: &Value, diags: &mut Diagnostics) -> Vec<ListedResource> {
        let Some(client) = self.common.client(diags) else {
            return Vec::new();
        };
        match client.list_models().await {
            Ok(models) => models
                .iter()
                .map(|m| ListedResource {
                    id: m.uuid.clone(),
                    display_name: format!("{}/{}", m.owner, m.name),
                    state: model_to_state(m, &Value::Null),
                })
                .collect(),
            Err(e) => {
                client_error(diags, "list", "models", &e);
                Vec::new()
            }
        }
    }
}
