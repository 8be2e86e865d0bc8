//! juju_storage_pool

use async_trait::async_trait;
use juju_common::{StoragePoolInfo, StoragePoolInput};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, model_uuid_attribute, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::RequiresReplace;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{get_string_attr, get_string_map_attr, make_state, string_map_value, string_value, Value};

const ID_FORMAT: &str = "<model_uuid>:<pool_name>";

pub struct StoragePoolResource {
    common: ResourceCommon,
}

impl StoragePoolResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_storage_pool"),
        }
    }
}

impl Default for StoragePoolResource {
    fn default() -> Self {
        Self::new()
    }
}

fn pool_input(plan: &Value) -> StoragePoolInput {
    StoragePoolInput {
        model_uuid: get_string_attr(plan, "model_uuid"),
        name: get_string_attr(plan, "name"),
        provider: get_string_attr(plan, "storage_provider"),
        attributes: get_string_map_attr(plan, "attributes"),
    }
}

fn pool_to_state(pool: &StoragePoolInfo, prior: &Value) -> Value {
    let attributes = match prior.get("attributes") {
        Some(Value::Null) | None if pool.attributes.is_empty() => Value::Null,
        _ => string_map_value(&pool.attributes),
    };
    make_state(vec![
        ("id", string_value(id::encode(&[&pool.model_uuid, &pool.name]))),
        ("model_uuid", string_value(&pool.model_uuid)),
        ("name", string_value(&pool.name)),
        ("storage_provider", string_value(&pool.provider)),
        ("attributes", attributes),
    ])
}

#[async_trait]
impl Resource for StoragePoolResource {
    fn type_name(&self) -> &'static str {
        "juju_storage_pool"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represents a Juju storage pool.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("name")
                        .required()
                        .description("The pool's name.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("storage_provider")
                        .required()
                        .description("The pool's storage provider, e.g. ebs or tmpfs.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::map("attributes", AttrType::String)
                        .optional()
                        .description("Attributes for the storage pool."),
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
        let input = pool_input(plan);
        if let Err(e) = client.create_storage_pool(input.clone()).await {
            client_error(diags, "create", "storage pool", &e);
            return None;
        }
        info!(pool = %input.name, provider = %input.provider, "created storage pool");
        Some(fill_unknowns(plan, &pool_to_state(&input, plan)))
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [model_uuid, name] = match id::decode::<2>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };
        match client.read_storage_pool(&model_uuid, &name).await {
            Ok(pool) => Some(pool_to_state(&pool, state)),
            Err(e) if e.is_not_found() => {
                debug!(pool = %name, "storage pool not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "storage pool", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, _prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let input = pool_input(plan);
        if let Err(e) = client.update_storage_pool(input.clone()).await {
            client_error(diags, "update", "storage pool", &e);
            return None;
        }
        Some(fill_unknowns(plan, &pool_to_state(&input, plan)))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        if let Err(e) = client.remove_storage_pool(&model_uuid, &get_string_attr(state, "name")).await {
            client_error(diags, "delete", "storage pool", &e);
        }
    }
}
