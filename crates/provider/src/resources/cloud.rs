//! juju_cloud

use async_trait::async_trait;
use juju_common::{CloudInfo, CloudInput, CloudRegion};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::RequiresReplace;
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{
    get_block_list, get_optional_string_attr, get_string_attr, get_string_set_attr, make_state, optional_string_value,
    string_set_value, string_value, Value,
};

const ID_FORMAT: &str = "<name>";

/// Region the controller adds to clouds declared without any
const IMPLICIT_REGION: &str = "default";

pub struct CloudResource {
    common: ResourceCommon,
}

impl CloudResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_cloud"),
        }
    }
}

impl Default for CloudResource {
    fn default() -> Self {
        Self::new()
    }
}

fn cloud_input(plan: &Value) -> CloudInput {
    CloudInput {
        name: get_string_attr(plan, "name"),
        cloud_type: get_string_attr(plan, "type"),
        auth_types: get_string_set_attr(plan, "auth_types"),
        endpoint: get_optional_string_attr(plan, "endpoint"),
        regions: get_block_list(plan, "region")
            .iter()
            .map(|r| CloudRegion {
                name: get_string_attr(r, "name"),
                endpoint: get_optional_string_attr(r, "endpoint"),
            })
            .collect(),
    }
}

fn cloud_to_state(cloud: &CloudInfo, prior: &Value) -> Value {
    let declared_none = matches!(prior.get("region"), Some(Value::List(items)) if items.is_empty());
    let implicit_only = cloud.regions.len() == 1 && cloud.regions[0].name == IMPLICIT_REGION;
    let regions = if declared_none && implicit_only {
        Vec::new()
    } else {
        cloud
            .regions
            .iter()
            .map(|r| {
                make_state(vec![
                    ("name", string_value(&r.name)),
                    ("endpoint", optional_string_value(r.endpoint.as_deref())),
                ])
            })
            .collect()
    };
    make_state(vec![
        ("id", string_value(&cloud.name)),
        ("name", string_value(&cloud.name)),
        ("type", string_value(&cloud.cloud_type)),
        ("auth_types", string_set_value(cloud.auth_types.iter().cloned())),
        ("endpoint", optional_string_value(cloud.endpoint.as_deref())),
        ("region", Value::List(regions)),
    ])
}

#[async_trait]
impl Resource for CloudResource {
    fn type_name(&self) -> &'static str {
        "juju_cloud"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represent a Juju Cloud for existing controller.")
                .attribute(id_attribute())
                .attribute(
                    Attribute::string("name")
                        .required()
                        .description("The name of the cloud in Juju.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("type")
                        .required()
                        .description("The type of the cloud, e.g. openstack or maas.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::set("auth_types", AttrType::String)
                        .required()
                        .description("List of supported authentication types by the cloud."),
                )
                .attribute(
                    Attribute::string("endpoint")
                        .optional()
                        .description("The API endpoint for the cloud."),
                )
                .block(NestedBlock::list(
                    "region",
                    Block::new()
                        .attribute(Attribute::string("name").required().description("The name of the region."))
                        .attribute(
                            Attribute::string("endpoint")
                                .optional()
                                .description("The API endpoint for the region."),
                        ),
                )),
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
        let input = cloud_input(plan);
        if let Err(e) = client.add_cloud(input.clone()).await {
            client_error(diags, "create", "cloud", &e);
            return None;
        }
        info!(name = %input.name, cloud_type = %input.cloud_type, "added cloud");
        match client.read_cloud(&input.name).await {
            Ok(cloud) => Some(fill_unknowns(plan, &cloud_to_state(&cloud, plan))),
            Err(e) => {
                client_error(diags, "read", "cloud", &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [name] = match id::decode::<1>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };
        match client.read_cloud(&name).await {
            Ok(cloud) => Some(cloud_to_state(&cloud, state)),
            Err(e) if e.is_not_found() => {
                debug!(name = %name, "cloud not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "cloud", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, _prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let input = cloud_input(plan);
        if let Err(e) = client.update_cloud(input.clone()).await {
            client_error(diags, "update", "cloud", &e);
            return None;
        }
        match client.read_cloud(&input.name).await {
            Ok(cloud) => Some(fill_unknowns(plan, &cloud_to_state(&cloud, plan))),
            Err(e) => {
                client_error(diags, "read", "cloud", &e);
                None
            }
        }
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        if let Err(e) = client.remove_cloud(&get_string_attr(state, "name")).await {
            client_error(diags, "delete", "cloud", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(regions: Vec<CloudRegion>) -> CloudInfo {
        CloudInfo {
            name: "maas".to_string(),
            cloud_type: "maas".to_string(),
            auth_types: vec!["oauth1".to_string()],
            endpoint: Some("http://10.0.0.2/MAAS".to_string()),
            regions,
        }
    }

    #[test]
    fn test_implicit_region_hidden_when_none_declared() {
        let implicit = cloud(vec![CloudRegion {
            name: IMPLICIT_REGION.to_string(),
            endpoint: Some("http://10.0.0.2/MAAS".to_string()),
        }]);
        let prior = make_state(vec![("region", Value::List(Vec::new()))]);
        assert_eq!(cloud_to_state(&implicit, &prior).get("region"), Some(&Value::List(Vec::new())));

        // An imported cloud reports what the controller has.
        let imported = cloud_to_state(&implicit, &make_state(vec![("id", string_value("maas"))]));
        assert_eq!(get_block_list(&imported, "region").len(), 1);
    }
}
