//! Terraform Plugin Protocol v6 service
//!
//! Implements the generated `Provider` gRPC service on top of
//! [`JujuProvider`], converting dynamic values, schemas and diagnostics.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use crate::diag::{self, AttributePath, PathStep};
use crate::provider::{JujuProvider, ProviderError, DATA_SOURCE_TYPES, RESOURCE_TYPES};
use crate::schema::{self as local, Nesting};
use crate::state::{decode_dynamic_value, decode_json_value, encode_dynamic_value, encode_untyped, make_state, string_value, Value};
use crate::tfplugin6::provider_server::Provider;
use crate::tfplugin6::*;

/// gRPC front of the Juju provider
#[derive(Clone)]
pub struct ProviderService {
    provider: Arc<JujuProvider>,
}

impl ProviderService {
    pub fn new(provider: JujuProvider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn decode(value: Option<DynamicValue>) -> Result<Value, Status> {
    let Some(value) = value else {
        return Ok(Value::Null);
    };
    let decoded = if !value.msgpack.is_empty() {
        decode_dynamic_value(&value.msgpack)
    } else {
        decode_json_value(&value.json)
    };
    decoded.map_err(|e| Status::invalid_argument(format!("Failed to decode value: {}", e)))
}

fn encode(value: &Value, schema: &local::Schema) -> Result<DynamicValue, Status> {
    let msgpack = encode_dynamic_value(value, &schema.block)
        .map_err(|e| Status::internal(format!("Failed to encode state: {}", e)))?;
    Ok(DynamicValue { msgpack, json: vec![] })
}

fn unknown_type(err: ProviderError) -> Status {
    Status::not_found(err.to_string())
}

fn wire_path(path: &AttributePath) -> crate::tfplugin6::AttributePath {
    use attribute_path::step::Selector;

    let steps = path
        .steps()
        .iter()
        .map_while(|step| {
            let selector = match step {
                PathStep::Attribute(name) => Selector::AttributeName(name.clone()),
                PathStep::ElementKeyString(key) => Selector::ElementKeyString(key.clone()),
                PathStep::ElementKeyInt(i) => Selector::ElementKeyInt(*i),
                PathStep::ElementKeyValue(_) => return None,
            };
            Some(attribute_path::Step {
                selector: Some(selector),
            })
        })
        .collect();
    crate::tfplugin6::AttributePath { steps }
}

fn diagnostics(diags: diag::Diagnostics) -> Vec<Diagnostic> {
    diags
        .into_iter()
        .map(|d| Diagnostic {
            severity: match d.severity {
                diag::Severity::Error => diagnostic::Severity::Error as i32,
                diag::Severity::Warning => diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.as_ref().map(wire_path),
        })
        .collect()
}

fn error_diagnostic(summary: &str, detail: String) -> Vec<Diagnostic> {
    diagnostics(diag::Diagnostic::error(summary, detail).into())
}

fn schema_block(block: &local::Block, version: i64) -> schema::Block {
    schema::Block {
        version,
        attributes: block
            .attributes
            .iter()
            .map(|attr| schema::Attribute {
                name: attr.name.clone(),
                r#type: attr.ty.cty_json().to_string().into_bytes(),
                description: attr.description.clone(),
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description_kind: StringKind::Plain as i32,
                deprecated: false,
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|nested| schema::NestedBlock {
                type_name: nested.name.clone(),
                block: Some(schema_block(&nested.block, 0)),
                nesting: match nested.nesting {
                    Nesting::Single => schema::nested_block::NestingMode::Single as i32,
                    Nesting::List => schema::nested_block::NestingMode::List as i32,
                    Nesting::Set => schema::nested_block::NestingMode::Set as i32,
                },
                min_items: nested.min_items,
                max_items: nested.max_items,
            })
            .collect(),
        description: block.description.clone(),
        description_kind: StringKind::Plain as i32,
        deprecated: false,
    }
}

fn wire_schema(schema: &local::Schema) -> Schema {
    Schema {
        version: schema.version,
        block: Some(schema_block(&schema.block, schema.version)),
    }
}

fn wire_schemas(schemas: impl IntoIterator<Item = (&'static str, local::Schema)>) -> HashMap<String, Schema> {
    schemas
        .into_iter()
        .map(|(name, schema)| (name.to_string(), wire_schema(&schema)))
        .collect()
}

fn capabilities() -> ServerCapabilities {
    ServerCapabilities {
        plan_destroy: false,
        get_provider_schema_optional: true,
        move_resource_state: false,
    }
}

// ============================================================================
// Service
// ============================================================================

#[tonic::async_trait]
impl Provider for ProviderService {
    async fn get_metadata(
        &self,
        _request: Request<get_metadata::Request>,
    ) -> Result<Response<get_metadata::Response>, Status> {
        debug!("GetMetadata called");

        Ok(Response::new(get_metadata::Response {
            server_capabilities: Some(capabilities()),
            diagnostics: vec![],
            data_sources: DATA_SOURCE_TYPES
                .iter()
                .map(|name| get_metadata::DataSourceMetadata {
                    type_name: name.to_string(),
                })
                .collect(),
            resources: RESOURCE_TYPES
                .iter()
                .map(|name| get_metadata::ResourceMetadata {
                    type_name: name.to_string(),
                })
                .collect(),
            list_resources: self
                .provider
                .list_resource_schemas()
                .into_keys()
                .map(|name| get_metadata::ListResourceMetadata {
                    type_name: name.to_string(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<get_provider_schema::Request>,
    ) -> Result<Response<get_provider_schema::Response>, Status> {
        info!("GetProviderSchema called");

        Ok(Response::new(get_provider_schema::Response {
            provider: Some(wire_schema(&self.provider.provider_schema())),
            resource_schemas: wire_schemas(self.provider.resource_schemas()),
            data_source_schemas: wire_schemas(self.provider.data_source_schemas()),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(capabilities()),
            list_resource_schemas: wire_schemas(self.provider.list_resource_schemas()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<validate_provider_config::Request>,
    ) -> Result<Response<validate_provider_config::Response>, Status> {
        debug!("ValidateProviderConfig called");

        let config = decode(request.into_inner().config)?;
        let diags = self.provider.validate_provider_config(&config);
        Ok(Response::new(validate_provider_config::Response {
            diagnostics: diagnostics(diags),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<validate_resource_config::Request>,
    ) -> Result<Response<validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateResourceConfig called for {}", req.type_name);

        let config = decode(req.config)?;
        let diags = self
            .provider
            .validate_resource_config(&req.type_name, &config)
            .await
            .map_err(unknown_type)?;
        Ok(Response::new(validate_resource_config::Response {
            diagnostics: diagnostics(diags),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<validate_data_resource_config::Request>,
    ) -> Result<Response<validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateDataResourceConfig called for {}", req.type_name);

        let config = decode(req.config)?;
        let diags = self
            .provider
            .validate_data_source_config(&req.type_name, &config)
            .await
            .map_err(unknown_type)?;
        Ok(Response::new(validate_data_resource_config::Response {
            diagnostics: diagnostics(diags),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<upgrade_resource_state::Request>,
    ) -> Result<Response<upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        debug!("UpgradeResourceState called for {} (version {})", req.type_name, req.version);

        let schema = self.provider.resource_schema(&req.type_name).map_err(unknown_type)?;
        let raw = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        let state = match decode_json_value(&raw) {
            Ok(state) => state,
            Err(e) => {
                return Ok(Response::new(upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: error_diagnostic("Unable to Read Previously Saved State", e.to_string()),
                }))
            }
        };

        let (upgraded, diags) = self
            .provider
            .upgrade_resource_state(&req.type_name, req.version, state)
            .await
            .map_err(unknown_type)?;
        let upgraded_state = upgraded.map(|state| encode(&state, &schema)).transpose()?;
        Ok(Response::new(upgrade_resource_state::Response {
            upgraded_state,
            diagnostics: diagnostics(diags),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<configure_provider::Request>,
    ) -> Result<Response<configure_provider::Response>, Status> {
        let req = request.into_inner();
        info!("ConfigureProvider called (terraform {})", req.terraform_version);

        let config = decode(req.config)?;
        let diags = self.provider.configure(&config).await;
        Ok(Response::new(configure_provider::Response {
            diagnostics: diagnostics(diags),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<read_resource::Request>,
    ) -> Result<Response<read_resource::Response>, Status> {
        let req = request.into_inner();
        debug!("ReadResource called for {}", req.type_name);

        let schema = self.provider.resource_schema(&req.type_name).map_err(unknown_type)?;
        let current = decode(req.current_state)?;
        let (new_state, diags) = self
            .provider
            .read_resource(&req.type_name, &current)
            .await
            .map_err(unknown_type)?;

        // A failed read keeps the current state
        let new_state = match new_state {
            Some(state) => state,
            None if diags.has_error() => current,
            None => Value::Null,
        };
        Ok(Response::new(read_resource::Response {
            new_state: Some(encode(&new_state, &schema)?),
            diagnostics: diagnostics(diags),
            private: req.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<plan_resource_change::Request>,
    ) -> Result<Response<plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!("PlanResourceChange called for {}", req.type_name);

        let schema = self.provider.resource_schema(&req.type_name).map_err(unknown_type)?;
        let prior = decode(req.prior_state)?;
        let proposed = decode(req.proposed_new_state)?;
        let config = decode(req.config)?;

        let result = self
            .provider
            .plan_resource_change(&req.type_name, &prior, &proposed, &config)
            .await
            .map_err(unknown_type)?;
        Ok(Response::new(plan_resource_change::Response {
            planned_state: Some(encode(&result.planned_state, &schema)?),
            requires_replace: result.requires_replace.iter().map(wire_path).collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics(result.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<apply_resource_change::Request>,
    ) -> Result<Response<apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        info!("ApplyResourceChange called for {}", req.type_name);

        let schema = self.provider.resource_schema(&req.type_name).map_err(unknown_type)?;
        let prior = decode(req.prior_state)?;
        let planned = decode(req.planned_state)?;

        let (new_state, diags) = self
            .provider
            .apply_resource_change(&req.type_name, &prior, &planned)
            .await
            .map_err(unknown_type)?;
        Ok(Response::new(apply_resource_change::Response {
            new_state: Some(encode(&new_state, &schema)?),
            private: vec![],
            diagnostics: diagnostics(diags),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<import_resource_state::Request>,
    ) -> Result<Response<import_resource_state::Response>, Status> {
        let req = request.into_inner();
        info!("ImportResourceState called for {} ({})", req.type_name, req.id);

        let schema = self.provider.resource_schema(&req.type_name).map_err(unknown_type)?;
        let (state, diags) = self
            .provider
            .import_resource_state(&req.type_name, &req.id)
            .await
            .map_err(unknown_type)?;

        let mut imported_resources = Vec::new();
        if let Some(state) = state {
            imported_resources.push(import_resource_state::ImportedResource {
                type_name: req.type_name.clone(),
                state: Some(encode(&state, &schema)?),
                private: vec![],
            });
        }
        Ok(Response::new(import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics(diags),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<read_data_source::Request>,
    ) -> Result<Response<read_data_source::Response>, Status> {
        let req = request.into_inner();
        debug!("ReadDataSource called for {}", req.type_name);

        let schema = self.provider.data_source_schema(&req.type_name).map_err(unknown_type)?;
        let config = decode(req.config)?;
        let (state, diags) = self
            .provider
            .read_data_source(&req.type_name, &config)
            .await
            .map_err(unknown_type)?;
        Ok(Response::new(read_data_source::Response {
            state: Some(encode(&state, &schema)?),
            diagnostics: diagnostics(diags),
        }))
    }

    type ListResourceStream = Pin<Box<dyn Stream<Item = Result<list_resource::Event, Status>> + Send + 'static>>;

    async fn list_resource(
        &self,
        request: Request<list_resource::Request>,
    ) -> Result<Response<Self::ListResourceStream>, Status> {
        let req = request.into_inner();
        info!("ListResource called for {}", req.type_name);

        let schema = self.provider.resource_schema(&req.type_name).map_err(unknown_type)?;
        let config = decode(req.config)?;
        let (listed, diags) = self
            .provider
            .list_resources(&req.type_name, &config)
            .await
            .map_err(unknown_type)?;

        let mut events = Vec::new();
        if !diags.is_empty() {
            events.push(Ok(list_resource::Event {
                identity: None,
                display_name: String::new(),
                resource_object: None,
                diagnostic: diagnostics(diags),
            }));
        }

        let limit = usize::try_from(req.limit).ok().filter(|l| *l > 0).unwrap_or(usize::MAX);
        for item in listed.into_iter().take(limit) {
            let identity = encode_untyped(&make_state(vec![("id", string_value(&item.id))]))
                .map_err(|e| Status::internal(format!("Failed to encode identity: {}", e)))?;
            let resource_object = if req.include_resource_object {
                Some(encode(&item.state, &schema)?)
            } else {
                None
            };
            events.push(Ok(list_resource::Event {
                identity: Some(ResourceIdentityData {
                    identity_data: Some(DynamicValue {
                        msgpack: identity,
                        json: vec![],
                    }),
                }),
                display_name: item.display_name,
                resource_object,
                diagnostic: vec![],
            }));
        }

        Ok(Response::new(Box::pin(tokio_stream::iter(events))))
    }

    async fn stop_provider(
        &self,
        _request: Request<stop_provider::Request>,
    ) -> Result<Response<stop_provider::Response>, Status> {
        info!("StopProvider called");
        Ok(Response::new(stop_provider::Response { error: String::new() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_element_paths_are_truncated() {
        let path = AttributePath::root("application")
            .element(string_value("x"))
            .attr("name");
        let wire = wire_path(&path);
        assert_eq!(wire.steps.len(), 1);
    }

    #[test]
    fn test_schema_attribute_types() {
        let schema = local::Schema::new(
            local::Block::new().attribute(local::Attribute::set("endpoints", local::AttrType::String).required()),
        );
        let wire = wire_schema(&schema);
        let block = wire.block.unwrap();
        assert_eq!(block.attributes[0].r#type, br#"["set","string"]"#.to_vec());
    }
}
