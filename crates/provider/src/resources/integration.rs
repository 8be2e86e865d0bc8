//! juju_integration
//!
//! Relates two applications, either of which may live behind an offer URL.
//! Offers are consumed into the model before the integration is created
//! and the consumed (SAAS) application is removed again on delete.

use async_trait::async_trait;
use juju_common::{ConsumeOfferInput, CreateIntegrationInput, IntegrationInfo};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, model_uuid_attribute, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::id;
use crate::modifiers::RequiresReplace;
use crate::schema::{id_attribute, Attribute, Block, NestedBlock, Schema};
use crate::state::{get_block_list, get_optional_string_attr, get_string_attr, make_state, string_value, Value};
use crate::types::comma_delimited::tokens;
use crate::types::CommaDelimitedType;
use crate::validators;

const ID_FORMAT: &str = "<model_uuid>:<app_a>:<ep_a>:<app_b>:<ep_b>";

pub struct IntegrationResource {
    common: ResourceCommon,
}

impl IntegrationResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_integration"),
        }
    }
}

impl Default for IntegrationResource {
    fn default() -> Self {
        Self::new()
    }
}

fn integration_id(info: &IntegrationInfo) -> String {
    let mut fields = vec![info.model_uuid.as_str()];
    for ep in &info.endpoints {
        fields.push(&ep.application);
        fields.push(&ep.endpoint);
    }
    id::encode(&fields)
}

/// State for `info`, keeping the offer URLs declared in `prior`.
pub fn integration_to_state(info: &IntegrationInfo, prior: &Value) -> Value {
    let declared = get_block_list(prior, "application");
    let applications = info
        .endpoints
        .iter()
        .map(|ep| {
            let offer_url = declared
                .iter()
                .find(|d| get_optional_string_attr(d, "name").as_deref() == Some(&ep.application))
                .or_else(|| {
                    declared
                        .iter()
                        .find(|d| !matches!(d.get("name"), Some(Value::String(_))) && get_optional_string_attr(d, "offer_url").is_some())
                })
                .and_then(|d| d.get("offer_url").cloned())
                .unwrap_or_default();
            make_state(vec![
                ("name", string_value(&ep.application)),
                ("endpoint", string_value(&ep.endpoint)),
                ("offer_url", offer_url),
            ])
        })
        .collect();

    let via = match prior.get("via").and_then(Value::as_str) {
        Some(previous) if tokens(previous) == info.via.iter().map(String::as_str).collect() => string_value(previous),
        _ if info.via.is_empty() => Value::Null,
        _ => string_value(info.via.join(",")),
    };

    make_state(vec![
        ("id", string_value(integration_id(info))),
        ("model_uuid", string_value(&info.model_uuid)),
        ("via", via),
        ("application", Value::List(applications)),
    ])
}

#[async_trait]
impl Resource for IntegrationResource {
    fn type_name(&self) -> &'static str {
        "juju_integration"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represents a Juju integration (relation) between two applications.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("via")
                        .optional()
                        .custom_type(CommaDelimitedType)
                        .description("A comma separated list of CIDRs for outbound traffic.")
                        .plan_modifier(RequiresReplace),
                )
                .block(
                    NestedBlock::set(
                        "application",
                        Block::new()
                            .attribute(
                                Attribute::string("name")
                                    .optional()
                                    .computed()
                                    .description("The name of the application. Computed for offers.")
                                    .validator(validators::application_name()),
                            )
                            .attribute(
                                Attribute::string("endpoint")
                                    .optional()
                                    .computed()
                                    .description("The endpoint name. Inferred when only one side names it."),
                            )
                            .attribute(
                                Attribute::string("offer_url")
                                    .optional()
                                    .description("The URL of a remote application offer.")
                                    .validator(validators::offer_url()),
                            ),
                    )
                    .min_items(2)
                    .max_items(2)
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
        for (i, app) in get_block_list(config, "application").iter().enumerate() {
            let name = app.get("name").unwrap_or(&Value::Null);
            let offer_url = app.get("offer_url").unwrap_or(&Value::Null);
            if name.is_unknown() || offer_url.is_unknown() {
                continue;
            }
            if name.is_null() == offer_url.is_null() {
                diags.attribute_error(
                    &AttributePath::root("application").index(i),
                    "Invalid Application Block",
                    "Exactly one of name or offer_url must be set for each application.",
                );
            }
        }
    }

    async fn create(&self, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let model_uuid = get_string_attr(plan, "model_uuid");

        let mut endpoints = Vec::new();
        for app in get_block_list(plan, "application") {
            let name = match get_optional_string_attr(&app, "offer_url") {
                Some(offer_url) => {
                    let consumed = client
                        .consume_offer(ConsumeOfferInput {
                            model_uuid: model_uuid.clone(),
                            offer_url: offer_url.clone(),
                            alias: None,
                        })
                        .await;
                    match consumed {
                        Ok(name) => {
                            debug!(offer = %offer_url, name = %name, "consumed offer");
                            name
                        }
                        Err(e) => {
                            client_error(diags, "consume", "offer", &e);
                            return None;
                        }
                    }
                }
                None => get_string_attr(&app, "name"),
            };
            endpoints.push(match get_optional_string_attr(&app, "endpoint") {
                Some(endpoint) => format!("{name}:{endpoint}"),
                None => name,
            });
        }

        let input = CreateIntegrationInput {
            model_uuid,
            endpoints,
            via: tokens(&get_string_attr(plan, "via")).into_iter().map(String::from).collect(),
        };
        match client.create_integration(input).await {
            Ok(info) => {
                info!(id = %integration_id(&info), "created integration");
                Some(fill_unknowns(plan, &integration_to_state(&info, plan)))
            }
            Err(e) => {
                client_error(diags, "create", "integration", &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [model_uuid, app_a, ep_a, app_b, ep_b] = match id::decode::<5>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };

        let endpoints = [format!("{app_a}:{ep_a}"), format!("{app_b}:{ep_b}")];
        match client.read_integration(&model_uuid, &endpoints).await {
            Ok(info) => Some(integration_to_state(&info, state)),
            Err(e) if e.is_not_found() => {
                debug!(endpoints = ?endpoints, "integration not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "integration", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, _diags: &mut Diagnostics) -> Option<Value> {
        Some(fill_unknowns(plan, prior))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        let applications = get_block_list(state, "application");
        let endpoints: Vec<String> = applications
            .iter()
            .map(|app| format!("{}:{}", get_string_attr(app, "name"), get_string_attr(app, "endpoint")))
            .collect();

        if let Err(e) = client.destroy_integration(&model_uuid, &endpoints).await {
            client_error(diags, "delete", "integration", &e);
            return;
        }
        for app in applications.iter().filter(|app| get_optional_string_attr(app, "offer_url").is_some()) {
            let name = get_string_attr(app, "name");
            if let Err(e) = client.remove_remote_application(&model_uuid, &name).await {
                client_error(diags, "remove", "remote application", &e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juju_common::IntegrationEndpoint;

    fn info() -> IntegrationInfo {
        IntegrationInfo {
            model_uuid: "uuid".to_string(),
            endpoints: vec![
                IntegrationEndpoint {
                    application: "wordpress".to_string(),
                    endpoint: "db".to_string(),
                },
                IntegrationEndpoint {
                    application: "mysql".to_string(),
                    endpoint: "database".to_string(),
                },
            ],
            via: vec!["10.0.0.0/24".to_string(), "10.0.1.0/24".to_string()],
        }
    }

    #[test]
    fn test_id_lists_both_endpoints() {
        assert_eq!(integration_id(&info()), "uuid:wordpress:db:mysql:database");
    }

    #[test]
    fn test_state_keeps_offer_url_and_via_order() {
        let app = |name: Value, offer_url: Value| make_state(vec![("name", name), ("endpoint", Value::Unknown), ("offer_url", offer_url)]);
        let prior = make_state(vec![
            ("via", string_value("10.0.1.0/24, 10.0.0.0/24")),
            (
                "application",
                Value::List(vec![
                    app(string_value("wordpress"), Value::Null),
                    app(Value::Unknown, string_value("admin/db.mysql")),
                ]),
            ),
        ]);
        let state = integration_to_state(&info(), &prior);
        assert_eq!(state.get("via"), Some(&string_value("10.0.1.0/24, 10.0.0.0/24")));
        let apps = get_block_list(&state, "application");
        assert_eq!(apps[0].get("offer_url"), Some(&Value::Null));
        assert_eq!(apps[1].get("offer_url"), Some(&string_value("admin/db.mysql")));
        assert_eq!(apps[1].get("endpoint"), Some(&string_value("database")));
    }

    #[test]
    fn test_each_application_needs_name_or_offer() {
        let config = make_state(vec![(
            "application",
            Value::List(vec![
                make_state(vec![("name", string_value("a")), ("offer_url", string_value("admin/m.b"))]),
                make_state(vec![("name", Value::Null), ("offer_url", Value::Null)]),
            ]),
        )]);
        let mut diags = Diagnostics::new();
        IntegrationResource::new().validate_config(&config, &mut diags);
        assert_eq!(diags.len(), 2);
    }
}
