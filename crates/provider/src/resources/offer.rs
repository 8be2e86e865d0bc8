//! juju_offer

use async_trait::async_trait;
use juju_common::{CreateOfferInput, OfferInfo};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, model_uuid_attribute, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::{RequiresReplace, UseStateForUnknown};
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{get_optional_string_attr, get_string_attr, get_string_set_attr, make_state, string_set_value, string_value, Value};
use crate::validators;

const ID_FORMAT: &str = "<offer_url>";

pub struct OfferResource {
    common: ResourceCommon,
}

impl OfferResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_offer"),
        }
    }
}

impl Default for OfferResource {
    fn default() -> Self {
        Self::new()
    }
}

pub fn offer_to_state(offer: &OfferInfo) -> Value {
    make_state(vec![
        ("id", string_value(&offer.url)),
        ("url", string_value(&offer.url)),
        ("name", string_value(&offer.name)),
        ("model_uuid", string_value(&offer.model_uuid)),
        ("application_name", string_value(&offer.application_name)),
        ("endpoints", string_set_value(offer.endpoints.iter().cloned())),
    ])
}

#[async_trait]
impl Resource for OfferResource {
    fn type_name(&self) -> &'static str {
        "juju_offer"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represent a Juju Offer.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("application_name")
                        .required()
                        .description("The name of the application.")
                        .validator(validators::application_name())
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::set("endpoints", AttrType::String)
                        .required()
                        .description("The endpoints to be offered.")
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("name")
                        .optional()
                        .computed()
                        .description("The name of the offer. Defaults to the application name.")
                        .plan_modifier(UseStateForUnknown)
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("url")
                        .computed()
                        .description("The offer URL.")
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
        let input = CreateOfferInput {
            model_uuid: get_string_attr(plan, "model_uuid"),
            application_name: get_string_attr(plan, "application_name"),
            endpoints: get_string_set_attr(plan, "endpoints"),
            offer_name: get_optional_string_attr(plan, "name"),
        };

        match client.create_offer(input).await {
            Ok(offer) => {
                info!(url = %offer.url, "created offer");
                Some(fill_unknowns(plan, &offer_to_state(&offer)))
            }
            Err(e) => {
                client_error(diags, "create", "offer", &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [url] = match id::decode::<1>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };

        match client.read_offer(&url).await {
            Ok(offer) => Some(offer_to_state(&offer)),
            Err(e) if e.is_not_found() => {
                debug!(url = %url, "offer not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "offer", &e);
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
        let url = get_string_attr(state, "url");
        if let Err(e) = client.destroy_offer(&url, false).await {
            client_error(diags, "delete", "offer", &e);
        }
    }
}
