//! juju_offer data source

use async_trait::async_trait;
use tracing::Span;

use super::DataSource;
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::resources::offer::offer_to_state;
use crate::resources::{client_error, ResourceCommon};
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::{get_string_attr, Value};
use crate::validators;

pub struct OfferDataSource {
    common: ResourceCommon,
}

impl OfferDataSource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_offer"),
        }
    }
}

impl Default for OfferDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for OfferDataSource {
    fn type_name(&self) -> &'static str {
        "juju_offer"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A data source representing a Juju Offer.")
                .attribute(
                    Attribute::string("url")
                        .required()
                        .description("The offer URL.")
                        .validator(validators::offer_url()),
                )
                .attribute(Attribute::string("id").computed().description("The offer URL."))
                .attribute(Attribute::string("name").computed().description("The name of the offer."))
                .attribute(Attribute::string("model_uuid").computed().description("The UUID of the offering model."))
                .attribute(
                    Attribute::string("application_name")
                        .computed()
                        .description("The name of the offered application."),
                )
                .attribute(
                    Attribute::set("endpoints", AttrType::String)
                        .computed()
                        .description("The endpoints the offer exposes."),
                ),
        )
    }

    fn configure(&mut self, data: &ProviderData) {
        self.common.configure(data);
    }

    fn subsystem(&self) -> &Span {
        self.common.span()
    }

    async fn read(&self, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        match client.read_offer(&get_string_attr(config, "url")).await {
            Ok(offer) => Some(offer_to_state(&offer)),
            Err(e) => {
                client_error(diags, "read", "offer", &e);
                None
            }
        }
    }
}
