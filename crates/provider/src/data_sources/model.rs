//! juju_model data source

use async_trait::async_trait;
use tracing::{debug, Span};

use super::{exactly_one_of, DataSource};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::resources::{client_error, ResourceCommon};
use crate::schema::{Attribute, Block, Schema};
use crate::state::{get_optional_string_attr, make_state, string_value, Value};
use crate::validators;

pub struct ModelDataSource {
    common: ResourceCommon,
}

impl ModelDataSource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_model"),
        }
    }
}

impl Default for ModelDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for ModelDataSource {
    fn type_name(&self) -> &'static str {
        "juju_model"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A data source representing a Juju Model.")
                .attribute(
                    Attribute::string("name")
                        .optional()
                        .computed()
                        .description("The name of the model.")
                        .validator(validators::model_name()),
                )
                .attribute(
                    Attribute::string("uuid")
                        .optional()
                        .computed()
                        .description("The UUID of the model.")
                        .validator(validators::model_uuid()),
                )
                .attribute(Attribute::string("owner").computed().description("The owner of the model."))
                .attribute(Attribute::string("type").computed().description("Type of the model."))
                .attribute(Attribute::string("cloud").computed().description("The cloud hosting the model."))
                .attribute(
                    Attribute::string("cloud_region")
                        .computed()
                        .description("The cloud region hosting the model."),
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
        exactly_one_of(config, "name", "uuid", diags);
    }

    async fn read(&self, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let found = match get_optional_string_attr(config, "uuid") {
            Some(uuid) => client.read_model(&uuid).await,
            None => {
                let name = get_optional_string_attr(config, "name").unwrap_or_default();
                client.read_model_by_name(&name).await
            }
        };
        let model = match found {
            Ok(model) => model,
            Err(e) => {
                client_error(diags, "read", "model", &e);
                return None;
            }
        };
        debug!(uuid = %model.uuid, name = %model.name, "found model");
        Some(make_state(vec![
            ("name", string_value(&model.name)),
            ("uuid", string_value(&model.uuid)),
            ("owner", string_value(&model.owner)),
            ("type", string_value(model.model_type.as_str())),
            ("cloud", string_value(&model.cloud)),
            ("cloud_region", string_value(&model.cloud_region)),
        ]))
    }
}
