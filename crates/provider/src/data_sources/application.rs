//! juju_application data source

use async_trait::async_trait;
use tracing::Span;

use super::DataSource;
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::resources::{client_error, model_uuid_attribute, ResourceCommon};
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::{get_string_attr, int_value, make_state, optional_string_value, string_set_value, string_value, Value};
use crate::validators;

pub struct ApplicationDataSource {
    common: ResourceCommon,
}

impl ApplicationDataSource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_application"),
        }
    }
}

impl Default for ApplicationDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for ApplicationDataSource {
    fn type_name(&self) -> &'static str {
        "juju_application"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A data source that represents a single Juju application deployment from a charm.")
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("name")
                        .required()
                        .description("Name of the application deployment.")
                        .validator(validators::application_name()),
                )
                .attribute(Attribute::string("charm_name").computed().description("The name of the charm."))
                .attribute(Attribute::string("channel").computed().description("The charm channel."))
                .attribute(Attribute::number("revision").computed().description("The charm revision."))
                .attribute(Attribute::number("units").computed().description("The number of units."))
                .attribute(
                    Attribute::set("machines", AttrType::String)
                        .computed()
                        .description("The machines the units run on."),
                )
                .attribute(Attribute::string("constraints").computed().description("Application constraints.")),
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
        let model_uuid = get_string_attr(config, "model_uuid");
        let name = get_string_attr(config, "name");
        let app = match client.read_application(&model_uuid, &name).await {
            Ok(app) => app,
            Err(e) => {
                client_error(diags, "read", "application", &e);
                return None;
            }
        };
        Some(make_state(vec![
            ("model_uuid", string_value(&app.model_uuid)),
            ("name", string_value(&app.name)),
            ("charm_name", string_value(&app.charm.name)),
            ("channel", optional_string_value(app.charm.channel.as_deref())),
            ("revision", app.charm.revision.map(int_value).unwrap_or_default()),
            ("units", int_value(i64::from(app.units))),
            ("machines", string_set_value(app.machines.iter().cloned())),
            ("constraints", string_value(&app.constraints)),
        ]))
    }
}
