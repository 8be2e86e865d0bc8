//! juju_machine data source

use async_trait::async_trait;
use tracing::Span;

use super::DataSource;
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::resources::{client_error, model_uuid_attribute, ResourceCommon};
use crate::schema::{Attribute, Block, Schema};
use crate::state::{get_string_attr, make_state, string_value, Value};

pub struct MachineDataSource {
    common: ResourceCommon,
}

impl MachineDataSource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_machine"),
        }
    }
}

impl Default for MachineDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for MachineDataSource {
    fn type_name(&self) -> &'static str {
        "juju_machine"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A data source representing a Juju Machine.")
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("machine_id")
                        .required()
                        .description("The Juju id of the machine."),
                )
                .attribute(Attribute::string("base").computed().description("The machine's operating system."))
                .attribute(Attribute::string("hostname").computed().description("The machine's hostname."))
                .attribute(Attribute::string("status").computed().description("The machine's agent status.")),
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
        let machine_id = get_string_attr(config, "machine_id");
        match client.read_machine(&model_uuid, &machine_id).await {
            Ok(machine) => Some(make_state(vec![
                ("model_uuid", string_value(&machine.model_uuid)),
                ("machine_id", string_value(&machine.machine_id)),
                ("base", string_value(&machine.base)),
                ("hostname", string_value(&machine.hostname)),
                ("status", string_value(&machine.status)),
            ])),
            Err(e) => {
                client_error(diags, "read", "machine", &e);
                None
            }
        }
    }
}
