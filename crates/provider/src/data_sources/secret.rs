//! juju_secret data source

use async_trait::async_trait;
use juju_common::ReadSecretInput;
use tracing::Span;

use super::{exactly_one_of, DataSource};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::resources::{client_error, model_uuid_attribute, ResourceCommon};
use crate::schema::{Attribute, Block, Schema};
use crate::state::{get_optional_string_attr, get_string_attr, make_state, optional_string_value, string_value, Value};

pub struct SecretDataSource {
    common: ResourceCommon,
}

impl SecretDataSource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_secret"),
        }
    }
}

impl Default for SecretDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for SecretDataSource {
    fn type_name(&self) -> &'static str {
        "juju_secret"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A data source representing a Juju Secret.")
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("name")
                        .optional()
                        .computed()
                        .description("The name of the secret."),
                )
                .attribute(
                    Attribute::string("secret_id")
                        .optional()
                        .computed()
                        .description("The ID of the secret."),
                )
                .attribute(Attribute::string("secret_uri").computed().description("The URI of the secret."))
                .attribute(Attribute::string("info").computed().description("The description of the secret.")),
        )
    }

    fn configure(&mut self, data: &ProviderData) {
        self.common.configure(data);
    }

    fn subsystem(&self) -> &Span {
        self.common.span()
    }

    fn validate_config(&self, config: &Value, diags: &mut Diagnostics) {
        exactly_one_of(config, "name", "secret_id", diags);
    }

    async fn read(&self, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let model_uuid = get_string_attr(config, "model_uuid");
        let input = ReadSecretInput {
            model_uuid: model_uuid.clone(),
            secret_id: get_optional_string_attr(config, "secret_id"),
            name: get_optional_string_attr(config, "name"),
        };
        match client.read_secret(input).await {
            Ok(secret) => Some(make_state(vec![
                ("model_uuid", string_value(model_uuid)),
                ("name", optional_string_value(secret.name.as_deref())),
                ("secret_id", string_value(&secret.secret_id)),
                ("secret_uri", string_value(&secret.secret_uri)),
                ("info", optional_string_value(secret.info.as_deref())),
            ])),
            Err(e) => {
                client_error(diags, "read", "secret", &e);
                None
            }
        }
    }
}
