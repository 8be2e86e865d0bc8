//! juju_jaas_group and juju_jaas_role
//!
//! Groups and roles only exist on JAAS. Both are a name behind a stable
//! UUID, so renaming is an in-place update.

use async_trait::async_trait;
use juju_common::{JaasEntity, JujuClient, Result};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::UseStateForUnknown;
use crate::schema::{id_attribute, Attribute, Block, Schema};
use crate::state::{get_string_attr, make_state, string_value, Value};
use crate::validators;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JaasKind {
    Group,
    Role,
}

impl JaasKind {
    fn type_name(self) -> &'static str {
        match self {
            JaasKind::Group => "juju_jaas_group",
            JaasKind::Role => "juju_jaas_role",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            JaasKind::Group => "group",
            JaasKind::Role => "role",
        }
    }

    fn id_format(self) -> &'static str {
        match self {
            JaasKind::Group => "<group_uuid>",
            JaasKind::Role => "<role_uuid>",
        }
    }

    async fn add(self, client: &dyn JujuClient, name: &str) -> Result<JaasEntity> {
        match self {
            JaasKind::Group => client.add_group(name).await,
            JaasKind::Role => client.add_role(name).await,
        }
    }

    async fn read(self, client: &dyn JujuClient, uuid: &str) -> Result<JaasEntity> {
        match self {
            JaasKind::Group => client.read_group(uuid).await,
            JaasKind::Role => client.read_role(uuid).await,
        }
    }

    async fn rename(self, client: &dyn JujuClient, uuid: &str, name: &str) -> Result<()> {
        match self {
            JaasKind::Group => client.rename_group(uuid, name).await,
            JaasKind::Role => client.rename_role(uuid, name).await,
        }
    }

    async fn remove(self, client: &dyn JujuClient, uuid: &str) -> Result<()> {
        match self {
            JaasKind::Group => client.remove_group(uuid).await,
            JaasKind::Role => client.remove_role(uuid).await,
        }
    }
}

pub struct JaasResource {
    kind: JaasKind,
    common: ResourceCommon,
}

impl JaasResource {
    pub fn group() -> Self {
        Self::new(JaasKind::Group)
    }

    pub fn role() -> Self {
        Self::new(JaasKind::Role)
    }

    fn new(kind: JaasKind) -> Self {
        Self {
            kind,
            common: ResourceCommon::new(kind.type_name()),
        }
    }
}

fn entity_to_state(entity: &JaasEntity) -> Value {
    make_state(vec![
        ("id", string_value(&entity.uuid)),
        ("uuid", string_value(&entity.uuid)),
        ("name", string_value(&entity.name)),
    ])
}

#[async_trait]
impl Resource for JaasResource {
    fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    fn schema(&self) -> Schema {
        let (description, name) = match self.kind {
            JaasKind::Group => (
                "A resource that represents a group in JAAS.",
                Attribute::string("name")
                    .required()
                    .description("The name of the group.")
                    .validator(validators::group_name()),
            ),
            JaasKind::Role => (
                "A resource that represents a role in JAAS.",
                Attribute::string("name")
                    .required()
                    .description("The name of the role.")
                    .validator(validators::role_name()),
            ),
        };
        Schema::new(
            Block::new()
                .description(description)
                .attribute(id_attribute())
                .attribute(name)
                .attribute(
                    Attribute::string("uuid")
                        .computed()
                        .description("The UUID assigned by JAAS.")
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
        let client = self.common.jaas_client(self.type_name(), diags)?;
        match self.kind.add(client, &get_string_attr(plan, "name")).await {
            Ok(entity) => {
                info!(uuid = %entity.uuid, name = %entity.name, "created {}", self.kind.noun());
                Some(fill_unknowns(plan, &entity_to_state(&entity)))
            }
            Err(e) => {
                client_error(diags, "create", self.kind.noun(), &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.jaas_client(self.type_name(), diags)?;
        let [uuid] = match id::decode::<1>(&get_string_attr(state, "id"), self.kind.id_format()) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };
        match self.kind.read(client, &uuid).await {
            Ok(entity) => Some(entity_to_state(&entity)),
            Err(e) if e.is_not_found() => {
                debug!(uuid = %uuid, "{} not found, removing from state", self.kind.noun());
                None
            }
            Err(e) => {
                client_error(diags, "read", self.kind.noun(), &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.jaas_client(self.type_name(), diags)?;
        let uuid = get_string_attr(prior, "uuid");
        let name = get_string_attr(plan, "name");
        if name != get_string_attr(prior, "name") {
            if let Err(e) = self.kind.rename(client, &uuid, &name).await {
                client_error(diags, "rename", self.kind.noun(), &e);
                return None;
            }
        }
        Some(fill_unknowns(plan, prior))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.jaas_client(self.type_name(), diags) else {
            return;
        };
        if let Err(e) = self.kind.remove(client, &get_string_attr(state, "uuid")).await {
            client_error(diags, "delete", self.kind.noun(), &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_have_distinct_type_names() {
        assert_eq!(JaasResource::group().type_name(), "juju_jaas_group");
        assert_eq!(JaasResource::role().type_name(), "juju_jaas_role");
    }

    #[tokio::test]
    async fn test_unconfigured_client_is_reported() {
        let mut diags = Diagnostics::new();
        let state = JaasResource::group()
            .create(&make_state(vec![("name", string_value("devops"))]), &mut diags)
            .await;
        assert!(state.is_none());
        assert!(diags.has_error());
    }
}
