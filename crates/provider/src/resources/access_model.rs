//! juju_access_model
//!
//! Grants one access level on a model to a set of users. The ID lists the
//! users, so it changes whenever the set does.

use async_trait::async_trait;
use juju_common::ModelAccess;
use tracing::{debug, info, Span};

use super::access_secret::set_diff;
use super::{client_error, model_uuid_attribute, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::id;
use crate::modifiers::RequiresReplace;
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::{get_string_attr, get_string_set_attr, make_state, string_set_value, string_value, Value};
use crate::validators::{self, Each, OneOf};

const ID_FORMAT: &str = "<model_uuid>:<access>:<user1,user2,...>";

pub struct AccessModelResource {
    common: ResourceCommon,
}

impl AccessModelResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_access_model"),
        }
    }
}

impl Default for AccessModelResource {
    fn default() -> Self {
        Self::new()
    }
}

fn access_model_state(model_uuid: &str, access: &str, users: &[String]) -> Value {
    make_state(vec![
        ("id", string_value(id::encode(&[model_uuid, access, &users.join(",")]))),
        ("model_uuid", string_value(model_uuid)),
        ("access", string_value(access)),
        ("users", string_set_value(users.iter().cloned())),
    ])
}

fn parse_access(s: &str, diags: &mut Diagnostics) -> Option<ModelAccess> {
    let access = ModelAccess::parse(s);
    if access.is_none() {
        diags.attribute_error(
            &AttributePath::root("access"),
            "Invalid Access Level",
            format!("{s:?} is not one of {:?}", ModelAccess::ALL),
        );
    }
    access
}

#[async_trait]
impl Resource for AccessModelResource {
    fn type_name(&self) -> &'static str {
        "juju_access_model"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represent a Juju Access Model.")
                .attribute(
                    Attribute::string("id")
                        .computed()
                        .description("The ID of this resource."),
                )
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("access")
                        .required()
                        .description("Level of access granted to the users.")
                        .validator(OneOf(ModelAccess::ALL))
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::set("users", AttrType::String)
                        .required()
                        .description("List of users to grant access to.")
                        .validator(Each::new(validators::user_name())),
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
        let model_uuid = get_string_attr(plan, "model_uuid");
        let access_name = get_string_attr(plan, "access");
        let access = parse_access(&access_name, diags)?;
        let users = get_string_set_attr(plan, "users");

        for user in &users {
            if let Err(e) = client.grant_model_access(&model_uuid, user, access).await {
                client_error(diags, "grant", "model access", &e);
                return None;
            }
        }
        info!(model = %model_uuid, access = %access_name, users = ?users, "granted model access");
        Some(access_model_state(&model_uuid, &access_name, &users))
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [model_uuid, access_name, users] = match id::decode::<3>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };
        let access = parse_access(&access_name, diags)?;

        let granted = match client.read_model_access(&model_uuid).await {
            Ok(granted) => granted,
            Err(e) if e.is_not_found() => {
                debug!(model = %model_uuid, "model not found, removing access from state");
                return None;
            }
            Err(e) => {
                client_error(diags, "read", "model access", &e);
                return None;
            }
        };

        let remaining: Vec<String> = users
            .split(',')
            .filter(|user| granted.get(*user) == Some(&access))
            .map(String::from)
            .collect();
        if remaining.is_empty() {
            debug!(model = %model_uuid, access = %access_name, "no users hold this access, removing from state");
            return None;
        }
        Some(access_model_state(&model_uuid, &access_name, &remaining))
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let model_uuid = get_string_attr(prior, "model_uuid");
        let access_name = get_string_attr(prior, "access");
        let access = parse_access(&access_name, diags)?;
        let users = get_string_set_attr(plan, "users");
        let (added, removed) = set_diff(&users, &get_string_set_attr(prior, "users"));

        for user in &added {
            if let Err(e) = client.grant_model_access(&model_uuid, user, access).await {
                client_error(diags, "grant", "model access", &e);
                return None;
            }
        }
        for user in &removed {
            if let Err(e) = client.revoke_model_access(&model_uuid, user, ModelAccess::Read).await {
                client_error(diags, "revoke", "model access", &e);
                return None;
            }
        }
        Some(access_model_state(&model_uuid, &access_name, &users))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        for user in get_string_set_attr(state, "users") {
            // Revoking read removes every level of access.
            if let Err(e) = client.revoke_model_access(&model_uuid, &user, ModelAccess::Read).await {
                client_error(diags, "revoke", "model access", &e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_lists_users() {
        let state = access_model_state("uuid", "write", &["alice".to_string(), "bob".to_string()]);
        assert_eq!(state.get("id"), Some(&string_value("uuid:write:alice,bob")));
    }

    #[test]
    fn test_unknown_access_level() {
        let mut diags = Diagnostics::new();
        assert_eq!(parse_access("superuser", &mut diags), None);
        assert!(diags.has_error());
        assert_eq!(parse_access("admin", &mut diags), Some(ModelAccess::Admin));
    }
}
