//! juju_user

use async_trait::async_trait;
use juju_common::{UserInfo, UserInput};
use tracing::{debug, info, Span};

use super::{client_error, fill_unknowns, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::Diagnostics;
use crate::id;
use crate::modifiers::RequiresReplace;
use crate::schema::{id_attribute, Attribute, Block, Schema};
use crate::state::{get_optional_string_attr, get_string_attr, make_state, optional_string_value, string_value, Value};
use crate::validators;

const ID_PREFIX: &str = "user";
const ID_FORMAT: &str = "user:<name>";

pub struct UserResource {
    common: ResourceCommon,
}

impl UserResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_user"),
        }
    }
}

impl Default for UserResource {
    fn default() -> Self {
        Self::new()
    }
}

/// The controller never returns passwords; `prior` supplies it.
fn user_to_state(user: &UserInfo, prior: &Value) -> Value {
    make_state(vec![
        ("id", string_value(id::encode(&[ID_PREFIX, &user.name]))),
        ("name", string_value(&user.name)),
        ("display_name", optional_string_value(user.display_name.as_deref())),
        ("password", prior.get("password").cloned().unwrap_or_default()),
    ])
}

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &'static str {
        "juju_user"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represents a Juju user.")
                .attribute(id_attribute())
                .attribute(
                    Attribute::string("name")
                        .required()
                        .description("The name to be assigned to the user.")
                        .validator(validators::user_name())
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::string("display_name")
                        .optional()
                        .description("The display name to be assigned to the user."),
                )
                .attribute(
                    Attribute::string("password")
                        .required()
                        .sensitive()
                        .description("The password to be assigned to the user."),
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
        let input = UserInput {
            name: get_string_attr(plan, "name"),
            display_name: get_optional_string_attr(plan, "display_name"),
            password: get_optional_string_attr(plan, "password"),
        };
        match client.add_user(input).await {
            Ok(user) => {
                info!(user = %user.name, "added user");
                Some(fill_unknowns(plan, &user_to_state(&user, plan)))
            }
            Err(e) => {
                client_error(diags, "create", "user", &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [name] = match id::decode_prefixed::<1>(&get_string_attr(state, "id"), ID_PREFIX, ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };
        match client.read_user(&name).await {
            Ok(user) => Some(user_to_state(&user, state)),
            Err(e) if e.is_not_found() => {
                debug!(user = %name, "user not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "user", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let mut input = UserInput {
            name: get_string_attr(prior, "name"),
            display_name: get_optional_string_attr(plan, "display_name"),
            password: None,
        };
        if plan.get("password") != prior.get("password") {
            input.password = get_optional_string_attr(plan, "password");
        }
        if let Err(e) = client.update_user(input).await {
            client_error(diags, "update", "user", &e);
            return None;
        }
        Some(fill_unknowns(plan, prior))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        if let Err(e) = client.remove_user(&get_string_attr(state, "name")).await {
            client_error(diags, "delete", "user", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_comes_from_prior_state() {
        let user = UserInfo {
            name: "alice".to_string(),
            display_name: None,
        };
        let prior = make_state(vec![("password", string_value("hunter2"))]);
        let state = user_to_state(&user, &prior);
        assert_eq!(state.get("id"), Some(&string_value("user:alice")));
        assert_eq!(state.get("password"), Some(&string_value("hunter2")));
        assert_eq!(state.get("display_name"), Some(&Value::Null));
    }
}
