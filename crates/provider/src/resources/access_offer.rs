//! juju_access_offer
//!
//! Manages the admin, consume and read users of an offer. The offer owner
//! always holds admin access and is never reported.

use std::collections::BTreeMap;

use async_trait::async_trait;
use juju_common::names::OfferUrl;
use juju_common::OfferAccess;
use tracing::{debug, info, Span};

use super::{client_error, Resource, ResourceCommon};
use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::id;
use crate::modifiers::RequiresReplace;
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::{get_string_attr, make_state, string_set_value, string_value, Value};
use crate::validators::{self, Each};

const ID_FORMAT: &str = "<offer_url>";

const LEVELS: [(&str, OfferAccess); 3] = [
    ("admin_users", OfferAccess::Admin),
    ("consume_users", OfferAccess::Consume),
    ("read_users", OfferAccess::Read),
];

pub struct AccessOfferResource {
    common: ResourceCommon,
}

impl AccessOfferResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_access_offer"),
        }
    }
}

impl Default for AccessOfferResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Desired access per user. Unknown or null sets contribute nothing.
fn planned_access(plan: &Value) -> BTreeMap<String, OfferAccess> {
    let mut users = BTreeMap::new();
    for (key, access) in LEVELS {
        for user in plan.get(key).and_then(Value::as_list).unwrap_or_default() {
            if let Some(user) = user.as_str() {
                users.insert(user.to_string(), access);
            }
        }
    }
    users
}

fn access_offer_state(url: &str, users: &BTreeMap<String, OfferAccess>) -> Value {
    let holders = |level: OfferAccess| {
        let matching: Vec<&String> = users.iter().filter(|(_, a)| **a == level).map(|(u, _)| u).collect();
        if matching.is_empty() {
            Value::Null
        } else {
            string_set_value(matching.into_iter().cloned())
        }
    };
    make_state(vec![
        ("id", string_value(url)),
        ("offer_url", string_value(url)),
        ("admin_users", holders(OfferAccess::Admin)),
        ("consume_users", holders(OfferAccess::Consume)),
        ("read_users", holders(OfferAccess::Read)),
    ])
}

/// The levels to revoke, highest first, to take a user from `current` down
/// to `target` (`None` removes all access).
fn revocations(current: OfferAccess, target: Option<OfferAccess>) -> Vec<OfferAccess> {
    [OfferAccess::Admin, OfferAccess::Consume, OfferAccess::Read]
        .into_iter()
        .filter(|level| *level <= current && target.map_or(true, |t| *level > t))
        .collect()
}

fn offer_owner(url: &str) -> Option<String> {
    OfferUrl::parse(url).ok().and_then(|u| u.user)
}

impl AccessOfferResource {
    async fn apply(
        &self,
        url: &str,
        current: &BTreeMap<String, OfferAccess>,
        planned: &BTreeMap<String, OfferAccess>,
        diags: &mut Diagnostics,
    ) -> bool {
        let Some(client) = self.common.client(diags) else {
            return false;
        };
        for (user, access) in planned {
            if current.get(user).map_or(true, |c| c < access) {
                if let Err(e) = client.grant_offer_access(url, user, *access).await {
                    client_error(diags, "grant", "offer access", &e);
                    return false;
                }
            }
        }
        for (user, access) in current {
            for level in revocations(*access, planned.get(user).copied()) {
                if let Err(e) = client.revoke_offer_access(url, user, level).await {
                    client_error(diags, "revoke", "offer access", &e);
                    return false;
                }
            }
        }
        true
    }
}

#[async_trait]
impl Resource for AccessOfferResource {
    fn type_name(&self) -> &'static str {
        "juju_access_offer"
    }

    fn schema(&self) -> Schema {
        let users = |name: &str, description: &str| {
            Attribute::set(name, AttrType::String)
                .optional()
                .description(description)
                .validator(Each::new(validators::user_name()))
        };
        Schema::new(
            Block::new()
                .description("A resource that represent a Juju Access Offer.")
                .attribute(
                    Attribute::string("id")
                        .computed()
                        .description("The ID of this resource."),
                )
                .attribute(
                    Attribute::string("offer_url")
                        .required()
                        .description("The URL of the offer for access management.")
                        .validator(validators::offer_url())
                        .plan_modifier(RequiresReplace),
                )
                .attribute(users("admin_users", "List of users to grant admin access."))
                .attribute(users("consume_users", "List of users to grant consume access."))
                .attribute(users("read_users", "List of users to grant read access.")),
        )
    }

    fn configure(&mut self, data: &ProviderData) {
        self.common.configure(data);
    }

    fn subsystem(&self) -> &Span {
        self.common.span()
    }

    fn validate_config(&self, config: &Value, diags: &mut Diagnostics) {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (key, _) in LEVELS {
            for user in config.get(key).and_then(Value::as_list).unwrap_or_default() {
                let Some(user) = user.as_str() else {
                    continue;
                };
                if let Some(first) = seen.insert(user, key) {
                    diags.attribute_error(
                        &AttributePath::root(key).element(string_value(user)),
                        "Invalid Attribute Combination",
                        format!("User {user:?} appears in both {first} and {key}; a user can hold one access level."),
                    );
                }
            }
        }
        if let Some(url) = config.get("offer_url").and_then(Value::as_str) {
            if let Some(owner) = offer_owner(url) {
                if seen.contains_key(owner.as_str()) {
                    diags.error(
                        "Invalid Attribute Value",
                        format!("User {owner:?} owns the offer and always has admin access."),
                    );
                }
            }
        }
    }

    async fn create(&self, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let url = get_string_attr(plan, "offer_url");
        let planned = planned_access(plan);
        if !self.apply(&url, &BTreeMap::new(), &planned, diags).await {
            return None;
        }
        info!(url = %url, users = planned.len(), "granted offer access");
        Some(access_offer_state(&url, &planned))
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
            Ok(offer) => {
                let owner = offer_owner(&offer.url);
                let mut users = offer.users;
                if let Some(owner) = owner {
                    users.remove(&owner);
                }
                Some(access_offer_state(&url, &users))
            }
            Err(e) if e.is_not_found() => {
                debug!(url = %url, "offer not found, removing access from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "offer access", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let url = get_string_attr(prior, "offer_url");
        let planned = planned_access(plan);
        if !self.apply(&url, &planned_access(prior), &planned, diags).await {
            return None;
        }
        Some(access_offer_state(&url, &planned))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let url = get_string_attr(state, "offer_url");
        self.apply(&url, &planned_access(state), &BTreeMap::new(), diags).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocations_step_down() {
        assert_eq!(
            revocations(OfferAccess::Admin, Some(OfferAccess::Read)),
            vec![OfferAccess::Admin, OfferAccess::Consume]
        );
        assert_eq!(revocations(OfferAccess::Consume, None), vec![OfferAccess::Consume, OfferAccess::Read]);
        assert!(revocations(OfferAccess::Read, Some(OfferAccess::Admin)).is_empty());
    }

    #[test]
    fn test_user_in_two_sets() {
        let config = make_state(vec![
            ("offer_url", string_value("admin/db.mysql")),
            ("admin_users", string_set_value(["alice"])),
            ("read_users", string_set_value(["alice", "bob"])),
        ]);
        let mut diags = Diagnostics::new();
        AccessOfferResource::new().validate_config(&config, &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_owner_cannot_be_listed() {
        let config = make_state(vec![
            ("offer_url", string_value("admin/db.mysql")),
            ("consume_users", string_set_value(["admin"])),
        ]);
        let mut diags = Diagnostics::new();
        AccessOfferResource::new().validate_config(&config, &mut diags);
        assert!(diags.has_error());
    }

    #[test]
    fn test_state_groups_users_by_level() {
        let users = BTreeMap::from([
            ("alice".to_string(), OfferAccess::Consume),
            ("bob".to_string(), OfferAccess::Consume),
        ]);
        let state = access_offer_state("admin/db.mysql", &users);
        assert_eq!(state.get("consume_users"), Some(&string_set_value(["alice", "bob"])));
        assert_eq!(state.get("admin_users"), Some(&Value::Null));
    }
}
