//! Resource Implementations
//!
//! Each resource type owns its schema and CRUD operations against the Juju
//! client. The provider creates a fresh instance per request and configures
//! it with the [`ProviderData`] from `ConfigureProvider`.

pub mod access_model;
pub mod access_offer;
pub mod access_secret;
pub mod application;
pub mod cloud;
pub mod credential;
pub mod integration;
pub mod jaas;
pub mod machine;
pub mod model;
pub mod offer;
pub mod secret;
pub mod ssh_key;
pub mod storage_pool;
pub mod user;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use juju_common::{Constraints, Error, JujuClient};
use tracing::Span;

use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::modifiers::RequiresReplace;
use crate::schema::{Attribute, Schema};
use crate::state::{make_state, string_value, Value};
use crate::validators;

/// Trait for resource operations
///
/// CRUD methods report failures through `diags`; a `None` state alongside an
/// error means nothing usable came back.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `juju_model`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn configure(&mut self, data: &ProviderData);

    /// Span for everything logged on behalf of this resource
    fn subsystem(&self) -> &Span;

    /// Checks across attributes, after the schema checks passed
    fn validate_config(&self, _config: &Value, _diags: &mut Diagnostics) {}

    /// Last chance to adjust a plan after attribute plan modifiers ran
    fn modify_plan(
        &self,
        _config: &Value,
        _prior: &Value,
        _planned: &mut Value,
        _requires_replace: &mut Vec<AttributePath>,
        _diags: &mut Diagnostics,
    ) {
    }

    async fn create(&self, plan: &Value, diags: &mut Diagnostics) -> Option<Value>;

    /// `None` without errors means the object is gone and leaves state.
    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value>;

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value>;

    async fn delete(&self, state: &Value, diags: &mut Diagnostics);

    /// State to hand to `read` for an imported ID
    fn import_state(&self, id: &str, _diags: &mut Diagnostics) -> Option<Value> {
        Some(make_state(vec![("id", string_value(id))]))
    }

    /// Upgrade state written by an older schema version
    fn upgrade_state(&self, _version: i64, state: Value, _diags: &mut Diagnostics) -> Option<Value> {
        Some(state)
    }

    /// Config schema for listing objects of this type, if supported
    fn list_schema(&self) -> Option<Schema> {
        None
    }

    async fn list(&self, _config: &Value, diags: &mut Diagnostics) -> Vec<ListedResource> {
        diags.error(
            "List Not Supported",
            format!("The {} resource does not support listing.", self.type_name()),
        );
        Vec::new()
    }
}

/// One object found by a list request
#[derive(Debug, Clone, PartialEq)]
pub struct ListedResource {
    pub id: String,
    pub display_name: String,
    pub state: Value,
}

/// Client handle and logging span shared by resources and data sources
pub struct ResourceCommon {
    client: Option<Arc<dyn JujuClient>>,
    is_jaas: bool,
    span: Span,
}

impl ResourceCommon {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            client: None,
            is_jaas: false,
            span: tracing::info_span!("juju", resource = type_name),
        }
    }

    pub fn configure(&mut self, data: &ProviderData) {
        self.client = Some(data.client.clone());
        self.is_jaas = data.is_jaas;
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The configured client, or an error diagnostic.
    pub fn client(&self, diags: &mut Diagnostics) -> Option<&dyn JujuClient> {
        if self.client.is_none() {
            diags.error(
                "Unconfigured Juju Client",
                "Expected configured Juju client. Please report this issue to the provider developers.",
            );
        }
        self.client.as_deref()
    }

    /// Like [`client`](Self::client), but also requires a JAAS controller.
    pub fn jaas_client(&self, type_name: &str, diags: &mut Diagnostics) -> Option<&dyn JujuClient> {
        let client = self.client(diags)?;
        if !self.is_jaas {
            diags.error(
                "Unsupported Operation",
                format!("The {type_name} resource is only supported when the provider is connected to JAAS."),
            );
            return None;
        }
        Some(client)
    }
}

/// The `model_uuid` attribute of model-scoped resources
pub fn model_uuid_attribute() -> Attribute {
    Attribute::string("model_uuid")
        .required()
        .description("The UUID of the model this object belongs to. Changing this forces a new resource.")
        .validator(validators::model_uuid())
        .plan_modifier(RequiresReplace)
}

/// Report a failed client call as `Unable to {action} {kind}, got error: ..`.
pub fn client_error(diags: &mut Diagnostics, action: &str, kind: &str, err: &Error) {
    diags.error("Client Error", format!("Unable to {action} {kind}, got error: {err}"));
}

/// The state value for a constraints attribute: the prior string when it
/// means the same as the controller's canonical form, that form otherwise.
pub fn constraints_state(prior: &Value, canonical: &str) -> Value {
    if let Some(previous) = prior.as_str() {
        if Constraints::parse(previous).map_or(false, |c| c.to_string() == canonical) {
            return string_value(previous);
        }
    }
    string_value(canonical)
}

/// The entries of `actual` whose keys are tracked in `prior`, a map
/// attribute. Untracked keys are left to the controller.
pub fn tracked_map(prior: &Value, actual: &BTreeMap<String, String>) -> Value {
    match prior {
        Value::Map(tracked) => Value::Map(
            tracked
                .keys()
                .filter_map(|k| actual.get(k).map(|v| (k.clone(), string_value(v))))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// Resolve the unknowns in `plan` from `fresh`, a state built from the
/// controller after apply. Known planned values always win.
pub fn fill_unknowns(plan: &Value, fresh: &Value) -> Value {
    match (plan, fresh) {
        (Value::Unknown, fresh) => fresh.clone(),
        (Value::Map(planned), _) => Value::Map(
            planned
                .iter()
                .map(|(k, v)| (k.clone(), fill_unknowns(v, fresh.get(k).unwrap_or(&Value::Null))))
                .collect(),
        ),
        (Value::List(planned), Value::List(fresh_items)) => Value::List(
            planned
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if item.is_fully_known() {
                        return item.clone();
                    }
                    let counterpart = fresh_items
                        .iter()
                        .find(|f| known_parts_match(item, f))
                        .or_else(|| fresh_items.get(i))
                        .unwrap_or(&Value::Null);
                    fill_unknowns(item, counterpart)
                })
                .collect(),
        ),
        (planned, _) => planned.clone(),
    }
}

/// Whether every known scalar attribute of `planned` equals `fresh`'s.
fn known_parts_match(planned: &Value, fresh: &Value) -> bool {
    match planned {
        Value::Map(attrs) => attrs.iter().all(|(k, v)| match v {
            Value::Unknown | Value::Null | Value::List(_) | Value::Map(_) => true,
            v => fresh.get(k) == Some(v),
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{int_value, string_set_value};

    #[test]
    fn test_fill_unknowns_keeps_known_plan_values() {
        let plan = make_state(vec![
            ("id", Value::Unknown),
            ("constraints", string_value("mem=4096M")),
            ("machines", Value::Unknown),
        ]);
        let fresh = make_state(vec![
            ("id", string_value("uuid:app")),
            ("constraints", string_value("mem=4G")),
            ("machines", string_set_value(["0", "1"])),
        ]);
        let filled = fill_unknowns(&plan, &fresh);
        assert_eq!(filled.get("id"), Some(&string_value("uuid:app")));
        assert_eq!(filled.get("constraints"), Some(&string_value("mem=4096M")));
        assert_eq!(filled.get("machines"), Some(&string_set_value(["0", "1"])));
    }

    #[test]
    fn test_fill_unknowns_pairs_set_elements_by_known_attributes() {
        let element = |label: &str, size: Value| make_state(vec![("label", string_value(label)), ("size", size)]);
        let plan = Value::List(vec![element("logs", Value::Unknown), element("data", string_value("10G"))]);
        let fresh = Value::List(vec![
            element("data", string_value("10240M")),
            element("logs", string_value("1024M")),
        ]);
        let filled = fill_unknowns(&plan, &fresh);
        assert_eq!(
            filled,
            Value::List(vec![element("logs", string_value("1024M")), element("data", string_value("10G"))])
        );
    }

    #[test]
    fn test_constraints_state_keeps_equivalent_prior() {
        let prior = string_value("mem=4096M cores=2");
        assert_eq!(constraints_state(&prior, "cores=2 mem=4096M"), prior);
        assert_eq!(
            constraints_state(&prior, "cores=4 mem=4096M"),
            string_value("cores=4 mem=4096M")
        );
        assert_eq!(constraints_state(&Value::Null, ""), string_value(""));
    }

    #[test]
    fn test_tracked_map_only_reports_tracked_keys() {
        let actual = BTreeMap::from([
            ("logging-config".to_string(), "<root>=DEBUG".to_string()),
            ("default-series".to_string(), "jammy".to_string()),
        ]);
        let prior = make_state(vec![("logging-config", string_value("<root>=INFO"))]);
        assert_eq!(
            tracked_map(&prior, &actual),
            make_state(vec![("logging-config", string_value("<root>=DEBUG"))])
        );
        assert_eq!(tracked_map(&Value::Null, &actual), Value::Null);
    }

    #[test]
    fn test_fill_unknowns_missing_counterpart_is_null() {
        let plan = make_state(vec![("units", Value::Unknown), ("name", string_value("a"))]);
        let filled = fill_unknowns(&plan, &Value::Null);
        assert_eq!(filled.get("units"), Some(&Value::Null));

        let fresh = make_state(vec![("units", int_value(3))]);
        assert_eq!(fill_unknowns(&plan, &fresh).get("units"), Some(&int_value(3)));
    }
}
