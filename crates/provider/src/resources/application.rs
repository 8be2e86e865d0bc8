//! juju_application
//!
//! Deploys a charm into a model. Most attributes can be changed in place:
//! charm channel and revision (refresh), unit count or placement, config,
//! constraints, trust and exposure. Storage is fixed at deploy time.

use std::collections::BTreeMap;

use async_trait::async_trait;
use juju_common::{ApplicationInfo, CharmSpec, CreateApplicationInput, ExposeSpec, UpdateApplicationInput};
use tracing::{debug, info, Span};

use super::{
    client_error, constraints_state, fill_unknowns, model_uuid_attribute, tracked_map, ListedResource, Resource,
    ResourceCommon,
};
use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::id;
use crate::modifiers::{RequiresReplace, RequiresReplaceIfRemoved, StaticDefault, UnitCount, UseStateForUnknown};
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{
    bool_value, get_block_list, get_bool_attr, get_optional_int_attr, get_optional_string_attr, get_string_attr,
    get_string_map_attr, get_string_set_attr, int_value, make_state, string_set_value, string_value, Value,
};
use crate::types::comma_delimited::tokens;
use crate::types::{CommaDelimitedType, ConstraintsType};
use crate::validators;

const ID_FORMAT: &str = "<model_uuid>:<application_name>";

pub struct ApplicationResource {
    common: ResourceCommon,
}

impl ApplicationResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_application"),
        }
    }
}

impl Default for ApplicationResource {
    fn default() -> Self {
        Self::new()
    }
}

fn charm_block() -> NestedBlock {
    NestedBlock::list(
        "charm",
        Block::new()
            .description("The charm installed from Charmhub.")
            .attribute(
                Attribute::string("name")
                    .required()
                    .description("The name of the charm to be installed from Charmhub.")
                    .plan_modifier(RequiresReplace),
            )
            .attribute(
                Attribute::string("channel")
                    .optional()
                    .computed()
                    .description("The channel to use when deploying a charm. Specified as <track>/<risk>/<branch>.")
                    .validator(validators::channel()),
            )
            .attribute(
                Attribute::number("revision")
                    .optional()
                    .computed()
                    .description("The revision of the charm to deploy."),
            )
            .attribute(
                Attribute::string("base")
                    .optional()
                    .computed()
                    .description("The operating system on which to deploy, e.g. ubuntu@22.04."),
            ),
    )
    .min_items(1)
    .max_items(1)
}

fn expose_block() -> NestedBlock {
    let list = |name: &str, description: &str| {
        Attribute::string(name)
            .optional()
            .custom_type(CommaDelimitedType)
            .description(description)
    };
    NestedBlock::list(
        "expose",
        Block::new()
            .description("Makes an application publicly available over the network.")
            .attribute(list("endpoints", "Expose only the ports that charms have opened for this comma-delimited list of endpoints."))
            .attribute(list("spaces", "A comma-delimited list of spaces that should be able to access the application ports once exposed."))
            .attribute(list("cidrs", "A comma-delimited list of CIDRs that should be able to access the application ports once exposed.")),
    )
    .max_items(1)
}

fn storage_block() -> NestedBlock {
    NestedBlock::set(
        "storage",
        Block::new()
            .description("Storage used by the application. Cannot be changed after deployment.")
            .attribute(Attribute::string("label").required().description("The specific storage option defined in the charm."))
            .attribute(
                Attribute::string("size")
                    .optional()
                    .computed()
                    .description("The size of each volume, e.g. 100G."),
            )
            .attribute(
                Attribute::string("pool")
                    .optional()
                    .computed()
                    .description("Name of the storage pool to use."),
            )
            .attribute(
                Attribute::number("count")
                    .optional()
                    .computed()
                    .description("The number of volumes."),
            ),
    )
    .plan_modifier(RequiresReplaceIfRemoved)
}

/// Storage directives from the `storage_directives` map and `storage` blocks
fn storage_directives(plan: &Value) -> BTreeMap<String, String> {
    let mut directives = get_string_map_attr(plan, "storage_directives");
    for storage in get_block_list(plan, "storage") {
        let mut parts = Vec::new();
        if let Some(pool) = get_optional_string_attr(&storage, "pool") {
            parts.push(pool);
        }
        if let Some(count) = get_optional_int_attr(&storage, "count") {
            parts.push(count.to_string());
        }
        if let Some(size) = get_optional_string_attr(&storage, "size") {
            parts.push(size);
        }
        directives.insert(get_string_attr(&storage, "label"), parts.join(","));
    }
    directives
}

fn expose_spec(plan: &Value) -> Option<ExposeSpec> {
    let expose = get_block_list(plan, "expose").into_iter().next()?;
    let list = |key: &str| -> Vec<String> {
        tokens(&get_string_attr(&expose, key)).into_iter().map(String::from).collect()
    };
    Some(ExposeSpec {
        endpoints: list("endpoints"),
        spaces: list("spaces"),
        cidrs: list("cidrs"),
    })
}

fn unit_count(units: i64, diags: &mut Diagnostics) -> Option<u32> {
    match u32::try_from(units) {
        Ok(n) => Some(n),
        Err(_) => {
            diags.attribute_error(
                &AttributePath::root("units"),
                "Invalid Unit Count",
                format!("units must be between 0 and {}, got {units}.", u32::MAX),
            );
            None
        }
    }
}

fn charm_spec(plan: &Value) -> CharmSpec {
    let charm = get_block_list(plan, "charm").into_iter().next().unwrap_or_default();
    CharmSpec {
        name: get_string_attr(&charm, "name"),
        channel: get_optional_string_attr(&charm, "channel"),
        revision: get_optional_int_attr(&charm, "revision"),
        base: get_optional_string_attr(&charm, "base"),
    }
}

/// The comma-delimited state value: the prior string when it holds the
/// same tokens, the joined tokens otherwise, null when there are none.
fn comma_delimited_state(prior: &Value, items: &[String]) -> Value {
    if let Some(previous) = prior.as_str() {
        let previous_tokens: Vec<&str> = tokens(previous).into_iter().collect();
        let mut current: Vec<&str> = items.iter().map(String::as_str).collect();
        current.sort_unstable();
        current.dedup();
        if previous_tokens == current {
            return string_value(previous);
        }
    }
    if items.is_empty() {
        Value::Null
    } else {
        string_value(items.join(","))
    }
}

fn storage_state(app: &ApplicationInfo, prior: &Value) -> Value {
    let elements = get_block_list(prior, "storage")
        .into_iter()
        .filter_map(|declared| {
            let label = get_string_attr(&declared, "label");
            let actual = app.storage.iter().find(|s| s.label == label)?;
            let keep = |key: &str, actual: Value| match declared.get(key) {
                Some(v) if !v.is_null() && !v.is_unknown() => v.clone(),
                _ => actual,
            };
            Some(make_state(vec![
                ("label", string_value(&label)),
                ("size", keep("size", string_value(&actual.size))),
                ("pool", keep("pool", string_value(&actual.pool))),
                ("count", keep("count", int_value(actual.count))),
            ]))
        })
        .collect();
    Value::List(elements)
}

pub fn application_to_state(app: &ApplicationInfo, prior: &Value) -> Value {
    let prior_expose = get_block_list(prior, "expose").into_iter().next().unwrap_or_default();
    let expose = match &app.expose {
        Some(spec) => Value::List(vec![make_state(vec![
            ("endpoints", comma_delimited_state(prior_expose.get("endpoints").unwrap_or(&Value::Null), &spec.endpoints)),
            ("spaces", comma_delimited_state(prior_expose.get("spaces").unwrap_or(&Value::Null), &spec.spaces)),
            ("cidrs", comma_delimited_state(prior_expose.get("cidrs").unwrap_or(&Value::Null), &spec.cidrs)),
        ])]),
        None => Value::List(Vec::new()),
    };

    let charm = make_state(vec![
        ("name", string_value(&app.charm.name)),
        ("channel", app.charm.channel.as_deref().map(string_value).unwrap_or_default()),
        ("revision", app.charm.revision.map(int_value).unwrap_or_default()),
        ("base", app.charm.base.as_deref().map(string_value).unwrap_or_default()),
    ]);

    make_state(vec![
        ("id", string_value(id::encode(&[&app.model_uuid, &app.name]))),
        ("model_uuid", string_value(&app.model_uuid)),
        ("name", string_value(&app.name)),
        ("charm", Value::List(vec![charm])),
        ("units", int_value(i64::from(app.units))),
        ("machines", string_set_value(app.machines.iter().cloned())),
        (
            "constraints",
            constraints_state(prior.get("constraints").unwrap_or(&Value::Null), &app.constraints),
        ),
        ("config", tracked_map(prior.get("config").unwrap_or(&Value::Null), &app.config)),
        ("trust", bool_value(app.trust)),
        ("expose", expose),
        (
            "storage_directives",
            tracked_map(prior.get("storage_directives").unwrap_or(&Value::Null), &app.storage_directives),
        ),
        ("storage", storage_state(app, prior)),
    ])
}

#[async_trait]
impl Resource for ApplicationResource {
    fn type_name(&self) -> &'static str {
        "juju_application"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .description("A resource that represents a single Juju application deployment from a charm.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(
                    Attribute::string("name")
                        .optional()
                        .computed()
                        .description("A custom name for the application deployment. If empty, uses the charm's name.")
                        .validator(validators::application_name())
                        .plan_modifier(UseStateForUnknown)
                        .plan_modifier(RequiresReplace),
                )
                .attribute(
                    Attribute::number("units")
                        .optional()
                        .computed()
                        .description("The number of application units to deploy for the charm.")
                        .validator(validators::AtLeast(0))
                        .plan_modifier(UnitCount),
                )
                .attribute(
                    Attribute::set("machines", AttrType::String)
                        .optional()
                        .computed()
                        .description("Specify the target machines for the application's units."),
                )
                .attribute(
                    Attribute::string("constraints")
                        .optional()
                        .computed()
                        .custom_type(ConstraintsType)
                        .description("Constraints imposed on this application.")
                        .plan_modifier(UseStateForUnknown),
                )
                .attribute(
                    Attribute::map("config", AttrType::String)
                        .optional()
                        .description("Application specific configuration."),
                )
                .attribute(
                    Attribute::bool("trust")
                        .optional()
                        .computed()
                        .description("Set the trust for the application.")
                        .plan_modifier(StaticDefault(bool_value(false))),
                )
                .attribute(
                    Attribute::map("storage_directives", AttrType::String)
                        .optional()
                        .description("Storage directives (constraints) for the juju application, keyed by storage label.")
                        .plan_modifier(RequiresReplace),
                )
                .block(charm_block())
                .block(expose_block())
                .block(storage_block()),
        )
    }

    fn configure(&mut self, data: &ProviderData) {
        self.common.configure(data);
    }

    fn subsystem(&self) -> &Span {
        self.common.span()
    }

    fn validate_config(&self, config: &Value, diags: &mut Diagnostics) {
        let (Some(units), Some(Value::List(machines))) = (config.get("units").and_then(Value::as_i64), config.get("machines")) else {
            return;
        };
        if machines.iter().all(|m| !m.is_unknown()) && units != machines.len() as i64 {
            diags.attribute_error(
                &AttributePath::root("units"),
                "Invalid Attribute Combination",
                format!(
                    "units ({units}) must equal the number of machines ({}) when machines are specified.",
                    machines.len()
                ),
            );
        }
    }

    async fn create(&self, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let charm = charm_spec(plan);
        let name = get_optional_string_attr(plan, "name").unwrap_or_else(|| charm.name.clone());
        let Some(units) = unit_count(get_optional_int_attr(plan, "units").unwrap_or(1), diags) else {
            return None;
        };

        let input = CreateApplicationInput {
            model_uuid: get_string_attr(plan, "model_uuid"),
            name,
            charm,
            units,
            machines: get_string_set_attr(plan, "machines"),
            constraints: get_optional_string_attr(plan, "constraints"),
            config: get_string_map_attr(plan, "config"),
            trust: get_bool_attr(plan, "trust", false),
            expose: expose_spec(plan),
            storage_directives: storage_directives(plan),
        };

        let app = match client.create_application(input).await {
            Ok(app) => app,
            Err(e) => {
                client_error(diags, "create", "application", &e);
                return None;
            }
        };
        info!(application = %app.name, units = app.units, "deployed application");
        Some(fill_unknowns(plan, &application_to_state(&app, plan)))
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [model_uuid, name] = match id::decode::<2>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };

        match client.read_application(&model_uuid, &name).await {
            Ok(app) => Some(application_to_state(&app, state)),
            Err(e) if e.is_not_found() => {
                debug!(application = %name, "application not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "application", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let model_uuid = get_string_attr(prior, "model_uuid");
        let name = get_string_attr(prior, "name");

        let planned_labels = get_block_list(plan, "storage").iter().map(|s| get_string_attr(s, "label")).collect::<Vec<_>>();
        let prior_labels = get_block_list(prior, "storage").iter().map(|s| get_string_attr(s, "label")).collect::<Vec<_>>();
        if planned_labels.iter().any(|l| !prior_labels.contains(l)) {
            diags.attribute_error(
                &AttributePath::root("storage"),
                "Unsupported Storage Change",
                "Storage cannot be added to a deployed application. Recreate the application to change its storage.",
            );
            return None;
        }

        let planned_charm = charm_spec(plan);
        let prior_charm = charm_spec(prior);
        let mut input = UpdateApplicationInput {
            model_uuid: model_uuid.clone(),
            name: name.clone(),
            ..Default::default()
        };
        if planned_charm.channel.is_some() && planned_charm.channel != prior_charm.channel {
            input.channel = planned_charm.channel.clone();
        }
        if planned_charm.revision.is_some() && planned_charm.revision != prior_charm.revision {
            input.revision = planned_charm.revision;
        }
        if planned_charm.base.is_some() && planned_charm.base != prior_charm.base {
            input.base = planned_charm.base.clone();
        }

        let machines = plan.get("machines").unwrap_or(&Value::Null);
        if machines.as_list().is_some() && machines != prior.get("machines").unwrap_or(&Value::Null) {
            input.machines = Some(get_string_set_attr(plan, "machines"));
        } else if let Some(units) = get_optional_int_attr(plan, "units") {
            if Some(units) != get_optional_int_attr(prior, "units") {
                input.units = Some(unit_count(units, diags)?);
            }
        }

        if let Some(constraints) = plan.get("constraints").and_then(Value::as_str) {
            if prior.get("constraints").and_then(Value::as_str) != Some(constraints) {
                input.constraints = Some(constraints.to_string());
            }
        }

        let planned_config = get_string_map_attr(plan, "config");
        let prior_config = get_string_map_attr(prior, "config");
        input.config = planned_config
            .iter()
            .filter(|(k, v)| prior_config.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        input.unset_config = prior_config
            .keys()
            .filter(|k| !planned_config.contains_key(*k))
            .cloned()
            .collect();

        let trust = get_bool_attr(plan, "trust", false);
        if trust != get_bool_attr(prior, "trust", false) {
            input.trust = Some(trust);
        }

        match (expose_spec(plan), expose_spec(prior)) {
            (None, Some(_)) => input.unexpose = true,
            (Some(planned), previous) if Some(&planned) != previous.as_ref() => input.expose = Some(planned),
            _ => {}
        }

        debug!(application = %name, ?input, "updating application");
        if let Err(e) = client.update_application(input).await {
            client_error(diags, "update", "application", &e);
            return None;
        }
        match client.read_application(&model_uuid, &name).await {
            Ok(app) => Some(fill_unknowns(plan, &application_to_state(&app, plan))),
            Err(e) => {
                client_error(diags, "read", "application", &e);
                None
            }
        }
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        let name = get_string_attr(state, "name");
        if let Err(e) = client.destroy_application(&model_uuid, &name).await {
            client_error(diags, "delete", "application", &e);
        }
    }

    fn list_schema(&self) -> Option<Schema> {
        Some(Schema::new(
            Block::new()
                .description("Lists the applications deployed in a model.")
                .attribute(model_uuid_attribute()),
        ))
    }

    async fn list(&self, config: &Value, diags: &mut Diagnostics) -> Vec<ListedResource> {
        let Some(client) = self.common.client(diags) else {
            return Vec::new();
        };
        let model_uuid = get_string_attr(config, "model_uuid");
        match client.list_applications(&model_uuid).await {
            Ok(apps) => apps
                .iter()
                .map(|app| ListedResource {
                    id: id::encode(&[&app.model_uuid, &app.name]),
                    display_name: app.name.clone(),
                    state: application_to_state(app, &Value::Null),
                })
                .collect(),
            Err(e) => {
                client_error(diags, "list", "applications", &e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juju_common::StorageSpec;

    fn app() -> ApplicationInfo {
        ApplicationInfo {
            model_uuid: "uuid".to_string(),
            name: "pg".to_string(),
            charm: CharmSpec {
                name: "postgresql".to_string(),
                channel: Some("14/stable".to_string()),
                revision: Some(7),
                base: Some("ubuntu@22.04".to_string()),
            },
            units: 2,
            machines: vec!["0".to_string(), "1".to_string()],
            constraints: "cores=2".to_string(),
            config: BTreeMap::from([("profile".to_string(), "testing".to_string())]),
            trust: false,
            expose: Some(ExposeSpec {
                endpoints: vec![],
                spaces: vec![],
                cidrs: vec!["10.0.0.0/24".to_string(), "10.0.1.0/24".to_string()],
            }),
            storage: vec![StorageSpec {
                label: "pgdata".to_string(),
                size: "10240M".to_string(),
                pool: "rootfs".to_string(),
                count: 1,
            }],
            storage_directives: BTreeMap::from([("pgdata".to_string(), "10G".to_string())]),
        }
    }

    #[test]
    fn test_storage_directives_merge_blocks() {
        let plan = make_state(vec![
            (
                "storage_directives",
                make_state(vec![("logs", string_value("2G"))]),
            ),
            (
                "storage",
                Value::List(vec![make_state(vec![
                    ("label", string_value("pgdata")),
                    ("size", string_value("10G")),
                    ("pool", Value::Unknown),
                    ("count", int_value(2)),
                ])]),
            ),
        ]);
        let directives = storage_directives(&plan);
        assert_eq!(directives.get("logs").map(String::as_str), Some("2G"));
        assert_eq!(directives.get("pgdata").map(String::as_str), Some("2,10G"));
    }

    #[test]
    fn test_state_keeps_declared_values() {
        let prior = make_state(vec![
            ("constraints", string_value("cpu-cores=2")),
            ("expose", Value::List(vec![make_state(vec![("cidrs", string_value("10.0.1.0/24,10.0.0.0/24"))])])),
            (
                "storage",
                Value::List(vec![make_state(vec![
                    ("label", string_value("pgdata")),
                    ("size", string_value("10G")),
                    ("pool", Value::Null),
                    ("count", Value::Null),
                ])]),
            ),
        ]);
        let state = application_to_state(&app(), &prior);

        assert_eq!(state.get("id"), Some(&string_value("uuid:pg")));
        assert_eq!(state.get("constraints"), Some(&string_value("cpu-cores=2")));
        assert_eq!(state.get("config"), Some(&Value::Null));
        let expose = &get_block_list(&state, "expose")[0];
        assert_eq!(expose.get("cidrs"), Some(&string_value("10.0.1.0/24,10.0.0.0/24")));
        assert_eq!(expose.get("endpoints"), Some(&Value::Null));
        let storage = &get_block_list(&state, "storage")[0];
        assert_eq!(storage.get("size"), Some(&string_value("10G")));
        assert_eq!(storage.get("pool"), Some(&string_value("rootfs")));
        assert_eq!(storage.get("count"), Some(&int_value(1)));
    }

    #[test]
    fn test_unit_and_machine_count_mismatch() {
        let config = make_state(vec![
            ("units", int_value(3)),
            ("machines", string_set_value(["0", "1"])),
        ]);
        let mut diags = Diagnostics::new();
        ApplicationResource::new().validate_config(&config, &mut diags);
        assert!(diags.has_error());

        let config = make_state(vec![("units", int_value(2)), ("machines", string_set_value(["0", "1"]))]);
        let mut diags = Diagnostics::new();
        ApplicationResource::new().validate_config(&config, &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_negative_units_rejected() {
        let config = make_state(vec![
            ("model_uuid", string_value("3f6a1c52-8d0e-4b6a-a1f4-9a3c2b1d0e5f")),
            ("units", int_value(-1)),
            ("charm", Value::List(vec![make_state(vec![("name", string_value("postgresql"))])])),
        ]);
        let diags = crate::validate::validate_config(&ApplicationResource::new().schema(), &config);
        assert!(diags.has_error());
        assert!(diags.iter().any(|d| d.attribute == Some(AttributePath::root("units"))));

        let mut diags = Diagnostics::new();
        assert_eq!(unit_count(-1, &mut diags), None);
        assert!(diags.has_error());
        assert_eq!(unit_count(4, &mut Diagnostics::new()), Some(4));
    }
}
