//! Resource change planning
//!
//! Turns Terraform's proposed new state into a planned state:
//!
//! 1. destroy plans pass through untouched;
//! 2. custom string types keep the prior value when semantically equal;
//! 3. if anything still differs from the prior state, computed attributes
//!    left unset in config become unknown;
//! 4. attribute and block plan modifiers run, collecting replace paths.
//!
//! The resource's own `modify_plan` hook runs afterwards, in the provider.

use std::sync::Arc;

use crate::diag::{AttributePath, Diagnostics};
use crate::modifiers::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::schema::{Block, Nesting, Schema};
use crate::state::Value;

#[derive(Debug, Default)]
pub struct PlanResult {
    pub planned_state: Value,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Diagnostics,
}

pub fn plan_resource_change(schema: &Schema, prior: &Value, proposed: &Value, config: &Value) -> PlanResult {
    let mut result = PlanResult {
        planned_state: proposed.clone(),
        ..Default::default()
    };
    if proposed.is_null() {
        return result;
    }

    keep_semantically_equal(
        &schema.block,
        &AttributePath::default(),
        prior,
        &mut result.planned_state,
        &mut result.diagnostics,
    );

    if prior.is_null() || result.planned_state != *prior {
        mark_computed_unknown(&schema.block, config, &mut result.planned_state);
    }

    let mut targets = Vec::new();
    collect_modifier_targets(&schema.block, &AttributePath::default(), &result.planned_state, &mut targets);
    for (path, modifiers) in targets {
        run_modifiers(&path, modifiers, prior, config, &mut result);
    }

    result
}

fn keep_semantically_equal(
    block: &Block,
    path: &AttributePath,
    prior: &Value,
    planned: &mut Value,
    diags: &mut Diagnostics,
) {
    let Value::Map(entries) = planned else {
        return;
    };

    for attr in &block.attributes {
        let Some(ty) = &attr.custom_type else {
            continue;
        };
        let (Some(Value::String(proposed)), Some(Value::String(previous))) =
            (entries.get(&attr.name), prior.get(&attr.name))
        else {
            continue;
        };
        if proposed == previous {
            continue;
        }
        let proposed_value = ty.value_from_string(proposed);
        let prior_value = ty.value_from_string(previous);
        match proposed_value.string_semantic_equals(prior_value.as_ref()) {
            Ok(true) => {
                let previous = previous.clone();
                entries.insert(attr.name.clone(), Value::String(previous));
            }
            Ok(false) => {}
            Err(errors) => {
                let attr_path = path.attr(&attr.name);
                for diag in errors {
                    diags.push(match diag.attribute {
                        Some(_) => diag,
                        None => diag.with_attribute(attr_path.clone()),
                    });
                }
            }
        }
    }

    for nested in &block.blocks {
        let nested_prior = prior.get(&nested.name).unwrap_or(&Value::Null);
        let Some(nested_planned) = entries.get_mut(&nested.name) else {
            continue;
        };
        let nested_path = path.attr(&nested.name);
        match (nested.nesting, nested_planned) {
            (Nesting::Single, planned) => {
                keep_semantically_equal(&nested.block, &nested_path, nested_prior, planned, diags);
            }
            (Nesting::List, Value::List(items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let prior_item = nested_prior.as_list().and_then(|l| l.get(i)).unwrap_or(&Value::Null);
                    keep_semantically_equal(&nested.block, &nested_path.index(i), prior_item, item, diags);
                }
            }
            // Set elements have no stable identity to pair them with prior ones
            _ => {}
        }
    }
}

fn mark_computed_unknown(block: &Block, config: &Value, planned: &mut Value) {
    let Value::Map(entries) = planned else {
        return;
    };

    for attr in &block.attributes {
        if !attr.computed {
            continue;
        }
        if config.get(&attr.name).map_or(true, Value::is_null) {
            entries.insert(attr.name.clone(), Value::Unknown);
        }
    }

    for nested in &block.blocks {
        let nested_config = config.get(&nested.name).unwrap_or(&Value::Null);
        let Some(nested_planned) = entries.get_mut(&nested.name) else {
            continue;
        };
        match (nested.nesting, nested_planned) {
            (Nesting::Single, planned) => mark_computed_unknown(&nested.block, nested_config, planned),
            (Nesting::List, Value::List(items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let config_item = nested_config.as_list().and_then(|l| l.get(i)).unwrap_or(&Value::Null);
                    mark_computed_unknown(&nested.block, config_item, item);
                }
            }
            (Nesting::Set, Value::List(items)) => {
                for item in items.iter_mut() {
                    let config_item = matching_config_element(&nested.block, item, nested_config);
                    mark_computed_unknown(&nested.block, &config_item, item);
                }
            }
            _ => {}
        }
    }
}

/// The config element of a set block whose configurable-only attributes
/// match `planned`.
fn matching_config_element(block: &Block, planned: &Value, config: &Value) -> Value {
    let Some(elements) = config.as_list() else {
        return Value::Null;
    };
    elements
        .iter()
        .find(|element| {
            block
                .attributes
                .iter()
                .filter(|a| !a.computed)
                .all(|a| element.get(&a.name) == planned.get(&a.name))
        })
        .cloned()
        .unwrap_or_default()
}

fn collect_modifier_targets<'s>(
    block: &'s Block,
    path: &AttributePath,
    planned: &Value,
    out: &mut Vec<(AttributePath, &'s [Arc<dyn PlanModifier>])>,
) {
    for attr in &block.attributes {
        if !attr.plan_modifiers.is_empty() {
            out.push((path.attr(&attr.name), attr.plan_modifiers.as_slice()));
        }
    }
    for nested in &block.blocks {
        let nested_path = path.attr(&nested.name);
        if !nested.plan_modifiers.is_empty() {
            out.push((nested_path.clone(), nested.plan_modifiers.as_slice()));
        }
        let nested_planned = planned.get(&nested.name).unwrap_or(&Value::Null);
        match nested.nesting {
            Nesting::Single if matches!(nested_planned, Value::Map(_)) => {
                collect_modifier_targets(&nested.block, &nested_path, nested_planned, out);
            }
            Nesting::List => {
                for (i, item) in nested_planned.as_list().unwrap_or_default().iter().enumerate() {
                    collect_modifier_targets(&nested.block, &nested_path.index(i), item, out);
                }
            }
            _ => {}
        }
    }
}

fn run_modifiers(
    path: &AttributePath,
    modifiers: &[Arc<dyn PlanModifier>],
    prior: &Value,
    config: &Value,
    result: &mut PlanResult,
) {
    let config_value = config.at_path(path).cloned().unwrap_or_default();
    let state_value = prior.at_path(path).cloned().unwrap_or_default();
    let mut resp = PlanModifierResponse {
        plan_value: result.planned_state.at_path(path).cloned().unwrap_or_default(),
        requires_replace: false,
        diagnostics: Diagnostics::new(),
    };

    for modifier in modifiers {
        let plan = result.planned_state.clone();
        let plan_value = resp.plan_value.clone();
        let req = PlanModifierRequest {
            path,
            config_value: &config_value,
            state_value: &state_value,
            plan_value: &plan_value,
            config,
            state: prior,
            plan: &plan,
        };
        modifier.modify(&req, &mut resp);
        if let Some(slot) = result.planned_state.at_path_mut(path) {
            *slot = resp.plan_value.clone();
        }
    }

    if resp.requires_replace && !prior.is_null() {
        result.requires_replace.push(path.clone());
    }
    result.diagnostics.extend(resp.diagnostics);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{RequiresReplace, UnitCount, UseStateForUnknown};
    use crate::schema::{AttrType, Attribute};
    use crate::state::{int_value, make_state, string_set_value, string_value};
    use crate::types::ConstraintsType;

    fn schema() -> Schema {
        Schema::new(
            Block::new()
                .attribute(Attribute::string("name").required().plan_modifier(RequiresReplace))
                .attribute(Attribute::number("units").optional().computed().plan_modifier(UnitCount))
                .attribute(Attribute::set("machines", AttrType::String).optional().computed())
                .attribute(
                    Attribute::string("constraints")
                        .optional()
                        .computed()
                        .custom_type(ConstraintsType)
                        .plan_modifier(UseStateForUnknown),
                )
                .attribute(Attribute::string("uuid").computed().plan_modifier(UseStateForUnknown)),
        )
    }

    fn prior() -> Value {
        make_state(vec![
            ("name", string_value("app")),
            ("units", int_value(1)),
            ("machines", string_set_value(["0"])),
            ("constraints", string_value("cores=2 mem=4G")),
            ("uuid", string_value("u-1")),
        ])
    }

    #[test]
    fn test_create_marks_computed_unknown_and_defaults_units() {
        let config = make_state(vec![("name", string_value("app"))]);
        let result = plan_resource_change(&schema(), &Value::Null, &config, &config);

        let planned = &result.planned_state;
        assert_eq!(planned.get("units"), Some(&int_value(1)));
        assert_eq!(planned.get("machines"), Some(&Value::Unknown));
        assert_eq!(planned.get("constraints"), Some(&Value::Unknown));
        assert_eq!(planned.get("uuid"), Some(&Value::Unknown));
        assert!(result.requires_replace.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_semantically_equal_constraints_plan_no_change() {
        let config = make_state(vec![
            ("name", string_value("app")),
            ("constraints", string_value("mem=4096M cpu-cores=2")),
        ]);
        let mut proposed = prior();
        proposed.set("constraints", string_value("mem=4096M cpu-cores=2"));

        let result = plan_resource_change(&schema(), &prior(), &proposed, &config);
        assert_eq!(result.planned_state, prior());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_renaming_requires_replace_and_keeps_uuid() {
        let config = make_state(vec![("name", string_value("other"))]);
        let mut proposed = prior();
        proposed.set("name", string_value("other"));

        let result = plan_resource_change(&schema(), &prior(), &proposed, &config);
        assert_eq!(result.requires_replace, vec![AttributePath::root("name")]);
        assert_eq!(result.planned_state.get("uuid"), Some(&string_value("u-1")));
        assert_eq!(result.planned_state.get("machines"), Some(&Value::Unknown));
    }

    #[test]
    fn test_malformed_constraints_is_an_error() {
        let config = make_state(vec![("name", string_value("app")), ("constraints", string_value("mem"))]);
        let mut proposed = prior();
        proposed.set("constraints", string_value("mem"));

        let result = plan_resource_change(&schema(), &prior(), &proposed, &config);
        assert!(result.diagnostics.has_error());
        let diag = result.diagnostics.iter().next().unwrap();
        assert_eq!(diag.attribute, Some(AttributePath::root("constraints")));
    }

    #[test]
    fn test_reordered_expose_lists_keep_prior_strings() {
        use crate::resources::application::ApplicationResource;
        use crate::resources::Resource;
        use crate::state::bool_value;

        let expose = |cidrs: &str, spaces: &str| {
            Value::List(vec![make_state(vec![
                ("endpoints", Value::Null),
                ("spaces", string_value(spaces)),
                ("cidrs", string_value(cidrs)),
            ])])
        };
        let application = |expose: Value| {
            make_state(vec![
                ("id", string_value("u-1:pg")),
                ("model_uuid", string_value("u-1")),
                ("name", string_value("pg")),
                ("charm", Value::List(vec![make_state(vec![("name", string_value("postgresql"))])])),
                ("units", int_value(1)),
                ("trust", bool_value(false)),
                ("expose", expose),
            ])
        };
        let prior = application(expose("10.0.0.0/24,10.0.1.0/24", "alpha,beta"));
        let proposed = application(expose("10.0.1.0/24, 10.0.0.0/24", "beta,alpha"));

        let result = plan_resource_change(&ApplicationResource::new().schema(), &prior, &proposed, &proposed);
        assert!(result.diagnostics.is_empty(), "{}", result.diagnostics);
        assert!(result.requires_replace.is_empty());
        assert_eq!(result.planned_state, prior);
    }

    #[test]
    fn test_destroy_passes_through() {
        let result = plan_resource_change(&schema(), &prior(), &Value::Null, &Value::Null);
        assert!(result.planned_state.is_null());
        assert!(result.requires_replace.is_empty());
    }
}
