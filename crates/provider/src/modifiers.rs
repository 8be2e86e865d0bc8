//! Plan modifiers
//!
//! A modifier sees one attribute (or nested block) in the config, the prior
//! state and the plan built so far, and may replace its planned value or
//! mark the resource for replacement.

use std::fmt;

use juju_common::constraints::Constraints;

use crate::diag::{AttributePath, Diagnostics};
use crate::state::{int_value, Value};

pub struct PlanModifierRequest<'a> {
    pub path: &'a AttributePath,
    pub config_value: &'a Value,
    pub state_value: &'a Value,
    pub plan_value: &'a Value,
    /// Whole resource config
    pub config: &'a Value,
    /// Whole prior state; null on create
    pub state: &'a Value,
    /// Whole plan as built so far; null on destroy
    pub plan: &'a Value,
}

#[derive(Debug)]
pub struct PlanModifierResponse {
    pub plan_value: Value,
    pub requires_replace: bool,
    pub diagnostics: Diagnostics,
}

pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse);
}

impl fmt::Debug for dyn PlanModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Any change to the value destroys and recreates the resource.
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "If the value of this attribute changes, Terraform will destroy and recreate the resource.".to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.state.is_null() || req.plan.is_null() {
            return;
        }
        if req.plan_value == req.state_value {
            return;
        }
        resp.requires_replace = true;
    }
}

/// Replace when the value changes and `check` says the change needs it.
pub struct RequiresReplaceIf {
    pub description: &'static str,
    pub check: fn(&PlanModifierRequest<'_>) -> bool,
}

impl PlanModifier for RequiresReplaceIf {
    fn description(&self) -> String {
        self.description.to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.state.is_null() || req.plan.is_null() {
            return;
        }
        if req.plan_value == req.state_value {
            return;
        }
        if (self.check)(req) {
            resp.requires_replace = true;
        }
    }
}

/// Constraints have no update API: replace when their canonical forms differ.
pub fn constraints_requires_replace() -> RequiresReplaceIf {
    RequiresReplaceIf {
        description: "If the normalized constraints change, Terraform will destroy and recreate the resource.",
        check: |req| {
            let (Some(prior), Some(planned)) = (req.state_value.as_str(), req.plan_value.as_str()) else {
                return false;
            };
            match (Constraints::parse(prior), Constraints::parse(planned)) {
                (Ok(prior), Ok(planned)) => prior.to_string() != planned.to_string(),
                // Invalid constraints are reported by validation
                _ => false,
            }
        },
    }
}

/// Keep the prior state value instead of showing a computed value as
/// "known after apply".
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "Once set, the value of this attribute in state will not change.".to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.state_value.is_null() {
            return;
        }
        if !resp.plan_value.is_unknown() {
            return;
        }
        if req.config_value.is_unknown() {
            return;
        }
        resp.plan_value = req.state_value.clone();
    }
}

/// Static default for an optional computed attribute left unset.
pub struct StaticDefault(pub Value);

impl PlanModifier for StaticDefault {
    fn description(&self) -> String {
        format!("Defaults to {:?}.", self.0)
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.config_value.is_null() && !req.plan.is_null() {
            resp.plan_value = self.0.clone();
        }
    }
}

/// Derives the application unit count from the `machines` set when
/// `units` is not configured: one unit per machine, or 1 without machines.
pub struct UnitCount;

impl PlanModifier for UnitCount {
    fn description(&self) -> String {
        "Defaults to the number of machines, or 1 when no machines are given.".to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.plan.is_null() {
            return;
        }
        if !req.config_value.is_null() && !req.config_value.is_unknown() {
            return;
        }
        resp.plan_value = match req.config.get("machines") {
            Some(Value::Unknown) => Value::Unknown,
            Some(Value::List(machines)) if !machines.is_empty() => int_value(machines.len() as i64),
            _ => int_value(1),
        };
    }
}

/// Removing an optional block present in state forces replacement, with a
/// warning naming the block.
pub struct RequiresReplaceIfRemoved;

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::List(items) => !items.is_empty(),
        _ => true,
    }
}

impl PlanModifier for RequiresReplaceIfRemoved {
    fn description(&self) -> String {
        "Removing this block after it was set will destroy and recreate the resource.".to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.state.is_null() || req.plan.is_null() {
            return;
        }
        if is_present(req.state_value) && !is_present(req.config_value) {
            resp.requires_replace = true;
            resp.diagnostics.attribute_warning(
                req.path,
                "Resource Replacement Required",
                format!(
                    "The {} block was removed from the configuration. It cannot be removed in place, \
                     so the resource will be destroyed and recreated.",
                    req.path
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{make_state, string_set_value, string_value};

    struct Fixture {
        path: AttributePath,
        config: Value,
        state: Value,
        plan: Value,
    }

    impl Fixture {
        fn new(attr: &str, config: Value, state: Value, plan: Value) -> Self {
            Self {
                path: AttributePath::root(attr),
                config,
                state,
                plan,
            }
        }

        fn run(&self, modifier: &dyn PlanModifier) -> PlanModifierResponse {
            let attr = match self.path.steps().first() {
                Some(crate::diag::PathStep::Attribute(name)) => name.clone(),
                _ => unreachable!(),
            };
            let config_value = self.config.get(&attr).cloned().unwrap_or_default();
            let state_value = self.state.get(&attr).cloned().unwrap_or_default();
            let plan_value = self.plan.get(&attr).cloned().unwrap_or_default();
            let req = PlanModifierRequest {
                path: &self.path,
                config_value: &config_value,
                state_value: &state_value,
                plan_value: &plan_value,
                config: &self.config,
                state: &self.state,
                plan: &self.plan,
            };
            let mut resp = PlanModifierResponse {
                plan_value: plan_value.clone(),
                requires_replace: false,
                diagnostics: Diagnostics::new(),
            };
            modifier.modify(&req, &mut resp);
            resp
        }
    }

    #[test]
    fn test_unit_count_passes_configured_value_through() {
        let config = make_state(vec![("units", int_value(3)), ("machines", Value::Null)]);
        let resp = Fixture::new("units", config.clone(), Value::Null, config).run(&UnitCount);
        assert_eq!(resp.plan_value, int_value(3));
    }

    #[test]
    fn test_unit_count_follows_machines() {
        let config = make_state(vec![("units", Value::Null), ("machines", string_set_value(["0", "1"]))]);
        let plan = make_state(vec![("units", Value::Unknown), ("machines", string_set_value(["0", "1"]))]);
        let resp = Fixture::new("units", config, Value::Null, plan).run(&UnitCount);
        assert_eq!(resp.plan_value, int_value(2));
    }

    #[test]
    fn test_unit_count_defaults_to_one() {
        for machines in [Value::Null, Value::List(vec![])] {
            let config = make_state(vec![("units", Value::Null), ("machines", machines)]);
            let plan = make_state(vec![("units", Value::Unknown)]);
            let resp = Fixture::new("units", config, Value::Null, plan).run(&UnitCount);
            assert_eq!(resp.plan_value, int_value(1));
        }
    }

    #[test]
    fn test_unit_count_unknown_machines() {
        let config = make_state(vec![("units", Value::Null), ("machines", Value::Unknown)]);
        let plan = make_state(vec![("units", Value::Unknown)]);
        let resp = Fixture::new("units", config, Value::Null, plan).run(&UnitCount);
        assert_eq!(resp.plan_value, Value::Unknown);
    }

    #[test]
    fn test_requires_replace_state_machine() {
        let state = make_state(vec![("name", string_value("a"))]);
        let same = Fixture::new("name", state.clone(), state.clone(), state.clone()).run(&RequiresReplace);
        assert!(!same.requires_replace);

        let changed = make_state(vec![("name", string_value("b"))]);
        let resp = Fixture::new("name", changed.clone(), state.clone(), changed.clone()).run(&RequiresReplace);
        assert!(resp.requires_replace);

        let create = Fixture::new("name", changed.clone(), Value::Null, changed).run(&RequiresReplace);
        assert!(!create.requires_replace);
    }

    #[test]
    fn test_constraints_replace_only_on_normalized_change() {
        let state = make_state(vec![("constraints", string_value("cores=2 mem=4G"))]);
        let reordered = make_state(vec![("constraints", string_value("mem=4096M cpu-cores=2"))]);
        let resp = Fixture::new("constraints", reordered.clone(), state.clone(), reordered)
            .run(&constraints_requires_replace());
        assert!(!resp.requires_replace);

        let bigger = make_state(vec![("constraints", string_value("cores=4 mem=4G"))]);
        let resp = Fixture::new("constraints", bigger.clone(), state, bigger).run(&constraints_requires_replace());
        assert!(resp.requires_replace);
    }

    #[test]
    fn test_use_state_for_unknown() {
        let state = make_state(vec![("uuid", string_value("abc"))]);
        let plan = make_state(vec![("uuid", Value::Unknown)]);
        let resp = Fixture::new("uuid", Value::Null, state, plan.clone()).run(&UseStateForUnknown);
        assert_eq!(resp.plan_value, string_value("abc"));

        let resp = Fixture::new("uuid", Value::Null, Value::Null, plan).run(&UseStateForUnknown);
        assert_eq!(resp.plan_value, Value::Unknown);
    }

    #[test]
    fn test_block_removal_forces_replace_with_warning() {
        let block = Value::List(vec![make_state(vec![("label", string_value("data"))])]);
        let state = make_state(vec![("storage", block)]);
        let config = make_state(vec![("storage", Value::List(vec![]))]);
        let resp = Fixture::new("storage", config.clone(), state.clone(), config).run(&RequiresReplaceIfRemoved);
        assert!(resp.requires_replace);
        assert_eq!(resp.diagnostics.len(), 1);
        assert!(!resp.diagnostics.has_error());

        let kept = Fixture::new("storage", state.clone(), state.clone(), state).run(&RequiresReplaceIfRemoved);
        assert!(!kept.requires_replace);
        assert!(kept.diagnostics.is_empty());
    }

    #[test]
    fn test_default_applies_when_unset() {
        let plan = make_state(vec![("controller_credential", Value::Unknown)]);
        let resp = Fixture::new("controller_credential", Value::Null, Value::Null, plan)
            .run(&StaticDefault(Value::Bool(true)));
        assert_eq!(resp.plan_value, Value::Bool(true));
    }
}
