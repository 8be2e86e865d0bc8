//! Schema-driven config validation
//!
//! Runs before any resource hook: required attributes, read-only
//! attributes set in config, custom string types, attribute validators
//! and nested block counts.

use crate::diag::{AttributePath, Diagnostics};
use crate::schema::{Block, Nesting, Schema};
use crate::state::Value;

pub fn validate_config(schema: &Schema, config: &Value) -> Diagnostics {
    let mut diags = Diagnostics::new();
    validate_block(&schema.block, config, &AttributePath::default(), &mut diags);
    diags
}

fn validate_block(block: &Block, config: &Value, path: &AttributePath, diags: &mut Diagnostics) {
    for attr in &block.attributes {
        let value = config.get(&attr.name).unwrap_or(&Value::Null);
        let attr_path = path.attr(&attr.name);

        if attr.required && value.is_null() {
            diags.attribute_error(
                &attr_path,
                "Missing required argument",
                format!("The argument \"{attr_path}\" is required, but no definition was found."),
            );
            continue;
        }
        if attr.computed && !attr.optional && !attr.required && !value.is_null() {
            diags.attribute_error(
                &attr_path,
                "Invalid Configuration for Read-Only Attribute",
                format!("Cannot set value for this attribute as the provider has marked it as read-only. Remove the configuration line setting the value.\n\nRefer to the provider documentation or contact the provider developers for additional information about configurable and read-only attributes that are supported.\n\nAttribute: {attr_path}"),
            );
            continue;
        }
        if value.is_null() || value.is_unknown() {
            continue;
        }

        if let (Some(ty), Some(s)) = (&attr.custom_type, value.as_str()) {
            ty.validate(&attr_path, s, diags);
        }
        for validator in &attr.validators {
            validator.validate(&attr_path, value, diags);
        }
    }

    for nested in &block.blocks {
        let value = config.get(&nested.name).unwrap_or(&Value::Null);
        if value.is_unknown() {
            continue;
        }
        let nested_path = path.attr(&nested.name);

        let elements: Vec<(AttributePath, &Value)> = match (nested.nesting, value) {
            (_, Value::Null) => Vec::new(),
            (Nesting::Single, v) => vec![(nested_path.clone(), v)],
            (Nesting::List, Value::List(items)) => {
                items.iter().enumerate().map(|(i, v)| (nested_path.index(i), v)).collect()
            }
            (Nesting::Set, Value::List(items)) => items.iter().map(|v| (nested_path.element(v.clone()), v)).collect(),
            _ => Vec::new(),
        };

        let count = elements.len() as i64;
        if nested.min_items > 0 && count < nested.min_items {
            diags.attribute_error(
                &nested_path,
                format!("Insufficient {} blocks", nested.name),
                format!("At least {} \"{}\" blocks are required.", nested.min_items, nested.name),
            );
        }
        if nested.max_items > 0 && count > nested.max_items {
            diags.attribute_error(
                &nested_path,
                format!("Too many {} blocks", nested.name),
                format!("No more than {} \"{}\" blocks are allowed.", nested.max_items, nested.name),
            );
        }

        for (element_path, element) in elements {
            validate_block(&nested.block, element, &element_path, diags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};
    use crate::state::{make_state, string_value};
    use crate::types::ConstraintsType;
    use crate::validators;

    fn schema() -> Schema {
        Schema::new(
            Block::new()
                .attribute(Attribute::string("name").required())
                .attribute(Attribute::string("uuid").computed())
                .attribute(Attribute::string("constraints").optional().custom_type(ConstraintsType))
                .block(
                    NestedBlock::list(
                        "application",
                        Block::new().attribute(Attribute::string("offer_url").optional().validator(validators::offer_url())),
                    )
                    .min_items(2)
                    .max_items(2),
                ),
        )
    }

    fn app(offer_url: Value) -> Value {
        make_state(vec![("offer_url", offer_url)])
    }

    #[test]
    fn test_valid_config() {
        let config = make_state(vec![
            ("name", string_value("db")),
            ("constraints", string_value("cores=2")),
            ("application", Value::List(vec![app(Value::Null), app(string_value("admin/m.db"))])),
        ]);
        assert!(validate_config(&schema(), &config).is_empty());
    }

    #[test]
    fn test_missing_required_and_read_only() {
        let config = make_state(vec![
            ("uuid", string_value("set-by-user")),
            ("application", Value::List(vec![app(Value::Null), app(Value::Null)])),
        ]);
        let diags = validate_config(&schema(), &config);
        assert_eq!(diags.len(), 2);
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"Missing required argument"));
        assert!(summaries.contains(&"Invalid Configuration for Read-Only Attribute"));
    }

    #[test]
    fn test_unknown_values_skip_checks() {
        let config = make_state(vec![
            ("name", Value::Unknown),
            ("constraints", Value::Unknown),
            ("application", Value::Unknown),
        ]);
        assert!(validate_config(&schema(), &config).is_empty());
    }

    #[test]
    fn test_nested_errors_and_block_counts() {
        let config = make_state(vec![
            ("name", string_value("db")),
            ("constraints", string_value("mem")),
            ("application", Value::List(vec![app(string_value("ctrl:admin/m.db"))])),
        ]);
        let diags = validate_config(&schema(), &config);
        assert_eq!(diags.len(), 3);
        assert!(diags
            .iter()
            .any(|d| d.attribute == Some(AttributePath::root("application").index(0).attr("offer_url"))));
        assert!(diags.iter().any(|d| d.summary == "Insufficient application blocks"));
        assert!(diags.iter().any(|d| d.summary == "Invalid Constraints"));
    }
}
