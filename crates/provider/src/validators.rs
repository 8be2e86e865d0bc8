//! Attribute validators
//!
//! Null and unknown values always pass; they are checked again once known.

use std::fmt;
use std::sync::Arc;

use juju_common::names::{self, Channel, OfferUrl};

use crate::diag::{AttributePath, Diagnostics};
use crate::state::Value;

pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, path: &AttributePath, value: &Value, diags: &mut Diagnostics);
}

impl fmt::Debug for dyn Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// A string check returning the reason a value is rejected
struct StringCheck {
    description: &'static str,
    summary: &'static str,
    check: fn(&str) -> Result<(), String>,
}

impl Validator for StringCheck {
    fn description(&self) -> String {
        self.description.to_string()
    }

    fn validate(&self, path: &AttributePath, value: &Value, diags: &mut Diagnostics) {
        let Some(s) = value.as_str() else {
            return;
        };
        if let Err(reason) = (self.check)(s) {
            diags.attribute_error(path, self.summary, reason);
        }
    }
}

pub fn user_name() -> impl Validator {
    StringCheck {
        description: "value must be a valid Juju user name",
        summary: "Invalid User Name",
        check: |s| {
            if names::is_valid_user_name(s) {
                Ok(())
            } else {
                Err(format!("{s:?} is not a valid user name"))
            }
        },
    }
}

pub fn model_name() -> impl Validator {
    StringCheck {
        description: "value must be a valid model name",
        summary: "Invalid Model Name",
        check: |s| {
            if names::is_valid_model_name(s) {
                Ok(())
            } else {
                Err(format!(
                    "{s:?} is not a valid model name: use lowercase letters, digits and hyphens, \
                     starting with a letter or digit"
                ))
            }
        },
    }
}

pub fn application_name() -> impl Validator {
    StringCheck {
        description: "value must be a valid application name",
        summary: "Invalid Application Name",
        check: |s| {
            if names::is_valid_application_name(s) {
                Ok(())
            } else {
                Err(format!("{s:?} is not a valid application name"))
            }
        },
    }
}

pub fn model_uuid() -> impl Validator {
    StringCheck {
        description: "value must be a model UUID",
        summary: "Invalid Model UUID",
        check: |s| {
            if names::is_valid_model_uuid(s) {
                Ok(())
            } else {
                Err(format!("{s:?} is not a valid model UUID"))
            }
        },
    }
}

pub fn offer_url() -> impl Validator {
    StringCheck {
        description: "value must be an offer URL of the form [user/]model.application[:endpoint]",
        summary: "Invalid Offer URL",
        check: |s| OfferUrl::parse(s).map(|_| ()),
    }
}

pub fn channel() -> impl Validator {
    StringCheck {
        description: "value must be a channel of the form track/risk[/branch]",
        summary: "Invalid Channel",
        check: |s| Channel::parse(s).map(|_| ()),
    }
}

pub fn group_name() -> impl Validator {
    StringCheck {
        description: "value must be a valid group name",
        summary: "Invalid Group Name",
        check: |s| {
            if names::is_valid_group_name(s) {
                Ok(())
            } else {
                Err(format!(
                    "{s:?} is not a valid group name: use 5 to 64 letters, digits, '.', '_' or '-', \
                     starting and ending with a letter or digit"
                ))
            }
        },
    }
}

pub fn role_name() -> impl Validator {
    StringCheck {
        description: "value must be a valid role name",
        summary: "Invalid Role Name",
        check: |s| {
            if names::is_valid_role_name(s) {
                Ok(())
            } else {
                Err(format!(
                    "{s:?} is not a valid role name: use 5 to 64 letters, digits, '.', '_' or '-', \
                     starting and ending with a letter or digit"
                ))
            }
        },
    }
}

/// The value must be one of a fixed set of strings
pub struct OneOf(pub &'static [&'static str]);

impl Validator for OneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.0.join(", "))
    }

    fn validate(&self, path: &AttributePath, value: &Value, diags: &mut Diagnostics) {
        let Some(s) = value.as_str() else {
            return;
        };
        if !self.0.contains(&s) {
            diags.attribute_error(
                path,
                "Invalid Attribute Value Match",
                format!("Attribute {path} value must be one of: {:?}, got: {s:?}", self.0),
            );
        }
    }
}

/// Lower bound for whole-number attributes
pub struct AtLeast(pub i64);

impl Validator for AtLeast {
    fn description(&self) -> String {
        format!("value must be at least {}", self.0)
    }

    fn validate(&self, path: &AttributePath, value: &Value, diags: &mut Diagnostics) {
        let Some(n) = value.as_i64() else {
            return;
        };
        if n < self.0 {
            diags.attribute_error(
                path,
                "Invalid Attribute Value",
                format!("Attribute {path} value must be at least {}, got: {n}", self.0),
            );
        }
    }
}

/// Applies a validator to every element of a list or set
pub struct Each(Arc<dyn Validator>);

impl Each {
    pub fn new(inner: impl Validator + 'static) -> Self {
        Self(Arc::new(inner))
    }
}

impl Validator for Each {
    fn description(&self) -> String {
        format!("each element: {}", self.0.description())
    }

    fn validate(&self, path: &AttributePath, value: &Value, diags: &mut Diagnostics) {
        let Some(items) = value.as_list() else {
            return;
        };
        for item in items {
            if item.is_null() || item.is_unknown() {
                continue;
            }
            self.0.validate(&path.element(item.clone()), item, diags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{int_value, string_set_value, string_value};

    fn check(v: &dyn Validator, value: Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        v.validate(&AttributePath::root("attr"), &value, &mut diags);
        diags
    }

    #[test]
    fn test_null_and_unknown_pass() {
        let validators: Vec<Box<dyn Validator>> = vec![
            Box::new(user_name()),
            Box::new(channel()),
            Box::new(offer_url()),
            Box::new(model_uuid()),
        ];
        for v in &validators {
            assert!(check(v.as_ref(), Value::Null).is_empty());
            assert!(check(v.as_ref(), Value::Unknown).is_empty());
        }
    }

    #[test]
    fn test_offer_url_rejects_controller_prefix() {
        assert!(check(&offer_url(), string_value("admin/db.postgresql")).is_empty());
        let diags = check(&offer_url(), string_value("ctrl:admin/db.postgresql"));
        assert!(diags.has_error());
        assert!(diags.to_string().contains("controller prefix"));
    }

    #[test]
    fn test_channel() {
        assert!(check(&channel(), string_value("14/stable")).is_empty());
        assert!(check(&channel(), string_value("stable")).has_error());
    }

    #[test]
    fn test_one_of() {
        let v = OneOf(&["read", "write", "admin"]);
        assert!(check(&v, string_value("write")).is_empty());
        assert!(check(&v, string_value("superuser")).has_error());
    }

    #[test]
    fn test_at_least() {
        let v = AtLeast(0);
        assert!(check(&v, int_value(0)).is_empty());
        assert!(check(&v, int_value(3)).is_empty());
        let diags = check(&v, int_value(-1));
        assert!(diags.has_error());
        assert_eq!(diags.iter().next().unwrap().attribute, Some(AttributePath::root("attr")));
    }

    #[test]
    fn test_each_attributes_errors_to_elements() {
        let v = Each::new(user_name());
        let diags = check(&v, string_set_value(["alice", "-bad", "bob"]));
        assert_eq!(diags.len(), 1);
        let diag = diags.iter().next().unwrap();
        assert_eq!(
            diag.attribute,
            Some(AttributePath::root("attr").element(string_value("-bad")))
        );
    }

    #[test]
    fn test_group_and_role_names() {
        assert!(check(&group_name(), string_value("devops")).is_empty());
        assert!(check(&role_name(), string_value("ops")).has_error());
    }
}
