//! String attribute types with semantic equality
//!
//! A custom type wraps a plain string attribute. During planning, when both
//! the prior and proposed values are known, the proposed value is asked
//! whether it is semantically equal to the prior one; if so the prior value
//! is kept and no change is planned.

pub mod comma_delimited;
pub mod constraints;

use std::any::Any;
use std::fmt;

use crate::diag::{AttributePath, Diagnostic, Diagnostics};

pub use comma_delimited::{CommaDelimitedType, CommaDelimitedValue};
pub use constraints::{ConstraintsType, ConstraintsValue};

/// A string attribute type
pub trait StringType: Send + Sync {
    fn name(&self) -> &'static str;

    fn value_from_string(&self, s: &str) -> Box<dyn StringValuable>;

    /// Check a configured value. Null and unknown values are never passed in.
    fn validate(&self, _path: &AttributePath, _value: &str, _diags: &mut Diagnostics) {}
}

impl fmt::Debug for dyn StringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value of some string attribute type
pub trait StringValuable: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;

    fn string_value(&self) -> &str;

    /// Whether `self` (the proposed value) means the same as `prior`.
    ///
    /// Plain strings compare byte for byte.
    fn string_semantic_equals(&self, prior: &dyn StringValuable) -> Result<bool, Diagnostics> {
        Ok(self.string_value() == prior.string_value())
    }
}

/// A plain string value, with no custom type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainString(pub String);

impl StringValuable for PlainString {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        "PlainString"
    }

    fn string_value(&self) -> &str {
        &self.0
    }
}

/// Error for a semantic equality check handed a value of another type
pub(crate) fn unexpected_type(expected: &str, got: &dyn StringValuable) -> Diagnostics {
    Diagnostic::error(
        "Semantic Equality Check Error",
        format!(
            "An unexpected value type was received while performing semantic equality checks. \
             Please report this to the provider developers.\n\n\
             Expected Value Type: {expected}\nGot Value Type: {}",
            got.type_name()
        ),
    )
    .into()
}

/// Error for a side of the comparison that does not parse
pub(crate) fn unparsable(side: &str, value: &str, err: impl fmt::Display) -> Diagnostics {
    Diagnostic::error(
        "Semantic Equality Check Error",
        format!("Failed to parse the {side} value {value:?}: {err}"),
    )
    .into()
}
