//! Constraint strings compared by their canonical form

use std::any::Any;

use juju_common::constraints::{Constraints, ConstraintsError};

use super::{unexpected_type, unparsable, StringType, StringValuable};
use crate::diag::{AttributePath, Diagnostics};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintsType;

impl StringType for ConstraintsType {
    fn name(&self) -> &'static str {
        "ConstraintsType"
    }

    fn value_from_string(&self, s: &str) -> Box<dyn StringValuable> {
        Box::new(ConstraintsValue::new(s))
    }

    fn validate(&self, path: &AttributePath, value: &str, diags: &mut Diagnostics) {
        if let Err(e) = Constraints::parse(value) {
            diags.attribute_error(
                path,
                "Invalid Constraints",
                format!("{value:?} is not a valid constraint string: {e}"),
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintsValue(String);

impl ConstraintsValue {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn normalized(&self) -> Result<String, ConstraintsError> {
        Ok(Constraints::parse(&self.0)?.to_string())
    }
}

impl StringValuable for ConstraintsValue {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        "ConstraintsValue"
    }

    fn string_value(&self) -> &str {
        &self.0
    }

    fn string_semantic_equals(&self, prior: &dyn StringValuable) -> Result<bool, Diagnostics> {
        let Some(prior) = prior.as_any().downcast_ref::<ConstraintsValue>() else {
            return Err(unexpected_type(self.type_name(), prior));
        };
        let proposed = self.normalized().map_err(|e| unparsable("proposed", &self.0, e))?;
        let previous = prior.normalized().map_err(|e| unparsable("prior", &prior.0, e))?;
        Ok(proposed == previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlainString;
    use test_case::test_case;

    fn equals(a: &str, b: &str) -> Result<bool, Diagnostics> {
        ConstraintsValue::new(a).string_semantic_equals(&ConstraintsValue::new(b))
    }

    #[test_case("cpu-cores=2 mem=4G", "mem=4G cpu-cores=2", true ; "reordered")]
    #[test_case("cpu-cores=2 mem=4096M", "cpu-cores=2 mem=4G", true ; "unit normalization")]
    #[test_case("cores=2", "cpu-cores=2", true ; "alias")]
    #[test_case("cpu-cores=2 mem=4G", "cpu-cores=4 mem=4G", false ; "different cores")]
    #[test_case("", "", true ; "both empty")]
    #[test_case("", "mem=1G", false ; "empty against set")]
    fn test_semantic_equality_is_symmetric(a: &str, b: &str, expected: bool) {
        assert_eq!(equals(a, b).unwrap(), expected);
        assert_eq!(equals(b, a).unwrap(), expected);
    }

    #[test]
    fn test_malformed_side_is_named() {
        let err = equals("mem=4G", "mem=lots").unwrap_err();
        assert!(err.has_error());
        assert!(err.to_string().contains("prior"));

        let err = equals("cores", "cores=2").unwrap_err();
        assert!(err.to_string().contains("proposed"));
    }

    #[test]
    fn test_plain_string_is_a_type_mismatch() {
        let result = ConstraintsValue::new("mem=4G").string_semantic_equals(&PlainString("mem=4G".into()));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("PlainString"));
    }

    #[test]
    fn test_validate_reports_attribute() {
        let mut diags = Diagnostics::new();
        let path = AttributePath::root("constraints");
        ConstraintsType.validate(&path, "mem=4G", &mut diags);
        assert!(diags.is_empty());
        ConstraintsType.validate(&path, "colour=blue", &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().attribute, Some(path));
    }
}
