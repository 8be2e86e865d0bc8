//! Comma separated strings compared as sets
//!
//! Tokens are trimmed, empty tokens are ignored and duplicates collapse, so
//! `a,b,c`, `c, b, a` and `a,b,,c,a` are all equal.

use std::any::Any;
use std::collections::BTreeSet;

use super::{unexpected_type, StringType, StringValuable};
use crate::diag::Diagnostics;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommaDelimitedType;

impl StringType for CommaDelimitedType {
    fn name(&self) -> &'static str {
        "CommaDelimitedType"
    }

    fn value_from_string(&self, s: &str) -> Box<dyn StringValuable> {
        Box::new(CommaDelimitedValue::new(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommaDelimitedValue(String);

impl CommaDelimitedValue {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn tokens(&self) -> BTreeSet<&str> {
        tokens(&self.0)
    }
}

/// The distinct, trimmed, non-empty tokens of a comma separated string
pub fn tokens(s: &str) -> BTreeSet<&str> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty()).collect()
}

impl StringValuable for CommaDelimitedValue {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        "CommaDelimitedValue"
    }

    fn string_value(&self) -> &str {
        &self.0
    }

    fn string_semantic_equals(&self, prior: &dyn StringValuable) -> Result<bool, Diagnostics> {
        let Some(prior) = prior.as_any().downcast_ref::<CommaDelimitedValue>() else {
            return Err(unexpected_type(self.type_name(), prior));
        };
        Ok(self.tokens() == prior.tokens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlainString;
    use test_case::test_case;

    #[test_case("a,b,c", "c,b,a", true ; "reordered")]
    #[test_case("a,b", "a,b,c", false ; "subset")]
    #[test_case("a, b", "b,a", true ; "whitespace")]
    #[test_case("a,a,b", "a,b", true ; "duplicates collapse")]
    #[test_case("a,,b,", "a,b", true ; "empty tokens ignored")]
    #[test_case("", "", true ; "both empty")]
    fn test_set_semantics(a: &str, b: &str, expected: bool) {
        let a = CommaDelimitedValue::new(a);
        let b = CommaDelimitedValue::new(b);
        assert_eq!(a.string_semantic_equals(&b).unwrap(), expected);
        assert_eq!(b.string_semantic_equals(&a).unwrap(), expected);
    }

    #[test]
    fn test_plain_string_is_a_type_mismatch() {
        let value = CommaDelimitedValue::new("a,b");
        assert!(value.string_semantic_equals(&PlainString("a,b".into())).is_err());
    }
}
