//! Data Source Implementations
//!
//! Data sources look up existing objects. Unlike resource reads, a missing
//! object is an error.

pub mod application;
pub mod machine;
pub mod model;
pub mod offer;
pub mod secret;

use async_trait::async_trait;
use tracing::Span;

use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::schema::Schema;
use crate::state::Value;

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name, e.g. `juju_model`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn configure(&mut self, data: &ProviderData);

    fn subsystem(&self) -> &Span;

    fn validate_config(&self, _config: &Value, _diags: &mut Diagnostics) {}

    async fn read(&self, config: &Value, diags: &mut Diagnostics) -> Option<Value>;
}

/// Require exactly one of two attributes. Unknown values are not judged.
pub fn exactly_one_of(config: &Value, first: &str, second: &str, diags: &mut Diagnostics) {
    let state = |key: &str| config.get(key).cloned().unwrap_or_default();
    let (a, b) = (state(first), state(second));
    if a.is_unknown() || b.is_unknown() {
        return;
    }
    if a.is_null() == b.is_null() {
        diags.attribute_error(
            &AttributePath::root(first),
            "Invalid Attribute Combination",
            format!("Exactly one of {first} or {second} must be set."),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{make_state, string_value};

    #[test]
    fn test_exactly_one_of() {
        let check = |config: Value| {
            let mut diags = Diagnostics::new();
            exactly_one_of(&config, "name", "uuid", &mut diags);
            diags.has_error()
        };
        assert!(!check(make_state(vec![("name", string_value("dev"))])));
        assert!(check(make_state(vec![])));
        assert!(check(make_state(vec![
            ("name", string_value("dev")),
            ("uuid", string_value("u")),
        ])));
        assert!(!check(make_state(vec![("name", Value::Unknown)])));
    }
}
