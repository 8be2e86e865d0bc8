//! Composite resource IDs
//!
//! IDs join a fixed number of fields with `:`. There is no escaping, so a
//! field must never contain the delimiter itself.

use thiserror::Error;

use crate::diag::Diagnostic;

pub const DELIMITER: char = ':';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid ID {id:?}: expected {expected} fields in the format {format:?}, got {got}")]
    FieldCount {
        id: String,
        format: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid ID {id:?}: field {index} of {format:?} is empty")]
    EmptyField { id: String, format: &'static str, index: usize },

    #[error("invalid ID {id:?}: expected prefix {prefix:?}")]
    Prefix { id: String, prefix: &'static str },
}

impl IdError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error("Invalid ID", self.to_string())
    }
}

pub fn encode(fields: &[&str]) -> String {
    fields.join(":")
}

/// Split `id` into exactly `N` non-empty fields.
pub fn decode<const N: usize>(id: &str, format: &'static str) -> Result<[String; N], IdError> {
    let parts: Vec<&str> = id.split(DELIMITER).collect();
    if parts.len() != N {
        return Err(IdError::FieldCount {
            id: id.to_string(),
            format,
            expected: N,
            got: parts.len(),
        });
    }
    if let Some(index) = parts.iter().position(|p| p.is_empty()) {
        return Err(IdError::EmptyField {
            id: id.to_string(),
            format,
            index,
        });
    }
    let mut fields: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, part) in fields.iter_mut().zip(parts) {
        *slot = part.to_string();
    }
    Ok(fields)
}

/// Decode an ID that starts with a fixed `prefix:` field.
pub fn decode_prefixed<const N: usize>(
    id: &str,
    prefix: &'static str,
    format: &'static str,
) -> Result<[String; N], IdError> {
    let rest = id
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix(DELIMITER))
        .ok_or(IdError::Prefix {
            id: id.to_string(),
            prefix,
        })?;
    decode::<N>(rest, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MACHINE: &str = "<model_uuid>:<machine_id>:<machine_name>";

    #[test]
    fn test_round_trip() {
        let id = encode(&["0b8c4d2e-aaaa-4bbb-8ccc-123456789abc", "3", "juju-3"]);
        let [model, machine, name] = decode::<3>(&id, MACHINE).unwrap();
        assert_eq!(model, "0b8c4d2e-aaaa-4bbb-8ccc-123456789abc");
        assert_eq!(machine, "3");
        assert_eq!(name, "juju-3");
    }

    #[test]
    fn test_wrong_field_count_names_format() {
        let err = decode::<3>("uuid:3", MACHINE).unwrap_err();
        assert!(matches!(err, IdError::FieldCount { expected: 3, got: 2, .. }));
        assert!(err.to_string().contains(MACHINE));

        assert!(decode::<3>("a:b:c:d", MACHINE).is_err());
    }

    #[test]
    fn test_empty_field() {
        let err = decode::<2>("uuid:", "<model_uuid>:<application_name>").unwrap_err();
        assert!(matches!(err, IdError::EmptyField { index: 1, .. }));
    }

    #[test]
    fn test_prefixed() {
        let [model, fp] = decode_prefixed::<2>("sshkey:uuid:abcd", "sshkey", "sshkey:<model_uuid>:<fingerprint>").unwrap();
        assert_eq!(model, "uuid");
        assert_eq!(fp, "abcd");

        let [name] = decode_prefixed::<1>("user:alice", "user", "user:<name>").unwrap();
        assert_eq!(name, "alice");

        assert!(matches!(
            decode_prefixed::<1>("alice", "user", "user:<name>"),
            Err(IdError::Prefix { .. })
        ));
    }
}
