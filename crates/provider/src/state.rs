//! Terraform State Management
//!
//! Handles encoding and decoding of Terraform values. Terraform sends
//! msgpack (with unknown values as extension type 0) and, for raw state
//! upgrades, JSON. Encoding is schema directed: every attribute the schema
//! declares is written, absent ones as null.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};

use crate::diag::{AttributePath, PathStep};
use crate::schema::{AttrType, Block, Nesting};

/// Dynamic value that can be encoded/decoded from Terraform state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Unknown,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Lists, sets and tuples
    List(Vec<Value>),
    /// Maps and objects
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// True when neither this value nor anything nested in it is unknown.
    pub fn is_fully_known(&self) -> bool {
        match self {
            Value::Unknown => false,
            Value::List(items) => items.iter().all(Value::is_fully_known),
            Value::Map(entries) => entries.values().all(Value::is_fully_known),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(key)
    }

    /// Set an attribute, turning a null value into an empty object first.
    pub fn set(&mut self, key: &str, value: Value) {
        if self.is_null() {
            *self = Value::Map(BTreeMap::new());
        }
        if let Value::Map(m) = self {
            m.insert(key.to_string(), value);
        }
    }

    /// Look up a nested value. Missing steps resolve to `None`.
    pub fn at_path(&self, path: &AttributePath) -> Option<&Value> {
        let mut current = self;
        for step in path.steps() {
            current = match (step, current) {
                (PathStep::Attribute(name), Value::Map(m)) => m.get(name)?,
                (PathStep::ElementKeyString(key), Value::Map(m)) => m.get(key)?,
                (PathStep::ElementKeyInt(i), Value::List(items)) => items.get(usize::try_from(*i).ok()?)?,
                (PathStep::ElementKeyValue(v), Value::List(items)) => items.iter().find(|item| *item == v)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable lookup of a nested value. Missing object attributes along the
    /// path are created as null.
    pub fn at_path_mut(&mut self, path: &AttributePath) -> Option<&mut Value> {
        let mut current = self;
        for step in path.steps() {
            if current.is_null() && matches!(step, PathStep::Attribute(_)) {
                *current = Value::Map(BTreeMap::new());
            }
            current = match (step, current) {
                (PathStep::Attribute(name), Value::Map(m)) => m.entry(name.clone()).or_default(),
                (PathStep::ElementKeyString(key), Value::Map(m)) => m.get_mut(key)?,
                (PathStep::ElementKeyInt(i), Value::List(items)) => items.get_mut(usize::try_from(*i).ok()?)?,
                (PathStep::ElementKeyValue(v), Value::List(items)) => items.iter_mut().find(|item| **item == *v)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Replace every unknown with null.
    pub fn unknowns_to_null(&mut self) {
        match self {
            Value::Unknown => *self = Value::Null,
            Value::List(items) => items.iter_mut().for_each(Value::unknowns_to_null),
            Value::Map(entries) => entries.values_mut().for_each(Value::unknowns_to_null),
            _ => {}
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unknown => "unknown",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(entries) => {
                Value::Map(entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ============================================================================
// msgpack / JSON codec
// ============================================================================

fn unknown_msgpack() -> rmpv::Value {
    rmpv::Value::Ext(0, vec![0])
}

/// Decode a Terraform DynamicValue from msgpack bytes
pub fn decode_dynamic_value(data: &[u8]) -> Result<Value> {
    if data.is_empty() {
        return Ok(Value::Null);
    }
    let mut reader = data;
    let raw = rmpv::decode::read_value(&mut reader)?;
    from_msgpack(raw)
}

fn from_msgpack(raw: rmpv::Value) -> Result<Value> {
    Ok(match raw {
        rmpv::Value::Nil => Value::Null,
        rmpv::Value::Boolean(b) => Value::Bool(b),
        rmpv::Value::Integer(i) => {
            if let Some(n) = i.as_i64() {
                Value::Number(n.into())
            } else if let Some(n) = i.as_u64() {
                Value::Number(n.into())
            } else {
                bail!("integer out of range")
            }
        }
        rmpv::Value::F32(f) => float_value(f64::from(f)),
        rmpv::Value::F64(f) => float_value(f),
        rmpv::Value::String(s) => Value::String(s.into_str().ok_or_else(|| anyhow!("string is not valid UTF-8"))?),
        rmpv::Value::Binary(_) => bail!("unexpected binary value"),
        rmpv::Value::Array(items) => Value::List(items.into_iter().map(from_msgpack).collect::<Result<_>>()?),
        rmpv::Value::Map(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let key = key
                    .as_str()
                    .ok_or_else(|| anyhow!("map key is not a string"))?
                    .to_string();
                map.insert(key, from_msgpack(value)?);
            }
            Value::Map(map)
        }
        rmpv::Value::Ext(_, _) => Value::Unknown,
    })
}

/// Decode raw JSON state, as sent to UpgradeResourceState
pub fn decode_json_value(data: &[u8]) -> Result<Value> {
    if data.is_empty() {
        return Ok(Value::Null);
    }
    let json: serde_json::Value = serde_json::from_slice(data)?;
    Ok(Value::from(json))
}

/// Encode a value of the given block's object type to msgpack bytes
pub fn encode_dynamic_value(value: &Value, block: &Block) -> Result<Vec<u8>> {
    let raw = block_to_msgpack(value, block)?;
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &raw)?;
    Ok(buf)
}

/// Encode a value with no schema (object keys as found)
pub fn encode_untyped(value: &Value) -> Result<Vec<u8>> {
    let raw = untyped_to_msgpack(value);
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &raw)?;
    Ok(buf)
}

fn block_to_msgpack(value: &Value, block: &Block) -> Result<rmpv::Value> {
    match value {
        Value::Null => return Ok(rmpv::Value::Nil),
        Value::Unknown => return Ok(unknown_msgpack()),
        Value::Map(_) => {}
        other => bail!("expected an object, got {}", other.kind()),
    }

    let mut entries = Vec::with_capacity(block.attributes.len() + block.blocks.len());
    for attr in &block.attributes {
        let v = value.get(&attr.name).unwrap_or(&Value::Null);
        let encoded = typed_to_msgpack(v, &attr.ty).map_err(|e| anyhow!("attribute {:?}: {}", attr.name, e))?;
        entries.push((rmpv::Value::from(attr.name.as_str()), encoded));
    }
    for nested in &block.blocks {
        let v = value.get(&nested.name).unwrap_or(&Value::Null);
        let encoded = match nested.nesting {
            Nesting::Single => block_to_msgpack(v, &nested.block)?,
            Nesting::List | Nesting::Set => match v {
                Value::Unknown => unknown_msgpack(),
                Value::List(items) => rmpv::Value::Array(
                    items
                        .iter()
                        .map(|item| block_to_msgpack(item, &nested.block))
                        .collect::<Result<_>>()?,
                ),
                // Collection blocks are never null on the wire
                _ => rmpv::Value::Array(Vec::new()),
            },
        };
        entries.push((rmpv::Value::from(nested.name.as_str()), encoded));
    }
    Ok(rmpv::Value::Map(entries))
}

fn typed_to_msgpack(value: &Value, ty: &AttrType) -> Result<rmpv::Value> {
    Ok(match (value, ty) {
        (Value::Null, _) => rmpv::Value::Nil,
        (Value::Unknown, _) => unknown_msgpack(),
        (Value::Bool(b), AttrType::Bool) => rmpv::Value::Boolean(*b),
        (Value::Number(n), AttrType::Number) => number_to_msgpack(n),
        (Value::String(s), AttrType::String) => rmpv::Value::from(s.as_str()),
        (Value::Number(n), AttrType::String) => rmpv::Value::from(n.to_string()),
        (Value::Bool(b), AttrType::String) => rmpv::Value::from(b.to_string()),
        (Value::List(items), AttrType::List(elem) | AttrType::Set(elem)) => rmpv::Value::Array(
            items
                .iter()
                .map(|item| typed_to_msgpack(item, elem))
                .collect::<Result<_>>()?,
        ),
        (Value::Map(entries), AttrType::Map(elem)) => rmpv::Value::Map(
            entries
                .iter()
                .map(|(k, v)| Ok((rmpv::Value::from(k.as_str()), typed_to_msgpack(v, elem)?)))
                .collect::<Result<_>>()?,
        ),
        (value, ty) => bail!("cannot encode {} as {:?}", value.kind(), ty),
    })
}

fn number_to_msgpack(n: &serde_json::Number) -> rmpv::Value {
    if let Some(i) = n.as_i64() {
        rmpv::Value::from(i)
    } else if let Some(u) = n.as_u64() {
        rmpv::Value::from(u)
    } else {
        rmpv::Value::F64(n.as_f64().unwrap_or_default())
    }
}

fn untyped_to_msgpack(value: &Value) -> rmpv::Value {
    match value {
        Value::Null => rmpv::Value::Nil,
        Value::Unknown => unknown_msgpack(),
        Value::Bool(b) => rmpv::Value::Boolean(*b),
        Value::Number(n) => number_to_msgpack(n),
        Value::String(s) => rmpv::Value::from(s.as_str()),
        Value::List(items) => rmpv::Value::Array(items.iter().map(untyped_to_msgpack).collect()),
        Value::Map(entries) => rmpv::Value::Map(
            entries
                .iter()
                .map(|(k, v)| (rmpv::Value::from(k.as_str()), untyped_to_msgpack(v)))
                .collect(),
        ),
    }
}

// ============================================================================
// Attribute helpers
// ============================================================================

/// Helper to extract a string attribute from a Value
pub fn get_string_attr(value: &Value, key: &str) -> String {
    value.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

/// Helper to extract an optional string attribute from a Value
pub fn get_optional_string_attr(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

/// Helper to extract an integer attribute from a Value
pub fn get_int_attr(value: &Value, key: &str, default: i64) -> i64 {
    value.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

pub fn get_optional_int_attr(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(|v| v.as_i64())
}

/// Helper to extract a bool attribute from a Value
pub fn get_bool_attr(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub fn get_optional_bool_attr(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(|v| v.as_bool())
}

/// Known string elements of a list or set attribute, sorted
pub fn get_string_set_attr(value: &Value, key: &str) -> Vec<String> {
    let mut items: Vec<String> = value
        .get(key)
        .and_then(|v| v.as_list())
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    items.sort();
    items.dedup();
    items
}

/// Known string entries of a map attribute
pub fn get_string_map_attr(value: &Value, key: &str) -> BTreeMap<String, String> {
    value
        .get(key)
        .and_then(|v| v.as_map())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Elements of a nested list or set block
pub fn get_block_list(value: &Value, key: &str) -> Vec<Value> {
    value
        .get(key)
        .and_then(|v| v.as_list())
        .map(<[Value]>::to_vec)
        .unwrap_or_default()
}

/// Create a Value map with the given attributes
pub fn make_state(attrs: Vec<(&str, Value)>) -> Value {
    let mut map = BTreeMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    Value::Map(map)
}

/// Create a string Value
pub fn string_value(s: impl Into<String>) -> Value {
    Value::String(s.into())
}

/// String when present, null otherwise
pub fn optional_string_value(s: Option<impl Into<String>>) -> Value {
    s.map(string_value).unwrap_or(Value::Null)
}

/// Create a number Value from i64
pub fn int_value(n: i64) -> Value {
    Value::Number(serde_json::Number::from(n))
}

/// Create a number Value from f64
pub fn float_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Create a bool Value
pub fn bool_value(b: bool) -> Value {
    Value::Bool(b)
}

/// Create a null Value
pub fn null_value() -> Value {
    Value::Null
}

/// Sorted, deduplicated set of strings
pub fn string_set_value<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Value {
    let mut items: Vec<String> = items.into_iter().map(Into::into).collect();
    items.sort();
    items.dedup();
    Value::List(items.into_iter().map(Value::String).collect())
}

pub fn string_map_value(entries: &BTreeMap<String, String>) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};

    fn schema_block() -> Block {
        Block::new()
            .attribute(Attribute::string("name").required())
            .attribute(Attribute::number("units").optional().computed())
            .attribute(Attribute::set("machines", AttrType::String).optional().computed())
            .block(NestedBlock::single(
                "charm",
                Block::new().attribute(Attribute::string("name").required()),
            ))
            .block(NestedBlock::set(
                "storage",
                Block::new().attribute(Attribute::string("label").required()),
            ))
    }

    #[test]
    fn test_msgpack_round_trip_fills_absent_attributes() {
        let value = make_state(vec![
            ("name", string_value("postgresql")),
            ("units", Value::Unknown),
            ("charm", make_state(vec![("name", string_value("postgresql"))])),
        ]);

        let bytes = encode_dynamic_value(&value, &schema_block()).unwrap();
        let decoded = decode_dynamic_value(&bytes).unwrap();

        assert_eq!(decoded.get("name"), Some(&string_value("postgresql")));
        assert_eq!(decoded.get("units"), Some(&Value::Unknown));
        assert_eq!(decoded.get("machines"), Some(&Value::Null));
        assert_eq!(decoded.get("storage"), Some(&Value::List(vec![])));
        assert_eq!(get_string_attr(decoded.get("charm").unwrap(), "name"), "postgresql");
    }

    #[test]
    fn test_encode_rejects_type_mismatch() {
        let value = make_state(vec![("units", string_value("three"))]);
        let bytes = encode_dynamic_value(&value, &schema_block());
        assert!(bytes.is_err());
    }

    #[test]
    fn test_decode_json_state() {
        let value = decode_json_value(br#"{"id":"abc","units":2,"machines":["0","1"]}"#).unwrap();
        assert_eq!(get_string_attr(&value, "id"), "abc");
        assert_eq!(get_int_attr(&value, "units", 0), 2);
        assert_eq!(get_string_set_attr(&value, "machines"), vec!["0", "1"]);
    }

    #[test]
    fn test_at_path_and_unknowns_to_null() {
        let mut value = make_state(vec![(
            "charm",
            make_state(vec![("channel", Value::Unknown)]),
        )]);
        let path = AttributePath::root("charm").attr("channel");
        assert_eq!(value.at_path(&path), Some(&Value::Unknown));
        assert!(!value.is_fully_known());

        value.unknowns_to_null();
        assert_eq!(value.at_path(&path), Some(&Value::Null));
        assert!(value.is_fully_known());
    }

    #[test]
    fn test_string_set_value_sorts_and_dedups() {
        let v = string_set_value(["b", "a", "b"]);
        assert_eq!(v, Value::List(vec![string_value("a"), string_value("b")]));
    }
}
