//! Juju constraint grammar
//!
//! Constraints are whitespace separated `key=value` pairs such as
//! `cores=2 mem=4G root-disk=20G`. Parsing normalizes aliases and size
//! units, and [`Constraints`]'s `Display` writes keys in one fixed order,
//! so two strings describe the same requirements iff their canonical forms
//! are identical.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Constraint parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintsError {
    #[error("malformed constraint {0:?}: expected key=value")]
    Malformed(String),

    #[error("unknown constraint {0:?}")]
    UnknownKey(String),

    #[error("bad {key:?} constraint: already set")]
    Duplicate { key: String },

    #[error("bad {key:?} constraint: {reason}")]
    BadValue { key: String, reason: String },
}

const SUPPORTED_ARCHES: &[&str] = &["amd64", "i386", "armhf", "arm64", "ppc64el", "s390x", "riscv64"];
const CONTAINER_TYPES: &[&str] = &["lxd", "kvm", "none"];

/// Parsed Juju constraints. Memory and disk sizes are held in MiB.
///
/// A `Some` holding an empty/zero value records a key that was given with an
/// empty value (`arch=`), which Juju treats as explicitly unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub arch: Option<String>,
    pub container: Option<String>,
    pub cores: Option<u64>,
    pub cpu_power: Option<u64>,
    pub image_id: Option<String>,
    pub instance_role: Option<String>,
    pub instance_type: Option<String>,
    pub mem: Option<u64>,
    pub root_disk: Option<u64>,
    pub root_disk_source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub spaces: Option<Vec<String>>,
    pub virt_type: Option<String>,
    pub zones: Option<Vec<String>>,
    pub allocate_public_ip: Option<bool>,
}

impl Constraints {
    /// Parse a constraint string. An empty or all-whitespace string yields
    /// empty constraints.
    pub fn parse(input: &str) -> Result<Self, ConstraintsError> {
        let mut cons = Constraints::default();
        for item in input.split_whitespace() {
            let (raw_key, value) = item
                .split_once('=')
                .ok_or_else(|| ConstraintsError::Malformed(item.to_string()))?;
            let key = match raw_key {
                "cpu-cores" => "cores",
                other => other,
            };
            cons.set(key, value)?;
        }
        Ok(cons)
    }

    pub fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConstraintsError> {
        let already_set = match key {
            "arch" => self.arch.is_some(),
            "container" => self.container.is_some(),
            "cores" => self.cores.is_some(),
            "cpu-power" => self.cpu_power.is_some(),
            "image-id" => self.image_id.is_some(),
            "instance-role" => self.instance_role.is_some(),
            "instance-type" => self.instance_type.is_some(),
            "mem" => self.mem.is_some(),
            "root-disk" => self.root_disk.is_some(),
            "root-disk-source" => self.root_disk_source.is_some(),
            "tags" => self.tags.is_some(),
            "spaces" => self.spaces.is_some(),
            "virt-type" => self.virt_type.is_some(),
            "zones" => self.zones.is_some(),
            "allocate-public-ip" => self.allocate_public_ip.is_some(),
            _ => return Err(ConstraintsError::UnknownKey(key.to_string())),
        };
        if already_set {
            return Err(ConstraintsError::Duplicate { key: key.to_string() });
        }

        match key {
            "arch" => self.arch = Some(parse_choice(key, value, SUPPORTED_ARCHES)?),
            "container" => self.container = Some(parse_choice(key, value, CONTAINER_TYPES)?),
            "cores" => self.cores = Some(parse_uint(key, value)?),
            "cpu-power" => self.cpu_power = Some(parse_uint(key, value)?),
            "image-id" => self.image_id = Some(value.to_string()),
            "instance-role" => self.instance_role = Some(value.to_string()),
            "instance-type" => self.instance_type = Some(value.to_string()),
            "mem" => self.mem = Some(parse_size(key, value)?),
            "root-disk" => self.root_disk = Some(parse_size(key, value)?),
            "root-disk-source" => self.root_disk_source = Some(value.to_string()),
            "tags" => self.tags = Some(parse_list(key, value)?),
            "spaces" => self.spaces = Some(parse_list(key, value)?),
            "virt-type" => self.virt_type = Some(value.to_string()),
            "zones" => self.zones = Some(parse_list(key, value)?),
            "allocate-public-ip" => self.allocate_public_ip = Some(parse_bool(key, value)?),
            _ => unreachable!("key checked above"),
        }
        Ok(())
    }
}

impl FromStr for Constraints {
    type Err = ConstraintsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraints::parse(s)
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let mut push = |key: &str, value: String| parts.push(format!("{key}={value}"));

        if let Some(v) = &self.arch {
            push("arch", v.clone());
        }
        if let Some(v) = &self.container {
            push("container", v.clone());
        }
        if let Some(v) = self.cores {
            push("cores", uint_str(v));
        }
        if let Some(v) = self.cpu_power {
            push("cpu-power", uint_str(v));
        }
        if let Some(v) = &self.image_id {
            push("image-id", v.clone());
        }
        if let Some(v) = &self.instance_role {
            push("instance-role", v.clone());
        }
        if let Some(v) = &self.instance_type {
            push("instance-type", v.clone());
        }
        if let Some(v) = self.mem {
            push("mem", size_str(v));
        }
        if let Some(v) = self.root_disk {
            push("root-disk", size_str(v));
        }
        if let Some(v) = &self.root_disk_source {
            push("root-disk-source", v.clone());
        }
        if let Some(v) = &self.tags {
            push("tags", v.join(","));
        }
        if let Some(v) = &self.spaces {
            push("spaces", v.join(","));
        }
        if let Some(v) = &self.virt_type {
            push("virt-type", v.clone());
        }
        if let Some(v) = &self.zones {
            push("zones", v.join(","));
        }
        if let Some(v) = self.allocate_public_ip {
            push("allocate-public-ip", v.to_string());
        }

        write!(f, "{}", parts.join(" "))
    }
}

/// Parse and re-serialize a constraint string in canonical key order.
pub fn canonical(input: &str) -> Result<String, ConstraintsError> {
    Ok(Constraints::parse(input)?.to_string())
}

fn bad_value(key: &str, reason: impl Into<String>) -> ConstraintsError {
    ConstraintsError::BadValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn parse_choice(key: &str, value: &str, allowed: &[&str]) -> Result<String, ConstraintsError> {
    if value.is_empty() || allowed.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(bad_value(key, format!("{value:?} not recognized")))
    }
}

fn parse_uint(key: &str, value: &str) -> Result<u64, ConstraintsError> {
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<u64>()
        .map_err(|_| bad_value(key, "must be a non-negative integer"))
}

fn parse_size(key: &str, value: &str) -> Result<u64, ConstraintsError> {
    if value.is_empty() {
        return Ok(0);
    }
    let (number, multiplier) = match value.chars().last() {
        Some('M') => (&value[..value.len() - 1], 1.0),
        Some('G') => (&value[..value.len() - 1], 1024.0),
        Some('T') => (&value[..value.len() - 1], 1024.0 * 1024.0),
        Some('P') => (&value[..value.len() - 1], 1024.0 * 1024.0 * 1024.0),
        _ => (value, 1.0),
    };
    let parsed: f64 = number
        .parse()
        .map_err(|_| bad_value(key, "must be a non-negative float with optional M/G/T/P suffix"))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(bad_value(key, "must be a non-negative float with optional M/G/T/P suffix"));
    }
    Ok((parsed * multiplier).ceil() as u64)
}

fn parse_list(key: &str, value: &str) -> Result<Vec<String>, ConstraintsError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|item| {
            if item.is_empty() {
                Err(bad_value(key, "empty list item"))
            } else {
                Ok(item.to_string())
            }
        })
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConstraintsError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(bad_value(key, "must be true or false")),
    }
}

fn uint_str(v: u64) -> String {
    if v == 0 {
        String::new()
    } else {
        v.to_string()
    }
}

fn size_str(v: u64) -> String {
    if v == 0 {
        String::new()
    } else {
        format!("{v}M")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_basic() {
        let c = Constraints::parse("cores=2 mem=4G").unwrap();
        assert_eq!(c.cores, Some(2));
        assert_eq!(c.mem, Some(4096));
    }

    #[test_case("cpu-cores=2 mem=4G", "cores=2 mem=4096M" ; "alias and unit")]
    #[test_case("mem=4G cpu-cores=2", "cores=2 mem=4096M" ; "reordered")]
    #[test_case("root-disk=1.5G", "root-disk=1536M" ; "fractional size")]
    #[test_case("mem=1T", "mem=1048576M" ; "terabytes")]
    #[test_case("mem=512", "mem=512M" ; "bare megabytes")]
    #[test_case("  arch=amd64   zones=a,b ", "arch=amd64 zones=a,b" ; "extra whitespace")]
    #[test_case("", "" ; "empty")]
    #[test_case("arch=", "arch=" ; "explicit empty")]
    fn test_canonical(input: &str, expected: &str) {
        assert_eq!(canonical(input).unwrap(), expected);
    }

    #[test]
    fn test_equivalent_strings_share_canonical_form() {
        assert_eq!(
            canonical("cpu-cores=2 mem=4096M").unwrap(),
            canonical("cpu-cores=2 mem=4G").unwrap()
        );
        assert_ne!(
            canonical("cpu-cores=2 mem=4G").unwrap(),
            canonical("cpu-cores=4 mem=4G").unwrap()
        );
    }

    #[test_case("mem" ; "missing equals")]
    #[test_case("foo=bar" ; "unknown key")]
    #[test_case("mem=lots" ; "bad size")]
    #[test_case("mem=-1G" ; "negative size")]
    #[test_case("cores=two" ; "bad integer")]
    #[test_case("cores=2 cpu-cores=3" ; "duplicate through alias")]
    #[test_case("arch=sparc" ; "unsupported arch")]
    #[test_case("allocate-public-ip=yes" ; "bad bool")]
    #[test_case("tags=a,,b" ; "empty tag")]
    fn test_parse_errors(input: &str) {
        assert!(Constraints::parse(input).is_err(), "{input} should not parse");
    }

    #[test]
    fn test_duplicate_error_names_key() {
        let err = Constraints::parse("mem=1G mem=2G").unwrap_err();
        assert_eq!(err, ConstraintsError::Duplicate { key: "mem".into() });
    }

    #[test]
    fn test_full_ordering() {
        let c = Constraints::parse(
            "allocate-public-ip=true zones=z1 virt-type=kvm spaces=db,^dmz tags=t \
             root-disk-source=ssd root-disk=10G mem=2G instance-type=m5 instance-role=r \
             image-id=img cpu-power=100 cores=4 container=lxd arch=arm64",
        )
        .unwrap();
        assert_eq!(
            c.to_string(),
            "arch=arm64 container=lxd cores=4 cpu-power=100 image-id=img instance-role=r \
             instance-type=m5 mem=2048M root-disk=10240M root-disk-source=ssd tags=t \
             spaces=db,^dmz virt-type=kvm zones=z1 allocate-public-ip=true"
        );
    }
}
