//! juju_machine
//!
//! Machines have no update API: every configurable attribute forces
//! replacement, constraints only when their canonical form changes.

use async_trait::async_trait;
use juju_common::{CreateMachineInput, MachineInfo};
use tracing::{debug, info, Span};

use super::{
    client_error, constraints_state, fill_unknowns, model_uuid_attribute, ListedResource, Resource, ResourceCommon,
};
use crate::client::ProviderData;
use crate::diag::{AttributePath, Diagnostics};
use crate::id;
use crate::modifiers::{constraints_requires_replace, RequiresReplace, UseStateForUnknown};
use crate::schema::{id_attribute, Attribute, Block, Schema};
use crate::state::{get_optional_string_attr, get_string_attr, make_state, optional_string_value, string_value, Value};
use crate::types::ConstraintsType;

const ID_FORMAT: &str = "<model_uuid>:<machine_id>:<machine_name>";

pub struct MachineResource {
    common: ResourceCommon,
}

impl MachineResource {
    pub fn new() -> Self {
        Self {
            common: ResourceCommon::new("juju_machine"),
        }
    }
}

impl Default for MachineResource {
    fn default() -> Self {
        Self::new()
    }
}

fn default_name(machine_id: &str) -> String {
    format!("machine-{machine_id}")
}

pub fn machine_to_state(machine: &MachineInfo, prior: &Value) -> Value {
    let name = get_optional_string_attr(prior, "name").unwrap_or_else(|| default_name(&machine.machine_id));
    make_state(vec![
        ("id", string_value(id::encode(&[&machine.model_uuid, &machine.machine_id, &name]))),
        ("model_uuid", string_value(&machine.model_uuid)),
        ("machine_id", string_value(&machine.machine_id)),
        ("name", string_value(name)),
        ("base", string_value(&machine.base)),
        (
            "constraints",
            constraints_state(prior.get("constraints").unwrap_or(&Value::Null), &machine.constraints),
        ),
        ("disks", optional_string_value(machine.disks.as_deref())),
        ("hostname", string_value(&machine.hostname)),
        ("ssh_address", prior.get("ssh_address").cloned().unwrap_or_default()),
        ("public_key_file", prior.get("public_key_file").cloned().unwrap_or_default()),
        ("private_key_file", prior.get("private_key_file").cloned().unwrap_or_default()),
    ])
}

#[async_trait]
impl Resource for MachineResource {
    fn type_name(&self) -> &'static str {
        "juju_machine"
    }

    fn schema(&self) -> Schema {
        let replace = |attr: Attribute| attr.plan_modifier(RequiresReplace);
        Schema::new(
            Block::new()
                .description("A resource that represents a Juju machine deployment.")
                .attribute(id_attribute())
                .attribute(model_uuid_attribute())
                .attribute(replace(
                    Attribute::string("name")
                        .optional()
                        .computed()
                        .description("A name for the machine resource in Terraform.")
                        .plan_modifier(UseStateForUnknown),
                ))
                .attribute(
                    Attribute::string("machine_id")
                        .computed()
                        .description("The id of the machine provisioned by Juju.")
                        .plan_modifier(UseStateForUnknown),
                )
                .attribute(
                    Attribute::string("constraints")
                        .optional()
                        .computed()
                        .custom_type(ConstraintsType)
                        .description("Machine constraints that overwrite those available from 'juju get-model-constraints' and provider's defaults.")
                        .plan_modifier(UseStateForUnknown)
                        .plan_modifier(constraints_requires_replace()),
                )
                .attribute(replace(
                    Attribute::string("disks")
                        .optional()
                        .description("Storage directives for disks to be attached to the machine."),
                ))
                .attribute(replace(
                    Attribute::string("base")
                        .optional()
                        .computed()
                        .description("The operating system to install on the new machine(s), e.g. ubuntu@22.04.")
                        .plan_modifier(UseStateForUnknown),
                ))
                .attribute(replace(
                    Attribute::string("ssh_address")
                        .optional()
                        .description("The user@host directive for manual provisioning an existing machine via ssh."),
                ))
                .attribute(replace(
                    Attribute::string("public_key_file")
                        .optional()
                        .description("The file path to read the public key from."),
                ))
                .attribute(replace(
                    Attribute::string("private_key_file")
                        .optional()
                        .description("The file path to read the private key from."),
                ))
                .attribute(
                    Attribute::string("hostname")
                        .computed()
                        .description("The name of the host that gets assigned to the machine.")
                        .plan_modifier(UseStateForUnknown),
                ),
        )
    }

    fn configure(&mut self, data: &ProviderData) {
        self.common.configure(data);
    }

    fn subsystem(&self) -> &Span {
        self.common.span()
    }

    fn validate_config(&self, config: &Value, diags: &mut Diagnostics) {
        let is_set = |key: &str| config.get(key).map_or(false, |v| !v.is_null());
        if !is_set("ssh_address") {
            for key in ["public_key_file", "private_key_file"] {
                if is_set(key) {
                    diags.attribute_error(
                        &AttributePath::root(key),
                        "Invalid Attribute Combination",
                        format!("{key} is only used together with ssh_address."),
                    );
                }
            }
            return;
        }
        for key in ["public_key_file", "private_key_file"] {
            if !is_set(key) {
                diags.attribute_error(
                    &AttributePath::root(key),
                    "Missing Attribute Configuration",
                    format!("{key} must be set when ssh_address is set."),
                );
            }
        }
        for key in ["constraints", "disks", "base"] {
            if is_set(key) {
                diags.attribute_error(
                    &AttributePath::root(key),
                    "Invalid Attribute Combination",
                    format!("{key} cannot be set for a manually provisioned machine (ssh_address is set)."),
                );
            }
        }
    }

    async fn create(&self, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let model_uuid = get_string_attr(plan, "model_uuid");
        let input = CreateMachineInput {
            model_uuid: model_uuid.clone(),
            constraints: get_optional_string_attr(plan, "constraints"),
            disks: get_optional_string_attr(plan, "disks"),
            base: get_optional_string_attr(plan, "base"),
            ssh_address: get_optional_string_attr(plan, "ssh_address"),
            public_key_file: get_optional_string_attr(plan, "public_key_file"),
            private_key_file: get_optional_string_attr(plan, "private_key_file"),
        };

        let created = match client.create_machine(input).await {
            Ok(created) => created,
            Err(e) => {
                client_error(diags, "create", "machine", &e);
                return None;
            }
        };
        info!(machine = %created.machine_id, base = %created.base, "added machine");
        match client.read_machine(&model_uuid, &created.machine_id).await {
            Ok(machine) => Some(fill_unknowns(plan, &machine_to_state(&machine, plan))),
            Err(e) => {
                client_error(diags, "read", "machine", &e);
                None
            }
        }
    }

    async fn read(&self, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let client = self.common.client(diags)?;
        let [model_uuid, machine_id, name] = match id::decode::<3>(&get_string_attr(state, "id"), ID_FORMAT) {
            Ok(fields) => fields,
            Err(e) => {
                diags.push(e.to_diagnostic());
                return None;
            }
        };

        match client.read_machine(&model_uuid, &machine_id).await {
            Ok(machine) => {
                let mut prior = state.clone();
                prior.set("name", string_value(name));
                Some(machine_to_state(&machine, &prior))
            }
            Err(e) if e.is_not_found() => {
                debug!(machine = %machine_id, "machine not found, removing from state");
                None
            }
            Err(e) => {
                client_error(diags, "read", "machine", &e);
                None
            }
        }
    }

    async fn update(&self, plan: &Value, prior: &Value, _diags: &mut Diagnostics) -> Option<Value> {
        // Only semantically equal changes reach here; nothing to send.
        Some(fill_unknowns(plan, prior))
    }

    async fn delete(&self, state: &Value, diags: &mut Diagnostics) {
        let Some(client) = self.common.client(diags) else {
            return;
        };
        let model_uuid = get_string_attr(state, "model_uuid");
        let machine_id = get_string_attr(state, "machine_id");
        if let Err(e) = client.destroy_machine(&model_uuid, &machine_id).await {
            client_error(diags, "delete", "machine", &e);
        }
    }

    fn list_schema(&self) -> Option<Schema> {
        Some(Schema::new(
            Block::new()
                .description("Lists the machines in a model.")
                .attribute(model_uuid_attribute()),
        ))
    }

    async fn list(&self, config: &Value, diags: &mut Diagnostics) -> Vec<ListedResource> {
        let Some(client) = self.common.client(diags) else {
            return Vec::new();
        };
        let model_uuid = get_string_attr(config, "model_uuid");
        match client.list_machines(&model_uuid).await {
            Ok(machines) => machines
                .iter()
                .map(|m| {
                    let state = machine_to_state(m, &Value::Null);
                    ListedResource {
                        id: get_string_attr(&state, "id"),
                        display_name: m.hostname.clone(),
                        state,
                    }
                })
                .collect(),
            Err(e) => {
                client_error(diags, "list", "machines", &e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(config: Vec<(&str, Value)>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        MachineResource::new().validate_config(&make_state(config), &mut diags);
        diags
    }

    #[test]
    fn test_ssh_address_requires_both_key_files() {
        let diags = check(vec![
            ("ssh_address", string_value("ubuntu@10.0.0.5")),
            ("public_key_file", string_value("/home/u/.ssh/id_ed25519.pub")),
        ]);
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags.iter().next().unwrap().attribute,
            Some(AttributePath::root("private_key_file"))
        );
    }

    #[test]
    fn test_ssh_address_excludes_constraints() {
        let diags = check(vec![
            ("ssh_address", string_value("ubuntu@10.0.0.5")),
            ("public_key_file", string_value("a.pub")),
            ("private_key_file", string_value("a")),
            ("constraints", string_value("cores=2")),
        ]);
        assert_eq!(diags.len(), 1);
        assert!(diags.has_error());
    }

    #[test]
    fn test_key_files_without_address() {
        let diags = check(vec![("public_key_file", string_value("a.pub"))]);
        assert!(diags.has_error());
        assert!(check(vec![("constraints", string_value("cores=2"))]).is_empty());
    }

    #[test]
    fn test_default_name_in_id() {
        let machine = MachineInfo {
            model_uuid: "uuid".to_string(),
            machine_id: "3".to_string(),
            base: "ubuntu@22.04".to_string(),
            constraints: String::new(),
            disks: None,
            hostname: "juju-3".to_string(),
            status: "started".to_string(),
        };
        let state = machine_to_state(&machine, &Value::Null);
        assert_eq!(state.get("id"), Some(&string_value("uuid:3:machine-3")));
        assert_eq!(state.get("constraints"), Some(&string_value("")));
    }
}
