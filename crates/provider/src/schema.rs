//! Resource, data source and provider schemas
//!
//! A [`Schema`] describes one object type: its attributes (with validators,
//! plan modifiers and optional semantic-equality string types) and its
//! nested blocks. The same description drives msgpack encoding, config
//! validation, planning and the schema sent to Terraform.

use std::sync::Arc;

use serde_json::json;

use crate::modifiers::PlanModifier;
use crate::types::StringType;
use crate::validators::Validator;

/// Terraform attribute types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    String,
    Number,
    Bool,
    List(Box<AttrType>),
    Set(Box<AttrType>),
    Map(Box<AttrType>),
}

impl AttrType {
    /// The cty JSON type encoding, e.g. `["set","string"]`
    pub fn cty_json(&self) -> serde_json::Value {
        match self {
            AttrType::String => json!("string"),
            AttrType::Number => json!("number"),
            AttrType::Bool => json!("bool"),
            AttrType::List(elem) => json!(["list", elem.cty_json()]),
            AttrType::Set(elem) => json!(["set", elem.cty_json()]),
            AttrType::Map(elem) => json!(["map", elem.cty_json()]),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, AttrType::List(_) | AttrType::Set(_) | AttrType::Map(_))
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub ty: AttrType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub custom_type: Option<Arc<dyn StringType>>,
}

impl Attribute {
    pub fn new(name: &str, ty: AttrType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            custom_type: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttrType::String)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, AttrType::Number)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttrType::Bool)
    }

    pub fn set(name: &str, elem: AttrType) -> Self {
        Self::new(name, AttrType::Set(Box::new(elem)))
    }

    pub fn list(name: &str, elem: AttrType) -> Self {
        Self::new(name, AttrType::List(Box::new(elem)))
    }

    pub fn map(name: &str, elem: AttrType) -> Self {
        Self::new(name, AttrType::Map(Box::new(elem)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.plan_modifiers.push(Arc::new(modifier));
        self
    }

    pub fn custom_type(mut self, ty: impl StringType + 'static) -> Self {
        self.custom_type = Some(Arc::new(ty));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    Single,
    List,
    Set,
}

#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub name: String,
    pub nesting: Nesting,
    pub block: Block,
    pub min_items: i64,
    pub max_items: i64,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
}

impl NestedBlock {
    fn new(name: &str, nesting: Nesting, block: Block) -> Self {
        Self {
            name: name.to_string(),
            nesting,
            block,
            min_items: 0,
            max_items: 0,
            plan_modifiers: Vec::new(),
        }
    }

    pub fn single(name: &str, block: Block) -> Self {
        Self::new(name, Nesting::Single, block)
    }

    pub fn list(name: &str, block: Block) -> Self {
        Self::new(name, Nesting::List, block)
    }

    pub fn set(name: &str, block: Block) -> Self {
        Self::new(name, Nesting::Set, block)
    }

    pub fn min_items(mut self, n: i64) -> Self {
        self.min_items = n;
        self
    }

    pub fn max_items(mut self, n: i64) -> Self {
        self.max_items = n;
        self
    }

    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.plan_modifiers.push(Arc::new(modifier));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<NestedBlock>,
    pub description: String,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn get_block(&self, name: &str) -> Option<&NestedBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn new(block: Block) -> Self {
        Self { version: 0, block }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }
}

/// The `id` attribute every resource carries
pub fn id_attribute() -> Attribute {
    Attribute::string("id")
        .computed()
        .description("The ID of this resource.")
        .plan_modifier(crate::modifiers::UseStateForUnknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cty_type_json() {
        assert_eq!(AttrType::String.cty_json().to_string(), r#""string""#);
        assert_eq!(
            AttrType::Set(Box::new(AttrType::String)).cty_json().to_string(),
            r#"["set","string"]"#
        );
        assert_eq!(
            AttrType::Map(Box::new(AttrType::Number)).cty_json().to_string(),
            r#"["map","number"]"#
        );
    }

    #[test]
    fn test_block_lookup() {
        let block = Block::new()
            .attribute(Attribute::string("name").required())
            .block(NestedBlock::single("charm", Block::new()));
        assert!(block.get_attribute("name").unwrap().required);
        assert_eq!(block.get_block("charm").unwrap().nesting, Nesting::Single);
        assert!(block.get_attribute("charm").is_none());
    }
}
