use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use crate::error::{KeySchemaError, Result};
use crate::model::grammar::{self, ParsedAttributes};
use crate::model::key_schema::{self, KeyRole, KeySchema, SecondaryIndex};
use crate::model::types::{self, StorageType, USES_IDENTIFIER_GENERATION, USES_TIMESTAMP};
use crate::model::Identifier;

pub const ID_ATTRIBUTE: &str = "id";
pub const CREATED_AT_ATTRIBUTE: &str = "createdAt";
pub const UPDATED_AT_ATTRIBUTE: &str = "updatedAt";
pub const DELETED_AT_ATTRIBUTE: &str = "deletedAt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingMode {
    #[default]
    #[serde(rename = "provisioned")]
    Provisioned,
    #[serde(rename = "ondemand")]
    OnDemand,
}

impl FromStr for BillingMode {
    type Err = String;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode.trim().to_lowercase().as_str() {
            "provisioned" => Ok(BillingMode::Provisioned),
            "ondemand" | "on_demand" | "pay_per_request" => Ok(BillingMode::OnDemand),
            other => Err(format!(
                "unknown billing mode `{other}`, expected `provisioned` or `ondemand`"
            )),
        }
    }
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingMode::Provisioned => f.write_str("provisioned"),
            BillingMode::OnDemand => f.write_str("ondemand"),
        }
    }
}

/// Provisioned read/write capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapacityUnits {
    pub read: i64,
    pub write: i64,
}

impl Default for CapacityUnits {
    fn default() -> Self {
        Self { read: 1, write: 1 }
    }
}

/// Options applied on top of the parsed attributes.
///
/// Defaults: no generated id, no timestamps, no soft delete, no explicit key
/// schema, no indexes, provisioned billing with one read and one write unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Adds a string `id` attribute and makes it the hash key. Wins over
    /// `explicit_key_schema`.
    pub generate_id: bool,
    /// Adds `createdAt` and `updatedAt`.
    pub add_timestamps: bool,
    /// Adds a nullable `deletedAt`.
    pub add_soft_delete: bool,
    /// `attribute:ROLE` pairs; empty means none.
    pub explicit_key_schema: String,
    /// `name:local|global:hash[:range]` declarations; empty means none.
    pub indexes: String,
    pub billing_mode: BillingMode,
    pub capacity: CapacityUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub identifier: Identifier,
    pub semantic_type: String,
    pub storage_type: StorageType,
    #[serde(default)]
    pub nullable: bool,
}

impl Attribute {
    pub fn new(name: &str, semantic_type: &str) -> Self {
        Self {
            identifier: Identifier::new(name),
            semantic_type: semantic_type.trim().to_string(),
            storage_type: types::storage_type(semantic_type),
            nullable: semantic_type.trim().starts_with('*'),
        }
    }

    fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn name(&self) -> &str {
        self.identifier.as_str()
    }
}

/// A resource, or a nested object inside one.
///
/// Only the root of a tree carries a key schema; nested nodes describe
/// embedded documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub identifier: Identifier,
    pub is_collection: bool,
    pub attributes: BTreeMap<String, Attribute>,
    pub nested: Vec<Model>,
    pub required_imports: BTreeSet<String>,
    pub key_schema: KeySchema,
    #[serde(default)]
    pub indexes: Vec<SecondaryIndex>,
    pub generated_id: bool,
    pub is_composite_key: bool,
    pub billing_mode: BillingMode,
    pub capacity_units: Option<CapacityUnits>,
}

/// Builds and validates a resource model.
///
/// # Example
///
/// ```
/// use mug_scaffold::model::{build, GenerationOptions};
///
/// let options = GenerationOptions {
///     generate_id: true,
///     ..Default::default()
/// };
/// let course = build("course", false, "name,price:float64", &options)?;
/// assert_eq!(course.hash_key(), Some("id"));
/// assert!(!course.is_composite_key);
/// # Ok::<(), mug_scaffold::error::ScaffoldError>(())
/// ```
#[instrument(skip(attributes, options))]
pub fn build(
    name: &str,
    is_collection: bool,
    attributes: &str,
    options: &GenerationOptions,
) -> Result<Model> {
    let (mut model, marked_hash) = Model::assemble(name, is_collection, attributes)?;

    if options.generate_id {
        model.generated_id = true;
        model.add_attribute(Attribute::new(ID_ATTRIBUTE, "identifier"));
        model
            .required_imports
            .insert(USES_IDENTIFIER_GENERATION.to_string());
        model.key_schema = KeySchema::from([(KeyRole::Hash, ID_ATTRIBUTE.to_string())]);
    } else if !options.explicit_key_schema.trim().is_empty() {
        model.key_schema = key_schema::parse_key_schema(&options.explicit_key_schema)?;
    } else {
        match marked_hash.as_slice() {
            [] => {}
            [hash] => {
                model.key_schema = KeySchema::from([(KeyRole::Hash, hash.clone())]);
            }
            many => {
                return Err(KeySchemaError::AmbiguousHashKey {
                    model: model.identifier.to_string(),
                    matches: many.len(),
                }
                .into())
            }
        }
    }

    if options.add_timestamps {
        model.required_imports.insert(USES_TIMESTAMP.to_string());
        model.add_attribute(Attribute::new(CREATED_AT_ATTRIBUTE, "timestamp"));
        model.add_attribute(Attribute::new(UPDATED_AT_ATTRIBUTE, "timestamp"));
    }

    if options.add_soft_delete {
        model.required_imports.insert(USES_TIMESTAMP.to_string());
        model.add_attribute(Attribute::new(DELETED_AT_ATTRIBUTE, "timestamp").nullable());
    }

    if !options.indexes.trim().is_empty() {
        model.indexes = key_schema::parse_indexes(&options.indexes)?;
    }

    model.billing_mode = options.billing_mode;
    model.capacity_units = match options.billing_mode {
        BillingMode::Provisioned => Some(options.capacity),
        BillingMode::OnDemand => None,
    };

    let shape = key_schema::validate(&model)?;
    model.is_composite_key = shape.is_composite();

    info!(
        model = %model.identifier,
        attributes = model.attributes.len(),
        nested = model.nested.len(),
        composite = model.is_composite_key,
        "model built"
    );
    Ok(model)
}

impl Model {
    /// Parses a description into an unkeyed model tree.
    ///
    /// No options are applied and no key schema is resolved; use [`build`]
    /// for a resource.
    pub fn parse(name: &str, is_collection: bool, description: &str) -> Result<Model> {
        Model::assemble(name, is_collection, description).map(|(model, _)| model)
    }

    /// Parses one level of `attributes` and recurses into nested blocks.
    ///
    /// Returns the node and the names of leaves carrying a `:hash` marker.
    fn assemble(
        name: &str,
        is_collection: bool,
        attributes: &str,
    ) -> Result<(Model, Vec<String>)> {
        let ParsedAttributes { leaves, nested } = grammar::parse(attributes)?;

        let mut model = Model {
            identifier: Identifier::new(Identifier::new(name).camel()),
            is_collection,
            attributes: BTreeMap::new(),
            nested: Vec::with_capacity(nested.len()),
            required_imports: BTreeSet::new(),
            key_schema: KeySchema::new(),
            indexes: Vec::new(),
            generated_id: false,
            is_composite_key: false,
            billing_mode: BillingMode::default(),
            capacity_units: None,
        };

        for block in nested {
            let (child, _) = Model::assemble(&block.name, block.is_collection, &block.body)?;
            debug!(parent = %model.identifier, child = %child.identifier, "nested model");
            model.nested.push(child);
        }

        let mut marked_hash: Vec<String> = Vec::new();
        for leaf in leaves {
            let attribute = Attribute::new(&leaf.name, &leaf.semantic_type);
            if let StorageType::Other(tag) = &attribute.storage_type {
                warn!(
                    model = %model.identifier,
                    attribute = %leaf.name,
                    "unrecognized semantic type `{tag}`, passing it through"
                );
            }
            if let Some(capability) = types::capability(&leaf.semantic_type) {
                model.required_imports.insert(capability.to_string());
            }
            if leaf.is_hash && !marked_hash.contains(&leaf.name) {
                marked_hash.push(leaf.name.clone());
            }
            model.add_attribute(attribute);
        }

        Ok((model, marked_hash))
    }

    /// Inserts `attribute`, replacing any attribute with the same name.
    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes
            .insert(attribute.name().to_string(), attribute);
    }

    pub fn hash_key(&self) -> Option<&str> {
        self.key_schema.get(&KeyRole::Hash).map(String::as_str)
    }

    pub fn range_key(&self) -> Option<&str> {
        self.key_schema.get(&KeyRole::Range).map(String::as_str)
    }

    /// Key attributes in `HASH`, `RANGE` order.
    pub fn key_attributes(&self) -> impl Iterator<Item = (KeyRole, &Attribute)> + '_ {
        self.key_schema
            .iter()
            .filter_map(|(role, name)| self.attributes.get(name).map(|a| (*role, a)))
    }

    /// Capability tags of this node and every nested node.
    pub fn collect_imports(&self) -> BTreeSet<String> {
        let mut imports = self.required_imports.clone();
        for child in &self.nested {
            imports.extend(child.collect_imports());
        }
        imports
    }

    /// Type name used when rendering the model, `Vec<T>` for collections.
    pub fn type_name(&self) -> String {
        let pascal = self.identifier.pascal();
        if self.is_collection {
            format!("Vec<{pascal}>")
        } else {
            pascal
        }
    }
}
