use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::KeySchemaError;
use crate::model::Model;

/// Role of a key attribute. Ordering puts `HASH` before `RANGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyRole {
    Hash,
    Range,
}

impl KeyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRole::Hash => "HASH",
            KeyRole::Range => "RANGE",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyRole {
    type Err = KeySchemaError;

    fn from_str(role: &str) -> Result<Self, Self::Err> {
        match role.trim().to_uppercase().as_str() {
            "HASH" => Ok(KeyRole::Hash),
            "RANGE" => Ok(KeyRole::Range),
            other => Err(KeySchemaError::UnknownRole {
                role: other.to_string(),
            }),
        }
    }
}

/// Role to attribute name.
pub type KeySchema = BTreeMap<KeyRole, String>;

/// Parses `attribute:ROLE` pairs, e.g. `courseId:HASH,userId:range`.
///
/// A role given twice keeps the last attribute.
pub fn parse_key_schema(schema: &str) -> Result<KeySchema, KeySchemaError> {
    let mut keys = KeySchema::new();
    for term in schema.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (attribute, role) = term
            .split_once(':')
            .filter(|(attribute, _)| !attribute.trim().is_empty())
            .ok_or_else(|| KeySchemaError::MalformedTerm {
                term: term.to_string(),
            })?;
        keys.insert(role.parse()?, attribute.trim().to_string());
    }
    Ok(keys)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Local,
    Global,
}

/// A secondary index over the resource table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryIndex {
    pub name: String,
    pub kind: IndexKind,
    pub key_schema: KeySchema,
}

impl SecondaryIndex {
    pub fn hash_key(&self) -> Option<&str> {
        self.key_schema.get(&KeyRole::Hash).map(String::as_str)
    }

    pub fn range_key(&self) -> Option<&str> {
        self.key_schema.get(&KeyRole::Range).map(String::as_str)
    }
}

/// Parses `name:local|global:hash[:range]` declarations separated by commas.
pub fn parse_indexes(declarations: &str) -> Result<Vec<SecondaryIndex>, KeySchemaError> {
    declarations
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|declaration| {
            let malformed = || KeySchemaError::MalformedIndex {
                term: declaration.to_string(),
            };
            let parts: Vec<&str> = declaration.split(':').map(str::trim).collect();
            if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
                return Err(malformed());
            }
            let kind = match parts[1].to_lowercase().as_str() {
                "local" => IndexKind::Local,
                "global" => IndexKind::Global,
                _ => return Err(malformed()),
            };
            let mut key_schema = KeySchema::from([(KeyRole::Hash, parts[2].to_string())]);
            if let Some(range) = parts.get(3) {
                key_schema.insert(KeyRole::Range, (*range).to_string());
            }
            Ok(SecondaryIndex {
                name: parts[0].to_string(),
                kind,
                key_schema,
            })
        })
        .collect()
}

/// Resolved primary key of a valid model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape {
    Simple { hash: String },
    Composite { hash: String, range: String },
}

impl KeyShape {
    pub fn is_composite(&self) -> bool {
        matches!(self, KeyShape::Composite { .. })
    }
}

/// Checks the key schema and secondary indexes of `model` against its
/// attributes.
///
/// Pure: nothing on the model is touched. The caller decides what to do with
/// the resolved [`KeyShape`].
pub fn validate(model: &Model) -> Result<KeyShape, KeySchemaError> {
    let name = model.identifier.to_string();
    let hash = model.key_schema.get(&KeyRole::Hash);
    let range = model.key_schema.get(&KeyRole::Range);

    let hash = match (hash, range) {
        (Some(hash), _) => hash,
        (None, Some(range)) => {
            return Err(KeySchemaError::RangeWithoutHash {
                model: name,
                attribute: range.clone(),
            })
        }
        (None, None) => return Err(KeySchemaError::NoHashKey { model: name }),
    };

    match model.attributes.keys().filter(|n| *n == hash).count() {
        0 => return Err(KeySchemaError::NoHashKey { model: name }),
        1 => {}
        matches => {
            return Err(KeySchemaError::AmbiguousHashKey {
                model: name,
                matches,
            })
        }
    }

    if let Some(range) = range {
        if !model.attributes.contains_key(range) {
            return Err(KeySchemaError::UnknownRangeKey {
                model: name,
                attribute: range.clone(),
            });
        }
    }

    for index in &model.indexes {
        for attribute in index.key_schema.values() {
            if !model.attributes.contains_key(attribute) {
                return Err(KeySchemaError::UnknownIndexKey {
                    index: index.name.clone(),
                    attribute: attribute.clone(),
                });
            }
        }
        if index.kind == IndexKind::Local && index.hash_key() != Some(hash.as_str()) {
            return Err(KeySchemaError::LocalIndexHashMismatch {
                index: index.name.clone(),
                hash: hash.clone(),
            });
        }
    }

    let key_names = model
        .key_schema
        .values()
        .chain(model.indexes.iter().flat_map(|index| index.key_schema.values()));
    for (name, attribute) in key_names.filter_map(|name| Some((name, model.attributes.get(name)?))) {
        if !attribute.storage_type.is_scalar_key() {
            return Err(KeySchemaError::NonScalarKey {
                attribute: name.clone(),
                storage: attribute.storage_type.to_string(),
            });
        }
    }

    let shape = match range {
        Some(range) => KeyShape::Composite {
            hash: hash.clone(),
            range: range.clone(),
        },
        None => KeyShape::Simple { hash: hash.clone() },
    };
    debug!(model = %model.identifier, ?shape, "key schema valid");
    Ok(shape)
}
