//! Semantic type resolution.
//!
//! [`TYPE_TABLE`] is the one place that decides how a semantic type tag from
//! the attribute grammar maps onto a DynamoDB attribute type code and an
//! OpenAPI primitive. Add a row to support a new tag. Tags missing from the
//! table pass through unchanged: the storage code becomes
//! [`StorageType::Other`] and the API schema repeats the tag verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const USES_TIMESTAMP: &str = "uses-timestamp";
pub const USES_UUID: &str = "uses-uuid";
pub const USES_IDENTIFIER_GENERATION: &str = "uses-identifier-generation";

/// DynamoDB attribute type code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageType {
    String,
    StringSet,
    Number,
    NumberSet,
    Map,
    Binary,
    BinarySet,
    Boolean,
    /// Unrecognized semantic type, carried through verbatim.
    Other(String),
}

impl StorageType {
    pub fn code(&self) -> &str {
        match self {
            StorageType::String => "S",
            StorageType::StringSet => "SS",
            StorageType::Number => "N",
            StorageType::NumberSet => "NS",
            StorageType::Map => "M",
            StorageType::Binary => "B",
            StorageType::BinarySet => "BS",
            StorageType::Boolean => "BOOL",
            StorageType::Other(tag) => tag,
        }
    }

    /// Whether DynamoDB accepts the type on a table or index key.
    pub fn is_scalar_key(&self) -> bool {
        matches!(
            self,
            StorageType::String | StorageType::Number | StorageType::Binary
        )
    }
}

impl From<String> for StorageType {
    fn from(code: String) -> Self {
        match code.as_str() {
            "S" => StorageType::String,
            "SS" => StorageType::StringSet,
            "N" => StorageType::Number,
            "NS" => StorageType::NumberSet,
            "M" => StorageType::Map,
            "B" => StorageType::Binary,
            "BS" => StorageType::BinarySet,
            "BOOL" => StorageType::Boolean,
            _ => StorageType::Other(code),
        }
    }
}

impl From<StorageType> for String {
    fn from(storage: StorageType) -> Self {
        storage.code().to_string()
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// OpenAPI primitive for a semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiType {
    pub schema_type: &'static str,
    pub format: Option<&'static str>,
    /// Item type when `schema_type` is `array`.
    pub items: Option<&'static str>,
}

impl ApiType {
    const fn plain(schema_type: &'static str) -> Self {
        Self {
            schema_type,
            format: None,
            items: None,
        }
    }

    const fn formatted(schema_type: &'static str, format: &'static str) -> Self {
        Self {
            schema_type,
            format: Some(format),
            items: None,
        }
    }

    const fn array_of(items: &'static str) -> Self {
        Self {
            schema_type: "array",
            format: None,
            items: Some(items),
        }
    }
}

#[derive(Debug)]
pub struct TypeMapping {
    pub semantic: &'static str,
    pub storage: StorageType,
    pub api: ApiType,
    pub capability: Option<&'static str>,
}

const fn row(
    semantic: &'static str,
    storage: StorageType,
    api: ApiType,
    capability: Option<&'static str>,
) -> TypeMapping {
    TypeMapping {
        semantic,
        storage,
        api,
        capability,
    }
}

/// Keys are normalized: lowercase, no leading `*`.
pub static TYPE_TABLE: &[TypeMapping] = &[
    row("string", StorageType::String, ApiType::plain("string"), None),
    row("text", StorageType::String, ApiType::plain("string"), None),
    row("identifier", StorageType::String, ApiType::plain("string"), Some(USES_UUID)),
    row("uuid", StorageType::String, ApiType::formatted("string", "uuid"), Some(USES_UUID)),
    row("uuid.uuid", StorageType::String, ApiType::formatted("string", "uuid"), Some(USES_UUID)),
    row("timestamp", StorageType::String, ApiType::formatted("string", "date-time"), Some(USES_TIMESTAMP)),
    row("datetime", StorageType::String, ApiType::formatted("string", "date-time"), Some(USES_TIMESTAMP)),
    row("time.time", StorageType::String, ApiType::formatted("string", "date-time"), Some(USES_TIMESTAMP)),
    row("date", StorageType::String, ApiType::formatted("string", "date"), Some(USES_TIMESTAMP)),
    row("int", StorageType::Number, ApiType::plain("integer"), None),
    row("integer", StorageType::Number, ApiType::plain("integer"), None),
    row("int8", StorageType::Number, ApiType::plain("integer"), None),
    row("int16", StorageType::Number, ApiType::plain("integer"), None),
    row("int32", StorageType::Number, ApiType::formatted("integer", "int32"), None),
    row("int64", StorageType::Number, ApiType::formatted("integer", "int64"), None),
    row("uint", StorageType::Number, ApiType::plain("integer"), None),
    row("uint8", StorageType::Number, ApiType::plain("integer"), None),
    row("uint16", StorageType::Number, ApiType::plain("integer"), None),
    row("uint32", StorageType::Number, ApiType::formatted("integer", "int32"), None),
    row("uint64", StorageType::Number, ApiType::formatted("integer", "int64"), None),
    row("byte", StorageType::Number, ApiType::plain("integer"), None),
    row("rune", StorageType::Number, ApiType::plain("integer"), None),
    row("float", StorageType::Number, ApiType::formatted("number", "float"), None),
    row("float32", StorageType::Number, ApiType::formatted("number", "float"), None),
    row("float64", StorageType::Number, ApiType::formatted("number", "double"), None),
    row("double", StorageType::Number, ApiType::formatted("number", "double"), None),
    row("number", StorageType::Number, ApiType::plain("number"), None),
    row("decimal", StorageType::Number, ApiType::plain("number"), None),
    row("bool", StorageType::Boolean, ApiType::plain("boolean"), None),
    row("boolean", StorageType::Boolean, ApiType::plain("boolean"), None),
    row("bytes", StorageType::Binary, ApiType::formatted("string", "byte"), None),
    row("binary", StorageType::Binary, ApiType::formatted("string", "byte"), None),
    row("list<string>", StorageType::StringSet, ApiType::array_of("string"), None),
    row("set<string>", StorageType::StringSet, ApiType::array_of("string"), None),
    row("list<int>", StorageType::NumberSet, ApiType::array_of("integer"), None),
    row("list<int64>", StorageType::NumberSet, ApiType::array_of("integer"), None),
    row("list<number>", StorageType::NumberSet, ApiType::array_of("number"), None),
    row("list<float64>", StorageType::NumberSet, ApiType::array_of("number"), None),
    row("set<number>", StorageType::NumberSet, ApiType::array_of("number"), None),
    row("list<bytes>", StorageType::BinarySet, ApiType::array_of("string"), None),
    row("list<binary>", StorageType::BinarySet, ApiType::array_of("string"), None),
    row("map", StorageType::Map, ApiType::plain("object"), None),
    row("object", StorageType::Map, ApiType::plain("object"), None),
];

/// Normalizes a semantic type tag for table lookup.
pub fn normalize(semantic: &str) -> String {
    semantic.trim().trim_start_matches('*').to_lowercase()
}

pub fn lookup(semantic: &str) -> Option<&'static TypeMapping> {
    let key = normalize(semantic);
    TYPE_TABLE.iter().find(|mapping| mapping.semantic == key)
}

/// Resolves the storage code, passing unknown tags through unchanged.
pub fn storage_type(semantic: &str) -> StorageType {
    match lookup(semantic) {
        Some(mapping) => mapping.storage.clone(),
        None => StorageType::Other(semantic.trim().to_string()),
    }
}

/// Resolves the API primitive; `None` means the tag passes through.
pub fn api_type(semantic: &str) -> Option<ApiType> {
    lookup(semantic).map(|mapping| mapping.api)
}

pub fn capability(semantic: &str) -> Option<&'static str> {
    lookup(semantic).and_then(|mapping| mapping.capability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_types() {
        assert_eq!(storage_type("string"), StorageType::String);
        assert_eq!(storage_type("float64"), StorageType::Number);
        assert_eq!(storage_type("list<string>"), StorageType::StringSet);
        assert_eq!(storage_type("list<int>"), StorageType::NumberSet);
        assert_eq!(storage_type("map"), StorageType::Map);
        assert_eq!(storage_type("bytes"), StorageType::Binary);
        assert_eq!(storage_type("list<binary>"), StorageType::BinarySet);
        assert_eq!(storage_type("bool"), StorageType::Boolean);
    }

    #[test]
    fn normalizes_case_and_pointer_marker() {
        assert_eq!(storage_type("*time.Time"), StorageType::String);
        assert_eq!(storage_type(" Timestamp "), StorageType::String);
        assert_eq!(capability("*time.Time"), Some(USES_TIMESTAMP));
    }

    #[test]
    fn unknown_types_pass_through() {
        assert_eq!(
            storage_type("geoPoint"),
            StorageType::Other("geoPoint".to_string())
        );
        assert_eq!(api_type("geoPoint"), None);
    }

    #[test]
    fn api_primitives() {
        assert_eq!(api_type("int64").unwrap().schema_type, "integer");
        assert_eq!(api_type("float32").unwrap().format, Some("float"));
        assert_eq!(api_type("float64").unwrap().format, Some("double"));
        assert_eq!(api_type("timestamp").unwrap().format, Some("date-time"));
        assert_eq!(api_type("list<string>").unwrap().items, Some("string"));
    }

    #[test]
    fn storage_codes_round_trip_through_strings() {
        for code in ["S", "SS", "N", "NS", "M", "B", "BS", "BOOL", "weird"] {
            let storage = StorageType::from(code.to_string());
            assert_eq!(String::from(storage), code);
        }
    }

    #[test]
    fn table_keys_are_normalized() {
        for mapping in TYPE_TABLE {
            assert_eq!(normalize(mapping.semantic), mapping.semantic);
        }
    }
}
