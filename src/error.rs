use thiserror::Error;

/// Malformed attribute description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("unbalanced '{bracket}' in attribute description near `{fragment}`")]
    Unbalanced { bracket: char, fragment: String },
    #[error("nested block without a name near `{fragment}`")]
    UnnamedNested { fragment: String },
    #[error("malformed attribute term `{term}`")]
    MalformedTerm { term: String },
}

/// Key schema that cannot be resolved against the attribute set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySchemaError {
    #[error("no hash key identifiable for `{model}`")]
    NoHashKey { model: String },
    #[error("ambiguous key schema for `{model}`: {matches} attributes match the hash key")]
    AmbiguousHashKey { model: String, matches: usize },
    #[error("range key `{attribute}` of `{model}` is not an attribute")]
    UnknownRangeKey { model: String, attribute: String },
    #[error("range key `{attribute}` declared without a hash key on `{model}`")]
    RangeWithoutHash { model: String, attribute: String },
    #[error("malformed key schema term `{term}`, expected `attribute:HASH|RANGE`")]
    MalformedTerm { term: String },
    #[error("unknown key role `{role}`")]
    UnknownRole { role: String },
    #[error("index `{index}` references missing attribute `{attribute}`")]
    UnknownIndexKey { index: String, attribute: String },
    #[error("local index `{index}` must share the table hash key `{hash}`")]
    LocalIndexHashMismatch { index: String, hash: String },
    #[error("key attribute `{attribute}` has non-scalar type `{storage}`, expected S, N or B")]
    NonScalarKey { attribute: String, storage: String },
    #[error("malformed index declaration `{term}`, expected `name:local|global:hash[:range]`")]
    MalformedIndex { term: String },
}

/// Amendment referencing something the current config does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigConsistencyError {
    #[error("resource `{0}` does not exist")]
    UnknownResource(String),
    #[error("function `{0}` does not exist")]
    UnknownFunction(String),
    #[error("manifest resource `{0}` does not exist")]
    UnknownManifestResource(String),
    #[error("table resource `{0}` has no properties to provision")]
    MissingTableProperties(String),
    #[error("secret `{key}` is not set for function group `{group}`")]
    MissingSecret { group: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaffoldError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    KeySchema(#[from] KeySchemaError),
    #[error(transparent)]
    Config(#[from] ConfigConsistencyError),
}

pub type Result<T, E = ScaffoldError> = std::result::Result<T, E>;
