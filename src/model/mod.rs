//! # Resource Model
//!
//! Turns a compact attribute description into a typed, validated [`Model`]
//! tree.
//!
//! ## Components
//!
//! - `grammar`: splits a description into leaf terms and nested blocks.
//! - `types`: maps semantic type tags onto DynamoDB and OpenAPI types.
//! - `builder`: assembles the [`Model`] and applies [`GenerationOptions`].
//! - `key_schema`: resolves and checks the primary key and secondary indexes.
//! - `identifier`: the naming rules every generated artifact shares.
//!
//! ## Example
//!
//! ```
//! use mug_scaffold::model::{build, GenerationOptions};
//!
//! let options = GenerationOptions {
//!     explicit_key_schema: "courseId:HASH,userId:RANGE".to_string(),
//!     ..Default::default()
//! };
//! let enrollment = build("enrollment", false, "courseId,userId,grade:int", &options)?;
//! assert!(enrollment.is_composite_key);
//! # Ok::<(), mug_scaffold::error::ScaffoldError>(())
//! ```

mod builder;
pub mod grammar;
mod identifier;
pub mod key_schema;
pub mod types;

pub use builder::{
    build, Attribute, BillingMode, CapacityUnits, GenerationOptions, Model, CREATED_AT_ATTRIBUTE,
    DELETED_AT_ATTRIBUTE, ID_ATTRIBUTE, UPDATED_AT_ATTRIBUTE,
};
pub use identifier::Identifier;
pub use key_schema::{IndexKind, KeyRole, KeySchema, KeyShape, SecondaryIndex};
pub use types::StorageType;
