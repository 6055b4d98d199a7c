//! Scaffolding compiler for serverless CRUDL backends.
//!
//! An attribute description such as `name,price:float64,tags[label]` is
//! parsed into a [`model::Model`], validated against DynamoDB key rules and
//! projected into a `serverless.yml` manifest and an OpenAPI document that
//! agree on every route, key and schema name.

pub mod compile;
pub mod config;
pub mod dynamodb;
pub mod error;
pub mod manifest;
pub mod model;
pub mod project;
pub mod utils;

pub use compile::compile_resource;

#[cfg(test)]
mod tests;
