//! # DynamoDB Module
//!
//! Creates the tables of generated resources on a local DynamoDB endpoint.
//!
//! ## Components
//!
//! - `TableProvisioner`: A client wrapper that creates, replaces and inspects tables.
//! - `LocalTable`: A compiled table resource converted into SDK types.
//!
//! ## Usage
//!
//! The SDK configuration is read from the environment:
//!
//! - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`: any values work for DynamoDB Local.
//! - `AWS_REGION`: the region reported to the emulator.
//! - `AWS_ENDPOINT_URL`: an explicit endpoint. When unset, `MUG_DYNAMODB_ENDPOINT`
//!   is used, falling back to `http://localhost:8000`.
//!
//! ## Example
//!
//! ```no_run
//! use mug_scaffold::config::ProjectConfig;
//! use mug_scaffold::dynamodb::{self, TableProvisioner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let project = ProjectConfig::load(std::path::Path::new("."))?;
//!     let model = project.load_model("course")?;
//!
//!     let sdk_config = dynamodb::local_sdk_config().await;
//!     let provisioner = TableProvisioner::new(&sdk_config);
//!     let table = dynamodb::local_table(&project.project_name, &model, "dev")?;
//!     provisioner.provision(&table, false).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod table;

pub use client::TableProvisioner;
pub use table::LocalTable;

use anyhow::Result;
use std::env;

use crate::compile::deployment;
use crate::error::ConfigConsistencyError;
use crate::manifest::ResourceProperties;
use crate::model::Model;

pub const ENDPOINT_ENV: &str = "MUG_DYNAMODB_ENDPOINT";
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:8000";

/// Loads the SDK configuration, pointing at the local endpoint unless
/// `AWS_ENDPOINT_URL` is set.
pub async fn local_sdk_config() -> aws_config::SdkConfig {
    if env::var_os("AWS_ENDPOINT_URL").is_some() {
        return aws_config::load_from_env().await;
    }
    let endpoint = env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_LOCAL_ENDPOINT.to_string());
    aws_config::from_env().endpoint_url(endpoint).load().await
}

/// The local table of `model` for `stage`.
pub fn local_table(project: &str, model: &Model, stage: &str) -> Result<LocalTable> {
    match deployment::table_resource(model).properties {
        ResourceProperties::Table(properties) => LocalTable::from_properties(
            &deployment::table_name(project, model, stage),
            &properties,
        ),
        ResourceProperties::Authorizer(_) => Err(ConfigConsistencyError::MissingTableProperties(
            deployment::table_resource_name(model),
        )
        .into()),
    }
}
