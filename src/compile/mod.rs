//! # Compilers
//!
//! Project a validated [`Model`] into its deployable artifacts.
//!
//! - `deployment`: CRUDL functions, the table resource and its environment
//!   wiring in a [`DeploymentManifest`](crate::manifest::DeploymentManifest).
//! - `api`: the OpenAPI document for the same functions.
//!
//! Both read names only through [`Identifier`](crate::model::Identifier),
//! so routes, function names and schema names always agree.

pub mod api;
pub mod deployment;

use tracing::{info, instrument};

use crate::config::ProjectConfig;
use crate::error::Result;
use crate::model::{self, GenerationOptions, Model};

pub use api::ApiSchema;
pub use deployment::{CompiledFunction, CompiledResource, Crudl};

/// Every artifact of one "add resource" run.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub model: Model,
    pub resource: CompiledResource,
    pub api_schema: ApiSchema,
}

/// Runs parse, build, validate and both compilers for one resource.
///
/// Nothing is compiled unless the model validates.
#[instrument(skip(project, attributes, options))]
pub fn compile_resource(
    project: &ProjectConfig,
    name: &str,
    is_collection: bool,
    attributes: &str,
    options: &GenerationOptions,
) -> Result<Artifacts> {
    let model = model::build(name, is_collection, attributes, options)?;
    let resource = deployment::compile(&model, project);
    let api_schema = api::compile(&model, &resource.manifest);
    info!(
        resource = %model.identifier,
        functions = resource.functions.len(),
        "resource compiled"
    );
    Ok(Artifacts {
        model,
        resource,
        api_schema,
    })
}
