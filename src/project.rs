//! Project-level operations: compile in memory, stage every touched
//! document, then persist them together. Nothing is written when
//! compilation, a consistency check or serialization fails.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::compile::{self, deployment, Artifacts};
use crate::config::{ProjectConfig, Transaction};
use crate::error::ConfigConsistencyError;
use crate::manifest::{DeploymentManifest, FunctionDef, USER_POOL_SECRET};
use crate::model::GenerationOptions;

/// Compiles a resource and merges it into the project.
///
/// An existing manifest for the resource is amended in place, so custom
/// functions and authorization settings survive a regeneration.
#[instrument(skip(project, attributes, options))]
pub fn add_resource(
    project: &mut ProjectConfig,
    name: &str,
    is_collection: bool,
    attributes: &str,
    options: &GenerationOptions,
) -> Result<Artifacts> {
    let artifacts = compile::compile_resource(project, name, is_collection, attributes, options)?;
    let model = &artifacts.model;
    let group = model.identifier.as_str();

    let manifest = match project.load_manifest(group)? {
        Some(mut existing) => {
            deployment::amend(&mut existing, model, &project.project_name);
            existing
        }
        None => artifacts.resource.manifest.clone(),
    };
    let mut api_schema = project.load_api_schema()?;
    if let Some(previous) = project.load_existing_model(group)? {
        api_schema.remove_model(&previous);
    }
    api_schema.add_model(model, &manifest);

    let mut updated = project.clone();
    updated.add_resource(artifacts.resource.summary.clone());

    let mut writes = Transaction::default();
    writes
        .json(&project.model_path(group), model)?
        .yaml(&project.manifest_path(group), &manifest)?
        .yaml(&project.api_schema_path(), &api_schema)?
        .json(&project.config_path(), &updated)?;
    writes.commit()?;
    *project = updated;

    info!(resource = group, "resource added");
    Ok(artifacts)
}

/// Removes a resource's summary, function group and API entries.
#[instrument(skip(project))]
pub fn remove_resource(project: &mut ProjectConfig, name: &str) -> Result<()> {
    if project.resource(name).is_none() {
        return Err(ConfigConsistencyError::UnknownResource(name.to_string()).into());
    }
    let model = project
        .load_model(name)
        .with_context(|| format!("Failed to load the model of '{name}'"))?;

    let mut api_schema = project.load_api_schema()?;
    api_schema.remove_model(&model);
    let mut updated = project.clone();
    updated.remove_resource(name)?;

    let mut writes = Transaction::default();
    writes
        .yaml(&project.api_schema_path(), &api_schema)?
        .json(&project.config_path(), &updated)?;
    project.remove_group_dir(name)?;
    writes.commit()?;
    *project = updated;

    info!(resource = name, "resource removed");
    Ok(())
}

/// Adds a custom function to `group`, creating the group's manifest when
/// needed. Returns the function name.
#[instrument(skip(project))]
pub fn add_function(
    project: &ProjectConfig,
    group: &str,
    verb: &str,
    path: &str,
    method: &str,
) -> Result<String> {
    let mut manifest = load_or_new_manifest(project, group)?;
    let name = deployment::function_name(group, verb);
    manifest.add_function(&name, FunctionDef::http(verb, path, method));
    project.save_manifest(group, &manifest)?;
    Ok(name)
}

#[instrument(skip(project))]
pub fn remove_function(project: &ProjectConfig, group: &str, name: &str) -> Result<()> {
    let mut manifest = project
        .load_manifest(group)?
        .ok_or_else(|| ConfigConsistencyError::UnknownFunction(name.to_string()))?;
    manifest.remove_function(name)?;
    project.save_manifest(group, &manifest)
}

/// Turns the Cognito authorizer on or off for a function group.
///
/// Enabling stores `pool` as the group's user pool secret and exposes it to
/// the functions. Without a `pool`, a previously stored one is reused.
#[instrument(skip(project))]
pub fn set_auth(
    project: &ProjectConfig,
    group: &str,
    enabled: bool,
    excludes: &[&str],
    pool: Option<&str>,
) -> Result<()> {
    let mut manifest = load_or_new_manifest(project, group)?;
    manifest.remove_auth();
    if !enabled {
        return project.save_manifest(group, &manifest);
    }

    let mut secrets = project.load_secrets(group)?;
    if let Some(pool) = pool {
        secrets.insert(USER_POOL_SECRET.to_string(), pool.to_string());
    }
    if !secrets.contains_key(USER_POOL_SECRET) {
        return Err(ConfigConsistencyError::MissingSecret {
            group: group.to_string(),
            key: USER_POOL_SECRET.to_string(),
        }
        .into());
    }
    manifest.add_auth(excludes);
    manifest.add_secret_env([USER_POOL_SECRET]);

    let mut writes = Transaction::default();
    writes
        .yaml(&project.secrets_path(group), &secrets)?
        .yaml(&project.manifest_path(group), &manifest)?;
    writes.commit()?;
    info!(group, "user pool stored");
    Ok(())
}

fn load_or_new_manifest(project: &ProjectConfig, group: &str) -> Result<DeploymentManifest> {
    Ok(project
        .load_manifest(group)?
        .unwrap_or_else(|| project.new_manifest(group)))
}
