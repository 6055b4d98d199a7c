//! Project configuration and on-disk layout.
//!
//! A project directory holds:
//!
//! ```text
//! mug.config.json                      ProjectConfig
//! spec.yml                             ApiSchema for every resource
//! functions/<resource>/serverless.yml  DeploymentManifest
//! functions/<resource>/<resource>.json Model
//! functions/<resource>/secrets.yml     Secrets read by the manifest
//! ```
//!
//! Every write goes through a temporary file in the target directory that
//! is persisted over the destination, so a failed write leaves the previous
//! document in place. A [`Transaction`] serializes several documents before
//! persisting any of them.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::compile::api::ApiSchema;
use crate::error::ConfigConsistencyError;
use crate::manifest::{DeploymentManifest, SECRETS_FILE};
use crate::model::{BillingMode, CapacityUnits, Identifier, KeySchema, Model, StorageType};

pub const CONFIG_FILE: &str = "mug.config.json";
pub const API_SCHEMA_FILE: &str = "spec.yml";
pub const MANIFEST_FILE: &str = "serverless.yml";
pub const FUNCTIONS_DIR: &str = "functions";
pub const DEFAULT_RUNTIME: &str = "provided.al2023";
pub const DEFAULT_REGION: &str = "us-east-1";

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

/// The slice of a model the project configuration remembers.
///
/// Only key attributes are recorded in `attribute_definitions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub identifier: Identifier,
    pub attribute_definitions: BTreeMap<String, StorageType>,
    pub key_schema: KeySchema,
    #[serde(default)]
    pub billing_mode: BillingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_units: Option<CapacityUnits>,
}

impl ResourceSummary {
    pub fn from_model(model: &Model) -> Self {
        Self {
            identifier: model.identifier.clone(),
            attribute_definitions: model
                .key_attributes()
                .map(|(_, attribute)| {
                    (attribute.name().to_string(), attribute.storage_type.clone())
                })
                .collect(),
            key_schema: model.key_schema.clone(),
            billing_mode: model.billing_mode,
            capacity_units: model.capacity_units,
        }
    }
}

/// Project-wide settings and the resources added so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_name: String,
    pub project_path: PathBuf,
    #[serde(default)]
    pub import_path: String,
    pub region: String,
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSummary>,
}

impl ProjectConfig {
    pub fn new(project_name: &str, project_path: impl Into<PathBuf>, region: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            project_path: project_path.into(),
            import_path: String::new(),
            region: region.to_string(),
            runtime: default_runtime(),
            resources: BTreeMap::new(),
        }
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSummary> {
        self.resources.get(name)
    }

    /// Records `summary`, replacing the entry of the same name.
    pub fn add_resource(&mut self, summary: ResourceSummary) {
        let name = summary.identifier.to_string();
        debug!(resource = %name, "resource recorded");
        self.resources.insert(name, summary);
    }

    pub fn remove_resource(
        &mut self,
        name: &str,
    ) -> Result<ResourceSummary, ConfigConsistencyError> {
        self.resources
            .remove(name)
            .ok_or_else(|| ConfigConsistencyError::UnknownResource(name.to_string()))
    }

    /// An empty manifest for the function group `group`.
    pub fn new_manifest(&self, group: &str) -> DeploymentManifest {
        DeploymentManifest::new(
            &format!("{}-{group}", self.project_name),
            &self.region,
            &self.runtime,
        )
    }

    pub fn config_path(&self) -> PathBuf {
        self.project_path.join(CONFIG_FILE)
    }

    pub fn api_schema_path(&self) -> PathBuf {
        self.project_path.join(API_SCHEMA_FILE)
    }

    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.project_path.join(FUNCTIONS_DIR).join(group)
    }

    pub fn manifest_path(&self, group: &str) -> PathBuf {
        self.group_dir(group).join(MANIFEST_FILE)
    }

    pub fn model_path(&self, resource: &str) -> PathBuf {
        self.group_dir(resource).join(format!("{resource}.json"))
    }

    pub fn secrets_path(&self, group: &str) -> PathBuf {
        self.group_dir(group).join(SECRETS_FILE)
    }

    /// Reads `mug.config.json` from `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE);
        let mut config: ProjectConfig = read_json(&path)?;
        config.project_path = project_dir.to_path_buf();
        info!(project = %config.project_name, resources = config.resources.len(), "project config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        write_json(&self.config_path(), self)
    }

    /// Reads the manifest of `group`, or `None` when it does not exist yet.
    pub fn load_manifest(&self, group: &str) -> Result<Option<DeploymentManifest>> {
        read_optional(&self.manifest_path(group), read_yaml)
    }

    pub fn save_manifest(&self, group: &str, manifest: &DeploymentManifest) -> Result<()> {
        write_yaml(&self.manifest_path(group), manifest)
    }

    /// Reads `spec.yml`, or starts a fresh document titled after the project.
    pub fn load_api_schema(&self) -> Result<ApiSchema> {
        Ok(read_optional(&self.api_schema_path(), read_yaml)?
            .unwrap_or_else(|| ApiSchema::new(&self.project_name)))
    }

    pub fn save_api_schema(&self, schema: &ApiSchema) -> Result<()> {
        write_yaml(&self.api_schema_path(), schema)
    }

    pub fn load_model(&self, resource: &str) -> Result<Model> {
        read_json(&self.model_path(resource))
    }

    /// Reads the model of `resource`, or `None` when it was never saved.
    pub fn load_existing_model(&self, resource: &str) -> Result<Option<Model>> {
        read_optional(&self.model_path(resource), read_json)
    }

    /// Reads the secrets of `group`; a missing file holds none.
    pub fn load_secrets(&self, group: &str) -> Result<BTreeMap<String, String>> {
        Ok(read_optional(&self.secrets_path(group), read_yaml)?.unwrap_or_default())
    }

    pub fn save_model(&self, model: &Model) -> Result<()> {
        write_json(&self.model_path(model.identifier.as_str()), model)
    }

    /// Deletes the function group directory of `resource`.
    pub fn remove_group_dir(&self, resource: &str) -> Result<()> {
        let dir = self.group_dir(resource);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Documents serialized to temporary files, persisted together on
/// [`commit`](Transaction::commit).
///
/// Dropping a transaction before committing removes the temporary files and
/// leaves every destination untouched.
#[derive(Debug, Default)]
pub struct Transaction {
    staged: Vec<(PathBuf, NamedTempFile)>,
}

impl Transaction {
    pub fn json<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<&mut Self> {
        let data = json_bytes(path, value)?;
        self.stage(path, &data)
    }

    pub fn yaml<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<&mut Self> {
        let data = yaml_bytes(path, value)?;
        self.stage(path, &data)
    }

    fn stage(&mut self, path: &Path, data: &[u8]) -> Result<&mut Self> {
        let file = stage_file(path, data)?;
        self.staged.push((path.to_path_buf(), file));
        Ok(self)
    }

    /// Persists every staged document in staging order.
    pub fn commit(self) -> Result<()> {
        let count = self.staged.len();
        for (path, file) in self.staged {
            file.persist(&path)
                .with_context(|| format!("Failed to replace {}", path.display()))?;
        }
        debug!(documents = count, "transaction committed");
        Ok(())
    }
}

fn read_optional<T>(path: &Path, read: fn(&Path) -> Result<T>) -> Result<Option<T>> {
    if path.exists() {
        read(path).map(Some)
    } else {
        Ok(None)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn json_bytes<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    let mut data = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    data.push('\n');
    Ok(data.into_bytes())
}

fn yaml_bytes<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    let data = serde_yaml::to_string(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    Ok(data.into_bytes())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomically(path, &json_bytes(path, value)?)
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomically(path, &yaml_bytes(path, value)?)
}

fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    stage_file(path, data)?
        .persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    debug!(path = %path.display(), bytes = data.len(), "written");
    Ok(())
}

/// Writes `data` to a temporary file next to `path`.
fn stage_file(path: &Path, data: &[u8]) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    file.write_all(data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{build, GenerationOptions, KeyRole};
    use tempfile::TempDir;

    fn enrollment() -> Model {
        let options = GenerationOptions {
            explicit_key_schema: "courseId:HASH,userId:RANGE".to_string(),
            billing_mode: BillingMode::OnDemand,
            ..Default::default()
        };
        build("enrollment", false, "courseId,userId,grade:int", &options).unwrap()
    }

    #[test]
    fn summary_keeps_only_key_attributes() {
        let summary = ResourceSummary::from_model(&enrollment());
        let names: Vec<&String> = summary.attribute_definitions.keys().collect();
        assert_eq!(names, vec!["courseId", "userId"]);
        assert_eq!(summary.key_schema[&KeyRole::Range], "userId");
        assert_eq!(summary.capacity_units, None);
    }

    #[test]
    fn removing_unknown_resource_fails() {
        let mut config = ProjectConfig::new("shop", "/tmp/shop", DEFAULT_REGION);
        config.add_resource(ResourceSummary::from_model(&enrollment()));
        let before = config.clone();
        assert_eq!(
            config.remove_resource("course").unwrap_err(),
            ConfigConsistencyError::UnknownResource("course".to_string())
        );
        assert_eq!(config, before);
        assert!(config.remove_resource("enrollment").is_ok());
        assert!(config.resources.is_empty());
    }

    #[test]
    fn new_manifest_is_named_after_group() {
        let config = ProjectConfig::new("shop", "/tmp/shop", "eu-central-1");
        let manifest = config.new_manifest("_");
        assert_eq!(manifest.service, "shop-_");
        assert_eq!(manifest.provider.region, "eu-central-1");
        assert!(manifest.functions.is_empty());
        assert!(manifest.resources.is_empty());
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let mut config = ProjectConfig::new("shop", dir.path(), DEFAULT_REGION);
        config.add_resource(ResourceSummary::from_model(&enrollment()));
        config.save().unwrap();

        let loaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);

        let raw = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(raw.contains("\"projectName\": \"shop\""));
    }

    #[test]
    fn missing_documents() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::new("shop", dir.path(), DEFAULT_REGION);
        assert!(config.load_manifest("course").unwrap().is_none());
        assert_eq!(config.load_api_schema().unwrap(), ApiSchema::new("shop"));
        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn model_and_manifest_are_stored_per_group() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::new("shop", dir.path(), DEFAULT_REGION);
        let model = enrollment();
        let manifest = config.new_manifest("enrollment");

        config.save_model(&model).unwrap();
        config.save_manifest("enrollment", &manifest).unwrap();

        assert!(dir.path().join("functions/enrollment/enrollment.json").exists());
        assert_eq!(config.load_model("enrollment").unwrap(), model);
        assert_eq!(config.load_manifest("enrollment").unwrap(), Some(manifest));

        config.remove_group_dir("enrollment").unwrap();
        assert!(!config.group_dir("enrollment").exists());
    }

    #[test]
    fn transaction_writes_nothing_until_commit() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::new("shop", dir.path(), DEFAULT_REGION);
        let model = enrollment();

        let mut writes = Transaction::default();
        writes
            .json(&config.model_path("enrollment"), &model)
            .unwrap()
            .yaml(&config.api_schema_path(), &ApiSchema::new("shop"))
            .unwrap();
        assert!(!config.model_path("enrollment").exists());
        assert!(!config.api_schema_path().exists());

        writes.commit().unwrap();
        assert_eq!(config.load_existing_model("enrollment").unwrap(), Some(model));
        assert!(config.api_schema_path().exists());

        let mut dropped = Transaction::default();
        dropped.json(&config.config_path(), &config).unwrap();
        drop(dropped);
        assert!(!config.config_path().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn missing_secrets_file_holds_none() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::new("shop", dir.path(), DEFAULT_REGION);
        assert!(config.load_secrets("course").unwrap().is_empty());
        assert!(config.load_existing_model("course").unwrap().is_none());
    }
}
