//! OpenAPI 3 document for the generated CRUDL endpoints.
//!
//! Paths and component schemas are keyed by name, so a document read back
//! from `spec.yml` can be amended one resource at a time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::compile::deployment::{operation_name, Crudl};
use crate::manifest::{DeploymentManifest, FunctionDef};
use crate::model::{types, Attribute, Model};

pub const OPENAPI_VERSION: &str = "3.0.0";
pub const API_VERSION: &str = "1.0.0";
const JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSchema {
    pub openapi: String,
    pub info: Info,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: &str) -> Option<&mut Option<Operation>> {
        match method {
            "get" => Some(&mut self.get),
            "post" => Some(&mut self.post),
            "put" => Some(&mut self.put),
            "patch" => Some(&mut self.patch),
            "delete" => Some(&mut self.delete),
            _ => None,
        }
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [&self.get, &self.post, &self.put, &self.patch, &self.delete]
            .into_iter()
            .flatten()
    }

    fn is_empty(&self) -> bool {
        self.operations().next().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub summary: String,
    pub description: String,
    pub operation_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    #[serde(default)]
    pub description: String,
    pub schema: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub description: String,
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// The subset of the OpenAPI schema object the generator emits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
}

impl Schema {
    pub fn reference(component: &str) -> Self {
        Self {
            reference: Some(format!("#/components/schemas/{component}")),
            ..Default::default()
        }
    }

    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    pub fn array_of(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Schema::typed("array")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
}

impl ApiSchema {
    pub fn new(title: &str) -> Self {
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: title.to_string(),
                version: API_VERSION.to_string(),
            },
            paths: BTreeMap::new(),
            components: Components::default(),
        }
    }

    /// Adds the model's operations and component schemas, replacing any
    /// previous ones with the same names.
    ///
    /// Every operation already tagged with the model is dropped first, so a
    /// route the manifest no longer has does not survive a regeneration.
    /// Routes and methods are taken from the manifest's functions; a
    /// generated function missing from the manifest gets no operation.
    #[instrument(skip(self, model, manifest), fields(model = %model.identifier))]
    pub fn add_model(&mut self, model: &Model, manifest: &DeploymentManifest) {
        self.remove_operations(&model.identifier.plural_camel());
        for operation in Crudl::ALL {
            let name = operation_name(model, operation);
            let Some(function) = manifest.function(&name) else {
                debug!(function = %name, "function not in manifest, skipping");
                continue;
            };
            self.add_operation(model, &name, function);
        }
        self.add_components(model, &model.identifier.singular_pascal());
        info!(paths = self.paths.len(), "api schema amended");
    }

    /// Drops every path tagged with the model and its component schemas.
    pub fn remove_model(&mut self, model: &Model) {
        self.remove_operations(&model.identifier.plural_camel());
        self.components
            .schemas
            .remove(&model.identifier.plural_pascal());
        for name in component_names(model, &model.identifier.singular_pascal()) {
            self.components.schemas.remove(&name);
        }
        info!(model = %model.identifier, "model removed from api schema");
    }

    fn remove_operations(&mut self, tag: &str) {
        for item in self.paths.values_mut() {
            for slot in [
                &mut item.get,
                &mut item.post,
                &mut item.put,
                &mut item.patch,
                &mut item.delete,
            ] {
                if slot
                    .as_ref()
                    .is_some_and(|op| op.tags.iter().any(|t| t == tag))
                {
                    *slot = None;
                }
            }
        }
        self.paths.retain(|_, item| !item.is_empty());
    }

    fn add_operation(&mut self, model: &Model, name: &str, function: &FunctionDef) {
        let (Some(route), Some(kind)) = (function.route(), Crudl::from_verb(function.verb()))
        else {
            debug!(function = name, handler = %function.handler, "no CRUDL operation for handler");
            return;
        };

        let singular = model.identifier.singular_pascal();
        let plural = model.identifier.plural_pascal();
        let mut operation = Operation {
            summary: format!("{} {singular}", capitalize(kind.verb())),
            description: String::new(),
            operation_id: name.to_string(),
            tags: vec![model.identifier.plural_camel()],
            parameters: Vec::new(),
            request_body: None,
            responses: BTreeMap::new(),
        };

        match kind {
            Crudl::Create => {
                operation.description = format!("Creates a new {singular} object.");
                operation.request_body = Some(request_body(&singular));
                operation
                    .responses
                    .insert("200".to_string(), json_response(&singular, &singular));
            }
            Crudl::Read => {
                operation.description = format!("Retrieves the details of an existing {singular}.");
                operation.parameters = key_parameters(model, "retrieve");
                operation
                    .responses
                    .insert("200".to_string(), json_response(&singular, &singular));
                operation.responses.insert(
                    "404".to_string(),
                    Response {
                        description: format!("The {singular} with the given key was not found."),
                        content: BTreeMap::new(),
                    },
                );
            }
            Crudl::Update => {
                operation.description = format!(
                    "Updates the specific {singular} by setting the values of the parameters passed."
                );
                operation.parameters = key_parameters(model, "update");
                operation.request_body = Some(request_body(&singular));
                operation
                    .responses
                    .insert("200".to_string(), json_response(&singular, &singular));
            }
            Crudl::Delete => {
                operation.description = format!("Deletes the specific {singular}.");
                operation.parameters = key_parameters(model, "delete");
                operation.responses.insert(
                    "200".to_string(),
                    Response {
                        description: format!("The {singular} was deleted."),
                        content: BTreeMap::new(),
                    },
                );
            }
            Crudl::List => {
                operation.description = format!("Returns a list of {plural}.");
                operation
                    .responses
                    .insert("200".to_string(), json_response(&plural, &plural));
            }
        }

        let item = self.paths.entry(format!("/{}", route.path)).or_default();
        match item.slot(&route.method) {
            Some(slot) => *slot = Some(operation),
            None => debug!(method = %route.method, "unsupported http method, skipping"),
        }
    }

    fn add_components(&mut self, model: &Model, component: &str) {
        let mut schema = Schema::typed("object");
        if component == model.identifier.singular_pascal() {
            schema.required = model.key_schema.values().cloned().collect();
            self.components.schemas.insert(
                model.identifier.plural_pascal(),
                Schema::array_of(Schema::reference(component)),
            );
        }
        schema.properties = model
            .attributes
            .values()
            .map(|attribute| (attribute.name().to_string(), property(attribute)))
            .collect();

        for child in &model.nested {
            let child_component = format!("{component}{}", child.identifier.pascal());
            let reference = Schema::reference(&child_component);
            let property = if child.is_collection {
                Schema::array_of(reference)
            } else {
                reference
            };
            schema
                .properties
                .insert(child.identifier.as_str().to_string(), property);
            self.add_components(child, &child_component);
        }

        self.components
            .schemas
            .insert(component.to_string(), schema);
    }
}

/// Compiles a fresh document for one model.
pub fn compile(model: &Model, manifest: &DeploymentManifest) -> ApiSchema {
    let mut schema = ApiSchema::new(&manifest.service);
    schema.add_model(model, manifest);
    schema
}

/// Component schema names of `model` and its nested sub-trees.
fn component_names(model: &Model, component: &str) -> Vec<String> {
    let mut names = vec![component.to_string()];
    for child in &model.nested {
        names.extend(component_names(
            child,
            &format!("{component}{}", child.identifier.pascal()),
        ));
    }
    names
}

fn property(attribute: &Attribute) -> Schema {
    let mut schema = match types::api_type(&attribute.semantic_type) {
        Some(api) => Schema {
            schema_type: Some(api.schema_type.to_string()),
            format: api.format.map(str::to_string),
            items: api.items.map(|items| Box::new(Schema::typed(items))),
            ..Default::default()
        },
        None => Schema::typed(attribute.semantic_type.trim()),
    };
    schema.nullable = attribute.nullable;
    schema
}

fn key_parameters(model: &Model, action: &str) -> Vec<Parameter> {
    let singular = model.identifier.singular_pascal();
    model
        .key_schema
        .values()
        .map(|key| Parameter {
            name: key.clone(),
            location: "path".to_string(),
            required: true,
            description: format!("The {key} of the {singular} to {action}"),
            schema: Schema::typed("string"),
        })
        .collect()
}

fn request_body(component: &str) -> RequestBody {
    RequestBody {
        description: format!("JSON Object of the {component}"),
        required: true,
        content: BTreeMap::from([(
            JSON.to_string(),
            MediaType {
                schema: Schema::reference(component),
            },
        )]),
    }
}

fn json_response(description: &str, component: &str) -> Response {
    Response {
        description: format!("JSON Object of the {description}"),
        content: BTreeMap::from([(
            JSON.to_string(),
            MediaType {
                schema: Schema::reference(component),
            },
        )]),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
