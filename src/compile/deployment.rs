use tracing::{debug, info, instrument};

use crate::config::{ProjectConfig, ResourceSummary};
use crate::manifest::{
    AttributeDefinition, DeploymentManifest, FunctionDef, IndexDefinition, KeySchemaElement,
    Projection, ProvisionedThroughput, ResourceDefinition, ResourceProperties, TableProperties,
    PAY_PER_REQUEST, STAGE_PLACEHOLDER, TABLE_RESOURCE_TYPE,
};
use crate::model::{BillingMode, Identifier, IndexKind, KeySchema, Model};

/// Generic function group; functions in it are named by their bare verb.
pub const GENERIC_GROUP: &str = "_";

/// The five generated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crudl {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Crudl {
    pub const ALL: [Crudl; 5] = [
        Crudl::Create,
        Crudl::Read,
        Crudl::Update,
        Crudl::Delete,
        Crudl::List,
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            Crudl::Create => "create",
            Crudl::Read => "read",
            Crudl::Update => "update",
            Crudl::Delete => "delete",
            Crudl::List => "list",
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Crudl::Create => "post",
            Crudl::Read | Crudl::List => "get",
            Crudl::Update => "put",
            Crudl::Delete => "delete",
        }
    }

    /// Whether the operation addresses a single item by key.
    pub fn on_item(&self) -> bool {
        matches!(self, Crudl::Read | Crudl::Update | Crudl::Delete)
    }

    pub fn from_verb(verb: &str) -> Option<Crudl> {
        Crudl::ALL.into_iter().find(|op| op.verb() == verb)
    }
}

/// A named function as compiled for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    pub name: String,
    pub operation: Crudl,
    pub definition: FunctionDef,
}

/// Everything the deployment compiler derives from one model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledResource {
    pub summary: ResourceSummary,
    pub functions: Vec<CompiledFunction>,
    pub manifest: DeploymentManifest,
}

/// `<verb>_<singular>`, or the bare verb for the generic group.
pub fn function_name(resource: &str, verb: &str) -> String {
    if resource == GENERIC_GROUP {
        verb.to_string()
    } else {
        format!("{verb}_{}", Identifier::new(resource).singular_camel())
    }
}

/// Function name for a generated operation. `list` takes the plural.
pub fn operation_name(model: &Model, operation: Crudl) -> String {
    match operation {
        Crudl::List => format!("list_{}", model.identifier.plural_camel()),
        _ => format!("{}_{}", operation.verb(), model.identifier.singular_camel()),
    }
}

pub fn base_route(model: &Model) -> String {
    model.identifier.plural_camel()
}

/// Base route followed by one `{key}` segment per key attribute.
pub fn item_route(model: &Model) -> String {
    model
        .key_schema
        .values()
        .fold(base_route(model), |route, key| format!("{route}/{{{key}}}"))
}

/// Name of the table resource in the manifest, e.g. `CourseDynamoDbTable`.
pub fn table_resource_name(model: &Model) -> String {
    format!("{}DynamoDbTable", model.identifier.singular_pascal())
}

/// Environment variable holding the table name, e.g. `COURSE_TABLE_NAME`.
pub fn table_env_var(model: &Model) -> String {
    format!("{}_TABLE_NAME", model.identifier.upper_snake())
}

/// Concrete table name for `stage`; the manifest uses the stage placeholder.
pub fn table_name(project: &str, model: &Model, stage: &str) -> String {
    format!("{project}-{}-{stage}", model.identifier.plural_camel())
}

/// Projects a validated model into a fresh manifest for its resource.
#[instrument(skip(model, project), fields(model = %model.identifier))]
pub fn compile(model: &Model, project: &ProjectConfig) -> CompiledResource {
    let mut manifest = project.new_manifest(model.identifier.as_str());
    let functions = amend(&mut manifest, model, &project.project_name);
    info!(
        functions = functions.len(),
        resources = manifest.resources.resources.len(),
        "deployment manifest compiled"
    );
    CompiledResource {
        summary: ResourceSummary::from_model(model),
        functions,
        manifest,
    }
}

/// Writes the model's functions, table resource and environment entry into
/// an existing manifest, replacing same-named entries and leaving the rest.
///
/// A replaced function keeps its authorizer.
pub fn amend(
    manifest: &mut DeploymentManifest,
    model: &Model,
    project: &str,
) -> Vec<CompiledFunction> {
    let functions = functions(model);
    for function in &functions {
        let mut definition = function.definition.clone();
        if let Some(authorizer) = manifest
            .function(&function.name)
            .and_then(FunctionDef::authorizer)
        {
            definition.set_authorizer(Some(authorizer.clone()));
        }
        manifest.add_function(&function.name, definition);
    }
    manifest.add_resource(&table_resource_name(model), table_resource(model));
    manifest.set_environment(
        &table_env_var(model),
        &table_name(project, model, STAGE_PLACEHOLDER),
    );
    functions
}

/// The five CRUDL functions in create, read, update, delete, list order.
pub fn functions(model: &Model) -> Vec<CompiledFunction> {
    let base = base_route(model);
    let item = item_route(model);
    Crudl::ALL
        .into_iter()
        .map(|operation| {
            let path = if operation.on_item() { &item } else { &base };
            CompiledFunction {
                name: operation_name(model, operation),
                operation,
                definition: FunctionDef::http(operation.verb(), path, operation.method()),
            }
        })
        .collect()
}

pub fn table_resource(model: &Model) -> ResourceDefinition {
    let (provisioned_throughput, billing_mode) = match model.billing_mode {
        BillingMode::Provisioned => {
            let units = model.capacity_units.unwrap_or_default();
            let throughput = ProvisionedThroughput {
                read_capacity_units: units.read,
                write_capacity_units: units.write,
            };
            (Some(throughput), None)
        }
        BillingMode::OnDemand => (None, Some(PAY_PER_REQUEST.to_string())),
    };

    let index = |kind: IndexKind| -> Vec<IndexDefinition> {
        model
            .indexes
            .iter()
            .filter(|index| index.kind == kind)
            .map(|index| IndexDefinition {
                index_name: index.name.clone(),
                key_schema: key_schema_elements(&index.key_schema),
                projection: Projection::default(),
                provisioned_throughput: match kind {
                    IndexKind::Global => provisioned_throughput,
                    IndexKind::Local => None,
                },
            })
            .collect()
    };

    let properties = TableProperties {
        table_name: format!("${{self:provider.environment.{}}}", table_env_var(model)),
        attribute_definitions: attribute_definitions(model),
        key_schema: key_schema_elements(&model.key_schema),
        provisioned_throughput,
        billing_mode,
        local_secondary_indexes: index(IndexKind::Local),
        global_secondary_indexes: index(IndexKind::Global),
    };
    debug!(
        attributes = properties.attribute_definitions.len(),
        "table resource compiled"
    );

    ResourceDefinition {
        depends_on: Vec::new(),
        kind: TABLE_RESOURCE_TYPE.to_string(),
        deletion_policy: Some("Retain".to_string()),
        properties: ResourceProperties::Table(properties),
    }
}

/// Definitions for exactly the key attributes: table keys first in
/// `HASH`, `RANGE` order, then index keys not already listed.
pub fn attribute_definitions(model: &Model) -> Vec<AttributeDefinition> {
    let mut names: Vec<&str> = model.key_schema.values().map(String::as_str).collect();
    for index in &model.indexes {
        for name in index.key_schema.values() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }
    names
        .into_iter()
        .filter_map(|name| model.attributes.get(name))
        .map(|attribute| AttributeDefinition {
            attribute_name: attribute.name().to_string(),
            attribute_type: attribute.storage_type.clone(),
        })
        .collect()
}

fn key_schema_elements(key_schema: &KeySchema) -> Vec<KeySchemaElement> {
    key_schema
        .iter()
        .map(|(role, name)| KeySchemaElement {
            attribute_name: name.clone(),
            key_type: *role,
        })
        .collect()
}
