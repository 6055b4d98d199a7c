//! Pipeline tests: description in, manifest and API schema out.
//!
//! These tests cover:
//! - The worked examples: an auto-id resource and a composite-key resource
//! - Grammar and key schema failures surfacing before anything compiles
//! - Billing mode exclusivity and attribute-definition minimality
//! - Round trips of every persisted document
//! - Project operations against a temporary directory
//!
//! No test talks to DynamoDB; table provisioning is covered at the
//! conversion level in `dynamodb::table`.

use crate::compile::{self, api, deployment, Crudl};
use crate::config::{ProjectConfig, DEFAULT_REGION};
use crate::error::{ConfigConsistencyError, GrammarError, KeySchemaError, ScaffoldError};
use crate::manifest::{
    DeploymentManifest, FunctionDef, ResourceProperties, TableProperties, USER_POOL_SECRET,
};
use crate::model::{
    build, BillingMode, CapacityUnits, GenerationOptions, KeyRole, Model, StorageType,
};
use crate::project;
use tempfile::TempDir;
use tracing::{info, instrument};

const PROJECT_NAME: &str = "shop";

fn project_config() -> ProjectConfig {
    ProjectConfig::new(PROJECT_NAME, "/tmp/shop", DEFAULT_REGION)
}

fn auto_id() -> GenerationOptions {
    GenerationOptions {
        generate_id: true,
        ..Default::default()
    }
}

fn composite() -> GenerationOptions {
    GenerationOptions {
        explicit_key_schema: "courseId:HASH,userId:RANGE".to_string(),
        ..Default::default()
    }
}

fn table_properties(model: &Model) -> TableProperties {
    match deployment::table_resource(model).properties {
        ResourceProperties::Table(table) => table,
        ResourceProperties::Authorizer(_) => panic!("expected a table resource"),
    }
}

#[test]
#[instrument]
fn auto_id_resource() {
    let model = build("course", false, "name,price:float64", &auto_id()).unwrap();

    let types: Vec<(&str, &StorageType)> = model
        .attributes
        .values()
        .map(|a| (a.name(), &a.storage_type))
        .collect();
    assert_eq!(
        types,
        vec![
            ("id", &StorageType::String),
            ("name", &StorageType::String),
            ("price", &StorageType::Number),
        ]
    );
    assert_eq!(model.key_schema.len(), 1);
    assert_eq!(model.hash_key(), Some("id"));
    assert!(!model.is_composite_key);
    assert!(model.generated_id);

    let compiled = deployment::compile(&model, &project_config());
    let names: Vec<&str> = compiled.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "create_course",
            "read_course",
            "update_course",
            "delete_course",
            "list_courses"
        ]
    );

    let read = compiled.manifest.function("read_course").unwrap();
    assert_eq!(read.handler, "read");
    let route = read.route().unwrap();
    assert_eq!(route.path, "courses/{id}");
    assert_eq!(route.method, "get");
    info!("auto-id resource compiled");
}

#[test]
fn composite_key_resource() {
    let model = build("enrollment", false, "courseId,userId", &composite()).unwrap();
    assert!(model.is_composite_key);
    assert_eq!(model.range_key(), Some("userId"));
    assert_eq!(deployment::item_route(&model), "enrollments/{courseId}/{userId}");

    let compiled = deployment::compile(&model, &project_config());
    let delete = compiled.manifest.function("delete_enrollment").unwrap();
    assert_eq!(delete.route().unwrap().path, "enrollments/{courseId}/{userId}");
    assert_eq!(compiled.summary.attribute_definitions.len(), 2);
}

#[test]
fn malformed_grammar_fails_before_build() {
    let err = build("course", false, "a{b", &auto_id()).unwrap_err();
    assert!(matches!(
        err,
        ScaffoldError::Grammar(GrammarError::Unbalanced { bracket: '{', .. })
    ));

    let err = compile::compile_resource(&project_config(), "course", false, "tags[a,b", &auto_id())
        .unwrap_err();
    assert!(matches!(err, ScaffoldError::Grammar(_)));
}

#[test]
fn key_schema_failures() {
    let no_key = build("course", false, "name,price:float64", &GenerationOptions::default());
    assert!(matches!(
        no_key.unwrap_err(),
        ScaffoldError::KeySchema(KeySchemaError::NoHashKey { .. })
    ));

    let options = GenerationOptions {
        explicit_key_schema: "userId:RANGE".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        build("enrollment", false, "courseId,userId", &options).unwrap_err(),
        ScaffoldError::KeySchema(KeySchemaError::RangeWithoutHash { .. })
    ));

    let options = GenerationOptions {
        explicit_key_schema: "courseId:HASH,missing:RANGE".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        build("enrollment", false, "courseId,userId", &options).unwrap_err(),
        ScaffoldError::KeySchema(KeySchemaError::UnknownRangeKey { .. })
    ));

    assert!(matches!(
        build("user", false, "email:string:hash,handle:string:hash", &GenerationOptions::default())
            .unwrap_err(),
        ScaffoldError::KeySchema(KeySchemaError::AmbiguousHashKey { matches: 2, .. })
    ));
}

#[test]
fn hash_marker_and_precedence() {
    let user = build("user", false, "email:string:hash,name", &GenerationOptions::default()).unwrap();
    assert_eq!(user.hash_key(), Some("email"));

    let options = GenerationOptions {
        generate_id: true,
        explicit_key_schema: "email:HASH".to_string(),
        ..Default::default()
    };
    let user = build("user", false, "email:string:hash,name", &options).unwrap();
    assert_eq!(user.hash_key(), Some("id"));
}

#[test]
fn key_invariant_holds_for_valid_models() {
    let models = [
        build("course", false, "name", &auto_id()).unwrap(),
        build("enrollment", false, "courseId,userId", &composite()).unwrap(),
        build("user", false, "email:string:hash", &GenerationOptions::default()).unwrap(),
    ];
    for model in &models {
        assert!((1..=2).contains(&model.key_schema.len()));
        assert_eq!(model.is_composite_key, model.key_schema.len() == 2);
    }
}

#[test]
fn billing_mode_exclusivity() {
    let on_demand = GenerationOptions {
        billing_mode: BillingMode::OnDemand,
        capacity: CapacityUnits { read: 5, write: 5 },
        ..auto_id()
    };
    let model = build("course", false, "name", &on_demand).unwrap();
    assert_eq!(model.capacity_units, None);
    let table = table_properties(&model);
    assert!(table.provisioned_throughput.is_none());
    assert_eq!(table.billing_mode.as_deref(), Some("PAY_PER_REQUEST"));

    let provisioned = GenerationOptions {
        capacity: CapacityUnits { read: 3, write: 2 },
        ..auto_id()
    };
    let model = build("course", false, "name", &provisioned).unwrap();
    let table = table_properties(&model);
    assert!(table.billing_mode.is_none());
    let throughput = table.provisioned_throughput.unwrap();
    assert_eq!(throughput.read_capacity_units, 3);
    assert_eq!(throughput.write_capacity_units, 2);
}

#[test]
fn attribute_definitions_are_minimal() {
    let options = GenerationOptions {
        add_timestamps: true,
        add_soft_delete: true,
        ..composite()
    };
    let model = build(
        "enrollment",
        false,
        "courseId,userId,grade:int,notes{text}",
        &options,
    )
    .unwrap();
    let table = table_properties(&model);

    let mut defined: Vec<&str> = table
        .attribute_definitions
        .iter()
        .map(|d| d.attribute_name.as_str())
        .collect();
    defined.sort_unstable();
    let mut keys: Vec<&str> = model.key_schema.values().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(defined, keys);

    let roles: Vec<KeyRole> = table.key_schema.iter().map(|k| k.key_type).collect();
    assert_eq!(roles, vec![KeyRole::Hash, KeyRole::Range]);
}

#[test]
fn timestamps_and_soft_delete() {
    let options = GenerationOptions {
        add_timestamps: true,
        add_soft_delete: true,
        ..auto_id()
    };
    let model = build("course", false, "name", &options).unwrap();
    assert!(model.attributes.contains_key("createdAt"));
    assert!(model.attributes.contains_key("updatedAt"));
    assert!(model.attributes["deletedAt"].nullable);
    assert!(!model.attributes["createdAt"].nullable);
    assert!(model.required_imports.contains("uses-timestamp"));
    assert!(model.required_imports.contains("uses-identifier-generation"));
}

#[test]
fn nesting_depth() {
    let model = Model::parse("root", false, "a{b{c:string}}").unwrap();
    assert!(model.attributes.is_empty());
    assert_eq!(model.nested.len(), 1);

    let a = &model.nested[0];
    assert_eq!(a.identifier.as_str(), "a");
    assert!(a.attributes.is_empty());
    assert_eq!(a.nested.len(), 1);

    let b = &a.nested[0];
    assert_eq!(b.identifier.as_str(), "b");
    assert_eq!(b.attributes["c"].semantic_type, "string");
    assert_eq!(b.attributes["c"].storage_type, StorageType::String);
    assert!(b.nested.is_empty());
}

#[test]
fn nested_imports_are_collected() {
    let model = build(
        "event",
        false,
        "title,sessions[startsAt:timestamp,room{ref:uuid}]",
        &GenerationOptions {
            explicit_key_schema: "title:HASH".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(model.required_imports.is_empty());
    let imports: Vec<String> = model.collect_imports().into_iter().collect();
    assert_eq!(imports, vec!["uses-timestamp", "uses-uuid"]);
    assert_eq!(model.nested[0].type_name(), "Vec<Sessions>");
}

#[test]
fn adding_a_function_twice_is_idempotent() {
    let model = build("course", false, "name", &auto_id()).unwrap();
    let mut manifest = deployment::compile(&model, &project_config()).manifest;
    let function = FunctionDef::http("search", "courses/search", "get");

    manifest.add_function("search_course", function.clone());
    let once = manifest.clone();
    manifest.add_function("search_course", function);
    assert_eq!(manifest, once);
    assert_eq!(
        manifest.functions.keys().filter(|k| *k == "search_course").count(),
        1
    );

    deployment::amend(&mut manifest, &model, PROJECT_NAME);
    assert_eq!(manifest, once);
}

#[test]
fn manifest_and_api_schema_round_trip() {
    let options = GenerationOptions {
        add_timestamps: true,
        indexes: "byGrade:local:courseId:grade".to_string(),
        ..composite()
    };
    let model = build("enrollment", false, "courseId,userId,grade:int,meta{tags:list<string>}", &options)
        .unwrap();
    let mut manifest = deployment::compile(&model, &project_config()).manifest;
    manifest.add_auth(&["list"]);
    manifest.add_secret_env(["COGNITO_USER_POOL"]);

    let yaml = serde_yaml::to_string(&manifest).unwrap();
    let parsed: DeploymentManifest = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, manifest);
    assert_eq!(serde_yaml::to_string(&parsed).unwrap(), yaml);

    let schema = api::compile(&model, &manifest);
    let yaml = serde_yaml::to_string(&schema).unwrap();
    let parsed: api::ApiSchema = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, schema);
    assert_eq!(serde_yaml::to_string(&parsed).unwrap(), yaml);

    let json = serde_json::to_string(&model).unwrap();
    let parsed: Model = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, model);
}

#[test]
fn manifest_yaml_uses_serverless_field_names() {
    let model = build("course", false, "name", &auto_id()).unwrap();
    let manifest = deployment::compile(&model, &project_config()).manifest;
    let yaml = serde_yaml::to_string(&manifest).unwrap();

    assert!(yaml.contains("iamRoleStatements"));
    assert!(yaml.contains("CourseDynamoDbTable"));
    assert!(yaml.contains("AttributeDefinitions"));
    assert!(yaml.contains("COURSE_TABLE_NAME"));
    assert!(yaml.contains("shop-courses-${opt:stage, self:provider.stage}"));
    assert!(yaml.contains("DeletionPolicy: Retain"));
}

#[test]
fn compilers_agree_on_routes() {
    let artifacts = compile::compile_resource(
        &project_config(),
        "enrollment",
        false,
        "courseId,userId",
        &composite(),
    )
    .unwrap();

    for function in &artifacts.resource.functions {
        let route = function.definition.route().unwrap();
        let item = &artifacts.api_schema.paths[&format!("/{}", route.path)];
        let operation = match function.operation {
            Crudl::Create => item.post.as_ref(),
            Crudl::Read | Crudl::List => item.get.as_ref(),
            Crudl::Update => item.put.as_ref(),
            Crudl::Delete => item.delete.as_ref(),
        }
        .unwrap();
        assert_eq!(operation.operation_id, function.name);
        assert_eq!(operation.tags, vec!["enrollments".to_string()]);
        if function.operation.on_item() {
            let params: Vec<&str> = operation.parameters.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(params, vec!["courseId", "userId"]);
        }
    }
    assert_eq!(
        artifacts.api_schema.components.schemas["Enrollment"].required,
        vec!["courseId".to_string(), "userId".to_string()]
    );
}

#[test]
fn project_add_and_remove_resource() {
    let dir = TempDir::new().unwrap();
    let mut config = ProjectConfig::new(PROJECT_NAME, dir.path(), DEFAULT_REGION);
    config.save().unwrap();

    project::add_resource(&mut config, "course", false, "name,price:float64", &auto_id()).unwrap();
    project::add_resource(&mut config, "enrollment", false, "courseId,userId", &composite()).unwrap();
    project::add_function(&config, "course", "search", "courses/search", "get").unwrap();
    let pool = "arn:aws:cognito-idp:us-east-1:123456789012:userpool/us-east-1_abc";
    project::set_auth(&config, "course", true, &["list", "read"], Some(pool)).unwrap();
    assert_eq!(config.load_secrets("course").unwrap()[USER_POOL_SECRET], pool);

    // regenerating keeps the custom function and the authorizer
    project::add_resource(&mut config, "course", false, "name,price:float64,level:int", &auto_id())
        .unwrap();
    let manifest = config.load_manifest("course").unwrap().unwrap();
    assert!(manifest.function("search_course").is_some());
    assert!(manifest.function("create_course").unwrap().route().unwrap().authorizer.is_some());
    assert!(manifest.function("list_courses").unwrap().route().unwrap().authorizer.is_none());
    assert_eq!(
        manifest.provider.environment[USER_POOL_SECRET],
        format!("${{file(secrets.yml):{USER_POOL_SECRET}}}")
    );

    // the stored pool is reused when none is given
    project::set_auth(&config, "course", false, &[], None).unwrap();
    project::set_auth(&config, "course", true, &[], None).unwrap();
    assert_eq!(config.load_secrets("course").unwrap()[USER_POOL_SECRET], pool);

    let reloaded = ProjectConfig::load(dir.path()).unwrap();
    assert_eq!(reloaded.resources.len(), 2);

    project::remove_resource(&mut config, "course").unwrap();
    let schema = config.load_api_schema().unwrap();
    assert!(schema.paths.keys().all(|path| path.starts_with("/enrollments")));
    assert!(config.load_manifest("course").unwrap().is_none());
    assert_eq!(ProjectConfig::load(dir.path()).unwrap().resources.len(), 1);
}

#[test]
fn failed_operations_write_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = ProjectConfig::new(PROJECT_NAME, dir.path(), DEFAULT_REGION);
    config.save().unwrap();

    assert!(project::add_resource(&mut config, "course", false, "a{b", &auto_id()).is_err());
    assert!(!config.api_schema_path().exists());
    assert!(!config.group_dir("course").exists());

    let err = project::remove_resource(&mut config, "course").unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigConsistencyError>(),
        Some(&ConfigConsistencyError::UnknownResource("course".to_string()))
    );

    let err = project::remove_function(&config, "course", "search_course").unwrap_err();
    assert!(err.downcast_ref::<ConfigConsistencyError>().is_some());
    assert!(ProjectConfig::load(dir.path()).unwrap().resources.is_empty());

    let err = project::set_auth(&config, "course", true, &[], None).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigConsistencyError>(),
        Some(&ConfigConsistencyError::MissingSecret {
            group: "course".to_string(),
            key: USER_POOL_SECRET.to_string(),
        })
    );
    assert!(!config.group_dir("course").exists());
}

#[test]
fn regenerating_with_a_new_key_replaces_api_routes() {
    let dir = TempDir::new().unwrap();
    let mut config = ProjectConfig::new(PROJECT_NAME, dir.path(), DEFAULT_REGION);
    config.save().unwrap();

    project::add_resource(&mut config, "course", false, "name,price:float64", &auto_id()).unwrap();
    let options = GenerationOptions {
        explicit_key_schema: "name:HASH".to_string(),
        ..Default::default()
    };
    project::add_resource(&mut config, "course", false, "name,price:float64", &options).unwrap();

    let manifest = config.load_manifest("course").unwrap().unwrap();
    assert_eq!(
        manifest.function("read_course").unwrap().route().unwrap().path,
        "courses/{name}"
    );

    let schema = config.load_api_schema().unwrap();
    assert!(!schema.paths.contains_key("/courses/{id}"));
    let read_ids: Vec<&str> = schema
        .paths
        .values()
        .flat_map(|item| item.operations())
        .map(|op| op.operation_id.as_str())
        .filter(|id| *id == "read_course")
        .collect();
    assert_eq!(read_ids.len(), 1);
    assert_eq!(
        config.resource("course").unwrap().key_schema[&KeyRole::Hash],
        "name"
    );
}
