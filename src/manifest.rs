//! Deployment manifest (`serverless.yml`) document model.
//!
//! Field names and order follow the Serverless Framework / CloudFormation
//! layout so a manifest written by one version of the tool reads back
//! unchanged in the next. Functions and resources are kept in insertion
//! order and keyed by name: adding an existing name replaces the entry in
//! place, removing one leaves every other entry untouched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigConsistencyError;
use crate::model::{KeyRole, StorageType};

pub const TABLE_RESOURCE_TYPE: &str = "AWS::DynamoDB::Table";
pub const AUTHORIZER_RESOURCE: &str = "ApiGatewayAuthorizer";
pub const AUTHORIZER_TYPE: &str = "COGNITO_USER_POOLS";
pub const PAY_PER_REQUEST: &str = "PAY_PER_REQUEST";
pub const DEFAULT_STAGE: &str = "${opt:stage, 'dev'}";
pub const STAGE_PLACEHOLDER: &str = "${opt:stage, self:provider.stage}";
pub const SECRETS_FILE: &str = "secrets.yml";
pub const USER_POOL_SECRET: &str = "COGNITO_USER_POOL";

/// DynamoDB actions granted to every function.
pub const STORAGE_ACTIONS: [&str; 7] = [
    "dynamodb:DescribeTable",
    "dynamodb:Query",
    "dynamodb:Scan",
    "dynamodb:GetItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
];
pub const STORAGE_RESOURCE_ARN: &str = "arn:aws:dynamodb:*:*:*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub service: String,
    pub provider: Provider,
    pub package: Package,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub functions: IndexMap<String, FunctionDef>,
    #[serde(default, skip_serializing_if = "Resources::is_empty")]
    pub resources: Resources,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub runtime: String,
    pub region: String,
    pub stage: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(rename = "iamRoleStatements", default)]
    pub iam_role_statements: Vec<RoleStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStatement {
    #[serde(rename = "Effect")]
    pub effect: String,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource")]
    pub resource: String,
}

impl RoleStatement {
    /// The single coarse allow statement for table access.
    pub fn storage_access() -> Self {
        Self {
            effect: "Allow".to_string(),
            actions: STORAGE_ACTIONS.iter().map(|a| a.to_string()).collect(),
            resource: STORAGE_RESOURCE_ARN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
}

impl Default for Package {
    fn default() -> Self {
        Self {
            exclude: vec!["./**".to_string()],
            include: vec!["bin/**".to_string()],
        }
    }
}

/// A deployable function bound to one HTTP route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub handler: String,
    pub events: Vec<FunctionEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEvent {
    pub http: HttpEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpEvent {
    pub path: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<Authorizer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorizer {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "authorizerId")]
    pub authorizer_id: Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "Ref")]
    pub target: String,
}

impl Reference {
    pub fn to(target: &str) -> Self {
        Self {
            target: target.to_string(),
        }
    }
}

impl FunctionDef {
    /// A function with one CORS-enabled HTTP event.
    pub fn http(handler: &str, path: &str, method: &str) -> Self {
        Self {
            handler: handler.to_string(),
            events: vec![FunctionEvent {
                http: HttpEvent {
                    path: path.trim_start_matches('/').to_string(),
                    method: method.to_lowercase(),
                    cors: true,
                    authorizer: None,
                },
            }],
        }
    }

    pub fn route(&self) -> Option<&HttpEvent> {
        self.events.first().map(|event| &event.http)
    }

    /// Handler with any `bin/` build prefix removed.
    pub fn verb(&self) -> &str {
        self.handler.trim_start_matches("bin/")
    }

    pub fn authorizer(&self) -> Option<&Authorizer> {
        self.route().and_then(|route| route.authorizer.as_ref())
    }

    pub fn set_authorizer(&mut self, authorizer: Option<Authorizer>) {
        for event in &mut self.events {
            event.http.authorizer = authorizer.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(rename = "Resources", default)]
    pub resources: IndexMap<String, ResourceDefinition>,
}

impl Resources {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    pub properties: ResourceProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceProperties {
    Table(TableProperties),
    Authorizer(AuthorizerProperties),
}

/// `AWS::DynamoDB::Table` properties.
///
/// `provisioned_throughput` and `billing_mode` are never both set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableProperties {
    pub table_name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_secondary_indexes: Vec<IndexDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<IndexDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: StorageType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexDefinition {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub projection: Projection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    pub projection_type: String,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            projection_type: "ALL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizerProperties {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IdentitySource")]
    pub identity_source: String,
    #[serde(rename = "RestApiId")]
    pub rest_api_id: Reference,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "ProviderARNs")]
    pub provider_arns: Vec<String>,
}

impl DeploymentManifest {
    /// An empty manifest with the default provider, IAM and packaging
    /// settings.
    pub fn new(service: &str, region: &str, runtime: &str) -> Self {
        Self {
            service: service.to_string(),
            provider: Provider {
                name: "aws".to_string(),
                runtime: runtime.to_string(),
                region: region.to_string(),
                stage: DEFAULT_STAGE.to_string(),
                environment: IndexMap::new(),
                iam_role_statements: vec![RoleStatement::storage_access()],
            },
            package: Package::default(),
            functions: IndexMap::new(),
            resources: Resources::default(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Adds `function` under `name`, replacing an existing entry in place.
    pub fn add_function(&mut self, name: &str, function: FunctionDef) {
        let replaced = self.functions.insert(name.to_string(), function).is_some();
        debug!(function = name, replaced, "function added to manifest");
    }

    pub fn remove_function(&mut self, name: &str) -> Result<FunctionDef, ConfigConsistencyError> {
        let removed = self
            .functions
            .shift_remove(name)
            .ok_or_else(|| ConfigConsistencyError::UnknownFunction(name.to_string()))?;
        info!(function = name, "function removed from manifest");
        Ok(removed)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.resources.get(name)
    }

    /// Table properties of resource `name`, if it is a table.
    pub fn table(&self, name: &str) -> Option<&TableProperties> {
        match self.resource(name).map(|r| &r.properties) {
            Some(ResourceProperties::Table(table)) => Some(table),
            _ => None,
        }
    }

    /// Adds `resource` under `name`, replacing an existing entry in place.
    pub fn add_resource(&mut self, name: &str, resource: ResourceDefinition) {
        self.resources.resources.insert(name.to_string(), resource);
    }

    pub fn remove_resource(
        &mut self,
        name: &str,
    ) -> Result<ResourceDefinition, ConfigConsistencyError> {
        let removed = self
            .resources
            .resources
            .shift_remove(name)
            .ok_or_else(|| ConfigConsistencyError::UnknownManifestResource(name.to_string()))?;
        info!(resource = name, "resource removed from manifest");
        Ok(removed)
    }

    pub fn set_environment(&mut self, key: &str, value: &str) {
        self.provider
            .environment
            .insert(key.to_string(), value.to_string());
    }

    /// Exposes each secret as an environment variable read from the
    /// resource's secrets file.
    pub fn add_secret_env<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.set_environment(key, &format!("${{file({SECRETS_FILE}):{key}}}"));
        }
    }

    /// Puts every function whose handler is not in `excludes` behind the
    /// Cognito authorizer. The authorizer resource is only added when at
    /// least one function needs it.
    pub fn add_auth(&mut self, excludes: &[&str]) {
        let authorizer = Authorizer {
            kind: AUTHORIZER_TYPE.to_string(),
            authorizer_id: Reference::to(AUTHORIZER_RESOURCE),
        };
        let mut protected = 0;
        for function in self.functions.values_mut() {
            if !excludes.contains(&function.verb()) {
                function.set_authorizer(Some(authorizer.clone()));
                protected += 1;
            }
        }

        if protected > 0 {
            self.add_resource(
                AUTHORIZER_RESOURCE,
                ResourceDefinition {
                    depends_on: vec!["ApiGatewayRestApi".to_string()],
                    kind: "AWS::ApiGateway::Authorizer".to_string(),
                    deletion_policy: None,
                    properties: ResourceProperties::Authorizer(AuthorizerProperties {
                        name: "cognito-authorizer".to_string(),
                        identity_source: "method.request.header.Authorization".to_string(),
                        rest_api_id: Reference::to("ApiGatewayRestApi"),
                        kind: AUTHORIZER_TYPE.to_string(),
                        provider_arns: vec![format!(
                            "${{file({SECRETS_FILE}):{USER_POOL_SECRET}}}"
                        )],
                    }),
                },
            );
        }
        info!(protected, "authorization added");
    }

    pub fn remove_auth(&mut self) {
        self.resources.resources.shift_remove(AUTHORIZER_RESOURCE);
        self.provider.environment.shift_remove(USER_POOL_SECRET);
        for function in self.functions.values_mut() {
            function.set_authorizer(None);
        }
        info!("authorization removed");
    }
}
