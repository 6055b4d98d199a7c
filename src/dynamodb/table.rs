use anyhow::{anyhow, Result};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, GlobalSecondaryIndex, KeySchemaElement, KeyType, LocalSecondaryIndex,
    Projection, ProjectionType, ProvisionedThroughput, ScalarAttributeType,
};

use crate::manifest::{self, IndexDefinition, TableProperties};
use crate::model::{KeyRole, StorageType};

/// A DynamoDB table ready to be created, converted from a compiled table
/// resource.
///
/// The manifest describes the table for CloudFormation; this struct holds the
/// same definition as SDK types so it can be created directly against
/// DynamoDB Local.
///
/// # Capacity Modes
///
/// - **Provisioned**: `throughput` is set, indexes inherit it.
/// - **On-Demand**: `throughput` is `None` and the table is created with
///   `PAY_PER_REQUEST`.
///
/// # Key Attributes
///
/// DynamoDB only accepts scalar key attributes (`S`, `N`, `B`). Conversion
/// fails for any other storage type.
///
/// # Example
///
/// ```
/// use mug_scaffold::compile::deployment;
/// use mug_scaffold::dynamodb::LocalTable;
/// use mug_scaffold::manifest::ResourceProperties;
/// use mug_scaffold::model::{build, GenerationOptions};
///
/// let options = GenerationOptions { generate_id: true, ..Default::default() };
/// let course = build("course", false, "name", &options)?;
/// let ResourceProperties::Table(properties) = deployment::table_resource(&course).properties
/// else {
///     unreachable!()
/// };
/// let table = LocalTable::from_properties("shop-courses-dev", &properties)?;
/// assert_eq!(table.name(), "shop-courses-dev");
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalTable {
    name: String,
    attribute_definitions: Vec<AttributeDefinition>,
    key_schema: Vec<KeySchemaElement>,
    throughput: Option<ProvisionedThroughput>,
    local_indexes: Vec<LocalSecondaryIndex>,
    global_indexes: Vec<GlobalSecondaryIndex>,
}

impl LocalTable {
    /// Converts compiled table properties into SDK types.
    ///
    /// # Arguments
    ///
    /// * `name` - The concrete table name, with the stage already resolved.
    /// * `properties` - The table resource properties from the manifest.
    ///
    /// # Returns
    ///
    /// The table definition, or an error if a key attribute is not scalar.
    pub fn from_properties(name: &str, properties: &TableProperties) -> Result<Self> {
        let attribute_definitions = properties
            .attribute_definitions
            .iter()
            .map(|definition| -> Result<AttributeDefinition> {
                AttributeDefinition::builder()
                    .attribute_name(&definition.attribute_name)
                    .attribute_type(scalar_type(
                        &definition.attribute_name,
                        &definition.attribute_type,
                    )?)
                    .build()
                    .map_err(Into::into)
            })
            .collect::<Result<Vec<_>>>()?;

        let throughput = properties
            .provisioned_throughput
            .map(convert_throughput)
            .transpose()?;

        let local_indexes = properties
            .local_secondary_indexes
            .iter()
            .map(|index| -> Result<LocalSecondaryIndex> {
                LocalSecondaryIndex::builder()
                    .index_name(&index.index_name)
                    .set_key_schema(Some(convert_key_schema(&index.key_schema)?))
                    .projection(projection(index))
                    .build()
                    .map_err(Into::into)
            })
            .collect::<Result<Vec<_>>>()?;

        let global_indexes = properties
            .global_secondary_indexes
            .iter()
            .map(|index| -> Result<GlobalSecondaryIndex> {
                GlobalSecondaryIndex::builder()
                    .index_name(&index.index_name)
                    .set_key_schema(Some(convert_key_schema(&index.key_schema)?))
                    .projection(projection(index))
                    .set_provisioned_throughput(
                        index
                            .provisioned_throughput
                            .map(convert_throughput)
                            .transpose()?,
                    )
                    .build()
                    .map_err(Into::into)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            attribute_definitions,
            key_schema: convert_key_schema(&properties.key_schema)?,
            throughput,
            local_indexes,
            global_indexes,
        })
    }

    /// Returns the name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_definitions(&self) -> &[AttributeDefinition] {
        &self.attribute_definitions
    }

    /// Returns the key schema in `HASH`, `RANGE` order.
    pub fn key_schema(&self) -> &[KeySchemaElement] {
        &self.key_schema
    }

    /// Returns the provisioned throughput; `None` means on-demand.
    pub fn throughput(&self) -> Option<&ProvisionedThroughput> {
        self.throughput.as_ref()
    }

    pub fn local_indexes(&self) -> &[LocalSecondaryIndex] {
        &self.local_indexes
    }

    pub fn global_indexes(&self) -> &[GlobalSecondaryIndex] {
        &self.global_indexes
    }
}

fn scalar_type(attribute: &str, storage: &StorageType) -> Result<ScalarAttributeType> {
    match storage {
        StorageType::String => Ok(ScalarAttributeType::S),
        StorageType::Number => Ok(ScalarAttributeType::N),
        StorageType::Binary => Ok(ScalarAttributeType::B),
        other => Err(anyhow!(
            "Key attribute '{attribute}' has non-scalar type '{other}'"
        )),
    }
}

fn convert_key_schema(elements: &[manifest::KeySchemaElement]) -> Result<Vec<KeySchemaElement>> {
    elements
        .iter()
        .map(|element| -> Result<KeySchemaElement> {
            let key_type = match element.key_type {
                KeyRole::Hash => KeyType::Hash,
                KeyRole::Range => KeyType::Range,
            };
            KeySchemaElement::builder()
                .attribute_name(&element.attribute_name)
                .key_type(key_type)
                .build()
                .map_err(Into::into)
        })
        .collect()
}

fn convert_throughput(throughput: manifest::ProvisionedThroughput) -> Result<ProvisionedThroughput> {
    ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read_capacity_units)
        .write_capacity_units(throughput.write_capacity_units)
        .build()
        .map_err(Into::into)
}

fn projection(index: &IndexDefinition) -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::from(index.projection.projection_type.as_str()))
        .build()
}
