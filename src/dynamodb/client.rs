use anyhow::{anyhow, Context, Result};
use aws_sdk_dynamodb::{
    operation::{create_table::CreateTableOutput, describe_table::DescribeTableOutput},
    types::BillingMode,
    Client,
};
use tokio::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::dynamodb::LocalTable;
use crate::utils::retry_with_backoff;

const CREATE_RETRY_DELAY: Duration = Duration::from_secs(1);
const CREATE_MAX_RETRIES: usize = 5;

/// Creates resource tables on a local DynamoDB endpoint.
///
/// Used during development to mirror the tables a deployment would create,
/// so generated functions can run against DynamoDB Local.
///
/// # Table Names
///
/// Local tables are named `<project>-<pluralCamel>-<stage>`, the same name
/// the deployed table gets once the stage placeholder in the manifest is
/// resolved.
///
/// # Error Handling
///
/// Every method returns `anyhow::Result`. SDK errors are wrapped with the
/// table name they concern.
#[derive(Debug)]
pub struct TableProvisioner {
    client: Client,
}

impl TableProvisioner {
    /// Creates a new `TableProvisioner` instance.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Verifies authentication by attempting to list tables.
    pub async fn check_auth(&self) -> Result<()> {
        self.client.list_tables().send().await.map_err(|e| {
            error!("Authentication failed: {}", e);
            anyhow!("Authentication failed")
        })?;
        info!("Authentication successful");
        Ok(())
    }

    /// Creates `table`, dropping an existing table of the same name first
    /// when `overwrite` is set.
    ///
    /// # Arguments
    ///
    /// * `table` - The table definition converted from the manifest.
    /// * `overwrite` - Whether to replace an existing table.
    ///
    /// # Returns
    ///
    /// The creation output, or `None` if the table exists and was kept.
    #[instrument(skip(self, table), fields(table = table.name()))]
    pub async fn provision(
        &self,
        table: &LocalTable,
        overwrite: bool,
    ) -> Result<Option<CreateTableOutput>> {
        if self.table_exists(table.name()).await? {
            if !overwrite {
                info!("Table '{}' exists", table.name());
                return Ok(None);
            }
            warn!("Table '{}' exists and will be recreated", table.name());
            self.delete_table(table.name()).await?;
        }

        let output = retry_with_backoff(
            || self.create_table(table),
            CREATE_RETRY_DELAY,
            CREATE_MAX_RETRIES,
        )
        .await?;
        info!("Table '{}' created", table.name());
        Ok(Some(output))
    }

    /// Creates a table from its definition.
    pub async fn create_table(&self, table: &LocalTable) -> Result<CreateTableOutput> {
        let mut request = self
            .client
            .create_table()
            .table_name(table.name())
            .set_attribute_definitions(Some(table.attribute_definitions().to_vec()))
            .set_key_schema(Some(table.key_schema().to_vec()))
            .set_local_secondary_indexes(non_empty(table.local_indexes().to_vec()))
            .set_global_secondary_indexes(non_empty(table.global_indexes().to_vec()));

        request = match table.throughput() {
            Some(throughput) => request
                .billing_mode(BillingMode::Provisioned)
                .provisioned_throughput(throughput.clone()),
            None => request.billing_mode(BillingMode::PayPerRequest),
        };

        request
            .send()
            .await
            .with_context(|| format!("Failed to create table '{}'", table.name()))
    }

    /// Deletes a table.
    pub async fn delete_table(&self, table_name: &str) -> Result<()> {
        self.client
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .with_context(|| format!("Failed to delete table '{table_name}'"))?;
        info!("Table '{table_name}' deleted");
        Ok(())
    }

    /// Checks if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let tables = self.client.list_tables().send().await?;
        Ok(tables.table_names().contains(&table_name.to_string()))
    }

    /// Retrieves table description.
    pub async fn describe_table(&self, table_name: &str) -> Result<DescribeTableOutput> {
        self.client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .with_context(|| format!("Failed to describe table '{table_name}'"))
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}
