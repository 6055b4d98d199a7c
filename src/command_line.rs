use anyhow::{anyhow, Result};
use mug_scaffold::config::{ProjectConfig, DEFAULT_REGION};
use mug_scaffold::dynamodb::{self, TableProvisioner};
use mug_scaffold::model::{BillingMode, CapacityUnits, GenerationOptions};
use mug_scaffold::project;
use std::io::{self, Write};
use std::path::Path;
use tracing::{error, info};

const DEFAULT_STAGE: &str = "dev";

/// Runs the interactive shell for a scaffolded project.
///
/// This function enters a loop that prompts the user for commands and executes them.
/// The supported commands are:
/// - add_resource: Compile a resource from an attribute description and add it to the project
/// - add_function: Add a custom function to a function group
/// - remove_function: Remove a function from a function group
/// - remove_resource: Remove a resource, its function group and its API entries
/// - auth: Turn the Cognito authorizer on or off for a function group
/// - show: Print the project configuration
/// - provision: Create a resource table on the local DynamoDB endpoint
/// - exit: Exit the program
///
/// A failed command is reported and leaves the project files untouched; the
/// loop keeps running.
///
/// # Arguments
///
/// * `project` - The loaded project configuration
///
/// # Returns
///
/// Returns `Ok(())` when the user exits, or an error if reading input fails.
pub async fn run(project: &mut ProjectConfig) -> Result<()> {
    loop {
        let command = prompt(
            "Enter command (add_resource/add_function/remove_function/remove_resource/auth/show/provision/exit)",
            None,
        )?;
        let outcome = match command.as_str() {
            "add_resource" => add_resource(project),
            "add_function" => add_function(project),
            "remove_function" => remove_function(project),
            "remove_resource" => remove_resource(project),
            "auth" => auth(project),
            "show" => show(project),
            "provision" => provision(project).await,
            "exit" => break,
            _ => {
                println!("Unknown command. Please try again.");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            error!("{command} failed: {e:#}");
        }
    }
    Ok(())
}

/// Loads the project in `dir`, or asks for the settings of a new one.
pub fn open_project(dir: &Path) -> Result<ProjectConfig> {
    if dir.join(mug_scaffold::config::CONFIG_FILE).exists() {
        return ProjectConfig::load(dir);
    }

    println!("No project found in {}.", dir.display());
    let default_name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mug-project".to_string());
    let name = prompt_optional("Enter project name", Some(&default_name))?.unwrap_or(default_name);
    let region = prompt_optional("Enter AWS region", Some(DEFAULT_REGION))?
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let mut project = ProjectConfig::new(&name, dir, &region);
    project.import_path = prompt("Enter import path", Some("github.com/acme/shop"))?;
    project.save()?;
    info!("Project '{name}' created");
    Ok(project)
}

/// Compiles a resource and writes its model, manifest and API entries.
///
/// Prompts for the resource name, the attribute description and the
/// generation options.
///
/// # Arguments
///
/// * `project` - The project configuration, updated with the new resource
///
/// # Returns
///
/// Returns `Ok(())` if the resource is added, or the parse, validation or
/// persistence error.
fn add_resource(project: &mut ProjectConfig) -> Result<()> {
    let name = prompt("Enter resource name", Some("course"))?;
    let attributes = prompt(
        "Enter attributes",
        Some("name,price:float64,tags[label,weight:int]"),
    )?;
    let is_collection = prompt_bool("Is the resource a collection?", false)?;
    let generate_id = prompt_bool("Generate an id attribute as hash key?", true)?;
    let explicit_key_schema = if generate_id {
        String::new()
    } else {
        prompt_optional("Enter key schema", Some("courseId:HASH,userId:RANGE"))?.unwrap_or_default()
    };
    let indexes = prompt_optional("Enter secondary indexes", Some("byEmail:global:email"))?
        .unwrap_or_default();
    let add_timestamps = prompt_bool("Add createdAt/updatedAt?", true)?;
    let add_soft_delete = prompt_bool("Add deletedAt for soft delete?", false)?;
    let billing_mode: BillingMode = prompt_optional("Enter billing mode", Some("provisioned"))?
        .map(|mode| mode.parse::<BillingMode>().map_err(|e| anyhow!(e)))
        .transpose()?
        .unwrap_or_default();
    let capacity = match billing_mode {
        BillingMode::Provisioned => CapacityUnits {
            read: prompt_number("Enter read capacity units", 1)?,
            write: prompt_number("Enter write capacity units", 1)?,
        },
        BillingMode::OnDemand => CapacityUnits::default(),
    };

    let options = GenerationOptions {
        generate_id,
        add_timestamps,
        add_soft_delete,
        explicit_key_schema,
        indexes,
        billing_mode,
        capacity,
    };
    let artifacts = project::add_resource(project, &name, is_collection, &attributes, &options)?;

    println!("\nResource '{}' added:", artifacts.model.identifier);
    for function in &artifacts.resource.functions {
        if let Some(route) = function.definition.route() {
            println!("  {:<24} {:<6} /{}", function.name, route.method, route.path);
        }
    }
    Ok(())
}

fn add_function(project: &ProjectConfig) -> Result<()> {
    let group = prompt("Enter function group (resource name or _)", Some("_"))?;
    let verb = prompt("Enter function verb", Some("search"))?;
    let path = prompt("Enter route path", Some("courses/search"))?;
    let method = prompt("Enter HTTP method", Some("get"))?;
    let name = project::add_function(project, &group, &verb, &path, &method)?;
    println!("Function '{name}' added to '{group}'");
    Ok(())
}

fn remove_function(project: &ProjectConfig) -> Result<()> {
    let group = prompt("Enter function group", Some("course"))?;
    let name = prompt("Enter function name", Some("search_course"))?;
    project::remove_function(project, &group, &name)?;
    println!("Function '{name}' removed from '{group}'");
    Ok(())
}

/// Removes a resource after confirmation.
///
/// # Arguments
///
/// * `project` - The project configuration, updated without the resource
///
/// # Returns
///
/// Returns `Ok(())` if the resource is removed or the user cancels, or an
/// error if the resource is unknown.
fn remove_resource(project: &mut ProjectConfig) -> Result<()> {
    let name = prompt("Enter resource name", Some("course"))?;
    if !prompt_bool(
        &format!("Remove '{name}' with its functions and API entries? This cannot be undone."),
        false,
    )? {
        println!("Resource removal cancelled.");
        return Ok(());
    }
    project::remove_resource(project, &name)?;
    println!("Resource '{name}' removed");
    Ok(())
}

fn auth(project: &ProjectConfig) -> Result<()> {
    let group = prompt("Enter function group", Some("course"))?;
    let enabled = prompt_bool("Require authorization?", true)?;
    let (excludes, pool) = if enabled {
        (
            prompt_optional("Enter handlers to leave public", Some("read,list"))?.unwrap_or_default(),
            prompt_optional(
                "Enter Cognito user pool ARN (empty keeps the stored one)",
                Some("arn:aws:cognito-idp:us-east-1:123456789012:userpool/us-east-1_abc"),
            )?,
        )
    } else {
        (String::new(), None)
    };
    let excludes: Vec<&str> = excludes
        .split(',')
        .map(str::trim)
        .filter(|verb| !verb.is_empty())
        .collect();
    project::set_auth(project, &group, enabled, &excludes, pool.as_deref())?;
    println!(
        "Authorization {} for '{group}'",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Prints the project settings and every resource with its key schema.
fn show(project: &ProjectConfig) -> Result<()> {
    println!("\n--- Project Information ---");
    println!("Project Name: {}", project.project_name);
    println!("Project Path: {}", project.project_path.display());
    println!("Region: {}", project.region);
    println!("Runtime: {}", project.runtime);
    if project.resources.is_empty() {
        println!("Resources: none");
    }
    for (name, resource) in &project.resources {
        let keys: Vec<String> = resource
            .key_schema
            .iter()
            .map(|(role, attribute)| format!("{attribute} ({role})"))
            .collect();
        println!("Resource: {name}");
        println!("  Keys: {}", keys.join(", "));
        println!("  Billing: {}", resource.billing_mode);
        if let Some(units) = resource.capacity_units {
            println!("  Capacity: {} read / {} write", units.read, units.write);
        }
    }
    println!("---------------------------\n");
    Ok(())
}

/// Creates the table of a resource on the local DynamoDB endpoint.
///
/// # Arguments
///
/// * `project` - The project configuration
///
/// # Returns
///
/// Returns `Ok(())` if the table exists afterwards, or an error if the
/// resource is unknown or the endpoint rejects the request.
async fn provision(project: &ProjectConfig) -> Result<()> {
    let name = prompt("Enter resource name", Some("course"))?;
    if project.resource(&name).is_none() {
        return Err(anyhow!("Unknown resource '{name}'"));
    }
    let stage = prompt_optional("Enter stage", Some(DEFAULT_STAGE))?
        .unwrap_or_else(|| DEFAULT_STAGE.to_string());
    let overwrite = prompt_bool("Overwrite an existing table?", false)?;

    let model = project.load_model(&name)?;
    let table = dynamodb::local_table(&project.project_name, &model, &stage)?;

    let sdk_config = dynamodb::local_sdk_config().await;
    let provisioner = TableProvisioner::new(&sdk_config);
    provisioner.check_auth().await?;
    match provisioner.provision(&table, overwrite).await? {
        Some(output) => {
            if let Some(description) = output.table_description() {
                info!("Table status: {:?}", description.table_status());
            }
        }
        None => {
            let existing = provisioner.describe_table(table.name()).await?;
            println!(
                "Table '{}' already exists (status: {:?})",
                table.name(),
                existing.table().and_then(|t| t.table_status())
            );
        }
    }
    Ok(())
}

fn prompt(message: &str, example: Option<&str>) -> Result<String> {
    let full_message = if let Some(ex) = example {
        format!("{} (e.g., {}): ", message, ex)
    } else {
        format!("{}: ", message)
    };
    print!("{}", full_message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_optional(message: &str, example: Option<&str>) -> Result<Option<String>> {
    let input = prompt(message, example)?;
    Ok(if input.is_empty() { None } else { Some(input) })
}

fn prompt_bool(message: &str, default: bool) -> Result<bool> {
    let input = prompt(
        &format!("{} (y/n)", message),
        Some(if default { "y" } else { "n" }),
    )?;
    Ok(input.to_lowercase().starts_with('y') || (input.is_empty() && default))
}

fn prompt_number(message: &str, default: i64) -> Result<i64> {
    match prompt_optional(message, Some(&default.to_string()))? {
        Some(input) => input
            .parse()
            .map_err(|_| anyhow!("'{input}' is not a whole number")),
        None => Ok(default),
    }
}
