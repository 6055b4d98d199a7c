mod command_line;
mod logging;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging()?;

    let dir = match env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => env::current_dir().context("Failed to read the working directory")?,
    };

    let mut project = command_line::open_project(&dir)?;
    info!(
        "Project '{}' with {} resource(s)",
        project.project_name,
        project.resources.len()
    );

    command_line::run(&mut project).await
}
