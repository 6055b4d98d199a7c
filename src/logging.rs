use anyhow::Result;
use std::env;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const LOG_LEVEL_ENV: &str = "MUG_LOG";

/// Installs the global subscriber. `MUG_LOG` overrides the `info` default.
pub fn init_logging() -> Result<()> {
    let level = env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|level| Level::from_str(level.trim()).ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
