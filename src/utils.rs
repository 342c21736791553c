use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use time::macros::format_description;
use tracing_subscriber::{fmt::time::LocalTime, EnvFilter};

/// Installs the global subscriber. Writes to `log_file` when given, to stderr
/// otherwise. `RUST_LOG` takes precedence over the verbosity flag.
pub fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let timer = LocalTime::new(format_description!(
        "[year].[month].[day] [hour]:[minute]:[second]"
    ));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(false);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;
        }
    }

    Ok(())
}

pub fn validate_args(args: &crate::args::Args) -> Result<()> {
    if let Some(path) = &args.config {
        if path.as_os_str().is_empty() {
            anyhow::bail!("--config must not be empty");
        }
        if path.is_dir() {
            anyhow::bail!("--config must point to a file, got directory {:?}", path);
        }
    }

    Ok(())
}
