//! Implementation of the `mapq init` command.
//!
//! # What `mapq init` does
//!
//! 1. Writes a config file with defaults (plus `--backend`/`--name`) if none exists
//! 2. Connects the configured store, creating its directory or Redis marker
//! 3. Reports where the store lives
//!
//! Running it again is harmless: an existing config is never overwritten.

use super::{Output, load_config};
use crate::cli::InitArgs;
use crate::config::{DEFAULT_CONFIG_FILE, StoreConfig};
use crate::error::{MapError, Result};
use crate::fs::atomic_write;
use crate::map::BackendKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Execute the `mapq init` command.
pub fn cmd_init(config_path: Option<&Path>, args: InitArgs, out: &mut Output<'_>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let written = if path.exists() {
        if args.backend.is_some() || args.name.is_some() {
            out.line(&format!(
                "Config '{}' already exists; --backend/--name ignored.",
                path.display()
            ))?;
        }
        false
    } else {
        write_config(&path, &args)?;
        true
    };

    let config = load_config(Some(&path))?;
    let queue = config.open_queue(None)?;
    queue.connect()?;
    info!(config = %path.display(), backend = %config.backend, "initialized store");

    if written {
        out.line(&format!("Wrote config:  {}", path.display()))?;
    }
    out.line(&format!("Queue:         {}", config.name))?;
    out.line(&format!("Backend:       {}", config.backend))?;
    out.line(&format!("Location:      {}", queue.map().backend().location()))?;
    Ok(())
}

fn write_config(path: &Path, args: &InitArgs) -> Result<()> {
    let mut config = StoreConfig::default();
    if let Some(backend) = &args.backend {
        config.backend = BackendKind::from_str(backend).ok_or_else(|| {
            MapError::UserError(format!(
                "unknown backend '{}' (expected memory, file, compressed, text or redis)",
                backend
            ))
        })?;
    }
    if let Some(name) = &args.name {
        config.name = name.clone();
        config.path = format!(".mapq/{}", name);
    }
    config.validate()?;

    atomic_write(path, config.to_yaml()?.as_bytes())
}
