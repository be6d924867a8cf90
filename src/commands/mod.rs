//! Command implementations for mapq.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command loads the store config first, then opens
//! the configured queue.

mod init;
mod lock;
mod queue;


use crate::cli::{Cli, Command, LockAction};
use crate::config::{DEFAULT_CONFIG_FILE, StoreConfig};
use crate::error::{MapError, Result};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Where command output goes (stdout in the binary, a buffer in tests).
pub struct Output<'a> {
    writer: &'a mut dyn Write,
}

impl<'a> Output<'a> {
    pub fn new(writer: &'a mut dyn Write) -> Self {
        Self { writer }
    }

    pub fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "{}", text)
            .map_err(|e| MapError::io("write output", Path::new("<stdout>"), e))
    }
}

/// Load the config named on the command line, else `./mapq.yaml` if present,
/// else built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    match path {
        Some(path) => StoreConfig::load(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                StoreConfig::load(default)
            } else {
                debug!("no {} found; using defaults", DEFAULT_CONFIG_FILE);
                Ok(StoreConfig::default())
            }
        }
    }
}

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(cli: Cli, out: &mut Output<'_>) -> Result<()> {
    let config_path = cli.config.as_deref();
    let config = || load_config(config_path);

    match cli.command {
        Command::Init(args) => init::cmd_init(config_path, args, out),
        Command::Push(args) => queue::cmd_push(&config()?, args, out),
        Command::Pop(args) => queue::cmd_pop(&config()?, args, out),
        Command::List(args) => queue::cmd_list(&config()?, args, out),
        Command::Count => queue::cmd_count(&config()?, out),
        Command::Reset => queue::cmd_reset(&config()?, out),
        Command::Validate => queue::cmd_validate(&config()?, out),
        Command::Destroy(args) => queue::cmd_destroy(&config()?, args, out),
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::Status => lock::cmd_lock_status(&config()?, out),
            LockAction::Clear(args) => lock::cmd_lock_clear(&config()?, args, out),
        },
    }
}
