//! CLI argument parsing for mapq.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// mapq: a FIFO queue over a lock-coordinated key-value store.
///
/// Every command operates on the queue described by the config file:
/// - `backend` selects memory, file, compressed, text or redis storage
/// - mutations are serialized by an exclusive lock shared by all processes
/// - `total` counts every push ever made; `count` is what is still pending
#[derive(Parser, Debug)]
#[command(name = "mapq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the store config (default: ./mapq.yaml, or built-in defaults if absent).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for mapq.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store and write a config file if none exists.
    Init(InitArgs),

    /// Append a JSON value to the queue.
    ///
    /// Prints the generated key.
    Push(PushArgs),

    /// Remove and print the oldest records.
    ///
    /// Prints nothing when the queue is empty; never waits for new records.
    Pop(PopArgs),

    /// Show pending records without removing them.
    List(ListArgs),

    /// Show pending and total record counts.
    Count,

    /// Remove all pending records (the total is kept).
    Reset,

    /// Check storage integrity.
    Validate,

    /// Remove the store and its lock permanently.
    ///
    /// Requires --force flag to prevent accidental destruction.
    Destroy(DestroyArgs),

    /// Lock management commands.
    ///
    /// Inspect or clear the store lock.
    Lock(LockCommand),
}

/// Arguments for the `init` command.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Backend for a newly written config (memory, file, compressed, text, redis).
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Queue name for a newly written config.
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Arguments for the `push` command.
#[derive(Parser, Debug)]
pub struct PushArgs {
    /// JSON value to enqueue (e.g. '{"job": 1}' or '"text"').
    pub value: String,

    /// Message stored alongside the value.
    #[arg(short, long, default_value = "")]
    pub message: String,
}

/// Arguments for the `pop` command.
#[derive(Parser, Debug)]
pub struct PopArgs {
    /// Maximum number of records to pop.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Print full records as JSON lines.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only show keys matching this glob.
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Print full records as JSON lines.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `destroy` command.
#[derive(Parser, Debug)]
pub struct DestroyArgs {
    /// Confirm destruction (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show who holds the store lock.
    Status,

    /// Clear the store lock after a crashed holder.
    ///
    /// A stale lock is cleared directly; a fresh one requires --force.
    Clear(LockClearArgs),
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Clear the lock even if it is not stale.
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
