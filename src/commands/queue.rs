//! Queue commands: push, pop, list, count, reset, validate, destroy.

use super::Output;
use crate::cli::{DestroyArgs, ListArgs, PopArgs, PushArgs};
use crate::config::StoreConfig;
use crate::error::{MapError, Result};
use crate::map::Record;
use crate::queue::key_time;
use serde_json::Value;

fn print_record(record: &Record, json: bool, out: &mut Output<'_>) -> Result<()> {
    if json {
        return out.line(&serde_json::to_string(record)?);
    }

    let enqueued = key_time(&record.key)
        .unwrap_or(record.timestamp)
        .format("%Y-%m-%d %H:%M:%S UTC");
    let mut line = format!("{}  {}  {}", record.key, enqueued, record.value);
    if !record.message.is_empty() {
        line.push_str(&format!("  # {}", record.message));
    }
    out.line(&line)
}

pub fn cmd_push(config: &StoreConfig, args: PushArgs, out: &mut Output<'_>) -> Result<()> {
    let value: Value = serde_json::from_str(&args.value).map_err(|e| {
        MapError::UserError(format!("value is not valid JSON ({}): {}", e, args.value))
    })?;

    let queue = config.open_queue(None)?;
    let key = queue.push(&value, &args.message)?;
    out.line(&key)
}

pub fn cmd_pop(config: &StoreConfig, args: PopArgs, out: &mut Output<'_>) -> Result<()> {
    let queue = config.open_queue(None)?;
    for record in queue.pop(args.count)? {
        print_record(&record, args.json, out)?;
    }
    Ok(())
}

pub fn cmd_list(config: &StoreConfig, args: ListArgs, out: &mut Output<'_>) -> Result<()> {
    let queue = config.open_queue(None)?;

    let records = match &args.filter {
        None => queue.list()?,
        Some(pattern) => {
            let mut records = Vec::new();
            for key in queue.map().keys_matching(pattern)? {
                if let Some(record) = queue.map().get_record(&key)? {
                    records.push(record);
                }
            }
            records
        }
    };

    if records.is_empty() && !args.json {
        return out.line("Queue is empty.");
    }
    for record in &records {
        print_record(record, args.json, out)?;
    }
    Ok(())
}

pub fn cmd_count(config: &StoreConfig, out: &mut Output<'_>) -> Result<()> {
    let queue = config.open_queue(None)?;
    out.line(&format!("pending: {}", queue.count()?))?;
    out.line(&format!("total:   {}", queue.total()?))
}

pub fn cmd_reset(config: &StoreConfig, out: &mut Output<'_>) -> Result<()> {
    let queue = config.open_queue(None)?;
    let dropped = queue.count()?;
    queue.reset()?;
    out.line(&format!("Dropped {} pending record(s).", dropped))
}

pub fn cmd_validate(config: &StoreConfig, out: &mut Output<'_>) -> Result<()> {
    let queue = config.open_queue(None)?;
    queue.validate()?;
    out.line(&format!("Queue '{}' is valid.", queue.name()))
}

pub fn cmd_destroy(config: &StoreConfig, args: DestroyArgs, out: &mut Output<'_>) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(MapError::UserError(format!(
            "refusing to destroy queue '{}' without --force flag.\n\n\
             Destroying removes every pending record, the total counter and the lock.\n\n\
             To destroy the queue, run:\n  mapq destroy --force",
            config.name
        )));
    }

    let queue = config.open_queue(None)?;
    let location = queue.map().backend().location();
    queue.destroy()?;
    out.line(&format!("Destroyed queue '{}' at {}.", queue.name(), location))
}
