//! Lock commands: status and clear.

use super::Output;
use crate::cli::LockClearArgs;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::locks::clear_lock;

pub fn cmd_lock_status(config: &StoreConfig, out: &mut Output<'_>) -> Result<()> {
    let map = config.open_map(None)?;

    let Some(info) = map.lock_info()? else {
        return out.line("Lock is free.");
    };

    out.line(&format!("Lock:     {}", info.resource))?;
    out.line(&format!("Owner:    {}", info.owner))?;
    if let Some(at) = info.acquired_at {
        out.line(&format!("Since:    {}", at.format("%Y-%m-%d %H:%M:%S UTC")))?;
    }
    out.line(&format!("Age:      {}", info.age_string()))?;
    if info.is_stale {
        out.line(&format!(
            "Status:   STALE (exceeds {} min threshold)",
            config.lock_stale_minutes
        ))?;
        out.line("Run `mapq lock clear` to remove it.")?;
    }
    Ok(())
}

pub fn cmd_lock_clear(config: &StoreConfig, args: LockClearArgs, out: &mut Output<'_>) -> Result<()> {
    let map = config.open_map(None)?;
    let cleared = clear_lock(map.lock(), args.force)?;
    out.line(&format!("Cleared lock held by {} (age {}).", cleared.owner, cleared.age_string()))
}
