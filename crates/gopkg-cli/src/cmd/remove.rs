//! `gopkg remove`.

use anyhow::{Context, Result};

use super::open_cache;

/// Uninstall the package installed under `alias`.
pub fn remove(alias: &str) -> Result<()> {
    let (_, mut cache) = open_cache()?;
    cache
        .remove(alias)
        .with_context(|| format!("Failed to remove {alias}"))?;
    println!("Removed {alias}");
    Ok(())
}
