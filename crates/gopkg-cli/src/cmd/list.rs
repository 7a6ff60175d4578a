//! `gopkg list`.

use anyhow::{Context, Result};

use super::open_cache;

/// Print installed packages, plus the catalog's unless `installed_only`.
pub async fn list(installed_only: bool) -> Result<()> {
    let (_, cache) = open_cache()?;
    let names = cache
        .list(installed_only)
        .await
        .context("Failed to list packages")?;

    if names.is_empty() {
        println!("No packages found.");
        return Ok(());
    }

    for name in names {
        match cache.get(&name) {
            Some(record) => println!("{name}\t{}\tinstalled", record.identity.version()),
            None => println!("{name}"),
        }
    }
    Ok(())
}
