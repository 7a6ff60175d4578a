//! `gopkg config`.

use anyhow::{Context, Result};
use gopkg_core::Config;

/// Print the resolved configuration.
pub fn config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("home          {}", config.home.display());
    println!("bin_dir       {}", config.bin_dir.display());
    println!("install_root  {}", config.install_root.display());
    println!("ledger_path   {}", config.ledger_path.display());
    println!("catalog_url   {}", config.catalog_url);
    println!("maintainer    {}", config.maintainer_entry());
    Ok(())
}
