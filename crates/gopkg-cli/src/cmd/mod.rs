//! Subcommand implementations.

pub mod build;
pub mod config;
pub mod install;
pub mod list;
pub mod make;
pub mod remove;

use anyhow::{Context, Result};
use gopkg_core::{Cache, Config, HttpCatalog};
use tracing::debug;

/// Resolve the configuration and open the cache it describes.
pub(crate) fn open_cache() -> Result<(Config, Cache<HttpCatalog>)> {
    let config = Config::load().context("Failed to load configuration")?;
    debug!(home = %config.home.display(), "Loaded configuration");

    let catalog = HttpCatalog::new(&config.catalog_url)
        .with_context(|| format!("Failed to set up catalog client for {}", config.catalog_url))?;
    debug!(catalog = catalog.base_url(), "Using catalog");
    let cache = Cache::open(config.layout(), catalog).context("Failed to open package cache")?;
    Ok((config, cache))
}
