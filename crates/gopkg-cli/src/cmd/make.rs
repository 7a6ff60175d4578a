//! `gopkg make`: start a control directory for an import path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use gopkg_core::{Config, Maintainer, Manifest};
use gopkg_schema::naming::name_from_import_path;
use tracing::debug;

/// Write a new control manifest for `import_path` into `path`, which
/// defaults to a directory named after the import path.
pub fn make(import_path: &str, path: Option<&Path>, release: &str) -> Result<()> {
    let name = name_from_import_path(import_path);
    ensure!(!name.is_empty(), "Import path `{import_path}` names no package");

    let config = Config::load().context("Failed to load configuration")?;
    let maintainer =
        (config.maintainer != Maintainer::default()).then(|| config.maintainer_entry());
    if maintainer.is_none() {
        debug!("No maintainer configured");
    }

    let directory = path.map_or_else(
        || PathBuf::from(&name),
        Path::to_path_buf,
    );
    let manifest = Manifest::scaffold(import_path, release, maintainer);
    let written = manifest
        .save(&directory)
        .with_context(|| format!("Failed to create package in {}", directory.display()))?;

    println!("{}", written.display());
    Ok(())
}
