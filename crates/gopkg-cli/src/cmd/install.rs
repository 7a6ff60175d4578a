//! `gopkg install`.

use std::path::Path;

use anyhow::{Context, Result};

use super::open_cache;

/// Install `package`: a catalog name, or a package file when `from_file`.
pub async fn install(package: &str, from_file: bool) -> Result<()> {
    let (_, mut cache) = open_cache()?;

    let record = if from_file {
        cache
            .install_from_file(Path::new(package))
            .with_context(|| format!("Failed to install {package}"))?
    } else {
        cache
            .install_by_name(package)
            .await
            .with_context(|| format!("Failed to install {package}"))?
    };

    println!(
        "Installed {} ({}) into {}",
        record.alias,
        record.identity,
        record.install_path.display()
    );
    for link in &record.links {
        println!("  {}", link.display());
    }
    Ok(())
}
