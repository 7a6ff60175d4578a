//! `gopkg build`: control directory to package files.

use std::path::Path;

use anyhow::{Context, Result};
use gopkg_core::{BuildOptions, Builder, GoCompiler, Manifest};

/// Build every package declared by the control directory at `path`.
pub fn build(path: &Path, force: bool, output: Option<&Path>, go: &Path) -> Result<()> {
    let manifest = Manifest::load(path)
        .with_context(|| format!("Failed to load control manifest in {}", path.display()))?;

    let mut options = BuildOptions::new(path).with_overwrite(force);
    if let Some(output) = output {
        options = options.with_output_dir(output);
    }

    let report = Builder::new(GoCompiler::new(go))
        .build(&manifest, &options)
        .with_context(|| format!("Failed to build {}", manifest.import_path))?;

    for artifact in &report.artifacts {
        println!("{}", artifact.display());
    }
    println!(
        "Built {} package(s) for {} {}",
        report.artifacts.len(),
        manifest.import_path,
        report.version
    );
    Ok(())
}
