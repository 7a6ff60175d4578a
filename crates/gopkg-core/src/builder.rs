//! Build orchestration: control manifest in, package archives out.
//!
//! A build walks the manifest's sub-packages in order. Source sub-packages
//! are bundled straight from the control directory; binary sub-packages are
//! compiled once per declared target and each executable is wrapped in its
//! own package. The first failure ends the build.
//!
//! ## Directory contract
//!
//! | Path | Use |
//! |---|---|
//! | `output_dir` | Finished packages (defaults to the control directory) |
//! | `scratch_dir` | Wiped and recreated at the start of every build |
//! | `scratch_dir/<package file name>` | Per-target compiler output, removed once packaged |
//!
//! Packages are never written over an existing file unless
//! [`BuildOptions::overwrite`] is set; a released package must not be
//! silently replaced.

use std::fs;
use std::path::{Path, PathBuf};

use gopkg_schema::{ArtifactIdentity, FILE_EXT, NamingError, encode};
use thiserror::Error;
use tracing::{debug, info};

use crate::archive::{self, ArchiveEntry, ArchiveError, BIN_DIR};
use crate::compiler::{CompileError, CompileRequest, Compiler};
use crate::manifest::{CONTROL_DIR, Manifest, SubPackage};

/// Default scratch directory name inside the control directory.
pub const SCRATCH_DIR: &str = "build";

/// Names never bundled into a source package.
const SOURCE_EXCLUDES: &[&str] = &[".git", CONTROL_DIR, SCRATCH_DIR];

/// Errors that abort a build.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The manifest has no release to version the packages with.
    #[error("manifest for {import_path} declares no release")]
    NoRelease {
        /// Import path of the manifest.
        import_path: String,
    },

    /// The scratch directory could not be recreated.
    #[error("cannot prepare scratch directory {}: {source}", path.display())]
    Scratch {
        /// Scratch directory.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The compiler failed for one target.
    #[error("failed to compile {package} for {os}/{arch}: {source}")]
    CompileFailed {
        /// Sub-package being built.
        package: String,
        /// Target OS.
        os: String,
        /// Target architecture.
        arch: String,
        /// Compiler error, carrying its diagnostics verbatim.
        source: CompileError,
    },

    /// A package could not be named.
    #[error("cannot name package {package}: {source}")]
    Naming {
        /// Sub-package being built.
        package: String,
        /// Codec error.
        source: NamingError,
    },

    /// A package archive could not be written.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Staging or cleanup IO failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Where a build reads from and writes to.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Control directory holding the Go sources.
    pub source_dir: PathBuf,
    /// Directory receiving finished packages.
    pub output_dir: PathBuf,
    /// Scratch directory, wiped at the start of the build.
    pub scratch_dir: PathBuf,
    /// Replace packages that already exist in `output_dir`.
    pub overwrite: bool,
}

impl BuildOptions {
    /// Options for building `source_dir` in place.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        Self {
            output_dir: source_dir.clone(),
            scratch_dir: source_dir.join(SCRATCH_DIR),
            source_dir,
            overwrite: false,
        }
    }

    /// Write packages to `output_dir` instead of the control directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Allow replacing existing packages.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Version every package was built at.
    pub version: String,
    /// Packages written, in build order.
    pub artifacts: Vec<PathBuf>,
}

/// Drives a [`Compiler`] and the archive writer over a manifest.
#[derive(Debug)]
pub struct Builder<C> {
    compiler: C,
}

impl<C: Compiler> Builder<C> {
    /// Create a builder backed by `compiler`.
    pub fn new(compiler: C) -> Self {
        Self { compiler }
    }

    /// Build every sub-package of `manifest` at its current release.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; packages finished before it stay
    /// on disk, nothing after it is attempted.
    pub fn build(
        &self,
        manifest: &Manifest,
        options: &BuildOptions,
    ) -> Result<BuildReport, BuildError> {
        let version = manifest
            .current_release()
            .ok_or_else(|| BuildError::NoRelease {
                import_path: manifest.import_path.clone(),
            })?
            .version
            .clone();

        recreate_dir(&options.scratch_dir).map_err(|source| BuildError::Scratch {
            path: options.scratch_dir.clone(),
            source,
        })?;
        fs::create_dir_all(&options.output_dir).map_err(|source| BuildError::Io {
            path: options.output_dir.clone(),
            source,
        })?;

        info!(import_path = %manifest.import_path, %version, "Building control package");

        let mut artifacts = Vec::new();
        for package in &manifest.packages {
            if package.is_source() {
                artifacts.push(build_source(manifest, package, &version, options)?);
            } else {
                self.build_binaries(package, &version, options, &mut artifacts)?;
            }
        }

        Ok(BuildReport { version, artifacts })
    }

    fn build_binaries(
        &self,
        package: &SubPackage,
        version: &str,
        options: &BuildOptions,
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<(), BuildError> {
        for (os, arch) in package.targets.pairs() {
            let identity = ArtifactIdentity::binary(&package.name, version, os, arch);
            let file_name = name_package(&identity, package)?;
            let build_dir = options.scratch_dir.join(&file_name);
            let binary = build_dir.join(package.binary_name());

            fs::create_dir_all(&build_dir).map_err(|source| BuildError::Io {
                path: build_dir.clone(),
                source,
            })?;

            self.compiler
                .compile(&CompileRequest {
                    source_dir: &options.source_dir,
                    entry_point: package.entry_point(),
                    output: &binary,
                    os,
                    arch,
                })
                .map_err(|source| BuildError::CompileFailed {
                    package: package.name.clone(),
                    os: os.to_string(),
                    arch: arch.to_string(),
                    source,
                })?;

            let dest = options.output_dir.join(&file_name);
            archive::write(
                &dest,
                &[ArchiveEntry::new(
                    &binary,
                    format!("{BIN_DIR}/{}", package.binary_name()),
                )],
                options.overwrite,
            )?;

            fs::remove_dir_all(&build_dir).map_err(|source| BuildError::Io {
                path: build_dir.clone(),
                source,
            })?;

            info!(package = %file_name, "Successfully built binary package");
            artifacts.push(dest);
        }
        Ok(())
    }
}

/// Bundle the control directory's sources, skipping metadata, scratch output
/// and previously built packages.
fn build_source(
    manifest: &Manifest,
    package: &SubPackage,
    version: &str,
    options: &BuildOptions,
) -> Result<PathBuf, BuildError> {
    let identity = ArtifactIdentity::source(&package.name, version);
    let file_name = name_package(&identity, package)?;
    let dest = options.output_dir.join(&file_name);

    let scratch_name = options
        .scratch_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(SCRATCH_DIR);
    let mut excludes = SOURCE_EXCLUDES.to_vec();
    excludes.push(scratch_name);

    let entries: Vec<ArchiveEntry> =
        archive::collect_entries(&options.source_dir, &manifest.import_path, &excludes)
            .map_err(|source| BuildError::Io {
                path: options.source_dir.clone(),
                source,
            })?
            .into_iter()
            .filter(|e| !is_package_file(&e.source_path))
            .collect();

    debug!(package = %package.name, files = entries.len(), "Staged source files");
    archive::write(&dest, &entries, options.overwrite)?;

    info!(package = %file_name, "Successfully built source package");
    Ok(dest)
}

fn name_package(identity: &ArtifactIdentity, package: &SubPackage) -> Result<String, BuildError> {
    encode(identity).map_err(|source| BuildError::Naming {
        package: package.name.clone(),
        source,
    })
}

fn is_package_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == FILE_EXT)
}

fn recreate_dir(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(path)
}
