//! Local package cache.
//!
//! The cache owns the installation ledger and the install root. It is the
//! only writer of either: opening a [`Cache`] takes an exclusive lock on the
//! ledger that is held until the cache is dropped.
//!
//! # Layout
//!
//! ```text
//! {install_root}/<alias>/...   # materialized package contents
//! {bin_dir}/<executable>       # links into {install_root}/<alias>/bin
//! {ledger_path}                # installed packages (JSON)
//! {ledger_path}.lock           # held while a cache is open
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use gopkg_schema::{ArtifactIdentity, ArtifactKind, NamingError, Platform, decode_path, encode};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveError, BIN_DIR};
use crate::catalog::{Catalog, CatalogError};
use crate::ledger::{InstalledRecord, Ledger, LedgerError};
use crate::paths;

/// Errors returned by cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The package file name is not a valid artifact name.
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// The package archive could not be read.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The catalog has no package for the host target.
    #[error("package {name} not found for {os}/{arch}")]
    NotFound {
        /// Requested package.
        name: String,
        /// Host OS.
        os: String,
        /// Host architecture.
        arch: String,
    },

    /// The catalog could not be queried.
    #[error("failed to fetch {name}: {reason}")]
    FetchFailed {
        /// Package (or listing) being fetched.
        name: String,
        /// Transport failure.
        reason: String,
    },

    /// No package is installed under this alias.
    #[error("{alias} is not installed")]
    NotInstalled {
        /// Requested alias.
        alias: String,
    },

    /// The ledger file exists but cannot be understood.
    #[error("ledger {} is corrupt: {reason}", path.display())]
    LedgerCorrupt {
        /// Ledger path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Another process holds the cache.
    #[error("cache is in use by another process (lock: {})", path.display())]
    Locked {
        /// Lock file path.
        path: PathBuf,
    },

    /// Filesystem failure while installing or removing.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl From<LedgerError> for CacheError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Corrupt { path, reason } => Self::LedgerCorrupt { path, reason },
            LedgerError::Io { path, source } => Self::Io { path, source },
        }
    }
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Where the cache keeps its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Parent of every install directory.
    pub install_root: PathBuf,
    /// Directory executables are exposed in.
    pub bin_dir: PathBuf,
    /// Ledger file.
    pub ledger_path: PathBuf,
}

impl Layout {
    /// Default layout under a gopkg home directory.
    pub fn under(home: &Path) -> Self {
        Self {
            install_root: paths::install_root(home),
            bin_dir: paths::bin_path(home),
            ledger_path: paths::ledger_path(home),
        }
    }
}

/// Installed packages plus the catalog to fetch new ones from.
#[derive(Debug)]
pub struct Cache<C> {
    layout: Layout,
    catalog: C,
    platform: Platform,
    ledger: Ledger,
    _lock: File,
}

impl<C: Catalog> Cache<C> {
    /// Lock and load the cache described by `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Locked`] if another cache is open on the same
    /// ledger, [`CacheError::LedgerCorrupt`] if the ledger cannot be parsed.
    pub fn open(layout: Layout, catalog: C) -> Result<Self, CacheError> {
        if let Some(parent) = layout
            .ledger_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(io_at(parent))?;
        }

        let lock_path = paths::lock_path(&layout.ledger_path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_at(&lock_path))?;
        match lock.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                return Err(CacheError::Locked { path: lock_path });
            }
            Err(e) => return Err(io_at(&lock_path)(e)),
        }

        let ledger = Ledger::load(&layout.ledger_path)?;
        debug!(
            ledger = %ledger.path().display(),
            installed = ledger.len(),
            "Opened cache"
        );

        Ok(Self {
            layout,
            catalog,
            platform: Platform::current(),
            ledger,
            _lock: lock,
        })
    }

    /// Resolve remote packages for `platform` instead of the host.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Directories the cache operates on.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Record installed under `alias`.
    pub fn get(&self, alias: &str) -> Option<&InstalledRecord> {
        self.ledger.get(alias)
    }

    /// Every installed record, in alias order.
    pub fn records(&self) -> impl Iterator<Item = &InstalledRecord> {
        self.ledger.records()
    }

    /// Install the package archive at `path`, replacing any package already
    /// installed under the same alias.
    ///
    /// The previous install is moved aside until the new one is recorded in
    /// the ledger; on any failure it is put back and the ledger is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Naming`] if the file name does not decode,
    /// [`CacheError::Archive`] if the archive is unreadable, and
    /// [`CacheError::Io`] if it cannot be materialized.
    pub fn install_from_file(&mut self, path: &Path) -> Result<InstalledRecord, CacheError> {
        let identity = decode_path(path)?;
        let alias = identity.alias();
        let install_path = self.install_path(&alias)?;
        let contents = archive::read(path)?;

        let root = self.layout.install_root.clone();
        fs::create_dir_all(&root).map_err(io_at(&root))?;

        let staging = temp_dir_in(&root, ".staging-")?;
        materialize(staging.path(), &contents, path)?;

        let backup = temp_dir_in(&root, ".backup-")?;
        let previous_tree = backup.path().join(&alias);
        let moved_aside = match fs::rename(&install_path, &previous_tree) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(io_at(&install_path)(e)),
        };
        let previous_links = self
            .ledger
            .get(&alias)
            .map(|r| r.links.clone())
            .unwrap_or_default();

        let mut created = Vec::new();
        match self.commit(identity, &staging, &install_path, &mut created) {
            Ok(record) => {
                let stale: Vec<PathBuf> = previous_links
                    .into_iter()
                    .filter(|l| !record.links.contains(l))
                    .collect();
                if let Err(e) = unlink_all(&stale) {
                    warn!(error = %e, "Failed to remove stale links");
                }
                if moved_aside {
                    debug!(path = %install_path.display(), "Replaced previous install");
                }
                info!(
                    alias = %record.alias,
                    version = %record.identity.version(),
                    path = %record.install_path.display(),
                    "Installed package"
                );
                Ok(record)
            }
            Err(err) => {
                for link in created.iter().filter(|l| !previous_links.contains(l)) {
                    if let Err(e) = fs::remove_file(link) {
                        warn!(link = %link.display(), error = %e, "Failed to remove link");
                    }
                }
                match fs::remove_dir_all(&install_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %install_path.display(), error = %e, "Failed to clear failed install");
                    }
                }
                if moved_aside {
                    if let Err(e) = fs::rename(&previous_tree, &install_path) {
                        warn!(
                            path = %install_path.display(),
                            error = %e,
                            "Failed to restore previous install"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Move the staged tree into place, expose its binaries and record it.
    /// `created` collects every link made, even when this fails.
    fn commit(
        &mut self,
        identity: ArtifactIdentity,
        staging: &TempDir,
        install_path: &Path,
        created: &mut Vec<PathBuf>,
    ) -> Result<InstalledRecord, CacheError> {
        fs::rename(staging.path(), install_path).map_err(io_at(install_path))?;

        if identity.kind() == ArtifactKind::Binary {
            expose_binaries(install_path, &self.layout.bin_dir, created)?;
        }
        let mut links = created.clone();
        links.sort();

        let record = InstalledRecord {
            alias: identity.alias(),
            identity,
            install_path: install_path.to_path_buf(),
            installed_at: Utc::now(),
            links,
        };
        let previous = self.ledger.upsert(record.clone());
        if let Err(e) = self.ledger.save() {
            match previous {
                Some(previous) => self.ledger.upsert(previous),
                None => self.ledger.remove(&record.alias),
            };
            return Err(e.into());
        }
        Ok(record)
    }

    /// Install directory for `alias`, which must be a single plain path
    /// component directly under the install root.
    fn install_path(&self, alias: &str) -> Result<PathBuf, CacheError> {
        let mut components = Path::new(alias).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.layout.install_root.join(alias)),
            _ => Err(NamingError::InvalidIdentity {
                reason: format!("alias `{alias}` is not a plain directory name"),
            }
            .into()),
        }
    }

    /// Fetch `name` for the cache's platform from the catalog and install it.
    ///
    /// Nothing is installed if the fetch fails.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] if the catalog has no such package,
    /// [`CacheError::FetchFailed`] if the catalog cannot be reached, and any
    /// error from [`Cache::install_from_file`].
    pub async fn install_by_name(&mut self, name: &str) -> Result<InstalledRecord, CacheError> {
        let Platform { os, arch } = self.platform.clone();
        let fetched = self
            .catalog
            .fetch_artifact(name, &os, &arch)
            .await
            .map_err(|e| match e {
                CatalogError::NotFound { name, os, arch } => CacheError::NotFound { name, os, arch },
                CatalogError::Transport { .. } => CacheError::FetchFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                },
            })?;

        let expected = ArtifactIdentity::binary(name, fetched.identity.version(), &os, &arch);
        if fetched.identity != expected {
            return Err(CacheError::FetchFailed {
                name: name.to_string(),
                reason: format!(
                    "catalog returned {} when asked for {name} on {os}/{arch}",
                    fetched.identity
                ),
            });
        }

        let root = &self.layout.install_root;
        fs::create_dir_all(root).map_err(io_at(root))?;
        let download = temp_dir_in(root, ".download-")?;
        let file = download.path().join(encode(&fetched.identity)?);
        fs::write(&file, &fetched.bytes).map_err(io_at(&file))?;
        debug!(file = %file.display(), bytes = fetched.bytes.len(), "Fetched package");

        self.install_from_file(&file)
    }

    /// Uninstall the package installed under `alias`.
    ///
    /// The record is only dropped once its links and install directory are
    /// gone.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotInstalled`] if nothing is installed under
    /// `alias` (the ledger is left untouched), [`CacheError::Io`] if the
    /// package files cannot be removed.
    pub fn remove(&mut self, alias: &str) -> Result<(), CacheError> {
        let Some(record) = self.ledger.get(alias) else {
            return Err(CacheError::NotInstalled {
                alias: alias.to_string(),
            });
        };

        unlink_all(&record.links)?;
        match fs::remove_dir_all(&record.install_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %record.install_path.display(), "Install directory already gone");
            }
            Err(e) => return Err(io_at(&record.install_path)(e)),
        }

        self.ledger.remove(alias);
        self.ledger.save()?;
        info!(%alias, "Removed package");
        Ok(())
    }

    /// Sorted package names: installed aliases, plus everything the catalog
    /// offers unless `installed_only`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::FetchFailed`] if the catalog cannot be listed.
    pub async fn list(&self, installed_only: bool) -> Result<Vec<String>, CacheError> {
        let mut names: BTreeSet<String> = self.ledger.aliases().map(str::to_string).collect();
        if !installed_only {
            let remote = self
                .catalog
                .list()
                .await
                .map_err(|e| CacheError::FetchFailed {
                    name: "catalog index".to_string(),
                    reason: e.to_string(),
                })?;
            names.extend(remote);
        }
        Ok(names.into_iter().collect())
    }
}

/// Write archive contents below `dir`, restoring executable bits under `bin/`.
fn materialize(
    dir: &Path,
    contents: &BTreeMap<String, Vec<u8>>,
    archive_path: &Path,
) -> Result<(), CacheError> {
    for (name, bytes) in contents {
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ArchiveError::CorruptArchive {
                path: archive_path.to_path_buf(),
                reason: format!("entry escapes the install directory: {name}"),
            }
            .into());
        }

        let dest = dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
        fs::write(&dest, bytes).map_err(io_at(&dest))?;

        #[cfg(unix)]
        if relative.starts_with(BIN_DIR) {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))
                .map_err(io_at(&dest))?;
        }
    }
    Ok(())
}

/// Link every file in `<install_path>/bin` into `bin_dir`, pushing each
/// link onto `links` as soon as it exists.
fn expose_binaries(
    install_path: &Path,
    bin_dir: &Path,
    links: &mut Vec<PathBuf>,
) -> Result<(), CacheError> {
    let source_dir = install_path.join(BIN_DIR);
    let entries = match fs::read_dir(&source_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(io_at(&source_dir)(e)),
    };

    fs::create_dir_all(bin_dir).map_err(io_at(bin_dir))?;

    for entry in entries {
        let entry = entry.map_err(io_at(&source_dir))?;
        if !entry.file_type().map_err(io_at(&source_dir))?.is_file() {
            continue;
        }

        let target = bin_dir.join(entry.file_name());
        if target.symlink_metadata().is_ok() {
            fs::remove_file(&target).map_err(io_at(&target))?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(entry.path(), &target).map_err(io_at(&target))?;
        #[cfg(not(unix))]
        fs::copy(entry.path(), &target).map_err(io_at(&target))?;

        debug!(link = %target.display(), "Exposed binary");
        links.push(target);
    }
    Ok(())
}

fn temp_dir_in(root: &Path, prefix: &str) -> Result<TempDir, CacheError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(root)
        .map_err(io_at(root))
}

fn unlink_all(links: &[PathBuf]) -> Result<(), CacheError> {
    for link in links {
        match fs::remove_file(link) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_at(link)(e)),
        }
    }
    Ok(())
}
