//! On-disk record of installed packages.
//!
//! # File format
//!
//! ```text
//! {
//!   "version": 1,
//!   "packages": {
//!     "<alias>": { "alias", "identity", "install_path", "installed_at", "links" }
//!   }
//! }
//! ```
//!
//! A missing file is an empty ledger. Anything unparsable is reported as
//! corrupt rather than silently reset.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gopkg_schema::ArtifactIdentity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger format version written by this release.
pub const LEDGER_VERSION: u32 = 1;

/// Errors raised while loading or persisting the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger exists but cannot be understood.
    #[error("ledger {} is corrupt: {reason}", path.display())]
    Corrupt {
        /// Ledger path.
        path: PathBuf,
        /// Parse failure or version mismatch.
        reason: String,
    },

    /// Reading or writing the ledger failed.
    #[error("ledger I/O error at {}: {source}", path.display())]
    Io {
        /// Ledger path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

/// One installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    /// Key the package is installed under.
    pub alias: String,
    /// Identity of the installed archive.
    pub identity: ArtifactIdentity,
    /// Directory the archive was materialized into.
    pub install_path: PathBuf,
    /// When the package was (last) installed.
    pub installed_at: DateTime<Utc>,
    /// Executables exposed in the bin directory.
    #[serde(default)]
    pub links: Vec<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    #[serde(default)]
    packages: BTreeMap<String, InstalledRecord>,
}

/// Installed packages keyed by alias, bound to the file they persist to.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    packages: BTreeMap<String, InstalledRecord>,
}

impl Ledger {
    /// Load the ledger at `path`, or an empty one if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Corrupt`] if the file cannot be parsed or has an
    /// unsupported version, [`LedgerError::Io`] if it cannot be read.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path: path.to_path_buf(),
                    packages: BTreeMap::new(),
                });
            }
            Err(source) => {
                return Err(LedgerError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let corrupt = |reason: String| LedgerError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let file: LedgerFile = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if file.version != LEDGER_VERSION {
            return Err(corrupt(format!("unsupported version {}", file.version)));
        }

        Ok(Self {
            path: path.to_path_buf(),
            packages: file.packages,
        })
    }

    /// Write the ledger back to its file through a temporary file and rename.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the file cannot be written.
    pub fn save(&self) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        let file = LedgerFile {
            version: LEDGER_VERSION,
            packages: self.packages.clone(),
        };
        let content = serde_json::to_vec_pretty(&file).map_err(|e| io_err(e.into()))?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(io_err)?;

        let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        staged.write_all(&content).map_err(io_err)?;
        staged.as_file().sync_all().map_err(io_err)?;
        staged.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Path the ledger persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record installed under `alias`, if any.
    pub fn get(&self, alias: &str) -> Option<&InstalledRecord> {
        self.packages.get(alias)
    }

    /// Insert or replace the record for `record.alias`.
    pub fn upsert(&mut self, record: InstalledRecord) -> Option<InstalledRecord> {
        self.packages.insert(record.alias.clone(), record)
    }

    /// Drop the record for `alias`.
    pub fn remove(&mut self, alias: &str) -> Option<InstalledRecord> {
        self.packages.remove(alias)
    }

    /// Installed aliases in sorted order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Installed records in alias order.
    pub fn records(&self) -> impl Iterator<Item = &InstalledRecord> {
        self.packages.values()
    }

    /// Number of installed packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// True when nothing is installed.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
