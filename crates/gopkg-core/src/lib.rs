//! Core library for gopkg.
//!
//! Builds package archives from a control directory ([`builder`]) and keeps
//! track of installed packages ([`cache`]). Artifact identities and file
//! naming live in `gopkg-schema`.

pub mod archive;
pub mod builder;
pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod ledger;
pub mod manifest;
pub mod paths;

pub use archive::{ArchiveEntry, ArchiveError};
pub use builder::{BuildError, BuildOptions, BuildReport, Builder};
pub use cache::{Cache, CacheError, Layout};
pub use catalog::{Catalog, CatalogError, FetchedArtifact, HttpCatalog, USER_AGENT};
pub use compiler::{CompileError, CompileRequest, Compiler, GoCompiler};
pub use config::{Config, ConfigError, Maintainer};
pub use ledger::{InstalledRecord, Ledger, LedgerError};
pub use manifest::{Manifest, ManifestError, Release, SubPackage, TargetMatrix};
