//! Control manifest for gopkg packages.
//!
//! A control directory carries `.gopkg/control.toml`, which declares the Go
//! import path, the release history and the sub-packages to build. The
//! orchestrator only consumes the parsed [`Manifest`]; loading it from disk
//! and scaffolding new ones are conveniences for the CLI.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gopkg_schema::naming::name_from_import_path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Directory inside a control directory holding gopkg metadata.
pub const CONTROL_DIR: &str = ".gopkg";

/// Manifest file name inside [`CONTROL_DIR`].
pub const MANIFEST_FILE: &str = "control.toml";

/// Errors that can occur when loading or saving a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Manifest path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The manifest is not valid TOML for the manifest schema.
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        /// Manifest path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A manifest already exists where a new one was to be written.
    #[error("{} already exists", path.display())]
    AlreadyExists {
        /// Manifest path.
        path: PathBuf,
    },

    /// The manifest could not be rendered as TOML.
    #[error("cannot render {}: {source}", path.display())]
    Render {
        /// Manifest path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::ser::Error,
    },
}

/// Parsed control manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Go import path of the packaged module (e.g. `github.com/acme/hello`).
    pub import_path: String,
    /// Maintainer as `Name <email>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    /// Declared dependencies. Parsed but not resolved.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Release history, oldest first. The last release is the current one.
    #[serde(default)]
    pub releases: Vec<Release>,
    /// Sub-packages to build, in build order.
    #[serde(default)]
    pub packages: Vec<SubPackage>,
}

/// One entry of the release history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Released version.
    pub version: String,
}

/// A buildable unit of a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubPackage {
    /// Package name used in artifact file names.
    pub name: String,
    /// Go entry point passed to the compiler (e.g. `./cmd/hello`).
    #[serde(default)]
    pub main: Option<String>,
    /// Name of the produced executable. Defaults to [`SubPackage::name`].
    #[serde(default)]
    pub binary: Option<String>,
    /// Targets to build for. Empty for a source sub-package.
    #[serde(default, skip_serializing_if = "TargetMatrix::is_empty")]
    pub targets: TargetMatrix,
}

impl SubPackage {
    /// Source sub-packages ship Go sources and declare no targets.
    pub fn is_source(&self) -> bool {
        self.targets.is_empty()
    }

    /// Name of the executable inside a binary package.
    pub fn binary_name(&self) -> &str {
        self.binary.as_deref().unwrap_or(&self.name)
    }

    /// Entry point handed to the compiler, `.` when none is declared.
    pub fn entry_point(&self) -> &str {
        self.main.as_deref().unwrap_or(".")
    }
}

/// Mapping from target OS to architectures, kept in declaration order.
///
/// Deserializes from a table such as
/// `{ linux = ["amd64", "arm64"], darwin = ["amd64"] }` without sorting its
/// keys, so targets are built in the order the manifest lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetMatrix(Vec<(String, Vec<String>)>);

impl TargetMatrix {
    /// Build a matrix from `(os, arches)` pairs.
    pub fn new<I, S, A>(targets: I) -> Self
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self(
            targets
                .into_iter()
                .map(|(os, arches)| (os.into(), arches.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    /// True when no OS is declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every `(os, arch)` pair in declaration order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(os, arches)| {
            arches
                .iter()
                .map(move |arch| (os.as_str(), arch.as_str()))
        })
    }
}

impl Serialize for TargetMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(os, arches)| (os, arches)))
    }
}

impl<'de> Deserialize<'de> for TargetMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MatrixVisitor;

        impl<'de> Visitor<'de> for MatrixVisitor {
            type Value = TargetMatrix;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of OS names to lists of architectures")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<TargetMatrix, M::Error> {
                let mut targets = Vec::new();
                while let Some((os, arches)) = map.next_entry::<String, Vec<String>>()? {
                    targets.push((os, arches));
                }
                Ok(TargetMatrix(targets))
            }
        }

        deserializer.deserialize_map(MatrixVisitor)
    }
}

impl Manifest {
    /// A fresh manifest for `import_path`: a single release and one source
    /// sub-package named after the import path.
    pub fn scaffold(import_path: &str, version: &str, maintainer: Option<String>) -> Self {
        Self {
            import_path: import_path.to_string(),
            maintainer,
            dependencies: Vec::new(),
            releases: vec![Release {
                version: version.to_string(),
            }],
            packages: vec![SubPackage {
                name: name_from_import_path(import_path),
                ..SubPackage::default()
            }],
        }
    }

    /// The current release, i.e. the last one in the history.
    pub fn current_release(&self) -> Option<&Release> {
        self.releases.last()
    }

    /// Parse a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if `content` does not match the schema.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Path of the manifest inside a control directory.
    pub fn path_in(directory: &Path) -> PathBuf {
        directory.join(CONTROL_DIR).join(MANIFEST_FILE)
    }

    /// Load the manifest of the control directory `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if the file cannot be read and
    /// [`ManifestError::Parse`] if it is not a valid manifest.
    pub fn load(directory: &Path) -> Result<Self, ManifestError> {
        let path = Self::path_in(directory);
        let content = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ManifestError::Parse { path, source })
    }

    /// Write the manifest into the control directory `directory`, creating
    /// [`CONTROL_DIR`] as needed. An existing manifest is never replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::AlreadyExists`] if the directory already has
    /// a manifest, [`ManifestError::Io`] if it cannot be written.
    pub fn save(&self, directory: &Path) -> Result<PathBuf, ManifestError> {
        let path = Self::path_in(directory);
        let io_err = |source: io::Error| ManifestError::Io {
            path: path.clone(),
            source,
        };

        let content = toml::to_string_pretty(self).map_err(|source| ManifestError::Render {
            path: path.clone(),
            source,
        })?;

        let control_dir = directory.join(CONTROL_DIR);
        std::fs::create_dir_all(&control_dir).map_err(io_err)?;
        let mut staged = tempfile::NamedTempFile::new_in(&control_dir).map_err(io_err)?;
        staged.write_all(content.as_bytes()).map_err(io_err)?;
        staged.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                ManifestError::AlreadyExists { path: path.clone() }
            } else {
                io_err(e.error)
            }
        })?;
        Ok(path)
    }
}
