//! Artifact identities: what a package file is, independent of its name.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::naming::SOURCE_SUFFIX;

/// The three flavours of artifact a control directory can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Control package, used to build the source and binary packages.
    Control,
    /// Package providing Go source code.
    Source,
    /// Package providing a compiled executable for one OS/arch pair.
    Binary,
}

impl ArtifactKind {
    /// Lowercase name used in logs and the ledger file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Source => "source",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identity of an artifact.
///
/// Only [`ArtifactIdentity::Binary`] carries a target platform, so an
/// identity can never claim an OS without an architecture or vice versa.
/// Field contents are validated by [`crate::encode`]; a value that fails to
/// encode never reaches disk.
///
/// # Example
///
/// ```
/// use gopkg_schema::{ArtifactIdentity, decode, encode};
///
/// let id = ArtifactIdentity::binary("gohello", "1.0.0", "linux", "amd64");
/// let file_name = encode(&id).unwrap();
/// assert_eq!(file_name, "gohello_1.0.0_linux_amd64.pkg");
/// assert_eq!(decode(&file_name).unwrap(), id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactIdentity {
    /// A control package.
    Control {
        /// Package name.
        name: String,
        /// Release version.
        version: String,
    },
    /// A source package. `name` is stored without the source marker.
    Source {
        /// Package name, without the `-src` marker.
        name: String,
        /// Release version.
        version: String,
    },
    /// A binary package built for a single target.
    Binary {
        /// Package name.
        name: String,
        /// Release version.
        version: String,
        /// Target operating system, Go naming (`linux`, `darwin`, ...).
        os: String,
        /// Target architecture, Go naming (`amd64`, `arm64`, ...).
        arch: String,
    },
}

impl ArtifactIdentity {
    /// Build a control identity.
    pub fn control(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::Control {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Build a source identity.
    pub fn source(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::Source {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Build a binary identity.
    pub fn binary(
        name: impl Into<String>,
        version: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self::Binary {
            name: name.into(),
            version: version.into(),
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Package name (without any source marker).
    pub fn name(&self) -> &str {
        match self {
            Self::Control { name, .. } | Self::Source { name, .. } | Self::Binary { name, .. } => {
                name
            }
        }
    }

    /// Release version.
    pub fn version(&self) -> &str {
        match self {
            Self::Control { version, .. }
            | Self::Source { version, .. }
            | Self::Binary { version, .. } => version,
        }
    }

    /// Target OS, present only for binaries.
    pub fn os(&self) -> Option<&str> {
        match self {
            Self::Binary { os, .. } => Some(os),
            _ => None,
        }
    }

    /// Target architecture, present only for binaries.
    pub fn arch(&self) -> Option<&str> {
        match self {
            Self::Binary { arch, .. } => Some(arch),
            _ => None,
        }
    }

    /// The kind tag of this identity.
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Control { .. } => ArtifactKind::Control,
            Self::Source { .. } => ArtifactKind::Source,
            Self::Binary { .. } => ArtifactKind::Binary,
        }
    }

    /// Version-independent key under which the artifact is installed.
    ///
    /// Source bundles keep their marker so that `foo` and `foo-src` can be
    /// installed side by side.
    pub fn alias(&self) -> String {
        match self {
            Self::Source { name, .. } => format!("{name}{SOURCE_SUFFIX}"),
            Self::Control { name, .. } | Self::Binary { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary {
                name,
                version,
                os,
                arch,
            } => write!(f, "{name} {version} ({os}/{arch})"),
            other => write!(f, "{} {} ({})", other.alias(), other.version(), other.kind()),
        }
    }
}
