//! Package file naming codec.
//!
//! | kind | file name |
//! |---|---|
//! | control | `<name>_<version>.pkg` |
//! | source | `<name>-src_<version>.pkg` |
//! | binary | `<name>_<version>_<os>_<arch>.pkg` |
//!
//! The field count tells binaries apart from the rest; the `-src` marker on
//! the name tells source packages apart from control packages. The marker
//! lives on the name and nowhere else.

use std::path::Path;

use thiserror::Error;

use crate::identity::{ArtifactIdentity, ArtifactKind};

/// Extension of every package file.
pub const FILE_EXT: &str = "pkg";

/// Name suffix marking a source package.
pub const SOURCE_SUFFIX: &str = "-src";

const SEPARATOR: char = '_';

/// Errors produced by [`encode`] and [`decode`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// The identity cannot be represented as a file name.
    #[error("invalid artifact identity: {reason}")]
    InvalidIdentity {
        /// What is wrong with the identity.
        reason: String,
    },

    /// The file name is not a package file name.
    #[error("malformed package file name: {name}")]
    MalformedName {
        /// The offending file name.
        name: String,
    },
}

fn invalid(reason: impl Into<String>) -> NamingError {
    NamingError::InvalidIdentity {
        reason: reason.into(),
    }
}

fn check_field(label: &str, value: &str) -> Result<(), NamingError> {
    if value.is_empty() {
        return Err(invalid(format!("{label} is empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|c| *c == SEPARATOR || *c == '/' || *c == '\\' || c.is_whitespace())
    {
        return Err(invalid(format!("{label} `{value}` contains {c:?}")));
    }
    if value == "." || value == ".." {
        return Err(invalid(format!("{label} `{value}` is a relative path component")));
    }
    Ok(())
}

/// Encode an identity into its package file name.
///
/// # Errors
///
/// Returns [`NamingError::InvalidIdentity`] if a field is empty, is `.` or
/// `..`, contains the `_` separator, a path separator or whitespace, or if a control or binary
/// package name carries the source marker reserved for source packages.
pub fn encode(identity: &ArtifactIdentity) -> Result<String, NamingError> {
    check_field("name", identity.name())?;
    check_field("version", identity.version())?;

    if identity.kind() != ArtifactKind::Source && identity.name().ends_with(SOURCE_SUFFIX) {
        return Err(invalid(format!(
            "{} package name `{}` ends with the source marker `{SOURCE_SUFFIX}`",
            identity.kind(),
            identity.name()
        )));
    }

    match identity {
        ArtifactIdentity::Control { name, version } => {
            Ok(format!("{name}{SEPARATOR}{version}.{FILE_EXT}"))
        }
        ArtifactIdentity::Source { name, version } => Ok(format!(
            "{name}{SOURCE_SUFFIX}{SEPARATOR}{version}.{FILE_EXT}"
        )),
        ArtifactIdentity::Binary {
            name,
            version,
            os,
            arch,
        } => {
            check_field("os", os)?;
            check_field("arch", arch)?;
            Ok(format!(
                "{name}{SEPARATOR}{version}{SEPARATOR}{os}{SEPARATOR}{arch}.{FILE_EXT}"
            ))
        }
    }
}

/// Decode a package file name back into an identity.
///
/// # Errors
///
/// Returns [`NamingError::MalformedName`] if the name lacks the `.pkg`
/// extension, does not split into 2 or 4 fields, or names an identity that
/// [`encode`] would refuse.
pub fn decode(file_name: &str) -> Result<ArtifactIdentity, NamingError> {
    let malformed = || NamingError::MalformedName {
        name: file_name.to_string(),
    };

    let stem = file_name
        .strip_suffix(FILE_EXT)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(malformed)?;

    let parts: Vec<&str> = stem.split(SEPARATOR).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(malformed());
    }

    let identity = match parts.as_slice() {
        [name, version] => match name.strip_suffix(SOURCE_SUFFIX) {
            Some(base) => ArtifactIdentity::source(base, *version),
            None => ArtifactIdentity::control(*name, *version),
        },
        [name, version, os, arch] => ArtifactIdentity::binary(*name, *version, *os, *arch),
        _ => return Err(malformed()),
    };

    // Anything encode would not produce is not a package name.
    match encode(&identity) {
        Ok(encoded) if encoded == file_name => Ok(identity),
        _ => Err(malformed()),
    }
}

/// Decode the file-name component of `path`.
///
/// # Errors
///
/// Returns [`NamingError::MalformedName`] if the path has no UTF-8 file name
/// or the file name does not decode.
pub fn decode_path(path: &Path) -> Result<ArtifactIdentity, NamingError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| NamingError::MalformedName {
            name: path.display().to_string(),
        })?;
    decode(file_name)
}

/// Translate a Go import path into a package name.
///
/// ```
/// use gopkg_schema::naming::name_from_import_path;
///
/// assert_eq!(name_from_import_path("github.com/creekorful/mvnparser"), "github.com-creekorful-mvnparser");
/// ```
pub fn name_from_import_path(import_path: &str) -> String {
    import_path.trim_matches('/').replace('/', "-")
}
