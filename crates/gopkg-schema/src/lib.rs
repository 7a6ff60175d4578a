//! Shared types for gopkg.
//!
//! Every artifact gopkg produces or installs carries an [`ArtifactIdentity`].
//! Identities only travel as file names through the [`naming`] codec, so this
//! crate is the single place that knows how a package file is named.

pub mod identity;
pub mod naming;
pub mod platform;

// Re-exports
pub use identity::{ArtifactIdentity, ArtifactKind};
pub use naming::{FILE_EXT, NamingError, SOURCE_SUFFIX, decode, decode_path, encode};
pub use platform::Platform;
