//! User configuration.
//!
//! Resolution order, later wins:
//!
//! 1. defaults under the gopkg home (`$GOPKG_HOME`, else `~/.gopkg`)
//! 2. `<home>/config.toml`, when present
//! 3. `GOPKG_*` environment variables
//!
//! ```toml
//! bin_dir = "/usr/local/gopkg/bin"
//! catalog_url = "https://mirror.example.org/gopkg"
//!
//! [maintainer]
//! name = "Jane Doe"
//! email = "jane@example.org"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::Layout;
use crate::paths;

/// Catalog queried when none is configured.
pub const DEFAULT_CATALOG_URL: &str = "https://catalog.gopkg.dev";

/// Errors raised while resolving the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file exists but cannot be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the config schema.
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// Neither `GOPKG_HOME` nor a user home directory is available.
    #[error("cannot determine the gopkg home directory; set {}", paths::HOME_ENV)]
    NoHome,
}

/// Package maintainer, stamped on packages built by this user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Maintainer {
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// gopkg home directory.
    pub home: PathBuf,
    /// Where installed executables are exposed.
    pub bin_dir: PathBuf,
    /// Where packages are materialized.
    pub install_root: PathBuf,
    /// Installation ledger file.
    pub ledger_path: PathBuf,
    /// Base URL of the remote catalog.
    pub catalog_url: String,
    /// Maintainer identity.
    pub maintainer: Maintainer,
}

/// On-disk form: every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    bin_dir: Option<PathBuf>,
    install_root: Option<PathBuf>,
    ledger_path: Option<PathBuf>,
    catalog_url: Option<String>,
    maintainer: Option<Maintainer>,
}

impl Config {
    /// Defaults for a given home directory.
    pub fn defaults(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            bin_dir: paths::bin_path(home),
            install_root: paths::install_root(home),
            ledger_path: paths::ledger_path(home),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            maintainer: Maintainer::default(),
        }
    }

    /// Resolve the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHome`] if no home directory can be found,
    /// and the errors of [`Config::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        let home = paths::try_gopkg_home().ok_or(ConfigError::NoHome)?;
        Self::load_from(&home, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration for `home`, reading overrides through `env`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if `<home>/config.toml` exists but
    /// cannot be read and [`ConfigError::Parse`] if it is invalid.
    pub fn load_from(
        home: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(home);

        let path = paths::config_path(home);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let file: ConfigFile = toml::from_str(&content)
                    .map_err(|source| ConfigError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                config.apply_file(file);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(ConfigError::Read { path, source }),
        }

        config.apply_env(env);
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.bin_dir {
            self.bin_dir = v;
        }
        if let Some(v) = file.install_root {
            self.install_root = v;
        }
        if let Some(v) = file.ledger_path {
            self.ledger_path = v;
        }
        if let Some(v) = file.catalog_url {
            self.catalog_url = v;
        }
        if let Some(v) = file.maintainer {
            self.maintainer = v;
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(v) = var("GOPKG_BIN_DIR") {
            self.bin_dir = v.into();
        }
        if let Some(v) = var("GOPKG_INSTALL_ROOT") {
            self.install_root = v.into();
        }
        if let Some(v) = var("GOPKG_LEDGER_PATH") {
            self.ledger_path = v.into();
        }
        if let Some(v) = var("GOPKG_CATALOG_URL") {
            self.catalog_url = v;
        }
        if let Some(v) = var("GOPKG_MAINTAINER_NAME") {
            self.maintainer.name = v;
        }
        if let Some(v) = var("GOPKG_MAINTAINER_EMAIL") {
            self.maintainer.email = v;
        }
    }

    /// Maintainer formatted as `Name <email>`.
    pub fn maintainer_entry(&self) -> String {
        format!("{} <{}>", self.maintainer.name, self.maintainer.email)
    }

    /// Directories the cache should operate on.
    pub fn layout(&self) -> Layout {
        Layout {
            install_root: self.install_root.clone(),
            bin_dir: self.bin_dir.clone(),
            ledger_path: self.ledger_path.clone(),
        }
    }
}
