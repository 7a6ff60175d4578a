//! Filesystem locations under the gopkg home.

use dirs::home_dir;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding the gopkg home directory.
pub const HOME_ENV: &str = "GOPKG_HOME";

/// Returns the gopkg home directory, or None if the user's home cannot be resolved.
pub fn try_gopkg_home() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".gopkg"))
}

/// Binary exposure directory: ~/.gopkg/bin
pub fn bin_path(home: &Path) -> PathBuf {
    home.join("bin")
}

/// Install root: ~/.gopkg/pkg
pub fn install_root(home: &Path) -> PathBuf {
    home.join("pkg")
}

/// Installation ledger: ~/.gopkg/cache.json
pub fn ledger_path(home: &Path) -> PathBuf {
    home.join("cache.json")
}

/// Optional configuration file: ~/.gopkg/config.toml
pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Lock file guarding `path`, e.g. `cache.json.lock`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_home() {
        let home = Path::new("/home/u/.gopkg");
        assert_eq!(bin_path(home), Path::new("/home/u/.gopkg/bin"));
        assert_eq!(install_root(home), Path::new("/home/u/.gopkg/pkg"));
        assert_eq!(ledger_path(home), Path::new("/home/u/.gopkg/cache.json"));
        assert_eq!(config_path(home), Path::new("/home/u/.gopkg/config.toml"));
    }

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(
            lock_path(Path::new("/tmp/cache.json")),
            Path::new("/tmp/cache.json.lock")
        );
    }
}
