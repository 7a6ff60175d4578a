//! Host platform detection in Go target naming.

/// Host operating system and architecture, spelled the way the Go toolchain
/// spells `GOOS` and `GOARCH`.
///
/// Binary packages are published per Go target, so remote lookups must use
/// Go names (`darwin`, `amd64`) rather than Rust ones (`macos`, `x86_64`).
///
/// # Example
///
/// ```
/// use gopkg_schema::Platform;
///
/// let host = Platform::current();
/// println!("Running on: {host}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Platform {
    /// Go OS name.
    pub os: String,
    /// Go architecture name.
    pub arch: String,
}

impl Platform {
    /// Build a platform from explicit Go names.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Platform of the running host.
    pub fn current() -> Self {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust target names (`std::env::consts`) onto Go names.
    pub fn from_rust(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "powerpc64" => "ppc64",
            "loongarch64" => "loong64",
            other => other,
        };
        Self::new(os, arch)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_names_map_to_go() {
        assert_eq!(
            Platform::from_rust("macos", "aarch64"),
            Platform::new("darwin", "arm64")
        );
        assert_eq!(
            Platform::from_rust("linux", "x86_64"),
            Platform::new("linux", "amd64")
        );
        assert_eq!(
            Platform::from_rust("windows", "x86"),
            Platform::new("windows", "386")
        );
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(
            Platform::from_rust("freebsd", "riscv64"),
            Platform::new("freebsd", "riscv64")
        );
    }
}
