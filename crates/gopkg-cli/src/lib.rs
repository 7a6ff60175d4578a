//! gopkg - build and install Go packages
#![allow(clippy::missing_errors_doc)]
//!
//! # Directory Layout
//!
//! ```text
//! ~/.gopkg/
//! ├── bin/          # Links to installed executables
//! ├── pkg/          # Installed packages by alias
//! ├── cache.json    # Installation ledger
//! └── config.toml   # Optional configuration
//! ```

pub mod cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line of the `gopkg` binary.
#[derive(Debug, Parser)]
#[command(name = "gopkg")]
#[command(author, version, about = "gopkg - build and install Go packages")]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the packages of a control directory
    Build {
        /// Control directory
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Replace packages that already exist
        #[arg(long, short = 'f')]
        force: bool,
        /// Write packages here instead of the control directory
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Go toolchain to compile with
        #[arg(long, env = "GOPKG_GO", default_value = "go")]
        go: PathBuf,
    },
    /// Create a new package from an import path
    Make {
        /// Go import path (e.g. github.com/acme/hello)
        import_path: String,
        /// Control directory to create. Defaults to one named after the import path
        #[arg(long, short = 'p')]
        path: Option<PathBuf>,
        /// Initial release version
        #[arg(long, default_value = "0.1.0")]
        release: String,
    },
    /// Install a package from the catalog or a local file
    Install {
        /// Package name, or a package file with --from-file
        package: String,
        /// Treat PACKAGE as a path to a package file
        #[arg(long)]
        from_file: bool,
    },
    /// Remove an installed package
    Remove {
        /// Alias the package is installed under
        alias: String,
    },
    /// List packages
    List {
        /// Only show installed packages
        #[arg(long)]
        installed: bool,
    },
    /// Show the resolved configuration
    Config,
}
