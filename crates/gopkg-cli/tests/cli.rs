//! Integration tests for the gopkg CLI binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use gopkg_core::Manifest;
use gopkg_core::archive::{self, ArchiveEntry};
use gopkg_schema::{ArtifactIdentity, encode};
use tempfile::TempDir;

/// Isolated gopkg home plus a scratch area for fixtures.
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".gopkg");
        Self { temp_dir, home }
    }

    fn gopkg(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gopkg"));
        cmd.env("HOME", self.temp_dir.path())
            .env("GOPKG_HOME", &self.home)
            // Nothing listens here; tests must never reach a real catalog.
            .env("GOPKG_CATALOG_URL", "http://127.0.0.1:9")
            .env_remove("RUST_LOG")
            .env_remove("GOPKG_BIN_DIR")
            .env_remove("GOPKG_INSTALL_ROOT")
            .env_remove("GOPKG_LEDGER_PATH")
            .env_remove("GOPKG_MAINTAINER_NAME")
            .env_remove("GOPKG_MAINTAINER_EMAIL");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.gopkg().args(args).output().expect("failed to run gopkg")
    }

    /// Write a binary package for `gohello` and return its path.
    fn hello_package(&self) -> PathBuf {
        let staged = self.temp_dir.path().join("gohello.bin");
        std::fs::write(&staged, b"#!/bin/sh\necho hello\n").unwrap();

        let identity = ArtifactIdentity::binary("gohello", "1.0.0", "linux", "amd64");
        let path = self.temp_dir.path().join(encode(&identity).unwrap());
        archive::write(&path, &[ArchiveEntry::new(&staged, "bin/gohello")], false).unwrap();
        path
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_config_reports_resolved_values() {
    let ctx = TestContext::new();
    let output = ctx
        .gopkg()
        .env("GOPKG_MAINTAINER_NAME", "Test")
        .env("GOPKG_MAINTAINER_EMAIL", "test@example.com")
        .arg("config")
        .output()
        .expect("failed to run gopkg");

    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Test <test@example.com>"));
    assert!(out.contains(&ctx.home.join("cache.json").display().to_string()));
}

#[test]
fn test_install_list_remove_cycle() {
    let ctx = TestContext::new();
    let package = ctx.hello_package();

    let output = ctx.run(&["install", "--from-file", package.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(ctx.home.join("pkg/gohello/bin/gohello").exists());
    assert!(ctx.home.join("bin/gohello").exists());

    let output = ctx.run(&["list", "--installed"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("gohello\t1.0.0\tinstalled"));

    let output = ctx.run(&["remove", "gohello"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!ctx.home.join("pkg/gohello").exists());
    assert!(ctx.home.join("bin/gohello").symlink_metadata().is_err());

    let output = ctx.run(&["list", "--installed"]);
    assert!(output.status.success());
    assert!(!stdout(&output).contains("gohello"));
}

#[test]
fn test_remove_unknown_alias_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["remove", "nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("nope is not installed"));
}

#[test]
fn test_install_malformed_file_name_fails() {
    let ctx = TestContext::new();
    let bogus = ctx.temp_dir.path().join("random.tar");
    std::fs::write(&bogus, b"x").unwrap();

    let output = ctx.run(&["install", "--from-file", bogus.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(!ctx.home.join("cache.json").exists());
}

#[cfg(unix)]
fn fake_go(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-go");
    std::fs::write(&path, "#!/bin/sh\necho \"$GOOS/$GOARCH\" > \"$3\"\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn test_build_control_directory() {
    let ctx = TestContext::new();
    let control = ctx.temp_dir.path().join("hello");
    std::fs::create_dir_all(control.join(".gopkg")).unwrap();
    std::fs::write(control.join("main.go"), "package main\n").unwrap();
    std::fs::write(
        control.join(".gopkg/control.toml"),
        r#"
import_path = "github.com/acme/hello"

[[releases]]
version = "0.9.0"

[[releases]]
version = "1.0.0"

[[packages]]
name = "gohello"
targets = { linux = ["amd64"], darwin = ["arm64"] }

[[packages]]
name = "github.com-acme-hello"
"#,
    )
    .unwrap();
    let go = fake_go(ctx.temp_dir.path());

    let output = ctx
        .gopkg()
        .args(["build", control.to_str().unwrap(), "--go", go.to_str().unwrap()])
        .output()
        .expect("failed to run gopkg");
    assert!(output.status.success(), "{}", stderr(&output));

    let binary = archive::read(&control.join("gohello_1.0.0_darwin_arm64.pkg")).unwrap();
    assert_eq!(binary["bin/gohello"], b"darwin/arm64\n");
    assert!(control.join("gohello_1.0.0_linux_amd64.pkg").exists());

    let source = archive::read(&control.join("github.com-acme-hello-src_1.0.0.pkg")).unwrap();
    assert_eq!(source.keys().collect::<Vec<_>>(), vec!["github.com/acme/hello/main.go"]);

    let again = ctx
        .gopkg()
        .args(["build", control.to_str().unwrap(), "--go", go.to_str().unwrap()])
        .output()
        .expect("failed to run gopkg");
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));
}

#[test]
fn test_make_writes_control_manifest() {
    let ctx = TestContext::new();
    let control = ctx.temp_dir.path().join("hello");

    let output = ctx
        .gopkg()
        .env("GOPKG_MAINTAINER_NAME", "Test")
        .env("GOPKG_MAINTAINER_EMAIL", "test@example.com")
        .args(["make", "github.com/acme/hello", "--path", control.to_str().unwrap()])
        .output()
        .expect("failed to run gopkg");
    assert!(output.status.success(), "{}", stderr(&output));

    let manifest = Manifest::load(&control).unwrap();
    assert_eq!(manifest.import_path, "github.com/acme/hello");
    assert_eq!(manifest.maintainer.as_deref(), Some("Test <test@example.com>"));
    assert_eq!(manifest.current_release().unwrap().version, "0.1.0");
    assert_eq!(manifest.packages.len(), 1);
    assert_eq!(manifest.packages[0].name, "github.com-acme-hello");
    assert!(manifest.packages[0].is_source());

    let again = ctx.run(&["make", "github.com/acme/hello", "--path", control.to_str().unwrap()]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));
}

#[test]
fn test_make_defaults_to_package_directory() {
    let ctx = TestContext::new();
    let output = ctx
        .gopkg()
        .current_dir(ctx.temp_dir.path())
        .args(["make", "github.com/acme/hello"])
        .output()
        .expect("failed to run gopkg");
    assert!(output.status.success(), "{}", stderr(&output));

    let manifest = Manifest::load(&ctx.temp_dir.path().join("github.com-acme-hello")).unwrap();
    assert_eq!(manifest.maintainer, None);
}
