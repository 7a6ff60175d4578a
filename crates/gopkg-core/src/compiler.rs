//! Compiler collaborator used by the build orchestrator.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::trace;

/// Why a compilation did not produce a binary.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The compiler ran and rejected the build.
    #[error("compiler exited with {status}:\n{diagnostics}")]
    Failed {
        /// Exit status as reported by the OS.
        status: String,
        /// Compiler output, verbatim.
        diagnostics: String,
    },

    /// The compiler could not be started.
    #[error("failed to run compiler: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One compilation: a single entry point for a single target.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    /// Directory the compiler runs in.
    pub source_dir: &'a Path,
    /// Entry point relative to `source_dir`.
    pub entry_point: &'a str,
    /// Where the executable must be written.
    pub output: &'a Path,
    /// Target OS (`GOOS`).
    pub os: &'a str,
    /// Target architecture (`GOARCH`).
    pub arch: &'a str,
}

/// Something that turns an entry point into an executable for a target.
pub trait Compiler {
    /// Compile `request.entry_point` into `request.output`.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Failed`] with the compiler's diagnostics when
    /// the build fails, [`CompileError::Spawn`] when it cannot run at all.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), CompileError>;
}

impl<C: Compiler + ?Sized> Compiler for &C {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), CompileError> {
        (**self).compile(request)
    }
}

/// Runs `go build`, cross-compiling through `GOOS`/`GOARCH`.
#[derive(Debug, Clone)]
pub struct GoCompiler {
    program: PathBuf,
}

impl Default for GoCompiler {
    fn default() -> Self {
        Self::new("go")
    }
}

impl GoCompiler {
    /// Use `program` as the Go toolchain binary.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Compiler for GoCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), CompileError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("build")
            .arg("-o")
            .arg(request.output)
            .arg(request.entry_point)
            .current_dir(request.source_dir)
            .env("GOOS", request.os)
            .env("GOARCH", request.arch)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        trace!(command = ?cmd, "Executing compiler");
        let output = cmd.output()?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CompileError::Failed {
                status: output.status.to_string(),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-go");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_go_compiler_passes_target_through_env() {
        let tmp = tempfile::tempdir().unwrap();
        let fake = script(tmp.path(), r#"echo "$GOOS/$GOARCH $1 $4" > "$3""#);
        let output = tmp.path().join("out");

        GoCompiler::new(&fake)
            .compile(&CompileRequest {
                source_dir: tmp.path(),
                entry_point: "./cmd/hello",
                output: &output,
                os: "linux",
                arch: "arm64",
            })
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "linux/arm64 build ./cmd/hello\n"
        );
    }

    #[test]
    fn test_go_compiler_surfaces_diagnostics() {
        let tmp = tempfile::tempdir().unwrap();
        let fake = script(tmp.path(), "echo 'main.go:3: undefined: x' >&2; exit 2");

        let err = GoCompiler::new(&fake)
            .compile(&CompileRequest {
                source_dir: tmp.path(),
                entry_point: ".",
                output: &tmp.path().join("out"),
                os: "linux",
                arch: "amd64",
            })
            .unwrap_err();

        match err {
            CompileError::Failed { diagnostics, .. } => {
                assert_eq!(diagnostics, "main.go:3: undefined: x\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_toolchain_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = GoCompiler::new(tmp.path().join("no-such-go"))
            .compile(&CompileRequest {
                source_dir: tmp.path(),
                entry_point: ".",
                output: &tmp.path().join("out"),
                os: "linux",
                arch: "amd64",
            })
            .unwrap_err();
        assert!(matches!(err, CompileError::Spawn(_)));
    }
}
