//! Error taxonomy for the pipeline.
//!
//! One enum per stage; every external-tool failure variant carries the
//! captured exit code and error stream so the operator sees the tool's own
//! diagnostics, not just a stage label.

use std::path::PathBuf;
use thiserror::Error;

use crate::artifact::ArtifactState;
use crate::platform::Os;

/// Errors from launching an external command.
///
/// A nonzero exit is *not* a `CommandError` — it comes back as a regular
/// [`crate::command::CommandOutput`] and each stage decides what a nonzero
/// exit means for it.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started at all.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran past its configured deadline.
    #[error("'{program}' timed out after {timeout_secs} seconds")]
    TimedOut { program: String, timeout_secs: u64 },
}

/// A missing prerequisite, detected before any subprocess is launched.
#[derive(Debug, Error)]
pub enum PrereqError {
    #[error("unsupported platform '{os}': this pipeline targets Windows with a MinGW toolchain")]
    UnsupportedPlatform { os: Os },

    #[error("'{tool}' not found on PATH. {hint}")]
    ToolNotFound { tool: String, hint: String },

    #[error("runtime library directory not found: {dir}")]
    RuntimeLibDirMissing { dir: PathBuf },

    #[error(
        "marker library '{marker}' not found in {dir}; \
         install openblas/lapack via vcpkg and check VCPKG_ROOT"
    )]
    MarkerLibraryMissing { marker: String, dir: PathBuf },

    #[error("CMake toolchain file not found: {path}")]
    ToolchainFileMissing { path: PathBuf },
}

/// Artifact lookup and lifecycle errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no artifact matching '{pattern}' was produced")]
    NoMatch { pattern: String },

    #[error("expected exactly one artifact matching '{pattern}', found {count}")]
    Ambiguous { pattern: String, count: usize },

    #[error("invalid artifact pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid artifact state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ArtifactState,
        to: ArtifactState,
    },
}

/// Build stage failures, including the build-requirement bootstrap.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to install build requirements (exit code {exit_code}): {stderr}")]
    BootstrapFailed { exit_code: i32, stderr: String },

    #[error("build tool exited with code {exit_code}: {stderr}")]
    ToolFailed { exit_code: i32, stderr: String },

    /// The tool claimed success but the expected artifact is not there.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("failed to create build output directory {dir}: {source}")]
    OutputDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Repair stage failures. Terminal: there is no silent fallback to the
/// unrepaired artifact.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("repair tool exited with code {exit_code}: {stderr}")]
    ToolFailed { exit_code: i32, stderr: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("failed to create repair output directory {dir}: {source}")]
    OutputDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Install stage failures.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("install tool exited with code {exit_code}: {stderr}")]
    ToolFailed { exit_code: i32, stderr: String },

    /// The artifact disappeared between stages.
    #[error("artifact no longer present at {path}")]
    ArtifactMissing { path: PathBuf },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Verify stage failures: only the subprocess machinery itself. A failing
/// self-test is a classified [`crate::verify::VerifyOutcome`], not an error.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Command(#[from] CommandError),
}
