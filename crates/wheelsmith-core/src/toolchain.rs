//! Toolchain resolution.
//!
//! Probes the host for every external tool the pipeline needs and produces
//! the immutable environment all later stages run under. Read-only: nothing
//! here launches a process or mutates ambient state, so a failed check
//! leaves zero side effects behind.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::env::BuildEnv;
use crate::error::PrereqError;
use crate::platform::Os;

/// Marker file that proves the vcpkg runtime libraries are installed.
pub const MARKER_LIBRARY: &str = "openblas.dll";

/// CMake generator forced onto the build.
pub const CMAKE_GENERATOR: &str = "MinGW Makefiles";

/// Resolved absolute paths to every external tool and library directory.
#[derive(Debug, Clone, Serialize)]
pub struct Toolchain {
    /// Build/packaging/install front end.
    pub uv: PathBuf,

    /// Fortran compiler.
    pub fortran: PathBuf,

    /// C compiler.
    pub cc: PathBuf,

    /// C++ compiler.
    pub cxx: PathBuf,

    /// Directory holding the MinGW compilers and their runtime DLLs.
    pub mingw_bin: PathBuf,

    /// Directory holding the vcpkg-installed runtime DLLs.
    pub vcpkg_bin: PathBuf,

    /// vcpkg CMake toolchain file.
    pub toolchain_file: PathBuf,
}

impl Toolchain {
    /// Deterministic digest of the resolved paths, for run identity.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for path in [
            &self.uv,
            &self.fortran,
            &self.cc,
            &self.cxx,
            &self.vcpkg_bin,
            &self.toolchain_file,
        ] {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

/// Locates and validates the toolchain, then derives the build environment.
pub struct ToolchainResolver<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ToolchainResolver<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Run every prerequisite check in order, failing fast on the first
    /// miss. On success returns the resolved toolchain together with the
    /// environment snapshot every later stage receives.
    pub fn resolve(&self) -> Result<(Toolchain, BuildEnv), PrereqError> {
        if self.config.os != Os::Windows {
            return Err(PrereqError::UnsupportedPlatform {
                os: self.config.os,
            });
        }

        let uv = self.locate("uv", "Install it from https://github.com/astral-sh/uv")?;
        debug!(path = %uv.display(), "found uv");

        let compiler_hint =
            "Install a MinGW-w64 toolchain (e.g. via MSYS2) and add its bin directory to PATH";
        let fortran = self.locate("gfortran", compiler_hint)?;
        let cc = self.locate("gcc", compiler_hint)?;
        let cxx = self.locate("g++", compiler_hint)?;
        debug!(path = %fortran.display(), "found MinGW toolchain");

        let mingw_bin = cc.parent().unwrap_or(Path::new(".")).to_path_buf();

        let vcpkg_bin = self.config.vcpkg_bin_dir();
        if !vcpkg_bin.is_dir() {
            return Err(PrereqError::RuntimeLibDirMissing { dir: vcpkg_bin });
        }
        if !vcpkg_bin.join(MARKER_LIBRARY).is_file() {
            return Err(PrereqError::MarkerLibraryMissing {
                marker: MARKER_LIBRARY.to_string(),
                dir: vcpkg_bin,
            });
        }

        let toolchain_file = self.config.toolchain_file();
        if !toolchain_file.is_file() {
            return Err(PrereqError::ToolchainFileMissing {
                path: toolchain_file,
            });
        }

        let toolchain = Toolchain {
            uv,
            fortran,
            cc,
            cxx,
            mingw_bin,
            vcpkg_bin,
            toolchain_file,
        };

        info!(
            fingerprint = %&toolchain.fingerprint()[..12],
            "all prerequisites met"
        );

        let env = self.build_env(&toolchain);
        Ok((toolchain, env))
    }

    /// Find an executable on the configured search path.
    fn locate(&self, tool: &str, hint: &str) -> Result<PathBuf, PrereqError> {
        let paths = self
            .config
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"));

        which::which_in(tool, paths, Path::new(".")).map_err(|_| PrereqError::ToolNotFound {
            tool: tool.to_string(),
            hint: hint.to_string(),
        })
    }

    /// Ambient environment plus the toolchain overlay. The vcpkg bin
    /// directory ends up first on PATH so the repair tool discovers the
    /// pipeline's library versions before anything else.
    fn build_env(&self, toolchain: &Toolchain) -> BuildEnv {
        BuildEnv::from_ambient()
            .with_var("VCPKG_ROOT", self.config.vcpkg_root.to_string_lossy())
            .with_var(
                "CMAKE_TOOLCHAIN_FILE",
                toolchain.toolchain_file.to_string_lossy(),
            )
            .with_var("CMAKE_GENERATOR", CMAKE_GENERATOR)
            .with_var("FC", "gfortran")
            .with_var("CC", "gcc")
            .with_var("CXX", "g++")
            .with_path_prepended(&toolchain.mingw_bin)
            .with_path_prepended(&toolchain.vcpkg_bin)
    }
}
