//! Runtime-library resolution and copying.
//!
//! The manual fallback to artifact repair: each required DLL has an ordered
//! list of candidate source directories, the first hit is copied into the
//! installed package directory, and misses are reported rather than fatal —
//! some of these libraries are optional at runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A runtime library plus the directories to search for it, in priority
/// order. The first existing candidate wins; later candidates are not
/// consulted once a match is found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    pub candidates: Vec<PathBuf>,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, candidates: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            candidates,
        }
    }
}

/// What the copier resolved and what it could not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyReport {
    pub copied: Vec<String>,
    pub missing: Vec<String>,
}

impl CopyReport {
    pub fn fully_resolved(&self) -> bool {
        self.missing.is_empty()
    }
}

/// The DLL set the wheel needs at runtime.
///
/// Compiler runtime DLLs ship with MinGW, so its bin directory is searched
/// first for those; BLAS/LAPACK come from vcpkg, searched first for those.
pub fn runtime_library_specs(mingw_bin: &Path, vcpkg_bin: &Path) -> Vec<DependencySpec> {
    let compiler_runtime = [
        "libgfortran-5.dll",
        "libgcc_s_seh-1.dll",
        "libquadmath-0.dll",
        "libwinpthread-1.dll",
    ];
    let linear_algebra = ["openblas.dll", "liblapack.dll"];

    let mut specs: Vec<DependencySpec> = compiler_runtime
        .iter()
        .map(|name| {
            DependencySpec::new(*name, vec![mingw_bin.to_path_buf(), vcpkg_bin.to_path_buf()])
        })
        .collect();
    specs.extend(linear_algebra.iter().map(|name| {
        DependencySpec::new(*name, vec![vcpkg_bin.to_path_buf(), mingw_bin.to_path_buf()])
    }));
    specs
}

/// Copy every resolvable dependency into `target_dir`.
///
/// Idempotent: an existing file in the target is overwritten, never an
/// error. A copy failure demotes that dependency to `missing` with a
/// warning; nothing here aborts the pipeline.
pub fn copy_all(specs: &[DependencySpec], target_dir: &Path) -> CopyReport {
    let mut report = CopyReport::default();

    for spec in specs {
        match spec.candidates.iter().find(|dir| dir.join(&spec.name).is_file()) {
            Some(dir) => {
                let src = dir.join(&spec.name);
                let dst = target_dir.join(&spec.name);
                match std::fs::copy(&src, &dst) {
                    Ok(_) => {
                        debug!(name = %spec.name, from = %dir.display(), "copied runtime library");
                        report.copied.push(spec.name.clone());
                    }
                    Err(error) => {
                        warn!(name = %spec.name, from = %src.display(), %error, "copy failed");
                        report.missing.push(spec.name.clone());
                    }
                }
            }
            None => {
                warn!(
                    name = %spec.name,
                    "runtime library not found in any candidate directory; \
                     the installed package may fail to load"
                );
                report.missing.push(spec.name.clone());
            }
        }
    }

    report
}
