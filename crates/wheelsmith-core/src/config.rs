//! Pipeline configuration.

use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::platform::Os;

/// Default vcpkg installation root when `VCPKG_ROOT` is unset.
pub const DEFAULT_VCPKG_ROOT: &str = "C:\\vcpkg";

/// How the wheel gets built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// One step: `pip wheel` builds and packages directly into the wheel
    /// directory.
    WheelDirect,

    /// Two steps: a forced source install into the active environment,
    /// then a separate packaging pass that wraps it into a wheel.
    SourceInstall,
}

/// How the built wheel gets its runtime libraries.
///
/// The two strategies are mutually exclusive within one run: selecting one
/// guarantees the other's component is never invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    /// `delvewheel repair` embeds the DLLs into the wheel itself.
    Delvewheel,

    /// Hand-copy the required DLLs into the installed package directory.
    CopyRuntimeLibs,
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Package to build (also the wheel filename prefix).
    pub package: String,

    pub build_strategy: BuildStrategy,
    pub repair_strategy: RepairStrategy,

    /// vcpkg installation root (env `VCPKG_ROOT`, defaulted).
    pub vcpkg_root: PathBuf,

    /// Parent directory for the transient build/repair output directories.
    pub work_root: PathBuf,

    /// Host platform. Defaults to the current process's; injectable so the
    /// platform gate is testable anywhere.
    pub os: Os,

    /// Executable search path override for toolchain resolution.
    /// `None` uses the ambient `PATH`.
    pub search_path: Option<OsString>,

    /// When false, a failing self-test is reported but does not fail the
    /// run (the install is never rolled back either way).
    pub strict_verify: bool,
}

impl PipelineConfig {
    /// Configuration with defaults for the given package, reading
    /// `VCPKG_ROOT` from the ambient environment.
    pub fn new(package: impl Into<String>) -> Self {
        let vcpkg_root = std::env::var_os("VCPKG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VCPKG_ROOT));

        Self {
            package: package.into(),
            build_strategy: BuildStrategy::WheelDirect,
            repair_strategy: RepairStrategy::Delvewheel,
            vcpkg_root,
            work_root: PathBuf::from("."),
            os: Os::current(),
            search_path: None,
            strict_verify: true,
        }
    }

    /// Transient directory the build tool writes the wheel into.
    pub fn wheel_dir(&self) -> PathBuf {
        self.work_root.join("wheels")
    }

    /// Transient directory the repair tool writes the repaired wheel into.
    /// Distinct from [`Self::wheel_dir`] so the pipeline can tell the two
    /// artifacts apart.
    pub fn repaired_dir(&self) -> PathBuf {
        self.work_root.join("wheelhouse")
    }

    /// vcpkg-installed runtime library directory.
    pub fn vcpkg_bin_dir(&self) -> PathBuf {
        self.vcpkg_root
            .join("installed")
            .join("x64-windows")
            .join("bin")
    }

    /// CMake toolchain file shipped with vcpkg.
    pub fn toolchain_file(&self) -> PathBuf {
        self.vcpkg_root
            .join("scripts")
            .join("buildsystems")
            .join("vcpkg.cmake")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let mut config = PipelineConfig::new("slycot");
        config.vcpkg_root = PathBuf::from("/opt/vcpkg");
        config.work_root = PathBuf::from("/tmp/run");

        assert_eq!(config.wheel_dir(), PathBuf::from("/tmp/run/wheels"));
        assert_eq!(config.repaired_dir(), PathBuf::from("/tmp/run/wheelhouse"));
        assert_eq!(
            config.vcpkg_bin_dir(),
            PathBuf::from("/opt/vcpkg/installed/x64-windows/bin")
        );
        assert_eq!(
            config.toolchain_file(),
            PathBuf::from("/opt/vcpkg/scripts/buildsystems/vcpkg.cmake")
        );
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("slycot");
        assert_eq!(config.package, "slycot");
        assert_eq!(config.build_strategy, BuildStrategy::WheelDirect);
        assert_eq!(config.repair_strategy, RepairStrategy::Delvewheel);
        assert!(config.strict_verify);
    }
}
