//! wheelsmith core library
//!
//! Builds a native-extension wheel with a MinGW toolchain, repairs it (or
//! hand-copies its runtime DLLs), installs it offline into the active
//! environment, and verifies the result by running the package's own test
//! suite. Every external tool is reached through a substitutable command
//! runner, so the whole pipeline is testable without launching anything.

pub mod artifact;
pub mod build;
pub mod command;
pub mod config;
pub mod deps;
pub mod env;
pub mod error;
pub mod fakes;
pub mod install;
pub mod pipeline;
pub mod platform;
pub mod repair;
pub mod telemetry;
pub mod toolchain;
pub mod verify;

pub use artifact::{find_single_wheel, Artifact, ArtifactState};
pub use build::{WheelBuilder, BUILD_REQUIREMENTS, FORTRAN_FLAGS};
pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use config::{BuildStrategy, PipelineConfig, RepairStrategy, DEFAULT_VCPKG_ROOT};
pub use deps::{copy_all, runtime_library_specs, CopyReport, DependencySpec};
pub use env::BuildEnv;
pub use error::{
    ArtifactError, BuildError, CommandError, InstallError, PrereqError, RepairError, VerifyError,
};
pub use install::Installer;
pub use pipeline::{Pipeline, PipelineOutcome, PipelineReport, Stage, StageRecord};
pub use platform::Os;
pub use repair::WheelRepairer;
pub use telemetry::init_tracing;
pub use toolchain::{Toolchain, ToolchainResolver, MARKER_LIBRARY};
pub use verify::{classify, Verifier, VerifyFailure, VerifyOutcome};

/// wheelsmith version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
