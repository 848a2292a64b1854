//! Installation verification.
//!
//! Runs the package's own test suite in a fresh subprocess so a crash or
//! hang in native code cannot take the orchestrator down with it, then
//! classifies the result. Classification is exit-code-first; the text
//! markers below are an explicitly secondary heuristic used only to refine
//! an already-failed result or flag warnings on a pass.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::config::PipelineConfig;
use crate::env::BuildEnv;
use crate::error::VerifyError;
use crate::toolchain::Toolchain;

/// Error-stream markers that indicate the module could not be loaded at
/// all — which points back at dependency repair, not at the package's own
/// correctness. Fragile by nature; kept short and reviewed against tool
/// output when uv or Python change.
pub const IMPORT_FAILURE_MARKERS: [&str; 3] =
    ["ImportError", "ModuleNotFoundError", "DLL load failed"];

/// Output markers that downgrade a clean exit to "passed with warnings".
pub const WARNING_MARKERS: [&str; 3] =
    ["warnings summary", "DeprecationWarning", "RuntimeWarning"];

/// Why the self-test failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifyFailure {
    /// The package could not even be imported — a runtime library is
    /// missing or misplaced.
    ImportResolution { detail: String },

    /// The package loaded but its tests failed.
    TestsFailed { exit_code: i32 },
}

/// Classified self-test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Passed,
    Warned { markers: Vec<String> },
    Failed { failure: VerifyFailure },
}

impl VerifyOutcome {
    /// Warnings still count as an overall pass.
    pub fn is_pass(&self) -> bool {
        !matches!(self, VerifyOutcome::Failed { .. })
    }
}

/// Classify a finished self-test subprocess.
pub fn classify(output: &CommandOutput) -> VerifyOutcome {
    if !output.success() {
        if let Some(line) = first_marked_line(&output.stderr, &IMPORT_FAILURE_MARKERS) {
            return VerifyOutcome::Failed {
                failure: VerifyFailure::ImportResolution { detail: line },
            };
        }
        return VerifyOutcome::Failed {
            failure: VerifyFailure::TestsFailed {
                exit_code: output.exit_code,
            },
        };
    }

    let combined = format!("{}\n{}", output.stdout, output.stderr);
    let markers: Vec<String> = WARNING_MARKERS
        .iter()
        .filter(|marker| combined.contains(*marker))
        .map(|marker| marker.to_string())
        .collect();

    if markers.is_empty() {
        VerifyOutcome::Passed
    } else {
        VerifyOutcome::Warned { markers }
    }
}

fn first_marked_line(stream: &str, markers: &[&str]) -> Option<String> {
    stream
        .lines()
        .find(|line| markers.iter().any(|marker| line.contains(marker)))
        .map(|line| line.trim().to_string())
}

/// Runs the installed package's built-in verification entry point.
pub struct Verifier<'a> {
    config: &'a PipelineConfig,
    toolchain: &'a Toolchain,
    runner: &'a dyn CommandRunner,
}

impl<'a> Verifier<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        toolchain: &'a Toolchain,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            toolchain,
            runner,
        }
    }

    /// Execute `import <package>; <package>.test()` in a fresh subprocess
    /// and classify the result.
    pub async fn verify(&self, env: &BuildEnv) -> Result<VerifyOutcome, VerifyError> {
        let package = &self.config.package;
        let spec = CommandSpec::new(
            self.toolchain.uv.to_string_lossy().into_owned(),
            vec![
                "run".to_string(),
                "python".to_string(),
                "-c".to_string(),
                format!("import {package}; {package}.test()"),
            ],
        )
        .with_env(env);

        info!(command = %spec.display(), "running package self-test");
        let output = self.runner.run(&spec).await?;
        Ok(classify(&output))
    }
}
