//! Pipeline orchestration.
//!
//! Sequences prerequisite resolution, bootstrap, build, repair (or manual
//! DLL copying), install, and verification. Strictly sequential: a stage
//! only starts if its predecessor passed, and every external invocation
//! blocks until the tool exits. The orchestrator owns the two transient
//! output directories and removes them on every exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::build::WheelBuilder;
use crate::command::{CommandRunner, CommandSpec, ProcessRunner};
use crate::config::{PipelineConfig, RepairStrategy};
use crate::deps::{copy_all, runtime_library_specs};
use crate::env::BuildEnv;
use crate::install::Installer;
use crate::repair::WheelRepairer;
use crate::toolchain::{Toolchain, ToolchainResolver};
use crate::verify::{Verifier, VerifyFailure, VerifyOutcome};

/// Stages as they appear in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prerequisites,
    Bootstrap,
    Build,
    Repair,
    CopyRuntimeLibs,
    Install,
    Verify,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Prerequisites => "prerequisites",
            Stage::Bootstrap => "bootstrap",
            Stage::Build => "build",
            Stage::Repair => "repair",
            Stage::CopyRuntimeLibs => "copy_runtime_libs",
            Stage::Install => "install",
            Stage::Verify => "verify",
        }
    }
}

/// Result of one executed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,

    /// Whether the stage completed cleanly. A non-fatal stage (runtime
    /// library copying) may record `false` without failing the run.
    pub passed: bool,

    /// Artifact path, error message, or other human-readable context.
    pub detail: String,

    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

/// Aggregate outcome. Exactly one terminal value per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success,
    PrerequisiteFailure,
    BuildFailure,
    RepairFailure,
    InstallFailure,
    VerificationFailure,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Success => "success",
            PipelineOutcome::PrerequisiteFailure => "prerequisite failure",
            PipelineOutcome::BuildFailure => "build failure",
            PipelineOutcome::RepairFailure => "repair failure",
            PipelineOutcome::InstallFailure => "install failure",
            PipelineOutcome::VerificationFailure => "verification failure",
        }
    }
}

impl std::fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub package: String,
    pub outcome: PipelineOutcome,
    pub stages: Vec<StageRecord>,

    /// Runtime libraries the copier could not resolve (manual-copy runs
    /// only). Non-fatal but surfaced to the operator.
    pub missing_libraries: Vec<String>,

    /// Classified self-test result, when the pipeline got that far.
    pub verify: Option<VerifyOutcome>,

    pub toolchain_fingerprint: Option<String>,
    pub duration_ms: u64,
}

impl PipelineReport {
    fn new(run_id: String, package: String) -> Self {
        Self {
            run_id,
            package,
            outcome: PipelineOutcome::Success,
            stages: Vec::new(),
            missing_libraries: Vec::new(),
            verify: None,
            toolchain_fingerprint: None,
            duration_ms: 0,
        }
    }

    /// Number of stages that completed cleanly.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed).count()
    }

    /// Number of stages that did not.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed).count()
    }
}

/// Times a stage and records its result.
struct StageTimer {
    stage: Stage,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl StageTimer {
    fn begin(stage: Stage) -> Self {
        info!(stage = stage.name(), "stage started");
        Self {
            stage,
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    fn pass(self, report: &mut PipelineReport, detail: impl Into<String>) {
        self.record(report, true, detail.into());
    }

    fn fail(self, report: &mut PipelineReport, detail: impl Into<String>) {
        self.record(report, false, detail.into());
    }

    fn record(self, report: &mut PipelineReport, passed: bool, detail: String) {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        if passed {
            info!(stage = self.stage.name(), duration_ms, "stage passed");
        } else {
            error!(stage = self.stage.name(), duration_ms, %detail, "stage failed");
        }
        report.stages.push(StageRecord {
            stage: self.stage,
            passed,
            detail,
            duration_ms,
            started_at: self.started_at,
        });
    }
}

/// The build-repair-install-verify orchestrator.
pub struct Pipeline {
    config: PipelineConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Pipeline {
    /// Pipeline backed by real subprocesses.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    /// Pipeline with a substituted command runner (tests).
    pub fn with_runner(config: PipelineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Run the whole pipeline. Never panics and never skips cleanup: the
    /// transient output directories are removed whether the run ends in
    /// `Success` or any failure.
    pub async fn run(&self) -> PipelineReport {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, package = %self.config.package, "starting pipeline");

        let mut report = PipelineReport::new(run_id, self.config.package.clone());

        let outcome = self.execute(&mut report).await;

        // Cleanup sits in "finally" position with respect to every stage.
        self.cleanup().await;

        report.outcome = outcome;
        report.duration_ms = start.elapsed().as_millis() as u64;

        if report.outcome.is_success() {
            info!(
                run_id = %report.run_id,
                duration_ms = report.duration_ms,
                "pipeline succeeded"
            );
        } else {
            error!(
                run_id = %report.run_id,
                outcome = %report.outcome,
                "pipeline failed"
            );
        }
        report
    }

    async fn execute(&self, report: &mut PipelineReport) -> PipelineOutcome {
        // Prerequisites: read-only probing. Nothing external may launch
        // before this passes.
        let timer = StageTimer::begin(Stage::Prerequisites);
        let (toolchain, env) = match ToolchainResolver::new(&self.config).resolve() {
            Ok(resolved) => {
                timer.pass(report, "all prerequisites met");
                resolved
            }
            Err(e) => {
                timer.fail(report, e.to_string());
                return PipelineOutcome::PrerequisiteFailure;
            }
        };
        report.toolchain_fingerprint = Some(toolchain.fingerprint());

        let builder = WheelBuilder::new(&self.config, &toolchain, self.runner.as_ref());

        let timer = StageTimer::begin(Stage::Bootstrap);
        match builder.install_build_requirements(&env).await {
            Ok(()) => timer.pass(report, "build requirements installed"),
            Err(e) => {
                timer.fail(report, e.to_string());
                return PipelineOutcome::BuildFailure;
            }
        }

        let timer = StageTimer::begin(Stage::Build);
        let artifact = match builder.build(&env).await {
            Ok(artifact) => {
                timer.pass(report, artifact.path().display().to_string());
                artifact
            }
            Err(e) => {
                timer.fail(report, e.to_string());
                return PipelineOutcome::BuildFailure;
            }
        };

        // Repair and manual copying are mutually exclusive per run; the
        // manual branch runs after install, once the package directory
        // exists in the environment.
        let artifact = match self.config.repair_strategy {
            RepairStrategy::Delvewheel => {
                let timer = StageTimer::begin(Stage::Repair);
                let repairer = WheelRepairer::new(&self.config, &toolchain, self.runner.as_ref());
                match repairer.repair(artifact, &env).await {
                    Ok(repaired) => {
                        timer.pass(report, repaired.path().display().to_string());
                        repaired
                    }
                    Err(e) => {
                        timer.fail(report, e.to_string());
                        return PipelineOutcome::RepairFailure;
                    }
                }
            }
            RepairStrategy::CopyRuntimeLibs => artifact,
        };

        let timer = StageTimer::begin(Stage::Install);
        let installer = Installer::new(&self.config, &toolchain, self.runner.as_ref());
        let _installed = match installer.install(artifact, &env).await {
            Ok(installed) => {
                timer.pass(report, installed.path().display().to_string());
                installed
            }
            Err(e) => {
                timer.fail(report, e.to_string());
                return PipelineOutcome::InstallFailure;
            }
        };

        if self.config.repair_strategy == RepairStrategy::CopyRuntimeLibs {
            let timer = StageTimer::begin(Stage::CopyRuntimeLibs);
            let specs = runtime_library_specs(&toolchain.mingw_bin, &toolchain.vcpkg_bin);
            match self.resolve_package_dir(&toolchain, &env).await {
                Some(target) => {
                    let copy = copy_all(&specs, &target);
                    report.missing_libraries = copy.missing.clone();
                    timer.pass(
                        report,
                        format!(
                            "copied {} runtime libraries, {} missing",
                            copy.copied.len(),
                            copy.missing.len()
                        ),
                    );
                }
                None => {
                    // Best-effort stage: record everything as unresolved
                    // and keep going; verification will tell the truth.
                    report.missing_libraries = specs.into_iter().map(|s| s.name).collect();
                    timer.fail(report, "could not determine installed package directory");
                }
            }
        }

        let timer = StageTimer::begin(Stage::Verify);
        let verifier = Verifier::new(&self.config, &toolchain, self.runner.as_ref());
        match verifier.verify(&env).await {
            Ok(outcome) => {
                let detail = verify_detail(&outcome);
                let pass = outcome.is_pass();
                report.verify = Some(outcome);
                if pass {
                    timer.pass(report, detail);
                } else {
                    timer.fail(report, detail);
                    if self.config.strict_verify {
                        return PipelineOutcome::VerificationFailure;
                    }
                    // Reported only; the install is not rolled back.
                    warn!("self-test failed; continuing because strict verification is disabled");
                }
            }
            Err(e) => {
                timer.fail(report, e.to_string());
                return PipelineOutcome::VerificationFailure;
            }
        }

        PipelineOutcome::Success
    }

    /// Ask the active environment where the package was installed.
    async fn resolve_package_dir(
        &self,
        toolchain: &Toolchain,
        env: &BuildEnv,
    ) -> Option<PathBuf> {
        let spec = CommandSpec::new(
            toolchain.uv.to_string_lossy().into_owned(),
            vec![
                "run".to_string(),
                "python".to_string(),
                "-c".to_string(),
                "import sysconfig; print(sysconfig.get_path('purelib'))".to_string(),
            ],
        )
        .with_env(env);

        match self.runner.run(&spec).await {
            Ok(output) if output.success() => {
                let target = PathBuf::from(output.stdout.trim()).join(&self.config.package);
                if target.is_dir() {
                    Some(target)
                } else {
                    warn!(dir = %target.display(), "installed package directory not found");
                    None
                }
            }
            Ok(output) => {
                warn!(exit_code = output.exit_code, "could not query site-packages");
                None
            }
            Err(error) => {
                warn!(%error, "could not query site-packages");
                None
            }
        }
    }

    /// Remove the transient output directories. Errors are logged, never
    /// raised — cleanup must not mask the run's real outcome.
    async fn cleanup(&self) {
        for dir in [self.config.wheel_dir(), self.config.repaired_dir()] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => info!(dir = %dir.display(), "removed intermediate directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    warn!(dir = %dir.display(), %error, "failed to remove intermediate directory");
                }
            }
        }
    }
}

fn verify_detail(outcome: &VerifyOutcome) -> String {
    match outcome {
        VerifyOutcome::Passed => "self-test passed".to_string(),
        VerifyOutcome::Warned { markers } => {
            format!("self-test passed with warnings: {}", markers.join(", "))
        }
        VerifyOutcome::Failed { failure } => match failure {
            VerifyFailure::ImportResolution { detail } => {
                format!("package could not be imported: {detail}")
            }
            VerifyFailure::TestsFailed { exit_code } => {
                format!("self-test failed with exit code {exit_code}")
            }
        },
    }
}
