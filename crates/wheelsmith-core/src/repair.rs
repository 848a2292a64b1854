//! Artifact repair stage.
//!
//! Runs delvewheel against the built wheel so the runtime DLLs end up
//! embedded in the artifact itself. On success the pipeline continues with
//! the repaired wheel exclusively; on failure it stops — falling back
//! silently to the unrepaired wheel would ship an artifact that cannot load.

use tracing::info;

use crate::artifact::{find_single_wheel, Artifact};
use crate::command::{CommandRunner, CommandSpec};
use crate::config::PipelineConfig;
use crate::env::BuildEnv;
use crate::error::RepairError;
use crate::toolchain::Toolchain;

/// Drives `delvewheel repair`.
pub struct WheelRepairer<'a> {
    config: &'a PipelineConfig,
    toolchain: &'a Toolchain,
    runner: &'a dyn CommandRunner,
}

impl<'a> WheelRepairer<'a> {
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

    /// Repair the built artifact into the repair output directory.
    ///
    /// The environment carries the vcpkg bin directory first on PATH, which
    /// is how the repair tool discovers the DLLs to embed.
    pub async fn repair(
        &self,
        artifact: Artifact,
        env: &BuildEnv,
    ) -> Result<Artifact, RepairError> {
        let repaired_dir = self.config.repaired_dir();
        tokio::fs::create_dir_all(&repaired_dir)
            .await
            .map_err(|source| RepairError::OutputDir {
                dir: repaired_dir.clone(),
                source,
            })?;

        let spec = CommandSpec::new(
            self.toolchain.uv.to_string_lossy().into_owned(),
            vec![
                "run".to_string(),
                "delvewheel".to_string(),
                "repair".to_string(),
                artifact.path().to_string_lossy().into_owned(),
                "-w".to_string(),
                repaired_dir.to_string_lossy().into_owned(),
            ],
        )
        .with_env(env);

        info!(command = %spec.display(), "repairing wheel");
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(RepairError::ToolFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        let repaired_path = find_single_wheel(&repaired_dir, &self.config.package)?;
        info!(wheel = %repaired_path.display(), "wheel repaired");
        Ok(artifact.repaired(repaired_path)?)
    }
}
