//! Install stage.
//!
//! Installs the artifact into the currently active environment. The
//! pipeline always installs offline — resolving only from the directory the
//! artifact was written to — so the exact build under test is what lands in
//! the environment. Index-based installation exists as a separate entry
//! point and is never combined with the offline mode in one run.

use tracing::info;

use crate::artifact::Artifact;
use crate::command::{CommandRunner, CommandSpec};
use crate::config::PipelineConfig;
use crate::env::BuildEnv;
use crate::error::InstallError;
use crate::toolchain::Toolchain;

/// Drives `uv pip install`.
pub struct Installer<'a> {
    config: &'a PipelineConfig,
    toolchain: &'a Toolchain,
    runner: &'a dyn CommandRunner,
}

impl<'a> Installer<'a> {
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

    fn uv(&self) -> String {
        self.toolchain.uv.to_string_lossy().into_owned()
    }

    /// Offline install from the artifact's own directory
    /// (`--no-index --find-links`). Verifies the artifact file is still
    /// where the previous stage left it before launching anything.
    pub async fn install(
        &self,
        artifact: Artifact,
        env: &BuildEnv,
    ) -> Result<Artifact, InstallError> {
        if !artifact.path().is_file() {
            return Err(InstallError::ArtifactMissing {
                path: artifact.path().to_path_buf(),
            });
        }

        let artifact_dir = artifact
            .path()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();

        let spec = CommandSpec::new(
            self.uv(),
            vec![
                "pip".to_string(),
                "install".to_string(),
                "--no-index".to_string(),
                format!("--find-links={}", artifact_dir.display()),
                "--force-reinstall".to_string(),
                self.config.package.clone(),
            ],
        )
        .with_env(env);

        info!(command = %spec.display(), "installing wheel");
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(InstallError::ToolFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        info!(wheel = %artifact.path().display(), "wheel installed");
        Ok(artifact.installed()?)
    }

    /// Index-based install by package name. Not used by the pipeline (it
    /// prefers the offline mode above); provided for operators who want the
    /// published package instead of a local build.
    pub async fn install_from_index(&self, env: &BuildEnv) -> Result<(), InstallError> {
        let spec = CommandSpec::new(
            self.uv(),
            vec![
                "pip".to_string(),
                "install".to_string(),
                self.config.package.clone(),
            ],
        )
        .with_env(env);

        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(InstallError::ToolFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}
