//! Wheel build stage.

use std::path::Path;

use tracing::info;

use crate::artifact::{find_single_wheel, Artifact};
use crate::command::{CommandRunner, CommandSpec};
use crate::config::{BuildStrategy, PipelineConfig};
use crate::env::BuildEnv;
use crate::error::BuildError;
use crate::toolchain::Toolchain;

/// Packages installed before the build itself can run.
pub const BUILD_REQUIREMENTS: [&str; 5] =
    ["numpy<2.0", "scikit-build", "wheel", "pytest", "delvewheel"];

/// Fortran ABI flags the numerical library's interface requires.
pub const FORTRAN_FLAGS: &str = "-ff2c -fdefault-integer-8 -fdefault-real-8";

/// Drives the external build tool to produce exactly one wheel.
pub struct WheelBuilder<'a> {
    config: &'a PipelineConfig,
    toolchain: &'a Toolchain,
    runner: &'a dyn CommandRunner,
}

impl<'a> WheelBuilder<'a> {
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

    /// Install the packages the build itself needs into the active
    /// environment.
    pub async fn install_build_requirements(&self, env: &BuildEnv) -> Result<(), BuildError> {
        let mut args = vec!["pip".to_string(), "install".to_string()];
        args.extend(BUILD_REQUIREMENTS.iter().map(|p| p.to_string()));

        let spec = CommandSpec::new(self.uv(), args).with_env(env);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(BuildError::BootstrapFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        info!("build requirements installed");
        Ok(())
    }

    /// Build the wheel with the configured strategy.
    ///
    /// Either strategy must leave exactly one `<package>-*.whl` in the
    /// wheel directory; a clean exit with zero matches is still a build
    /// failure (silent packaging failures happen).
    pub async fn build(&self, env: &BuildEnv) -> Result<Artifact, BuildError> {
        let wheel_dir = self.config.wheel_dir();
        tokio::fs::create_dir_all(&wheel_dir)
            .await
            .map_err(|source| BuildError::OutputDir {
                dir: wheel_dir.clone(),
                source,
            })?;

        for spec in self.build_commands(&wheel_dir, env) {
            info!(command = %spec.display(), "running build step");
            let output = self.runner.run(&spec).await?;
            if !output.success() {
                return Err(BuildError::ToolFailed {
                    exit_code: output.exit_code,
                    stderr: output.stderr,
                });
            }
        }

        let path = find_single_wheel(&wheel_dir, &self.config.package)?;
        info!(wheel = %path.display(), "wheel built");
        Ok(Artifact::built(path))
    }

    /// The exact invocation(s) for the configured strategy.
    fn build_commands(&self, wheel_dir: &Path, env: &BuildEnv) -> Vec<CommandSpec> {
        let package = &self.config.package;
        let wheel_dir_arg = format!("--wheel-dir={}", wheel_dir.display());
        let fortran_flags_arg =
            format!("--config-settings=cmake.define.CMAKE_Fortran_FLAGS={FORTRAN_FLAGS}");

        match self.config.build_strategy {
            BuildStrategy::WheelDirect => vec![CommandSpec::new(
                self.uv(),
                vec![
                    "run".to_string(),
                    "pip".to_string(),
                    "wheel".to_string(),
                    package.clone(),
                    wheel_dir_arg,
                    "--no-deps".to_string(),
                    "--no-build-isolation".to_string(),
                    fortran_flags_arg,
                ],
            )
            .with_env(env)],

            BuildStrategy::SourceInstall => vec![
                // Force a clean source build into the active environment.
                CommandSpec::new(
                    self.uv(),
                    vec![
                        "pip".to_string(),
                        "install".to_string(),
                        format!("--no-binary={package}"),
                        "--force-reinstall".to_string(),
                        "--no-deps".to_string(),
                        package.clone(),
                    ],
                )
                .with_env(env),
                // Wrap the installed build into a distributable wheel.
                CommandSpec::new(
                    self.uv(),
                    vec![
                        "run".to_string(),
                        "--with".to_string(),
                        "pip".to_string(),
                        "pip".to_string(),
                        "wheel".to_string(),
                        wheel_dir_arg,
                        "--no-deps".to_string(),
                        package.clone(),
                    ],
                )
                .with_env(env),
            ],
        }
    }
}
