//! Uniform external-command abstraction.
//!
//! Every stage talks to its external tool through [`CommandRunner`], which
//! returns a structured [`CommandOutput`] (exit code plus captured streams).
//! The production implementation is [`ProcessRunner`]; tests substitute
//! [`crate::fakes::ScriptedRunner`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::env::BuildEnv;
use crate::error::CommandError;

/// A single external tool invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program to execute (name or absolute path).
    pub program: String,

    /// Arguments, one element each.
    pub args: Vec<String>,

    /// Environment snapshot for the child. `None` inherits the ambient
    /// environment unchanged.
    pub env: Option<BuildEnv>,

    /// Working directory. `None` inherits the orchestrator's.
    pub cwd: Option<PathBuf>,

    /// Deadline in seconds; 0 waits forever.
    pub timeout_secs: u64,
}

impl CommandSpec {
    /// Create a spec with no environment overlay and no timeout.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: None,
            cwd: None,
            timeout_secs: 0,
        }
    }

    /// Attach an environment snapshot.
    pub fn with_env(mut self, env: &BuildEnv) -> Self {
        self.env = Some(env.clone());
        self
    }

    /// Render the command line for logs and error messages.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Structured result of a finished external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (0 = success; -1 when the process was killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches external commands and waits for them to finish.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Production runner backed by `tokio::process`.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let start = Instant::now();

        debug!(command = %spec.display(), "spawning process");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(env) = &spec.env {
            command.env_clear().envs(env.as_map());
        }
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let output = if spec.timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(spec.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| CommandError::TimedOut {
                program: spec.program.clone(),
                timeout_secs: spec.timeout_secs,
            })?
            .map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            })?
        } else {
            child
                .wait_with_output()
                .await
                .map_err(|source| CommandError::Spawn {
                    program: spec.program.clone(),
                    source,
                })?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            command = %spec.display(),
            exit_code,
            duration_ms,
            "process finished"
        );

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_program_and_args() {
        let spec = CommandSpec::new("uv", vec!["pip".to_string(), "install".to_string()]);
        assert_eq!(spec.display(), "uv pip install");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_run_captures_stdout() {
        let spec = CommandSpec::new("echo", vec!["hello".to_string()]);
        let output = ProcessRunner.run(&spec).await.expect("run failed");
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_run_reports_nonzero_exit() {
        let spec = CommandSpec::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let output = ProcessRunner.run(&spec).await.expect("run failed");
        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn test_run_spawn_error() {
        let spec = CommandSpec::new("/nonexistent-binary-that-does-not-exist", vec![]);
        let result = ProcessRunner.run(&spec).await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_env_snapshot_is_applied() {
        let env = crate::env::BuildEnv::empty()
            .with_var("PATH", std::env::var("PATH").unwrap_or_default())
            .with_var("WHEELSMITH_MARKER", "present");
        let spec = CommandSpec::new(
            "sh",
            vec!["-c".to_string(), "echo $WHEELSMITH_MARKER".to_string()],
        )
        .with_env(&env);

        let output = ProcessRunner.run(&spec).await.expect("run failed");
        assert_eq!(output.stdout.trim(), "present");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_env_clear_drops_ambient_vars() {
        // Ambient variables must not leak into a child launched with a snapshot.
        std::env::set_var("WHEELSMITH_AMBIENT_ONLY", "leaked");
        let env = crate::env::BuildEnv::empty()
            .with_var("PATH", std::env::var("PATH").unwrap_or_default());
        let spec = CommandSpec::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo ${WHEELSMITH_AMBIENT_ONLY:-clean}".to_string(),
            ],
        )
        .with_env(&env);

        let output = ProcessRunner.run(&spec).await.expect("run failed");
        assert_eq!(output.stdout.trim(), "clean");
        std::env::remove_var("WHEELSMITH_AMBIENT_ONLY");
    }
}
