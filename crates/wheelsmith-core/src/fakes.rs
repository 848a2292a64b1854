//! In-memory fakes for the command runner (testing only)
//!
//! Provides [`ScriptedRunner`], which satisfies the [`CommandRunner`] trait
//! contract without launching any process: it replays a scripted queue of
//! outcomes and records every invocation it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::CommandError;

/// One scripted response.
#[derive(Debug)]
enum Response {
    Output(CommandOutput),
    SpawnError,
}

/// A command runner that replays scripted outcomes in order.
///
/// The pipeline is strictly sequential, so queue order is invocation order.
/// When the queue runs dry, further invocations succeed with empty output;
/// tests that care about the exact invocation count assert on
/// [`ScriptedRunner::invocations`].
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<Response>>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a zero-exit response with the given stdout.
    pub fn ok(self, stdout: &str) -> Self {
        self.push(Response::Output(CommandOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration_ms: 1,
        }))
    }

    /// Queue an arbitrary exit code with captured streams.
    pub fn exit(self, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.push(Response::Output(CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration_ms: 1,
        }))
    }

    /// Queue a spawn failure (tool not launchable).
    pub fn spawn_error(self) -> Self {
        self.push(Response::SpawnError)
    }

    fn push(self, response: Response) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    /// Every invocation received so far, in order.
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().unwrap().clone()
    }

    /// Whether any recorded invocation's command line contains `needle`.
    pub fn invoked_matching(&self, needle: &str) -> bool {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .any(|spec| spec.display().contains(needle))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.invocations.lock().unwrap().push(spec.clone());

        match self.script.lock().unwrap().pop_front() {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnError) => Err(CommandError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn error"),
            }),
            None => Ok(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 1,
            }),
        }
    }
}
