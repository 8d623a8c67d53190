//! Invocation facade.
//!
//! [`PythonRunner`] exposes the two public entry points, [`run_script`] and
//! [`run_code`]. Both build an [`ExecutionCommand`] and hand it to the single
//! supervisor in [`subprocess`]; they differ only in how the command is
//! constructed.
//!
//! [`run_script`]: PythonRunner::run_script
//! [`run_code`]: PythonRunner::run_code

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use crate::config::RunnerConfig;
use crate::error::CoreError;

use super::outcome::ExecutionOutcome;
use super::request::{ExecutionMode, ExecutionRequest};
use super::resolver::TargetResolver;
use super::result::{normalize, ScriptResult};
use super::subprocess::{self, ExecutionCommand};

/// Runs scripts and inline code under the configured interpreter.
///
/// Holds only read-only configuration, so one instance can be cloned or
/// shared across any number of concurrent invocations.
#[derive(Debug, Clone)]
pub struct PythonRunner {
    config: Arc<RunnerConfig>,
    resolver: TargetResolver,
}

impl PythonRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let resolver = TargetResolver::from_config(&config);
        Self {
            config: Arc::new(config),
            resolver,
        }
    }

    /// Build the default runner from environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        RunnerConfig::from_env().map(Self::new)
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the script named `identifier` with `args`.
    ///
    /// The override root is searched before the default root. `timeout`
    /// falls back to the configured default (30 s unless overridden).
    pub async fn run_script<T: DeserializeOwned>(
        &self,
        identifier: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> ScriptResult<T> {
        self.run(ExecutionRequest::script(identifier, args.to_vec()).with_timeout(timeout))
            .await
    }

    /// Run `code` with `-c`, passing `args` after it.
    pub async fn run_code<T: DeserializeOwned>(
        &self,
        code: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> ScriptResult<T> {
        self.run(ExecutionRequest::code(code, args.to_vec()).with_timeout(timeout))
            .await
    }

    /// Run `request` and normalize the outcome.
    pub async fn run<T: DeserializeOwned>(&self, request: ExecutionRequest) -> ScriptResult<T> {
        let started = Instant::now();
        let outcome = self.execute(&request).await;
        normalize(outcome, started)
    }

    /// Run `request` and return the raw outcome.
    ///
    /// Unlike [`ScriptResult`], this keeps the failure class and any partial
    /// output captured before a timeout.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let command = match self.build_command(request).await {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(mode = ?request.mode, error = %e, "Rejected execution request");
                return ExecutionOutcome::spawn_failed(e.to_string());
            }
        };
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);

        subprocess::execute(&command, timeout).await
    }

    async fn build_command(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionCommand, CoreError> {
        request.validate()?;

        let command = match request.mode {
            ExecutionMode::Script => {
                let target = self.resolver.resolve(&request.identifier).await?;
                tracing::info!(
                    interpreter = %self.config.interpreter.display(),
                    script = %target.path.display(),
                    source = ?target.source,
                    args = request.arguments.len(),
                    cwd = %self.config.working_directory.display(),
                    "Running script",
                );
                ExecutionCommand::script(&self.config.interpreter, &target, &request.arguments)
            }
            ExecutionMode::InlineCode => {
                tracing::info!(
                    interpreter = %self.config.interpreter.display(),
                    code_bytes = request.identifier.len(),
                    args = request.arguments.len(),
                    cwd = %self.config.working_directory.display(),
                    "Running inline code",
                );
                ExecutionCommand::inline(
                    &self.config.interpreter,
                    &request.identifier,
                    &request.arguments,
                )
            }
        };

        Ok(command.in_dir(&self.config.working_directory))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
