//! Raw invocation outcomes and the failure taxonomy.
//!
//! [`ExecutionOutcome`] is what the supervisor produces: exactly one variant
//! per invocation. [`ScriptFailure`] classifies the unsuccessful ones; its
//! `Display` text is the message surfaced in
//! [`ScriptResult::error`](super::result::ScriptResult::error).

use serde::Serialize;

/// Text captured from the child's output streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// How one invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The process exited on its own before the budget ran out.
    Completed {
        /// Process exit code (`-1` if terminated by a signal).
        exit_code: i32,
        output: CapturedOutput,
    },
    /// Nothing ran: validation failed, the script was missing, or the
    /// interpreter could not be started.
    SpawnFailed { reason: String },
    /// The budget ran out and the process was killed.
    TimedOut {
        /// Whatever had been captured before the kill.
        partial: CapturedOutput,
    },
}

impl ExecutionOutcome {
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Split into the successful output or a classified failure.
    pub fn into_result(self) -> Result<CapturedOutput, ScriptFailure> {
        match self {
            Self::Completed {
                exit_code: 0,
                output,
            } => Ok(output),
            Self::Completed { exit_code, output } => Err(ScriptFailure::ExecutionFailed {
                exit_code,
                stderr: output.stderr,
            }),
            Self::SpawnFailed { reason } => Err(ScriptFailure::SpawnFailed { reason }),
            Self::TimedOut { .. } => Err(ScriptFailure::TimedOut),
        }
    }
}

/// Why an invocation did not succeed.
///
/// Output that is not structured data is not a failure; it is surfaced as
/// [`ScriptData::Text`](super::result::ScriptData::Text).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptFailure {
    #[error("{reason}")]
    SpawnFailed { reason: String },

    /// Displays stderr verbatim when it has content, otherwise the exit code.
    #[error("{}", exit_message(.exit_code, .stderr))]
    ExecutionFailed { exit_code: i32, stderr: String },

    #[error("execution timed out")]
    TimedOut,
}

fn exit_message(exit_code: &i32, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        format!("process exited with code {exit_code}")
    } else {
        stderr.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
