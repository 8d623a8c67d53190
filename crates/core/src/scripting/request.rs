use std::time::Duration;

use serde::Serialize;

use crate::error::CoreError;

use super::resolver::validate_identifier;

/// What an [`ExecutionRequest::identifier`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// A script file, resolved against the script roots.
    Script,
    /// Code text passed to the interpreter with `-c`.
    InlineCode,
}

/// One invocation, as received by the runner.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub mode: ExecutionMode,
    /// Script identifier or code text, depending on `mode`.
    pub identifier: String,
    pub arguments: Vec<String>,
    /// Budget for this run; `None` uses the runner's default.
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn script(identifier: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            mode: ExecutionMode::Script,
            identifier: identifier.into(),
            arguments,
            timeout: None,
        }
    }

    pub fn code(code: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            mode: ExecutionMode::InlineCode,
            identifier: code.into(),
            arguments,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self.mode {
            ExecutionMode::Script => validate_identifier(&self.identifier).map(|_| ()),
            ExecutionMode::InlineCode if self.identifier.trim().is_empty() => Err(
                CoreError::Validation("inline code must not be empty".into()),
            ),
            ExecutionMode::InlineCode => Ok(()),
        }
    }
}
