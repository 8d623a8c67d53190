//! Normalization of outcomes into the public [`ScriptResult`] shape.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::outcome::ExecutionOutcome;

/// Data decoded from a successful run's stdout.
///
/// Untagged, so on the wire it is either the decoded document or a plain
/// string. Serialize-only: with `T = Value` a serialized `Text` would read
/// back as a JSON string, so the variant cannot be recovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptData<T> {
    /// Stdout decoded as a JSON document of type `T`.
    Structured(T),
    /// Stdout was not valid for `T`; the trimmed text verbatim.
    Text(String),
}

impl<T> ScriptData<T> {
    pub fn as_structured(&self) -> Option<&T> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Structured(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// Result of one invocation, as handed to callers.
///
/// Serializes as `{ success, data?, error?, executionTimeMs }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResult<T = Value> {
    pub success: bool,
    /// Absent on failure and when a successful run printed nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScriptData<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time from request to outcome, on every path.
    pub execution_time_ms: u64,
}

/// Convert an outcome into a [`ScriptResult`], timing from `started`.
pub fn normalize<T: DeserializeOwned>(
    outcome: ExecutionOutcome,
    started: Instant,
) -> ScriptResult<T> {
    let execution_time_ms = started.elapsed().as_millis() as u64;

    match outcome.into_result() {
        Ok(output) => ScriptResult {
            success: true,
            data: decode_output(&output.stdout),
            error: None,
            execution_time_ms,
        },
        Err(failure) => ScriptResult {
            success: false,
            data: None,
            error: Some(failure.to_string()),
            execution_time_ms,
        },
    }
}

/// Decode trimmed stdout as `T`, falling back to the raw text.
///
/// Empty output is `None`, not an error.
pub fn decode_output<T: DeserializeOwned>(stdout: &str) -> Option<ScriptData<T>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<T>(trimmed) {
        Ok(value) => Some(ScriptData::Structured(value)),
        Err(e) => {
            tracing::debug!(error = %e, "Stdout is not structured data; returning raw text");
            Some(ScriptData::Text(trimmed.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
