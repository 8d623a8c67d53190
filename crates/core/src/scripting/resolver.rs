//! Script identifier resolution.
//!
//! An identifier is a relative path looked up under two roots: the override
//! root first, then the default root. Only the override lookup touches the
//! filesystem; a default-root miss is detected later by the supervisor.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::RunnerConfig;
use crate::error::CoreError;

/// Which root a [`ResolvedTarget`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    /// Found in the override root.
    PrimaryOverride,
    /// Fallback location in the default root; not verified to exist.
    DefaultLocation,
}

/// Concrete script location chosen for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    pub source: TargetSource,
}

/// Maps script identifiers onto the override and default roots.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    override_root: PathBuf,
    default_root: PathBuf,
}

impl TargetResolver {
    pub fn new(override_root: impl Into<PathBuf>, default_root: impl Into<PathBuf>) -> Self {
        Self {
            override_root: override_root.into(),
            default_root: default_root.into(),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(&config.override_dir, &config.scripts_dir)
    }

    /// Resolve `identifier` to a script path.
    ///
    /// Returns [`CoreError::Validation`] for identifiers that are empty or
    /// could escape the roots.
    pub async fn resolve(&self, identifier: &str) -> Result<ResolvedTarget, CoreError> {
        let relative = validate_identifier(identifier)?;

        let candidate = self.override_root.join(relative);
        if is_file(&candidate).await {
            return Ok(ResolvedTarget {
                path: candidate,
                source: TargetSource::PrimaryOverride,
            });
        }

        Ok(ResolvedTarget {
            path: self.default_root.join(relative),
            source: TargetSource::DefaultLocation,
        })
    }
}

/// Check that `identifier` is a non-empty relative path made only of normal
/// components (`.` is tolerated).
pub fn validate_identifier(identifier: &str) -> Result<&Path, CoreError> {
    if identifier.trim().is_empty() {
        return Err(CoreError::Validation(
            "script identifier must not be empty".into(),
        ));
    }

    let path = Path::new(identifier);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CoreError::Validation(format!(
                    "script identifier must stay inside the script roots: {identifier}"
                )));
            }
        }
    }

    Ok(path)
}

/// `true` if `path` exists and is a regular file (symlinks followed).
pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
