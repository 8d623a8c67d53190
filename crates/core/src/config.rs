use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoreError;

/// Interpreter used when `PYTHON_BIN` is unset.
pub const DEFAULT_INTERPRETER: &str = "/usr/bin/python3";

/// Default script root, relative to the working directory.
pub const DEFAULT_SCRIPTS_DIR: &str = "python-scripts";

/// Override script root, relative to the working directory. Files here shadow
/// the default root.
pub const DEFAULT_OVERRIDE_DIR: &str = "src/app/api/python";

/// Budget applied when a caller does not pass one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Runner configuration loaded from environment variables.
///
/// Read-only after construction and shared by every invocation.
/// `working_directory` is stored as an absolute path, and relative script
/// roots are joined onto it. The paths checked in this process then name the
/// same files the child sees from its own working directory.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interpreter executable spawned for every invocation.
    pub interpreter: PathBuf,
    /// Working directory of the child process.
    pub working_directory: PathBuf,
    /// Default script root (searched second, never existence-checked).
    pub scripts_dir: PathBuf,
    /// Override script root (searched first).
    pub override_dir: PathBuf,
    /// Budget used when an invocation does not specify one.
    pub default_timeout: Duration,
}

impl RunnerConfig {
    /// Build a configuration with default roots and timeout.
    ///
    /// A relative `working_directory` is made absolute against the current
    /// directory. If that directory cannot be read, the path is kept as given.
    pub fn new(interpreter: impl Into<PathBuf>, working_directory: impl Into<PathBuf>) -> Self {
        let working_directory = working_directory.into();
        let working_directory = absolute_dir(&working_directory).unwrap_or(working_directory);
        Self {
            interpreter: interpreter.into(),
            scripts_dir: working_directory.join(DEFAULT_SCRIPTS_DIR),
            override_dir: working_directory.join(DEFAULT_OVERRIDE_DIR),
            working_directory,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_scripts_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.scripts_dir = self.working_directory.join(dir);
        self
    }

    pub fn with_override_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.override_dir = self.working_directory.join(dir);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default              |
    /// |-------------------------|----------------------|
    /// | `PYTHON_BIN`            | `/usr/bin/python3`   |
    /// | `PYRUNNER_WORKING_DIR`  | current directory    |
    /// | `PYRUNNER_SCRIPTS_DIR`  | `python-scripts`     |
    /// | `PYRUNNER_OVERRIDE_DIR` | `src/app/api/python` |
    /// | `PYRUNNER_TIMEOUT_MS`   | `30000`              |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let interpreter = var("PYTHON_BIN").unwrap_or_else(|| DEFAULT_INTERPRETER.into());

        let working_directory = match var("PYRUNNER_WORKING_DIR") {
            Some(dir) => absolute_dir(Path::new(&dir))?,
            None => std::env::current_dir().map_err(|e| {
                CoreError::Config(format!("cannot determine current directory: {e}"))
            })?,
        };

        let mut config = Self::new(interpreter, working_directory);

        if let Some(dir) = var("PYRUNNER_SCRIPTS_DIR") {
            config = config.with_scripts_dir(dir);
        }
        if let Some(dir) = var("PYRUNNER_OVERRIDE_DIR") {
            config = config.with_override_dir(dir);
        }
        if let Some(raw) = var("PYRUNNER_TIMEOUT_MS") {
            config = config.with_default_timeout(parse_timeout_ms(&raw)?);
        }

        Ok(config)
    }
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, CoreError> {
    std::path::absolute(dir).map_err(|e| {
        CoreError::Config(format!(
            "cannot resolve working directory {}: {e}",
            dir.display()
        ))
    })
}

/// Parse a millisecond budget. Zero is rejected: it would time out every run.
pub fn parse_timeout_ms(raw: &str) -> Result<Duration, CoreError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(CoreError::Config(format!(
            "timeout must be a positive number of milliseconds, got '{raw}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
