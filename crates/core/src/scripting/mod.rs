//! External interpreter invocation.
//!
//! [`runner::PythonRunner`] is the entry point. A call flows through
//! [`resolver`] (script mode only), [`subprocess`] (spawn, drain, timeout)
//! and [`result`] (normalization into a [`result::ScriptResult`]). Each
//! invocation owns its own child process and buffers; nothing is shared
//! between calls except the read-only [`RunnerConfig`](crate::config::RunnerConfig).

pub mod outcome;
pub mod request;
pub mod resolver;
pub mod result;
pub mod runner;
pub mod subprocess;

/// Shared test helpers for scripting tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::path::{Path, PathBuf};

    use crate::config::RunnerConfig;

    use super::runner::PythonRunner;

    /// Script root used by [`bash_runner`], relative to the working directory.
    pub const SCRIPTS_DIR: &str = "scripts";

    /// Override root used by [`bash_runner`], relative to the working directory.
    pub const OVERRIDE_DIR: &str = "overrides";

    /// Write a bash script at `root/relative`, creating parent directories.
    pub fn write_script(root: &Path, relative: &str, body: &str) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create script dir");
        }
        std::fs::write(&path, format!("#!/bin/bash\n{body}")).expect("write script");
        path
    }

    /// A runner that uses `bash` as its interpreter, rooted at `workdir`.
    ///
    /// `bash` accepts the same `<script> args...` and `-c <code> args...`
    /// argv shapes as Python, which keeps the tests free of a Python
    /// dependency.
    pub fn bash_runner(workdir: &Path) -> PythonRunner {
        PythonRunner::new(
            RunnerConfig::new("bash", workdir)
                .with_scripts_dir(SCRIPTS_DIR)
                .with_override_dir(OVERRIDE_DIR),
        )
    }

    pub fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
}
