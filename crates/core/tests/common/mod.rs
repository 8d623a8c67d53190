//! Shared helpers for `pyrunner-core` integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use pyrunner_core::config::RunnerConfig;
use pyrunner_core::scripting::runner::PythonRunner;

/// Default script root inside the test working directory.
pub const SCRIPTS_DIR: &str = "python-scripts";

/// Override script root inside the test working directory.
pub const OVERRIDE_DIR: &str = "api/python";

/// Write a bash script at `workdir/root/name`, creating parent directories.
pub fn write_script(workdir: &Path, root: &str, name: &str, body: &str) -> PathBuf {
    let path = workdir.join(root).join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create script dir");
    }
    std::fs::write(&path, format!("#!/bin/bash\n{body}")).expect("write script");
    path
}

/// A runner rooted at `workdir` that uses `bash` as its interpreter.
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

/// Whether a process with `pid` still exists (zombies included).
#[cfg(unix)]
pub fn process_exists(pid: i32) -> bool {
    // Safety: signal 0 only performs the existence/permission check.
    unsafe { libc::kill(pid, 0) == 0 }
}
