//! `pyrunner-core` -- external interpreter execution.
//!
//! Resolves a script identifier (or takes an inline code fragment), runs it
//! under a configured interpreter with a wall-clock budget, and normalizes
//! whatever happened into a [`ScriptResult`](scripting::result::ScriptResult).

pub mod config;
pub mod error;
pub mod scripting;
