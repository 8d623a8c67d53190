/// Errors raised while loading configuration or validating a request.
///
/// These never cross the [`PythonRunner`](crate::scripting::runner::PythonRunner)
/// boundary: the facade folds them into a spawn-failure result.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
