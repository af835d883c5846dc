use thiserror::Error;

/// Per-stage error taxonomy. `Validation` blocks the pipeline immediately;
/// `Generation` and `Parse` are caught by the orchestrator and replaced with
/// that stage's fallback output.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("character not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StageError {
    pub fn generation(err: impl std::fmt::Display) -> Self {
        StageError::Generation(err.to_string())
    }
}
