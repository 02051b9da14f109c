use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

/// Error raised by an ML runtime while building, fitting or running a model.
///
/// The message is surfaced verbatim to callers and callbacks, so runtimes should
/// put the whole human-readable reason into it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("a training session is already active")]
    SessionAlreadyActive,

    #[error("invalid training request: {0}")]
    Validation(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("no trained model is available")]
    NoModel,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_is_surfaced_verbatim() {
        let err: TrainingError = RuntimeError::new("out of memory while fitting").into();
        assert_eq!(err.to_string(), "out of memory while fitting");
    }
}
