use crate::config::ConfigError;
use crate::storage::StorageError;
use pictura_training::TrainingError;
use thiserror::Error;

/// Errors from operations that span storage and training.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
