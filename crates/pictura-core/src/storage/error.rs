//! Failures raised by the class and image stores.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite rejected a statement or the database file could not be opened.
    #[error("Database error: {0}")]
    Connection(#[from] rusqlite::Error),

    /// A class id or name that the store does not know.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Saved model info or a setting value is not valid JSON.
    #[error("Corrupt stored JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input the store refuses, such as a blank class name.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The database directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_setting_reports_json_error() {
        let err: StorageError = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err().into();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(err.to_string().starts_with("Corrupt stored JSON"));
    }
}
