//! Pictura Core
//!
//! Concrete collaborators for the training controller: persistent storage of
//! classes, images, model metadata and settings; a reference runtime; request
//! assembly from stored data; and layered configuration.

pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod runtime;
pub mod storage;

pub use config::{ConfigError, ConfigResult, PicturaConfig, TrainingDefaults};
pub use dataset::{build_request, dataset_fingerprint};
pub use error::{CoreError, CoreResult};
pub use models::{ModelStatus, restore_model, save_trained_model};
pub use runtime::LinearRuntime;
pub use storage::{
    ClassRecord, Database, ImageRecord, MemoryStore, SqliteStore, StorageError, StorageResult,
    Store,
};
