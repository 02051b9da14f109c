//! Storage layer for Pictura.
//!
//! Persists classes, their images, the latest model's metadata and free-form
//! settings. `SqliteStore` is durable; `MemoryStore` lives for the process only.

// SQL strings don't need hash-less raw strings
#![allow(clippy::needless_raw_string_hashes)]

pub mod database;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{ClassRecord, ImageRecord, Store};
