//! Command implementations for the Pictura CLI.

pub mod class;
pub mod image;
pub mod model;
pub mod predict;
pub mod reset;
pub mod train;

use anyhow::{Context, Result};
use pictura_core::SqliteStore;
use std::path::Path;

pub fn open_store(db: &Path) -> Result<SqliteStore> {
    SqliteStore::open(db).with_context(|| format!("Failed to open database: {}", db.display()))
}
