//! Database connection and schema management.

use rusqlite::Connection;
use std::path::Path;
use tracing::info;

use crate::storage::error::StorageResult;

/// Database connection wrapper.
///
/// Manages SQLite connection and schema initialization.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database file, creating it and its parent directory if needed.
    ///
    /// # Errors
    /// * `StorageError::Io` - If the parent directory cannot be created
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Opens an in-memory database for testing.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Gets a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Creates the class, image, model and settings tables.
    fn init_schema(&self) -> StorageResult<()> {
        info!("Initializing database schema");

        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS classes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                class_id INTEGER NOT NULL,
                data BLOB NOT NULL,
                mime_type TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        // Single row: only the latest model is kept
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS model_info (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                info_json TEXT NOT NULL,
                saved_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn
            .execute("CREATE INDEX IF NOT EXISTS idx_images_class_id ON images(class_id)", [])?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_tables() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('classes', 'images', 'model_info', 'settings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("pictura.db");

        Database::open(&path).unwrap();
        assert!(path.exists());

        // Reopening an existing file keeps the schema idempotent
        Database::open(&path).unwrap();
    }
}
