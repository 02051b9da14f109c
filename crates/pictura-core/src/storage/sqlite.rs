//! SQLite-backed store.

use crate::storage::database::Database;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::store::{ClassRecord, ImageRecord, Store, normalize_class_name};
use chrono::{DateTime, Utc};
use pictura_training::{ClassId, ImageData, ImageId, ModelInfo};
use rusqlite::{OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info};

/// Parses an RFC3339 timestamp string from a row into a `DateTime<Utc>`.
fn parse_timestamp(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let timestamp_str: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&timestamp_str).map(|dt| dt.with_timezone(&Utc)).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            column_name.to_string(),
            rusqlite::types::Type::Text,
        )
    })
}

pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn class_exists(&self, id: ClassId) -> StorageResult<bool> {
        let found = self
            .db
            .conn()
            .query_row("SELECT 1 FROM classes WHERE id = ?1", params![id.0], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }
}

impl Store for SqliteStore {
    fn add_class(&mut self, name: &str) -> StorageResult<ClassId> {
        let name = normalize_class_name(name)?;
        let conn = self.db.conn_mut();
        conn.execute(
            "INSERT INTO classes (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        let id = ClassId(conn.last_insert_rowid());
        info!(class_id = %id, name, "Created class");
        Ok(id)
    }

    fn get_classes(&self) -> StorageResult<Vec<ClassRecord>> {
        let mut stmt =
            self.db.conn().prepare("SELECT id, name, created_at FROM classes ORDER BY id")?;
        let classes = stmt
            .query_map([], |row| {
                Ok(ClassRecord {
                    id: ClassId(row.get(0)?),
                    name: row.get(1)?,
                    created_at: parse_timestamp(row, 2, "created_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(classes)
    }

    fn update_class_name(&mut self, id: ClassId, name: &str) -> StorageResult<bool> {
        let name = normalize_class_name(name)?;
        let rows = self
            .db
            .conn_mut()
            .execute("UPDATE classes SET name = ?1 WHERE id = ?2", params![name, id.0])?;
        if rows > 0 {
            info!(class_id = %id, name, "Renamed class");
        }
        Ok(rows > 0)
    }

    fn delete_class(&mut self, id: ClassId) -> StorageResult<bool> {
        let tx = self.db.conn_mut().transaction()?;
        let images = tx.execute("DELETE FROM images WHERE class_id = ?1", params![id.0])?;
        let rows = tx.execute("DELETE FROM classes WHERE id = ?1", params![id.0])?;
        tx.commit()?;

        if rows > 0 {
            info!(class_id = %id, images, "Deleted class");
        }
        Ok(rows > 0)
    }

    fn add_image(&mut self, class_id: ClassId, data: &ImageData) -> StorageResult<ImageId> {
        if !self.class_exists(class_id)? {
            return Err(StorageError::NotFound(format!("class {class_id}")));
        }
        let conn = self.db.conn_mut();
        conn.execute(
            "INSERT INTO images (class_id, data, mime_type, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![class_id.0, data.bytes, data.mime_type, Utc::now().to_rfc3339()],
        )?;
        let id = ImageId(conn.last_insert_rowid());
        debug!(image_id = %id, class_id = %class_id, bytes = data.bytes.len(), "Stored image");
        Ok(id)
    }

    fn get_images_by_class(&self, class_id: ClassId) -> StorageResult<Vec<ImageRecord>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, class_id, data, mime_type, created_at FROM images WHERE class_id = ?1 ORDER BY id",
        )?;
        let images = stmt
            .query_map(params![class_id.0], |row| {
                Ok(ImageRecord {
                    id: ImageId(row.get(0)?),
                    class_id: ClassId(row.get(1)?),
                    data: ImageData { bytes: row.get(2)?, mime_type: row.get(3)? },
                    created_at: parse_timestamp(row, 4, "created_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(images)
    }

    fn delete_image(&mut self, id: ImageId) -> StorageResult<bool> {
        let rows = self.db.conn_mut().execute("DELETE FROM images WHERE id = ?1", params![id.0])?;
        Ok(rows > 0)
    }

    fn save_model_info(&mut self, info: &ModelInfo) -> StorageResult<()> {
        let info_json = serde_json::to_string(info)?;
        self.db.conn_mut().execute(
            "INSERT OR REPLACE INTO model_info (id, info_json, saved_at) VALUES (1, ?1, ?2)",
            params![info_json, Utc::now().to_rfc3339()],
        )?;
        info!(epochs_trained = info.epochs_trained, classes = info.classes.len(), "Saved model info");
        Ok(())
    }

    fn get_model_info(&self) -> StorageResult<Option<ModelInfo>> {
        let info_json: Option<String> = self
            .db
            .conn()
            .query_row("SELECT info_json FROM model_info WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        info_json.map(|json| serde_json::from_str(&json).map_err(StorageError::from)).transpose()
    }

    fn get_setting(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        let value_json: Option<String> = self
            .db
            .conn()
            .query_row("SELECT value_json FROM settings WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        value_json.map(|json| serde_json::from_str(&json).map_err(StorageError::from)).transpose()
    }

    fn set_setting(&mut self, key: &str, value: &serde_json::Value) -> StorageResult<()> {
        let value_json = serde_json::to_string(value)?;
        self.db.conn_mut().execute(
            "INSERT OR REPLACE INTO settings (key, value_json) VALUES (?1, ?2)",
            params![key, value_json],
        )?;
        Ok(())
    }

    fn clear_all(&mut self) -> StorageResult<()> {
        let tx = self.db.conn_mut().transaction()?;
        tx.execute("DELETE FROM images", [])?;
        tx.execute("DELETE FROM classes", [])?;
        tx.execute("DELETE FROM model_info", [])?;
        tx.execute("DELETE FROM settings", [])?;
        tx.commit()?;
        info!("Cleared all stored data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::conformance;

    fn setup_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_class_round_trip() {
        conformance::class_round_trip(&mut setup_store());
    }

    #[test]
    fn test_images_and_cascade() {
        conformance::images_and_cascade(&mut setup_store());
    }

    #[test]
    fn test_model_info_and_settings() {
        conformance::model_info_and_settings(&mut setup_store());
    }

    #[test]
    fn test_clear_all() {
        conformance::clear_all(&mut setup_store());
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("pictura.db");

        let class_id = {
            let mut store = SqliteStore::open(&path).unwrap();
            let id = store.add_class("cats").unwrap();
            store.add_image(id, &ImageData::new(vec![1, 2, 3])).unwrap();
            id
        };

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_classes().unwrap()[0].name, "cats");
        assert_eq!(store.get_images_by_class(class_id).unwrap()[0].data.bytes, vec![1, 2, 3]);
    }
}
