//! In-process store for tests and throwaway sessions.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::store::{ClassRecord, ImageRecord, Store, normalize_class_name};
use chrono::Utc;
use pictura_training::{ClassId, ImageData, ImageId, ModelInfo};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct MemoryStore {
    classes: BTreeMap<ClassId, ClassRecord>,
    images: BTreeMap<ImageId, ImageRecord>,
    model_info: Option<ModelInfo>,
    settings: HashMap<String, serde_json::Value>,
    next_class: i64,
    next_image: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn add_class(&mut self, name: &str) -> StorageResult<ClassId> {
        let name = normalize_class_name(name)?;
        self.next_class += 1;
        let id = ClassId(self.next_class);
        self.classes.insert(id, ClassRecord { id, name: name.to_string(), created_at: Utc::now() });
        Ok(id)
    }

    fn get_classes(&self) -> StorageResult<Vec<ClassRecord>> {
        Ok(self.classes.values().cloned().collect())
    }

    fn update_class_name(&mut self, id: ClassId, name: &str) -> StorageResult<bool> {
        let name = normalize_class_name(name)?;
        Ok(self.classes.get_mut(&id).map(|class| class.name = name.to_string()).is_some())
    }

    fn delete_class(&mut self, id: ClassId) -> StorageResult<bool> {
        if self.classes.remove(&id).is_none() {
            return Ok(false);
        }
        self.images.retain(|_, image| image.class_id != id);
        Ok(true)
    }

    fn add_image(&mut self, class_id: ClassId, data: &ImageData) -> StorageResult<ImageId> {
        if !self.classes.contains_key(&class_id) {
            return Err(StorageError::NotFound(format!("class {class_id}")));
        }
        self.next_image += 1;
        let id = ImageId(self.next_image);
        self.images
            .insert(id, ImageRecord { id, class_id, data: data.clone(), created_at: Utc::now() });
        Ok(id)
    }

    fn get_images_by_class(&self, class_id: ClassId) -> StorageResult<Vec<ImageRecord>> {
        Ok(self.images.values().filter(|i| i.class_id == class_id).cloned().collect())
    }

    fn delete_image(&mut self, id: ImageId) -> StorageResult<bool> {
        Ok(self.images.remove(&id).is_some())
    }

    fn save_model_info(&mut self, info: &ModelInfo) -> StorageResult<()> {
        self.model_info = Some(info.clone());
        Ok(())
    }

    fn get_model_info(&self) -> StorageResult<Option<ModelInfo>> {
        Ok(self.model_info.clone())
    }

    fn get_setting(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        Ok(self.settings.get(key).cloned())
    }

    fn set_setting(&mut self, key: &str, value: &serde_json::Value) -> StorageResult<()> {
        self.settings.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn clear_all(&mut self) -> StorageResult<()> {
        self.classes.clear();
        self.images.clear();
        self.model_info = None;
        self.settings.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::conformance;

    #[test]
    fn test_class_round_trip() {
        conformance::class_round_trip(&mut MemoryStore::new());
    }

    #[test]
    fn test_images_and_cascade() {
        conformance::images_and_cascade(&mut MemoryStore::new());
    }

    #[test]
    fn test_model_info_and_settings() {
        conformance::model_info_and_settings(&mut MemoryStore::new());
    }

    #[test]
    fn test_clear_all() {
        conformance::clear_all(&mut MemoryStore::new());
    }
}
