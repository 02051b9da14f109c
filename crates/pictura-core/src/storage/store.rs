//! The persistent store contract.

use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use pictura_training::{ClassId, ImageData, ImageId, ModelInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: ClassId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub class_id: ClassId,
    pub data: ImageData,
    pub created_at: DateTime<Utc>,
}

/// Storage for classes, images, model metadata and settings.
///
/// Classes are returned in creation order, images in insertion order. Only the
/// latest `ModelInfo` is kept.
pub trait Store: Send {
    /// Adds a class and returns its id.
    ///
    /// # Errors
    /// * `StorageError::InvalidData` - If the name is blank
    fn add_class(&mut self, name: &str) -> StorageResult<ClassId>;

    fn get_classes(&self) -> StorageResult<Vec<ClassRecord>>;

    /// Renames a class. Returns `false` if no class has that id.
    fn update_class_name(&mut self, id: ClassId, name: &str) -> StorageResult<bool>;

    /// Deletes a class together with its images. Returns `false` if no class has that id.
    fn delete_class(&mut self, id: ClassId) -> StorageResult<bool>;

    /// # Errors
    /// * `StorageError::NotFound` - If the class does not exist
    fn add_image(&mut self, class_id: ClassId, data: &ImageData) -> StorageResult<ImageId>;

    fn get_images_by_class(&self, class_id: ClassId) -> StorageResult<Vec<ImageRecord>>;

    fn delete_image(&mut self, id: ImageId) -> StorageResult<bool>;

    /// Replaces the stored model metadata.
    fn save_model_info(&mut self, info: &ModelInfo) -> StorageResult<()>;

    fn get_model_info(&self) -> StorageResult<Option<ModelInfo>>;

    fn get_setting(&self, key: &str) -> StorageResult<Option<serde_json::Value>>;

    fn set_setting(&mut self, key: &str, value: &serde_json::Value) -> StorageResult<()>;

    /// Removes every class, image, model record and setting.
    fn clear_all(&mut self) -> StorageResult<()>;

    fn count_images(&self, class_id: ClassId) -> StorageResult<usize> {
        Ok(self.get_images_by_class(class_id)?.len())
    }

    /// Finds a class by id or by exact name.
    fn find_class(&self, key: &str) -> StorageResult<ClassRecord> {
        let classes = self.get_classes()?;
        let by_id = key.parse::<i64>().ok().map(ClassId);
        classes
            .into_iter()
            .find(|c| Some(c.id) == by_id || c.name == key.trim())
            .ok_or_else(|| StorageError::NotFound(format!("class '{key}'")))
    }
}

/// Trims a class name, rejecting blank ones.
pub(crate) fn normalize_class_name(name: &str) -> StorageResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidData("class name must not be empty".to_string()));
    }
    Ok(trimmed)
}

/// Behavior every `Store` implementation must share.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use pictura_training::{Architecture, DatasetFingerprint, ModelClass, ModelToken};

    fn png(byte: u8) -> ImageData {
        ImageData::new(vec![0x89, b'P', b'N', b'G', byte]).with_mime_type("image/png")
    }

    fn model_info(epochs: usize) -> ModelInfo {
        ModelInfo {
            runtime: "linear".to_string(),
            architecture: Architecture::Simple,
            classes: vec![ModelClass { id: ClassId(1), name: "cats".to_string() }],
            epochs_trained: epochs,
            metrics: None,
            dataset: DatasetFingerprint("abc".to_string()),
            trained_at: Utc::now(),
            token: ModelToken("{}".to_string()),
        }
    }

    pub(crate) fn class_round_trip(store: &mut dyn Store) {
        let cats = store.add_class("  cats ").unwrap();
        let dogs = store.add_class("dogs").unwrap();
        assert_ne!(cats, dogs);

        let classes = store.get_classes().unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].id, cats);
        assert_eq!(classes[0].name, "cats");
        assert_eq!(classes[1].name, "dogs");

        assert!(store.update_class_name(dogs, "puppies").unwrap());
        assert!(!store.update_class_name(ClassId(999), "ghost").unwrap());
        assert_eq!(store.find_class("puppies").unwrap().id, dogs);
        assert_eq!(store.find_class(&cats.to_string()).unwrap().name, "cats");
        assert!(matches!(store.find_class("ghost"), Err(StorageError::NotFound(_))));

        assert!(matches!(store.add_class("   "), Err(StorageError::InvalidData(_))));
        assert!(matches!(store.update_class_name(cats, ""), Err(StorageError::InvalidData(_))));
    }

    pub(crate) fn images_and_cascade(store: &mut dyn Store) {
        let cats = store.add_class("cats").unwrap();
        let dogs = store.add_class("dogs").unwrap();

        let first = store.add_image(cats, &png(1)).unwrap();
        let second = store.add_image(cats, &png(2)).unwrap();
        let dog = store.add_image(dogs, &png(3)).unwrap();

        let images = store.get_images_by_class(cats).unwrap();
        assert_eq!(images.iter().map(|i| i.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(images[0].data, png(1));
        assert_eq!(images[0].class_id, cats);
        assert_eq!(store.count_images(dogs).unwrap(), 1);

        assert!(matches!(store.add_image(ClassId(999), &png(4)), Err(StorageError::NotFound(_))));

        assert!(store.delete_image(second).unwrap());
        assert!(!store.delete_image(second).unwrap());
        assert_eq!(store.count_images(cats).unwrap(), 1);

        assert!(store.delete_class(cats).unwrap());
        assert!(!store.delete_class(cats).unwrap());
        assert!(store.get_images_by_class(cats).unwrap().is_empty());
        assert!(!store.delete_image(first).unwrap());
        assert_eq!(store.get_images_by_class(dogs).unwrap()[0].id, dog);
    }

    pub(crate) fn model_info_and_settings(store: &mut dyn Store) {
        assert_eq!(store.get_model_info().unwrap(), None);
        store.save_model_info(&model_info(3)).unwrap();
        store.save_model_info(&model_info(5)).unwrap();
        assert_eq!(store.get_model_info().unwrap().unwrap().epochs_trained, 5);

        assert_eq!(store.get_setting("theme").unwrap(), None);
        store.set_setting("theme", &serde_json::json!("dark")).unwrap();
        store.set_setting("theme", &serde_json::json!({"mode": "light"})).unwrap();
        assert_eq!(
            store.get_setting("theme").unwrap(),
            Some(serde_json::json!({"mode": "light"}))
        );
    }

    pub(crate) fn clear_all(store: &mut dyn Store) {
        let cats = store.add_class("cats").unwrap();
        store.add_image(cats, &png(1)).unwrap();
        store.save_model_info(&model_info(1)).unwrap();
        store.set_setting("k", &serde_json::json!(1)).unwrap();

        store.clear_all().unwrap();

        assert!(store.get_classes().unwrap().is_empty());
        assert!(store.get_images_by_class(cats).unwrap().is_empty());
        assert_eq!(store.get_model_info().unwrap(), None);
        assert_eq!(store.get_setting("k").unwrap(), None);
    }
}
