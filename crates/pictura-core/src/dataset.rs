//! Builds training requests from stored classes and images.

use crate::error::CoreResult;
use crate::storage::Store;
use pictura_training::{DatasetFingerprint, HyperParams, TrainingClass, TrainingRequest};
use tracing::debug;

/// Collects every stored class, in creation order, with its images.
///
/// The request is not validated here; `TrainingController::start` does that.
pub fn build_request<S: Store + ?Sized>(store: &S, hyperparams: HyperParams) -> CoreResult<TrainingRequest> {
    let classes = store
        .get_classes()?
        .into_iter()
        .map(|class| {
            let images = store.get_images_by_class(class.id)?.into_iter().map(|r| r.data).collect();
            Ok(TrainingClass { id: class.id, name: class.name, images })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    let request = TrainingRequest::new(classes, hyperparams);
    debug!(classes = request.num_classes(), images = request.total_images(), "Assembled training request");
    Ok(request)
}

/// Fingerprint of the stored images, comparable with `ModelInfo::dataset`.
pub fn dataset_fingerprint<S: Store + ?Sized>(store: &S) -> CoreResult<DatasetFingerprint> {
    Ok(build_request(store, HyperParams::default())?.fingerprint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pictura_training::{ImageData, TrainingError};

    #[test]
    fn test_build_request_preserves_order() {
        let mut store = MemoryStore::new();
        let cats = store.add_class("cats").unwrap();
        let dogs = store.add_class("dogs").unwrap();
        store.add_image(dogs, &ImageData::new(vec![3])).unwrap();
        store.add_image(cats, &ImageData::new(vec![1])).unwrap();
        store.add_image(cats, &ImageData::new(vec![2])).unwrap();

        let request = build_request(&store, HyperParams::default()).unwrap();
        assert_eq!(request.num_classes(), 2);
        assert_eq!(request.classes()[0].name, "cats");
        assert_eq!(request.classes()[0].images[1].bytes, vec![2]);
        assert_eq!(request.label_of(dogs), Some(1));
        assert_eq!(request.total_images(), 3);
        assert!(matches!(request.validate(), Err(TrainingError::Validation(_))));
    }

    #[test]
    fn test_fingerprint_tracks_images() {
        let mut store = MemoryStore::new();
        let cats = store.add_class("cats").unwrap();
        store.add_image(cats, &ImageData::new(vec![1])).unwrap();

        let before = dataset_fingerprint(&store).unwrap();
        store.update_class_name(cats, "kittens").unwrap();
        assert_eq!(dataset_fingerprint(&store).unwrap(), before);

        store.add_image(cats, &ImageData::new(vec![2])).unwrap();
        assert_ne!(dataset_fingerprint(&store).unwrap(), before);
    }
}
