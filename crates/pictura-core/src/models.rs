//! Saving and restoring the trained model through the store.

use crate::dataset::dataset_fingerprint;
use crate::error::CoreResult;
use crate::storage::Store;
use pictura_training::{MlRuntime, ModelInfo, TrainingController};
use tracing::info;

/// How the stored model relates to the stored images.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStatus {
    Missing,
    /// Trained on exactly the images currently stored.
    Current(ModelInfo),
    /// Images were added or removed since training.
    Stale(ModelInfo),
}

impl ModelStatus {
    pub fn check<S: Store + ?Sized>(store: &S) -> CoreResult<Self> {
        let Some(info) = store.get_model_info()? else {
            return Ok(Self::Missing);
        };
        if dataset_fingerprint(store)? == info.dataset {
            Ok(Self::Current(info))
        } else {
            Ok(Self::Stale(info))
        }
    }

    pub fn info(&self) -> Option<&ModelInfo> {
        match self {
            Self::Missing => None,
            Self::Current(info) | Self::Stale(info) => Some(info),
        }
    }
}

/// Serializes the controller's latest model and records it in the store.
pub async fn save_trained_model<R, S>(controller: &TrainingController<R>, store: &mut S) -> CoreResult<ModelInfo>
where
    R: MlRuntime,
    S: Store + ?Sized,
{
    let info = controller.save_model().await?;
    store.save_model_info(&info)?;
    info!(runtime = %info.runtime, epochs_trained = info.epochs_trained, "Model saved");
    Ok(info)
}

/// Loads the stored model into the controller. Returns `None` if nothing is stored.
pub async fn restore_model<R, S>(controller: &TrainingController<R>, store: &S) -> CoreResult<Option<ModelInfo>>
where
    R: MlRuntime,
    S: Store + ?Sized,
{
    let Some(info) = store.get_model_info()? else {
        return Ok(None);
    };
    controller.load_model(&info).await?;
    Ok(Some(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::build_request;
    use crate::runtime::LinearRuntime;
    use crate::runtime::linear::tests::flat_png;
    use crate::storage::{MemoryStore, SqliteStore};
    use pictura_training::{ChannelCallbacks, HyperParams, Outcome, TrainingEvent};
    use std::sync::Arc;

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let dark = store.add_class("dark").unwrap();
        let bright = store.add_class("bright").unwrap();
        for i in 0..3u8 {
            store.add_image(dark, &flat_png(20 + i * 5, 20, 20)).unwrap();
            store.add_image(bright, &flat_png(230 + i * 5, 230, 230)).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_train_save_restore_round_trip() {
        let mut store = seeded_store();
        let controller = TrainingController::new(Arc::new(LinearRuntime::new()));
        assert_eq!(ModelStatus::check(&store).unwrap(), ModelStatus::Missing);

        let params = HyperParams { epochs: 10, batch_size: 4, learning_rate: 0.05, validation_split: 0.0, ..HyperParams::default() };
        let request = build_request(&store, params).unwrap();
        let (callbacks, mut rx) = ChannelCallbacks::new();
        let outcome = controller.start(request, callbacks).unwrap().wait().await.unwrap();
        assert_eq!(outcome, Outcome::Completed);

        let mut epochs = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, TrainingEvent::EpochEnd(_)) {
                epochs += 1;
            }
        }
        assert_eq!(epochs, 10);

        let info = save_trained_model(&controller, &mut store).await.unwrap();
        assert_eq!(info.runtime, "linear");
        assert!(matches!(ModelStatus::check(&store).unwrap(), ModelStatus::Current(_)));

        let image = flat_png(25, 20, 20);
        let expected = controller.predict(&image).await.unwrap();
        assert_eq!(expected[0].class_name, "dark");

        let fresh = TrainingController::new(Arc::new(LinearRuntime::new()));
        let restored = restore_model(&fresh, &store).await.unwrap();
        assert_eq!(restored.as_ref(), Some(&info));
        assert_eq!(fresh.predict(&image).await.unwrap(), expected);

        let dark = store.find_class("dark").unwrap().id;
        store.add_image(dark, &flat_png(40, 20, 20)).unwrap();
        assert!(matches!(ModelStatus::check(&store).unwrap(), ModelStatus::Stale(_)));
    }

    #[tokio::test]
    async fn test_restore_without_model() {
        let store = SqliteStore::open_in_memory().unwrap();
        let controller = TrainingController::new(Arc::new(LinearRuntime::new()));

        assert_eq!(restore_model(&controller, &store).await.unwrap(), None);
        assert!(!controller.has_model().await);
    }
}
