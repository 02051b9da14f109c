use crate::request::{Architecture, ClassId, DatasetFingerprint};
use crate::runtime::{EpochMetrics, ModelToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelClass {
    pub id: ClassId,
    pub name: String,
}

/// Metadata describing a saved model, as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Runtime that produced `token`.
    pub runtime: String,
    pub architecture: Architecture,
    /// Classes in label order.
    pub classes: Vec<ModelClass>,
    pub epochs_trained: usize,
    #[serde(default)]
    pub metrics: Option<EpochMetrics>,
    pub dataset: DatasetFingerprint,
    pub trained_at: DateTime<Utc>,
    pub token: ModelToken,
}

/// One class probability returned by `TrainingController::predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_id: ClassId,
    pub class_name: String,
    pub probability: f32,
}
