//! The contract between the session controller and an ML runtime.
//!
//! A runtime owns all numeric work: building and compiling a model, turning a
//! request's images into input/label tensors, fitting one epoch at a time and
//! predicting. The controller treats every call as atomic.

use crate::error::RuntimeResult;
use crate::request::{Architecture, ImageData, TrainingRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metrics reported by a runtime after one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f64>,
}

/// Probability the model assigns to the class at `index` (request label order).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub index: usize,
    pub probability: f32,
}

/// Opaque serialized form of a model, produced by `save` and accepted by `load`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelToken(pub String);

/// Called by `fit_one_epoch` with `(batch_index, batch_count)` after each batch.
pub type BatchCallback<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

#[async_trait]
pub trait MlRuntime: Send + Sync + 'static {
    type Model: Send + Sync + 'static;
    type Tensors: Send + Sync + 'static;

    fn id(&self) -> &'static str;

    async fn build_model(
        &self,
        architecture: Architecture,
        num_classes: usize,
    ) -> RuntimeResult<Self::Model>;

    async fn compile(&self, model: &mut Self::Model, learning_rate: f64) -> RuntimeResult<()>;

    /// Build the input/label tensors for a request.
    async fn allocate(&self, request: &TrainingRequest) -> RuntimeResult<Self::Tensors>;

    /// Free tensors produced by `allocate`.
    fn release(&self, tensors: Self::Tensors);

    /// Run one full pass over the tensors. The runtime must not keep a reference
    /// to `tensors` after returning.
    async fn fit_one_epoch(
        &self,
        model: &mut Self::Model,
        tensors: &Self::Tensors,
        batch_size: usize,
        on_batch: BatchCallback<'_>,
    ) -> RuntimeResult<EpochMetrics>;

    /// Class probabilities for one image, sorted by descending probability.
    async fn predict(&self, model: &Self::Model, image: &ImageData)
    -> RuntimeResult<Vec<ClassScore>>;

    async fn save(&self, model: &Self::Model) -> RuntimeResult<ModelToken>;

    async fn load(&self, token: &ModelToken) -> RuntimeResult<Self::Model>;
}
