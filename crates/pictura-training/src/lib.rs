//! Pictura Training
//!
//! Runtime-agnostic training session primitives for:
//! - Describing a labeled image set and its hyperparameters (`TrainingRequest`)
//! - Talking to an ML runtime (`MlRuntime`)
//! - Reporting progress and outcomes (`TrainingCallbacks`)
//! - Running one session at a time with pause, resume and stop (`TrainingController`)

pub mod controller;
pub mod error;
pub mod model;
pub mod progress;
pub mod request;
pub mod runtime;
pub mod session;

pub use controller::{SessionHandle, TrainingController};
pub use error::{RuntimeError, RuntimeResult, TrainingError, TrainingResult};
pub use model::{ModelClass, ModelInfo, Prediction};
pub use progress::{
    BatchEvent, ChannelCallbacks, LoggingCallbacks, Outcome, ProgressEvent, TrainingCallbacks,
    TrainingEvent,
};
pub use request::{
    Architecture, ClassId, DatasetFingerprint, HyperParams, ImageData, ImageId, TrainingClass,
    TrainingRequest, MIN_CLASSES, MIN_TOTAL_IMAGES,
};
pub use runtime::{BatchCallback, ClassScore, EpochMetrics, MlRuntime, ModelToken};
pub use session::{SessionId, SessionState};
