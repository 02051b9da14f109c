//! Progress and outcome events delivered to whoever drives a session.
//!
//! Delivery guarantees, per session:
//! - at most one `on_epoch_end` per epoch, in epoch order;
//! - any number of `on_batch_end` calls, each before the `on_epoch_end` of its epoch;
//! - exactly one terminal call, after every progress event: `on_training_end` for
//!   `Completed`/`Stopped`, `on_training_error` for `Failed`.

use crate::error::RuntimeError;
use crate::runtime::EpochMetrics;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Emitted once per completed epoch. `epoch` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub epoch: usize,
    pub epochs: usize,
    pub loss: f64,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f64>,
}

impl ProgressEvent {
    #[must_use]
    pub fn from_metrics(epoch: usize, epochs: usize, metrics: EpochMetrics) -> Self {
        Self {
            epoch,
            epochs,
            loss: metrics.loss,
            accuracy: metrics.accuracy,
            val_loss: metrics.val_loss,
            val_accuracy: metrics.val_accuracy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEvent {
    pub epoch: usize,
    pub batch: usize,
    pub batches: usize,
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Stopped,
    Failed(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Stopped => f.write_str("stopped"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

pub trait TrainingCallbacks: Send + Sync {
    fn on_epoch_end(&self, _event: &ProgressEvent) {}

    fn on_batch_end(&self, _event: &BatchEvent) {}

    fn on_training_end(&self, _outcome: &Outcome) {}

    fn on_training_error(&self, _error: &RuntimeError) {}
}

impl TrainingCallbacks for () {}

impl<A: TrainingCallbacks, B: TrainingCallbacks> TrainingCallbacks for (A, B) {
    fn on_epoch_end(&self, event: &ProgressEvent) {
        self.0.on_epoch_end(event);
        self.1.on_epoch_end(event);
    }

    fn on_batch_end(&self, event: &BatchEvent) {
        self.0.on_batch_end(event);
        self.1.on_batch_end(event);
    }

    fn on_training_end(&self, outcome: &Outcome) {
        self.0.on_training_end(outcome);
        self.1.on_training_end(outcome);
    }

    fn on_training_error(&self, error: &RuntimeError) {
        self.0.on_training_error(error);
        self.1.on_training_error(error);
    }
}

/// Writes every event through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingCallbacks;

impl TrainingCallbacks for LoggingCallbacks {
    fn on_epoch_end(&self, event: &ProgressEvent) {
        info!(
            epoch = event.epoch + 1,
            epochs = event.epochs,
            loss = event.loss,
            accuracy = event.accuracy,
            val_loss = ?event.val_loss,
            val_accuracy = ?event.val_accuracy,
            "Epoch finished"
        );
    }

    fn on_batch_end(&self, event: &BatchEvent) {
        debug!(epoch = event.epoch + 1, batch = event.batch + 1, batches = event.batches, "Batch finished");
    }

    fn on_training_end(&self, outcome: &Outcome) {
        info!(outcome = %outcome, "Training finished");
    }

    fn on_training_error(&self, error: &RuntimeError) {
        error!(error = %error, "Training failed");
    }
}

/// Events as forwarded by `ChannelCallbacks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainingEvent {
    EpochEnd(ProgressEvent),
    BatchEnd(BatchEvent),
    TrainingEnd { outcome: Outcome },
    TrainingError { message: String },
}

impl TrainingEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TrainingEnd { .. } | Self::TrainingError { .. })
    }
}

/// Forwards events over an unbounded channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelCallbacks {
    tx: mpsc::UnboundedSender<TrainingEvent>,
}

impl ChannelCallbacks {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TrainingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: TrainingEvent) {
        let _ = self.tx.send(event);
    }
}

impl TrainingCallbacks for ChannelCallbacks {
    fn on_epoch_end(&self, event: &ProgressEvent) {
        self.send(TrainingEvent::EpochEnd(*event));
    }

    fn on_batch_end(&self, event: &BatchEvent) {
        self.send(TrainingEvent::BatchEnd(*event));
    }

    fn on_training_end(&self, outcome: &Outcome) {
        self.send(TrainingEvent::TrainingEnd { outcome: outcome.clone() });
    }

    fn on_training_error(&self, error: &RuntimeError) {
        self.send(TrainingEvent::TrainingError { message: error.message().to_string() });
    }
}
