//! Single-flight training session controller.
//!
//! The controller owns at most one active session. A session runs on a spawned
//! task that drives the runtime one epoch at a time and reports through
//! `TrainingCallbacks`. Pause and stop are cooperative: they are observed before
//! each epoch and while the loop is parked in the paused wait, never in the middle
//! of a runtime call.

use crate::error::{RuntimeError, TrainingError, TrainingResult};
use crate::model::{ModelClass, ModelInfo, Prediction};
use crate::progress::{BatchEvent, Outcome, ProgressEvent, TrainingCallbacks};
use crate::request::{Architecture, DatasetFingerprint, ImageData, TrainingRequest};
use crate::runtime::{EpochMetrics, MlRuntime};
use crate::session::{SessionId, SessionState};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Control {
    paused: bool,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct Slot {
    state: SessionState,
    session_id: Option<SessionId>,
    epoch: Option<usize>,
    control: Option<watch::Sender<Control>>,
}

impl Slot {
    fn transition(&mut self, to: SessionState) -> bool {
        if !self.state.can_transition_to(to) {
            error!(from = ?self.state, to = ?to, "Invalid state transition");
            return false;
        }
        debug!(session_id = ?self.session_id, from = ?self.state, to = ?to, "State transition");
        self.state = to;
        true
    }

    fn signal(&self, update: impl FnOnce(&mut Control)) {
        if let Some(control) = &self.control {
            control.send_modify(update);
        }
    }
}

struct TrainedModel<M> {
    model: M,
    architecture: Architecture,
    classes: Vec<ModelClass>,
    epochs_trained: usize,
    metrics: Option<EpochMetrics>,
    dataset: DatasetFingerprint,
    trained_at: DateTime<Utc>,
}

/// Handle to a started session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    join: JoinHandle<Outcome>,
}

impl SessionHandle {
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Wait for the session's terminal outcome.
    pub async fn wait(self) -> TrainingResult<Outcome> {
        self.join.await.map_err(|e| {
            TrainingError::Other(anyhow::anyhow!("training task ended abnormally: {e}"))
        })
    }
}

/// Drives training sessions against an `MlRuntime`.
pub struct TrainingController<R: MlRuntime> {
    runtime: Arc<R>,
    slot: Arc<Mutex<Slot>>,
    model: Arc<RwLock<Option<TrainedModel<R::Model>>>>,
}

impl<R: MlRuntime> Clone for TrainingController<R> {
    fn clone(&self) -> Self {
        Self {
            runtime: Arc::clone(&self.runtime),
            slot: Arc::clone(&self.slot),
            model: Arc::clone(&self.model),
        }
    }
}

impl<R: MlRuntime> fmt::Debug for TrainingController<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingController")
            .field("runtime", &self.runtime.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<R: MlRuntime> TrainingController<R> {
    #[must_use]
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            slot: Arc::new(Mutex::new(Slot::default())),
            model: Arc::new(RwLock::new(None)),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state. `Idle` before the first session, otherwise the
    /// active state or the last terminal state.
    pub fn state(&self) -> SessionState {
        self.lock_slot().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Index of the epoch most recently started by the current or last session.
    pub fn current_epoch(&self) -> Option<usize> {
        self.lock_slot().epoch
    }

    /// Start a session.
    ///
    /// Returns once the request is validated and the session is registered; the
    /// epochs run on a task spawned onto the current Tokio runtime.
    ///
    /// # Errors
    /// * `TrainingError::SessionAlreadyActive` - a session is Running or Paused
    /// * `TrainingError::Validation` - the request is not trainable
    pub fn start<C>(&self, request: TrainingRequest, callbacks: C) -> TrainingResult<SessionHandle>
    where
        C: TrainingCallbacks + 'static,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            TrainingError::Other(anyhow::anyhow!("no async runtime to train on: {e}"))
        })?;

        let session_id = SessionId::new();
        let (control_tx, control_rx) = watch::channel(Control::default());
        {
            let mut slot = self.lock_slot();
            if slot.state.is_active() {
                warn!(
                    active_session = ?slot.session_id,
                    state = %slot.state,
                    "Rejected start: a session is already active"
                );
                return Err(TrainingError::SessionAlreadyActive);
            }
            request.validate()?;

            slot.session_id = Some(session_id.clone());
            slot.transition(SessionState::Running);
            slot.epoch = None;
            slot.control = Some(control_tx);
        }

        let params = request.hyperparams();
        info!(
            session_id = %session_id,
            runtime = self.runtime.id(),
            architecture = %params.architecture,
            classes = request.num_classes(),
            images = request.total_images(),
            epochs = params.epochs,
            batch_size = params.batch_size,
            learning_rate = params.learning_rate,
            "Training session started"
        );

        let run = SessionRun {
            id: session_id.clone(),
            runtime: Arc::clone(&self.runtime),
            slot: Arc::clone(&self.slot),
            model: Arc::clone(&self.model),
            control: control_rx,
            callbacks,
        };
        let join = handle.spawn(run.execute(request));

        Ok(SessionHandle { id: session_id, join })
    }

    /// Stop scheduling epochs until `resume`. No-op unless Running.
    pub fn pause(&self) {
        let mut slot = self.lock_slot();
        if slot.state != SessionState::Running {
            return;
        }
        slot.transition(SessionState::Paused);
        slot.signal(|c| c.paused = true);
        info!(session_id = ?slot.session_id, "Training paused");
    }

    /// No-op unless Paused.
    pub fn resume(&self) {
        let mut slot = self.lock_slot();
        if slot.state != SessionState::Paused {
            return;
        }
        slot.transition(SessionState::Running);
        slot.signal(|c| c.paused = false);
        info!(session_id = ?slot.session_id, "Training resumed");
    }

    /// Request cancellation. The epoch in flight, if any, still finishes.
    pub fn stop(&self) {
        let slot = self.lock_slot();
        if !slot.state.is_active() {
            return;
        }
        slot.signal(|c| c.cancelled = true);
        info!(session_id = ?slot.session_id, epoch = ?slot.epoch, "Training stop requested");
    }

    pub async fn has_model(&self) -> bool {
        self.model.read().await.is_some()
    }

    /// Forget the trained or loaded model.
    pub async fn discard_model(&self) {
        self.model.write().await.take();
    }

    /// Classify one image with the latest trained or loaded model.
    ///
    /// Predictions are sorted by descending probability.
    pub async fn predict(&self, image: &ImageData) -> TrainingResult<Vec<Prediction>> {
        let guard = self.model.read().await;
        let trained = guard.as_ref().ok_or(TrainingError::NoModel)?;

        let scores = self.runtime.predict(&trained.model, image).await?;
        let mut predictions = scores
            .into_iter()
            .map(|score| {
                trained
                    .classes
                    .get(score.index)
                    .map(|class| Prediction {
                        class_id: class.id,
                        class_name: class.name.clone(),
                        probability: score.probability,
                    })
                    .ok_or_else(|| {
                        RuntimeError::new(format!(
                            "runtime returned unknown class index {}",
                            score.index
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        predictions.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        Ok(predictions)
    }

    /// Serialize the latest model through the runtime.
    pub async fn save_model(&self) -> TrainingResult<ModelInfo> {
        let guard = self.model.read().await;
        let trained = guard.as_ref().ok_or(TrainingError::NoModel)?;
        let token = self.runtime.save(&trained.model).await?;

        Ok(ModelInfo {
            runtime: self.runtime.id().to_string(),
            architecture: trained.architecture,
            classes: trained.classes.clone(),
            epochs_trained: trained.epochs_trained,
            metrics: trained.metrics,
            dataset: trained.dataset.clone(),
            trained_at: trained.trained_at,
            token,
        })
    }

    /// Restore a model saved by `save_model`.
    pub async fn load_model(&self, info: &ModelInfo) -> TrainingResult<()> {
        if info.runtime != self.runtime.id() {
            return Err(TrainingError::Validation(format!(
                "model was saved by runtime '{}', this controller uses '{}'",
                info.runtime,
                self.runtime.id()
            )));
        }

        let model = self.runtime.load(&info.token).await?;
        *self.model.write().await = Some(TrainedModel {
            model,
            architecture: info.architecture,
            classes: info.classes.clone(),
            epochs_trained: info.epochs_trained,
            metrics: info.metrics,
            dataset: info.dataset.clone(),
            trained_at: info.trained_at,
        });
        debug!(classes = info.classes.len(), "Loaded saved model");
        Ok(())
    }
}

/// Owns a session's input tensors; dropping it hands them back to the runtime.
struct TensorLease<R: MlRuntime> {
    runtime: Arc<R>,
    tensors: Option<R::Tensors>,
}

impl<R: MlRuntime> TensorLease<R> {
    fn new(runtime: Arc<R>, tensors: R::Tensors) -> Self {
        Self { runtime, tensors: Some(tensors) }
    }

    fn tensors(&self) -> Option<&R::Tensors> {
        self.tensors.as_ref()
    }
}

impl<R: MlRuntime> Drop for TensorLease<R> {
    fn drop(&mut self) {
        if let Some(tensors) = self.tensors.take() {
            self.runtime.release(tensors);
            debug!("Released input tensors");
        }
    }
}

/// Moves the slot to a terminal state; marks it Failed if the task unwinds first.
struct SlotGuard {
    slot: Arc<Mutex<Slot>>,
    finished: bool,
}

impl SlotGuard {
    fn finish(&mut self, state: SessionState) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.transition(state);
        slot.control = None;
        self.finished = true;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.finished {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            error!(session_id = ?slot.session_id, "Training session aborted");
            slot.transition(SessionState::Failed);
            slot.control = None;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EpochGate {
    Run,
    Wait,
    Cancelled,
}

/// Claim `epoch` under the slot lock. `pause` and `stop` signal under the same
/// lock, so a flag set after the paused wait returned is still seen here.
fn claim_epoch(slot: &Mutex<Slot>, control: &watch::Receiver<Control>, epoch: usize) -> EpochGate {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let control = *control.borrow();
    if control.cancelled {
        EpochGate::Cancelled
    } else if control.paused {
        EpochGate::Wait
    } else {
        slot.epoch = Some(epoch);
        EpochGate::Run
    }
}

struct Finished<M> {
    model: M,
    epochs_trained: usize,
    metrics: Option<EpochMetrics>,
    cancelled: bool,
}

struct SessionRun<R: MlRuntime, C> {
    id: SessionId,
    runtime: Arc<R>,
    slot: Arc<Mutex<Slot>>,
    model: Arc<RwLock<Option<TrainedModel<R::Model>>>>,
    control: watch::Receiver<Control>,
    callbacks: C,
}

impl<R: MlRuntime, C: TrainingCallbacks + 'static> SessionRun<R, C> {
    async fn execute(mut self, request: TrainingRequest) -> Outcome {
        let started = Instant::now();
        let mut guard = SlotGuard { slot: Arc::clone(&self.slot), finished: false };

        let outcome = match self.drive(&request).await {
            Ok(finished) => {
                let (outcome, state) = if finished.cancelled {
                    (Outcome::Stopped, SessionState::Stopped)
                } else {
                    (Outcome::Completed, SessionState::Completed)
                };
                if finished.epochs_trained > 0 {
                    self.keep_model(&request, finished).await;
                }
                guard.finish(state);
                self.callbacks.on_training_end(&outcome);
                outcome
            }
            Err(err) => {
                error!(session_id = %self.id, error = %err, "Training session failed");
                guard.finish(SessionState::Failed);
                self.callbacks.on_training_error(&err);
                Outcome::Failed(err.message().to_string())
            }
        };

        info!(
            session_id = %self.id,
            outcome = %outcome,
            duration_ms = started.elapsed().as_millis(),
            "Training session finished"
        );
        outcome
    }

    async fn drive(&mut self, request: &TrainingRequest) -> Result<Finished<R::Model>, RuntimeError> {
        let params = request.hyperparams();
        let epochs = params.epochs as usize;
        let batch_size = params.batch_size as usize;

        let mut model = self.runtime.build_model(params.architecture, request.num_classes()).await?;
        self.runtime.compile(&mut model, params.learning_rate).await?;
        let lease = TensorLease::new(Arc::clone(&self.runtime), self.runtime.allocate(request).await?);
        debug!(session_id = %self.id, "Allocated input tensors");
        let tensors = lease
            .tensors()
            .ok_or_else(|| RuntimeError::new("input tensors were released before training"))?;

        let mut epochs_trained = 0;
        let mut metrics = None;
        'epochs: for epoch in 0..epochs {
            loop {
                if !self.wait_until_runnable().await {
                    break 'epochs;
                }
                match claim_epoch(&self.slot, &self.control, epoch) {
                    EpochGate::Run => break,
                    EpochGate::Wait => {}
                    EpochGate::Cancelled => break 'epochs,
                }
            }

            let callbacks = &self.callbacks;
            let on_batch = move |batch: usize, batches: usize| {
                callbacks.on_batch_end(&BatchEvent { epoch, batch, batches });
            };
            let epoch_metrics = self
                .runtime
                .fit_one_epoch(&mut model, tensors, batch_size, &on_batch)
                .await?;

            epochs_trained = epoch + 1;
            metrics = Some(epoch_metrics);
            self.callbacks.on_epoch_end(&ProgressEvent::from_metrics(epoch, epochs, epoch_metrics));
        }

        let cancelled = self.control.borrow().cancelled;
        drop(lease);

        Ok(Finished { model, epochs_trained, metrics, cancelled })
    }

    /// Park while paused. Returns `false` if the session was cancelled.
    async fn wait_until_runnable(&mut self) -> bool {
        if self.control.borrow().paused {
            debug!(session_id = %self.id, "Session paused, waiting for resume");
        }
        match self.control.wait_for(|c| c.cancelled || !c.paused).await {
            Ok(control) => !control.cancelled,
            Err(_) => false,
        }
    }

    async fn keep_model(&self, request: &TrainingRequest, finished: Finished<R::Model>) {
        let classes = request
            .classes()
            .iter()
            .map(|c| ModelClass { id: c.id, name: c.name.clone() })
            .collect();

        *self.model.write().await = Some(TrainedModel {
            model: finished.model,
            architecture: request.hyperparams().architecture,
            classes,
            epochs_trained: finished.epochs_trained,
            metrics: finished.metrics,
            dataset: request.fingerprint(),
            trained_at: Utc::now(),
        });
    }
}
