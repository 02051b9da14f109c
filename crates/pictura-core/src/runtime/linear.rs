//! Softmax-regression runtime over fixed image features.
//!
//! Models are a single dense layer trained with Adam on cross-entropy loss.
//! Everything runs on the CPU; `fit_one_epoch` yields to the scheduler between
//! batches so control signals and progress consumers stay responsive.

use crate::runtime::features;
use async_trait::async_trait;
use pictura_training::{
    Architecture, BatchCallback, ClassScore, EpochMetrics, ImageData, MlRuntime, ModelToken,
    RuntimeError, RuntimeResult, TrainingRequest,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;
const INIT_SCALE: f32 = 0.01;
const MIN_PROBABILITY: f32 = 1e-7;

#[derive(Debug, Clone)]
struct Adam {
    learning_rate: f32,
    step: i32,
    m_w: Vec<f32>,
    v_w: Vec<f32>,
    m_b: Vec<f32>,
    v_b: Vec<f32>,
}

impl Adam {
    fn new(learning_rate: f32, weights: usize, classes: usize) -> Self {
        Self {
            learning_rate,
            step: 0,
            m_w: vec![0.0; weights],
            v_w: vec![0.0; weights],
            m_b: vec![0.0; classes],
            v_b: vec![0.0; classes],
        }
    }

    fn apply(&mut self, weights: &mut [f32], bias: &mut [f32], grad_w: &[f32], grad_b: &[f32]) {
        self.step += 1;
        let c1 = 1.0 - BETA1.powi(self.step);
        let c2 = 1.0 - BETA2.powi(self.step);
        let lr = self.learning_rate;
        adam_update(weights, grad_w, &mut self.m_w, &mut self.v_w, lr, c1, c2);
        adam_update(bias, grad_b, &mut self.m_b, &mut self.v_b, lr, c1, c2);
    }
}

fn adam_update(params: &mut [f32], grads: &[f32], m: &mut [f32], v: &mut [f32], lr: f32, c1: f32, c2: f32) {
    for (((p, g), m), v) in params.iter_mut().zip(grads).zip(m.iter_mut()).zip(v.iter_mut()) {
        *m = BETA1 * *m + (1.0 - BETA1) * g;
        *v = BETA2 * *v + (1.0 - BETA2) * g * g;
        *p -= lr * (*m / c1) / ((*v / c2).sqrt() + EPSILON);
    }
}

fn softmax(logits: &mut [f32]) {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for l in logits.iter_mut() {
        *l = (*l - max).exp();
        sum += *l;
    }
    logits.iter_mut().for_each(|l| *l /= sum);
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i)
}

fn cross_entropy(probabilities: &[f32], label: usize) -> f64 {
    -f64::from(probabilities[label].max(MIN_PROBABILITY).ln())
}

/// Dense layer mapping image features to class logits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    architecture: Architecture,
    num_classes: usize,
    num_features: usize,
    /// Row-major, one row per class.
    weights: Vec<f32>,
    bias: Vec<f32>,
    epochs_seen: u64,
    #[serde(skip)]
    optimizer: Option<Adam>,
}

impl LinearModel {
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn epochs_seen(&self) -> u64 {
        self.epochs_seen
    }

    fn probabilities(&self, features: &[f32]) -> Vec<f32> {
        let mut logits: Vec<f32> = self
            .weights
            .chunks(self.num_features)
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();
        softmax(&mut logits);
        logits
    }

    fn check_shape(&self) -> RuntimeResult<()> {
        let expected = features::feature_len(self.architecture);
        if self.num_classes < 2
            || self.num_features != expected
            || self.weights.len() != self.num_classes * self.num_features
            || self.bias.len() != self.num_classes
        {
            return Err(RuntimeError::new(format!(
                "model parameters do not match a {} model with {} classes",
                self.architecture, self.num_classes
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Sample {
    features: Vec<f32>,
    label: usize,
}

/// Decoded and featurized training data for one session.
#[derive(Debug)]
pub struct LinearTensors {
    num_features: usize,
    train: Vec<Sample>,
    validation: Vec<Sample>,
    seed: u64,
}

impl LinearTensors {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn validation_len(&self) -> usize {
        self.validation.len()
    }
}

/// CPU runtime used by the `pic` binary.
#[derive(Debug, Clone)]
pub struct LinearRuntime {
    seed: u64,
}

impl Default for LinearRuntime {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl LinearRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed for weight initialization.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn featurize(architecture: Architecture, image: &ImageData) -> RuntimeResult<Vec<f32>> {
        let decoded = features::decode(&image.bytes)
            .map_err(|e| RuntimeError::new(format!("failed to decode image: {e}")))?;
        Ok(features::extract(architecture, &decoded))
    }

    fn evaluate(model: &LinearModel, samples: &[Sample]) -> (f64, f64) {
        let mut loss = 0.0;
        let mut correct = 0usize;
        for sample in samples {
            let probabilities = model.probabilities(&sample.features);
            loss += cross_entropy(&probabilities, sample.label);
            if argmax(&probabilities) == sample.label {
                correct += 1;
            }
        }
        let n = samples.len() as f64;
        (loss / n, correct as f64 / n)
    }
}

#[async_trait]
impl MlRuntime for LinearRuntime {
    type Model = LinearModel;
    type Tensors = LinearTensors;

    fn id(&self) -> &'static str {
        "linear"
    }

    async fn build_model(&self, architecture: Architecture, num_classes: usize) -> RuntimeResult<LinearModel> {
        if num_classes < 2 {
            return Err(RuntimeError::new(format!("cannot build a classifier for {num_classes} class(es)")));
        }
        let num_features = features::feature_len(architecture);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let weights = (0..num_classes * num_features)
            .map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE))
            .collect();

        debug!(%architecture, num_classes, num_features, "Built linear model");
        Ok(LinearModel {
            architecture,
            num_classes,
            num_features,
            weights,
            bias: vec![0.0; num_classes],
            epochs_seen: 0,
            optimizer: None,
        })
    }

    async fn compile(&self, model: &mut LinearModel, learning_rate: f64) -> RuntimeResult<()> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(RuntimeError::new(format!("invalid learning rate {learning_rate}")));
        }
        model.optimizer =
            Some(Adam::new(learning_rate as f32, model.weights.len(), model.num_classes));
        Ok(())
    }

    async fn allocate(&self, request: &TrainingRequest) -> RuntimeResult<LinearTensors> {
        let params = request.hyperparams();
        let architecture = params.architecture;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut samples = Vec::with_capacity(request.total_images());
        let mut validation = Vec::new();
        for (label, class) in request.classes().iter().enumerate() {
            let mut class_samples = Vec::with_capacity(class.images.len());
            for (index, image) in class.images.iter().enumerate() {
                let decoded = features::decode(&image.bytes).map_err(|e| {
                    RuntimeError::new(format!(
                        "failed to decode image {} of class '{}': {e}",
                        index + 1,
                        class.name
                    ))
                })?;
                class_samples.push(Sample { features: features::extract(architecture, &decoded), label });
            }
            // split < 0.5 leaves every class at least one training sample
            class_samples.shuffle(&mut rng);
            let held_out = (class_samples.len() as f32 * params.validation_split).floor() as usize;
            validation.extend(class_samples.split_off(class_samples.len() - held_out));
            samples.extend(class_samples);
        }
        samples.shuffle(&mut rng);

        debug!(train = samples.len(), validation = validation.len(), "Allocated linear tensors");
        Ok(LinearTensors {
            num_features: features::feature_len(architecture),
            train: samples,
            validation,
            seed: params.seed,
        })
    }

    fn release(&self, tensors: LinearTensors) {
        debug!(
            train = tensors.train.len(),
            validation = tensors.validation.len(),
            "Dropping linear tensors"
        );
    }

    async fn fit_one_epoch(
        &self,
        model: &mut LinearModel,
        tensors: &LinearTensors,
        batch_size: usize,
        on_batch: BatchCallback<'_>,
    ) -> RuntimeResult<EpochMetrics> {
        if model.num_features != tensors.num_features {
            return Err(RuntimeError::new("input features do not match the model architecture"));
        }
        if tensors.train.is_empty() {
            return Err(RuntimeError::new("no training samples"));
        }
        let mut optimizer =
            model.optimizer.take().ok_or_else(|| RuntimeError::new("model is not compiled"))?;

        let nf = model.num_features;
        let mut order: Vec<usize> = (0..tensors.train.len()).collect();
        let mut rng = StdRng::seed_from_u64(tensors.seed.wrapping_add(model.epochs_seen + 1));
        order.shuffle(&mut rng);

        let batch_size = batch_size.max(1);
        let batches = order.len().div_ceil(batch_size);
        let mut grad_w = vec![0.0f32; model.weights.len()];
        let mut grad_b = vec![0.0f32; model.num_classes];
        let mut loss_sum = 0.0;
        let mut correct = 0usize;

        for (batch, chunk) in order.chunks(batch_size).enumerate() {
            grad_w.fill(0.0);
            grad_b.fill(0.0);
            let scale = 1.0 / chunk.len() as f32;

            for &idx in chunk {
                let sample = &tensors.train[idx];
                let probabilities = model.probabilities(&sample.features);
                loss_sum += cross_entropy(&probabilities, sample.label);
                if argmax(&probabilities) == sample.label {
                    correct += 1;
                }

                for (class, p) in probabilities.iter().enumerate() {
                    let target = if class == sample.label { 1.0 } else { 0.0 };
                    let delta = (p - target) * scale;
                    grad_b[class] += delta;
                    for (g, x) in grad_w[class * nf..(class + 1) * nf].iter_mut().zip(&sample.features) {
                        *g += delta * x;
                    }
                }
            }

            optimizer.apply(&mut model.weights, &mut model.bias, &grad_w, &grad_b);
            on_batch(batch, batches);
            tokio::task::yield_now().await;
        }

        model.optimizer = Some(optimizer);
        model.epochs_seen += 1;

        let (val_loss, val_accuracy) = if tensors.validation.is_empty() {
            (None, None)
        } else {
            let (loss, accuracy) = Self::evaluate(model, &tensors.validation);
            (Some(loss), Some(accuracy))
        };

        let n = order.len() as f64;
        Ok(EpochMetrics { loss: loss_sum / n, accuracy: correct as f64 / n, val_loss, val_accuracy })
    }

    async fn predict(&self, model: &LinearModel, image: &ImageData) -> RuntimeResult<Vec<ClassScore>> {
        let features = Self::featurize(model.architecture, image)?;
        let mut scores: Vec<ClassScore> = model
            .probabilities(&features)
            .into_iter()
            .enumerate()
            .map(|(index, probability)| ClassScore { index, probability })
            .collect();
        scores.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        Ok(scores)
    }

    async fn save(&self, model: &LinearModel) -> RuntimeResult<ModelToken> {
        serde_json::to_string(model)
            .map(ModelToken)
            .map_err(|e| RuntimeError::new(format!("failed to serialize model: {e}")))
    }

    async fn load(&self, token: &ModelToken) -> RuntimeResult<LinearModel> {
        let model: LinearModel = serde_json::from_str(&token.0)
            .map_err(|e| RuntimeError::new(format!("failed to read saved model: {e}")))?;
        model.check_shape()?;
        Ok(model)
    }
}
