use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fewest classes a request may carry.
pub const MIN_CLASSES: usize = 2;
/// Fewest images, summed over all classes, a request may carry.
pub const MIN_TOTAL_IMAGES: usize = 4;

/// Identifier of a class record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub i64);

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub i64);

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Encoded image bytes as captured or uploaded (PNG, JPEG, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ImageData {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, mime_type: None }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Small classifier trained from raw pixels.
    #[default]
    Simple,
    /// Trainable head on top of a frozen feature extractor.
    Transfer,
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => f.write_str("simple"),
            Self::Transfer => f.write_str("transfer"),
        }
    }
}

impl std::str::FromStr for Architecture {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "transfer" => Ok(Self::Transfer),
            other => Err(TrainingError::Validation(format!(
                "unknown architecture '{other}' (expected simple or transfer)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    pub learning_rate: f64,
    pub batch_size: u32,
    pub epochs: u32,
    pub architecture: Architecture,
    /// Fraction of each class held out for validation metrics, rounded down.
    #[serde(default = "default_validation_split")]
    pub validation_split: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_validation_split() -> f32 {
    0.15
}

fn default_seed() -> u64 {
    42
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 16,
            epochs: 50,
            architecture: Architecture::Simple,
            validation_split: default_validation_split(),
            seed: default_seed(),
        }
    }
}

impl HyperParams {
    pub fn validate(&self) -> TrainingResult<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::Validation("learning_rate must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::Validation("batch_size must be >= 1".to_string()));
        }
        if self.epochs == 0 {
            return Err(TrainingError::Validation("epochs must be >= 1".to_string()));
        }
        if !(0.0..0.5).contains(&self.validation_split) {
            return Err(TrainingError::Validation(
                "validation_split must be in [0, 0.5)".to_string(),
            ));
        }
        Ok(())
    }
}

/// One labeled class of a training request, in label order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingClass {
    pub id: ClassId,
    pub name: String,
    pub images: Vec<ImageData>,
}

/// Stable content hash of the examples a model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetFingerprint(pub String);

/// Everything a session needs to train: the labeled images and hyperparameters.
///
/// A request is immutable once built and is moved into the controller when a
/// session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    classes: Vec<TrainingClass>,
    hyperparams: HyperParams,
}

impl TrainingRequest {
    #[must_use]
    pub fn new(classes: Vec<TrainingClass>, hyperparams: HyperParams) -> Self {
        Self { classes, hyperparams }
    }

    #[must_use]
    pub fn classes(&self) -> &[TrainingClass] {
        &self.classes
    }

    #[must_use]
    pub fn hyperparams(&self) -> &HyperParams {
        &self.hyperparams
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn total_images(&self) -> usize {
        self.classes.iter().map(|c| c.images.len()).sum()
    }

    /// Label index of a class within this request.
    #[must_use]
    pub fn label_of(&self, class_id: ClassId) -> Option<usize> {
        self.classes.iter().position(|c| c.id == class_id)
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.classes.len() < MIN_CLASSES {
            return Err(TrainingError::Validation(format!(
                "at least {MIN_CLASSES} classes are required, got {}",
                self.classes.len()
            )));
        }
        let total = self.total_images();
        if total < MIN_TOTAL_IMAGES {
            return Err(TrainingError::Validation(format!(
                "at least {MIN_TOTAL_IMAGES} images are required, got {total}"
            )));
        }
        for class in &self.classes {
            if class.images.is_empty() {
                return Err(TrainingError::Validation(format!(
                    "class '{}' has no images",
                    class.name
                )));
            }
        }
        let mut ids: Vec<ClassId> = self.classes.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.classes.len() {
            return Err(TrainingError::Validation("class ids must be unique".to_string()));
        }
        self.hyperparams.validate()
    }

    #[must_use]
    pub fn fingerprint(&self) -> DatasetFingerprint {
        let mut hasher = Sha256::new();
        for class in &self.classes {
            hasher.update(class.id.0.to_le_bytes());
            for image in &class.images {
                hasher.update((image.bytes.len() as u64).to_le_bytes());
                hasher.update(&image.bytes);
            }
            hasher.update(b"\n");
        }
        DatasetFingerprint(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: i64, images: usize) -> TrainingClass {
        TrainingClass {
            id: ClassId(id),
            name: format!("class-{id}"),
            images: (0..images).map(|i| ImageData::new(vec![id as u8, i as u8])).collect(),
        }
    }

    #[test]
    fn test_validate_requires_two_classes() {
        let request = TrainingRequest::new(vec![class(1, 6)], HyperParams::default());
        assert!(matches!(request.validate(), Err(TrainingError::Validation(_))));
    }

    #[test]
    fn test_validate_requires_four_images() {
        let request = TrainingRequest::new(vec![class(1, 2), class(2, 1)], HyperParams::default());
        assert!(matches!(request.validate(), Err(TrainingError::Validation(_))));

        let request = TrainingRequest::new(vec![class(1, 2), class(2, 2)], HyperParams::default());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_class() {
        let request =
            TrainingRequest::new(vec![class(1, 4), class(2, 0)], HyperParams::default());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_hyperparams_validate() {
        let mut params = HyperParams::default();
        assert!(params.validate().is_ok());

        params.learning_rate = 0.0;
        assert!(params.validate().is_err());

        params = HyperParams { batch_size: 0, ..HyperParams::default() };
        assert!(params.validate().is_err());

        params = HyperParams { epochs: 0, ..HyperParams::default() };
        assert!(params.validate().is_err());

        params = HyperParams { validation_split: 0.5, ..HyperParams::default() };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = TrainingRequest::new(vec![class(1, 2), class(2, 2)], HyperParams::default());
        let b = TrainingRequest::new(vec![class(1, 2), class(2, 3)], HyperParams::default());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_architecture_parse() {
        assert_eq!("Transfer".parse::<Architecture>().unwrap(), Architecture::Transfer);
        assert!("resnet".parse::<Architecture>().is_err());
    }
}
