//! Leaf species classification.
//!
//! Raw upload bytes are decoded, stretched to the canonical square input,
//! run through the loaded model once and mapped to a [`Label`] by taking the
//! top-scoring output.

pub mod labels;
pub mod model;
pub mod preprocess;

pub use labels::{Label, LabelSet};
pub use model::{argmax, ImageModel, OnnxModel};

use crate::config::ClassifierSettings;
use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("could not read the image: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model produced no scores")]
    EmptyOutput,

    #[error("model produced {scores} scores for {labels} class names")]
    OutputMismatch { scores: usize, labels: usize },

    #[error("failed to load model artifact: {0}")]
    Artifact(String),

    #[error("failed to load class names: {0}")]
    Labels(String),

    #[error("classification task failed: {0}")]
    Join(String),
}

impl ClassifierError {
    /// Whether the caller sent something we cannot classify, as opposed to
    /// the service failing on a valid image.
    pub fn is_bad_input(&self) -> bool {
        matches!(self, ClassifierError::Decode(_))
    }

    /// Short tag for metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierError::Decode(_) => "decode",
            ClassifierError::Inference(_) => "inference",
            ClassifierError::EmptyOutput => "empty_output",
            ClassifierError::OutputMismatch { .. } => "output_mismatch",
            ClassifierError::Artifact(_) => "artifact",
            ClassifierError::Labels(_) => "labels",
            ClassifierError::Join(_) => "join",
        }
    }
}

pub struct Classifier {
    model: Arc<dyn ImageModel>,
    labels: LabelSet,
    input_size: u32,
}

impl Classifier {
    /// Pair a model with its class names. Fails when the model declares an
    /// output size that does not match the number of names.
    pub fn new(
        model: Arc<dyn ImageModel>,
        labels: LabelSet,
        input_size: u32,
    ) -> Result<Self, ClassifierError> {
        if let Some(outputs) = model.num_outputs() {
            if outputs != labels.len() {
                return Err(ClassifierError::OutputMismatch {
                    scores: outputs,
                    labels: labels.len(),
                });
            }
        }

        Ok(Self {
            model,
            labels,
            input_size,
        })
    }

    /// Load the ONNX artifact and class-name list named in `settings`.
    pub fn load(settings: &ClassifierSettings) -> Result<Self, ClassifierError> {
        let labels = LabelSet::from_json_file(&settings.class_names_path)?;
        let model = OnnxModel::load(&settings.model_path, settings.input_size)?;

        tracing::info!(classes = labels.len(), "Loaded leaf class names");

        Self::new(Arc::new(model), labels, settings.input_size)
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Classify encoded image bytes.
    pub fn classify(&self, bytes: &[u8]) -> Result<Label, ClassifierError> {
        let image = preprocess::decode(bytes)?;
        self.classify_image(&image)
    }

    pub fn classify_image(&self, image: &DynamicImage) -> Result<Label, ClassifierError> {
        let canonical = preprocess::canonicalize(image, self.input_size);
        let input = preprocess::to_input_tensor(&canonical);

        let scores = self.model.forward(&input)?;
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::OutputMismatch {
                scores: scores.len(),
                labels: self.labels.len(),
            });
        }

        let index = argmax(&scores).ok_or(ClassifierError::EmptyOutput)?;
        let label = self
            .labels
            .get(index)
            .cloned()
            .ok_or(ClassifierError::OutputMismatch {
                scores: scores.len(),
                labels: self.labels.len(),
            })?;

        tracing::debug!(index, label = %label, "Classified leaf image");
        Ok(label)
    }

    /// [`Classifier::classify`] on the blocking pool.
    pub async fn classify_blocking(
        self: &Arc<Self>,
        bytes: Vec<u8>,
    ) -> Result<Label, ClassifierError> {
        let classifier = Arc::clone(self);
        tokio::task::spawn_blocking(move || classifier.classify(&bytes))
            .await
            .map_err(|e| ClassifierError::Join(e.to_string()))?
    }

    /// [`Classifier::classify_image`] on the blocking pool.
    pub async fn classify_image_blocking(
        self: &Arc<Self>,
        image: DynamicImage,
    ) -> Result<Label, ClassifierError> {
        let classifier = Arc::clone(self);
        tokio::task::spawn_blocking(move || classifier.classify_image(&image))
            .await
            .map_err(|e| ClassifierError::Join(e.to_string()))?
    }
}
