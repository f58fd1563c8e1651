//! Inference backends.
//!
//! The leaf classifier artifact is an ONNX export of the trained network.
//! It is loaded once, optimised for a fixed `[1, size, size, 3]` input and
//! then shared read-only between requests.

use super::preprocess::InputTensor;
use super::ClassifierError;
use std::path::Path;
use tract_onnx::prelude::*;

/// A loaded image classification network.
pub trait ImageModel: Send + Sync {
    /// Run one forward pass and return one score per class.
    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>, ClassifierError>;

    /// Output dimensionality, when the artifact declares it statically.
    fn num_outputs(&self) -> Option<usize>;
}

type Plan = TypedRunnableModel<TypedModel>;

/// ONNX artifact executed with tract.
pub struct OnnxModel {
    plan: Plan,
    input_size: u32,
    num_outputs: Option<usize>,
}

impl OnnxModel {
    pub fn load(path: &Path, input_size: u32) -> Result<Self, ClassifierError> {
        let artifact_error =
            |e: anyhow::Error| ClassifierError::Artifact(format!("{}: {:#}", path.display(), e));

        let size = input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(artifact_error)?
            .with_input_fact(0, f32::fact([1, size, size, 3]).into())
            .map_err(artifact_error)?
            .into_optimized()
            .map_err(artifact_error)?
            .into_runnable()
            .map_err(artifact_error)?;

        let num_outputs = plan
            .model()
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().map(|dims| dims.to_vec()))
            .and_then(|dims| dims.last().copied());

        tracing::info!(
            path = %path.display(),
            input_size,
            num_outputs = ?num_outputs,
            "Loaded ONNX leaf classifier"
        );

        Ok(Self {
            plan,
            input_size,
            num_outputs,
        })
    }
}

impl ImageModel for OnnxModel {
    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>, ClassifierError> {
        if input.size != self.input_size {
            return Err(ClassifierError::Inference(format!(
                "expected {}x{} input, got {}x{}",
                self.input_size, self.input_size, input.size, input.size
            )));
        }

        let tensor = Tensor::from_shape(&input.shape(), &input.data)
            .map_err(|e| ClassifierError::Inference(format!("{:#}", e)))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::Inference(format!("{:#}", e)))?;

        let scores = outputs
            .first()
            .ok_or(ClassifierError::EmptyOutput)?
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("{:#}", e)))?
            .iter()
            .copied()
            .collect();

        Ok(scores)
    }

    fn num_outputs(&self) -> Option<usize> {
        self.num_outputs
    }
}

/// Index of the highest score.
///
/// Ties go to the lowest index and `NaN` never wins, so the result is a pure
/// function of the scores. `None` when no score is comparable.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }

    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_highest_score() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
    }

    #[test]
    fn argmax_breaks_ties_on_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4, 0.0]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5, 0.5]), Some(0));
    }

    #[test]
    fn argmax_skips_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.3, 0.1]), Some(1));
        assert_eq!(argmax(&[0.3, f32::NAN, 0.9]), Some(2));
    }

    #[test]
    fn argmax_of_nothing_is_none() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[f32::NAN]), None);
    }

    #[test]
    fn argmax_handles_negative_logits() {
        assert_eq!(argmax(&[-3.0, -0.5, -1.0]), Some(1));
    }

    #[test]
    fn missing_artifact_is_reported() {
        let result = OnnxModel::load(Path::new("/nonexistent/leaf.onnx"), 224);
        assert!(matches!(result, Err(ClassifierError::Artifact(_))));
    }
}
