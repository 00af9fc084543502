//! ONNX model backend (tract)

use super::{Classifier, ModelInput, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};
use crate::error::{Error, Result};
use std::path::Path;
use tract_onnx::prelude::*;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX classifier loaded once at startup
pub struct OnnxClassifier {
    model: OnnxPlan,
}

impl OnnxClassifier {
    /// Load and optimize the model for a fixed `[1, 224, 224, 3]` input
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let shape = [
            1,
            INPUT_HEIGHT as usize,
            INPUT_WIDTH as usize,
            INPUT_CHANNELS,
        ];

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact(shape).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| Error::Config(format!("model load failed ({}): {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), "Classifier model loaded");
        Ok(Self { model })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: &ModelInput) -> Result<f32> {
        let shape = (
            1,
            input.height as usize,
            input.width as usize,
            INPUT_CHANNELS,
        );
        let tensor: Tensor = tract_ndarray::Array4::from_shape_vec(shape, input.data.clone())
            .map_err(|e| Error::ClassificationFailed(format!("bad input shape: {}", e)))?
            .into();

        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| Error::ClassificationFailed(format!("inference failed: {}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| Error::ClassificationFailed("model produced no output".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| Error::ClassificationFailed(format!("unexpected output type: {}", e)))?;

        view.iter()
            .next()
            .copied()
            .ok_or_else(|| Error::ClassificationFailed("empty model output".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_config_error() {
        let result = OnnxClassifier::load("/nonexistent/model.onnx");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
