//! ClassifierClient - Can/Plastic Binary Classifier
//!
//! ## Responsibilities
//!
//! - Convert an encoded frame into the model input (224x224 RGB, f32 in [0, 255])
//! - Run inference off the async executor
//! - Map the model probability to a label and confidence

mod onnx;

pub use onnx::OnnxClassifier;

use crate::error::{Error, Result};
use crate::models::{Frame, SortLabel};
use image::imageops::{self, FilterType};
use serde::Serialize;
use std::sync::Arc;

pub const INPUT_WIDTH: u32 = 224;
pub const INPUT_HEIGHT: u32 = 224;
pub const INPUT_CHANNELS: usize = 3;

/// Model input tensor, NHWC with N = 1
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB values in [0, 255]
    pub data: Vec<f32>,
}

/// Binary image model
///
/// Returns `P(Plastic | image)`.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &ModelInput) -> Result<f32>;
}

/// Classification verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub label: SortLabel,
    /// Probability of the chosen label, in [0.5, 1.0]
    pub confidence: f64,
    /// Raw model output
    pub probability: f32,
}

impl Verdict {
    /// `p >= 0.5` is Plastic with confidence `p`, otherwise Can with `1 - p`
    pub fn from_probability(probability: f32) -> Result<Self> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(Error::ClassificationFailed(format!(
                "model output out of range: {}",
                probability
            )));
        }

        let p = f64::from(probability);
        let (label, confidence) = if p >= 0.5 {
            (SortLabel::Plastic, p)
        } else {
            (SortLabel::Can, 1.0 - p)
        };

        Ok(Self {
            label,
            confidence,
            probability,
        })
    }

    /// Confidence as a percentage rounded to 2 decimals
    pub fn confidence_pct(&self) -> f64 {
        (self.confidence * 10000.0).round() / 100.0
    }
}

/// Decode, convert to RGB and resize to the model input size
pub fn preprocess(encoded: &[u8]) -> Result<ModelInput> {
    let decoded = image::load_from_memory(encoded)
        .map_err(|e| Error::ClassificationFailed(format!("image decode failed: {}", e)))?;

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

    let data = resized.into_raw().into_iter().map(f32::from).collect();

    Ok(ModelInput {
        width: INPUT_WIDTH,
        height: INPUT_HEIGHT,
        data,
    })
}

/// ClassifierClient instance
#[derive(Clone)]
pub struct ClassifierClient {
    model: Arc<dyn Classifier>,
}

impl ClassifierClient {
    pub fn new(model: Arc<dyn Classifier>) -> Self {
        Self { model }
    }

    /// Preprocess and classify a frame on the blocking pool
    pub async fn classify(&self, frame: Frame) -> Result<Verdict> {
        let model = self.model.clone();
        let started = std::time::Instant::now();

        let probability = tokio::task::spawn_blocking(move || {
            let input = preprocess(&frame.data)?;
            model.predict(&input)
        })
        .await
        .map_err(|e| Error::ClassificationFailed(format!("inference task failed: {}", e)))??;

        let verdict = Verdict::from_probability(probability)?;
        tracing::debug!(
            label = %verdict.label,
            probability = probability,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Frame classified"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted classifier shared by tests across the crate

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued probabilities in order
    pub struct ScriptedClassifier {
        outputs: Mutex<VecDeque<f32>>,
    }

    impl ScriptedClassifier {
        pub fn new(outputs: Vec<f32>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into()),
            }
        }
    }

    impl Classifier for ScriptedClassifier {
        fn predict(&self, input: &ModelInput) -> Result<f32> {
            assert_eq!(
                input.data.len(),
                (INPUT_WIDTH * INPUT_HEIGHT) as usize * INPUT_CHANNELS
            );
            self.outputs
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::ClassificationFailed("no scripted output".to_string()))
        }
    }

    /// Small PNG, decodable by `preprocess`
    pub fn sample_image(rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(32, 24, image::Rgb(rgb));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }
}
