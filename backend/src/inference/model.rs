use std::sync::Arc;

use ndarray::Array4;
use rand::Rng;

use super::InferenceError;
use super::labels::LabelSet;
use super::preprocess::{Preprocessor, decode_base64_image};
use crate::config::ConfigError;

/// Opaque classifier: a `(1, H, W, 3)` tensor in, one probability per class out.
pub trait Classifier: Send + Sync {
    fn backend(&self) -> &'static str;

    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Stand-in used when no model artifact is available. Picks a random class
/// with a confidence between 75% and 95%.
pub struct MockClassifier {
    num_classes: usize,
}

impl MockClassifier {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes }
    }
}

impl Classifier for MockClassifier {
    fn backend(&self) -> &'static str {
        "mock"
    }

    fn classify(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        if self.num_classes == 0 {
            return Err(InferenceError::Classifier(
                "mock classifier has no classes".to_string(),
            ));
        }
        let mut rng = rand::rng();
        let winner = rng.random_range(0..self.num_classes);
        let confidence: f32 = rng.random_range(0.75..=0.95);
        let rest = if self.num_classes > 1 {
            (1.0 - confidence) / (self.num_classes - 1) as f32
        } else {
            0.0
        };
        let mut probabilities = vec![rest; self.num_classes];
        probabilities[winner] = confidence;
        Ok(probabilities)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Percentage in `[0, 100]`, two decimals.
    pub confidence: f64,
}

#[derive(Clone)]
pub struct Model {
    classifier: Arc<dyn Classifier>,
    labels: Arc<LabelSet>,
    preprocessor: Preprocessor,
}

impl Model {
    /// Runs one probe pass so a label set that does not match the classifier
    /// output fails here instead of on the first request.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        labels: LabelSet,
        preprocessor: Preprocessor,
    ) -> Result<Self, ConfigError> {
        let probe = classifier
            .classify(&preprocessor.blank_tensor())
            .map_err(|e| ConfigError::Probe(e.to_string()))?;
        if probe.len() != labels.len() {
            return Err(ConfigError::LabelMismatch {
                labels: labels.len(),
                outputs: probe.len(),
            });
        }
        Ok(Self {
            classifier,
            labels: Arc::new(labels),
            preprocessor,
        })
    }

    pub fn backend(&self) -> &'static str {
        self.classifier.backend()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn infer_base64(&self, encoded: &str) -> Result<Prediction, InferenceError> {
        let bytes = decode_base64_image(encoded)?;
        self.infer_bytes(&bytes)
    }

    pub fn infer_bytes(&self, image: &[u8]) -> Result<Prediction, InferenceError> {
        let predictions = self.inference(image)?;
        self.calculate_result(&predictions)
    }

    pub fn inference(&self, image: &[u8]) -> Result<Vec<f32>, InferenceError> {
        let tensor = self.preprocessor.preprocess(image)?;
        self.classifier.classify(&tensor)
    }

    /// Argmax over the probabilities. Ties go to the lowest index and NaN
    /// never wins.
    pub fn calculate_result(&self, predictions: &[f32]) -> Result<Prediction, InferenceError> {
        if predictions.len() != self.labels.len() {
            return Err(InferenceError::Classifier(format!(
                "classifier returned {} outputs for {} labels",
                predictions.len(),
                self.labels.len()
            )));
        }

        let (index, max) = predictions
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| !p.is_nan())
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, top)) if top >= p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| {
                InferenceError::Classifier("classifier returned no usable scores".to_string())
            })?;

        let label = self
            .labels
            .get(index)
            .ok_or_else(|| InferenceError::Classifier(format!("no label at index {}", index)))?;

        Ok(Prediction {
            label: label.to_string(),
            confidence: round_percentage(max),
        })
    }
}

fn round_percentage(probability: f32) -> f64 {
    let percent = (probability as f64 * 100.0).clamp(0.0, 100.0);
    (percent * 100.0).round() / 100.0
}
