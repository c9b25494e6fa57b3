pub mod labels;
pub mod model;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

use std::sync::Arc;

use crate::config::{ClassifierBackend, ClassifierSettings, ConfigError};
use labels::LabelSet;
use model::{Classifier, MockClassifier, Model};
use preprocess::{PreprocessConfig, Preprocessor};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Model inference error: {0}")]
    Classifier(String),
}

pub fn load_labels(settings: &ClassifierSettings) -> Result<LabelSet, ConfigError> {
    match &settings.labels_path {
        Some(path) => LabelSet::from_yaml_file(path),
        None => Ok(LabelSet::builtin()),
    }
}

/// Loads labels and the configured classifier, then verifies they agree.
pub fn build_model(
    settings: &ClassifierSettings,
    preprocess: PreprocessConfig,
) -> Result<Model, ConfigError> {
    let labels = load_labels(settings)?;
    let classifier: Arc<dyn Classifier> = match settings.backend {
        ClassifierBackend::Mock => {
            log::warn!("Using the mock classifier; predictions are random");
            Arc::new(MockClassifier::new(labels.len()))
        }
        ClassifierBackend::Torch => load_torch(settings)?,
    };
    Model::new(classifier, labels, Preprocessor::new(preprocess))
}

#[cfg(feature = "torch")]
fn load_torch(settings: &ClassifierSettings) -> Result<Arc<dyn Classifier>, ConfigError> {
    if !settings.model_path.exists() {
        return Err(ConfigError::MissingModel(
            settings.model_path.display().to_string(),
        ));
    }
    let classifier = torch::TorchClassifier::load(&settings.model_path, settings.apply_softmax)?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "torch"))]
fn load_torch(_settings: &ClassifierSettings) -> Result<Arc<dyn Classifier>, ConfigError> {
    Err(ConfigError::BackendUnavailable(
        ClassifierBackend::Torch.as_str().to_string(),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use ndarray::Array4;

    use super::InferenceError;
    use super::model::Classifier;

    /// Always returns the same scores.
    pub struct FixedClassifier {
        scores: Vec<f32>,
    }

    impl FixedClassifier {
        pub fn new(scores: Vec<f32>) -> Self {
            Self { scores }
        }

        /// All mass on `index` out of `len` classes.
        pub fn one_hot(len: usize, index: usize, probability: f32) -> Self {
            let rest = (1.0 - probability) / (len.max(2) - 1) as f32;
            let mut scores = vec![rest; len];
            scores[index] = probability;
            Self { scores }
        }
    }

    impl Classifier for FixedClassifier {
        fn backend(&self) -> &'static str {
            "fixed"
        }

        fn classify(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(self.scores.clone())
        }
    }

    pub struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn backend(&self) -> &'static str {
            "failing"
        }

        fn classify(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Classifier("backend fault: shape mismatch".to_string()))
        }
    }

    /// Answers the all-zero startup probe, fails on anything else.
    pub struct FailsAfterProbe {
        pub len: usize,
    }

    impl Classifier for FailsAfterProbe {
        fn backend(&self) -> &'static str {
            "fails-after-probe"
        }

        fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            if input.iter().all(|v| *v == 0.0) {
                Ok(vec![1.0 / self.len as f32; self.len])
            } else {
                Err(InferenceError::Classifier("device lost".to_string()))
            }
        }
    }

    pub fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
        encode(image, ImageFormat::Png)
    }

    pub fn encode_jpeg(image: &DynamicImage) -> Vec<u8> {
        encode(image, ImageFormat::Jpeg)
    }

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .expect("encode test image");
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn settings(backend: ClassifierBackend) -> ClassifierSettings {
        ClassifierSettings {
            backend,
            model_path: PathBuf::from("/nonexistent/model.pt"),
            apply_softmax: false,
            labels_path: None,
            treatments_path: None,
        }
    }

    #[test]
    fn mock_backend_builds_with_builtin_labels() {
        let model = build_model(&settings(ClassifierBackend::Mock), PreprocessConfig::default())
            .unwrap();
        assert_eq!(model.backend(), "mock");
        assert_eq!(model.labels().len(), 38);
    }

    #[test]
    fn mock_backend_follows_a_custom_label_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- Rice___Blast\n- Rice___healthy\n- Wheat___Rust").unwrap();
        let mut settings = settings(ClassifierBackend::Mock);
        settings.labels_path = Some(file.path().to_path_buf());
        let model = build_model(&settings, PreprocessConfig::default()).unwrap();
        assert_eq!(model.labels().len(), 3);
    }

    #[cfg(not(feature = "torch"))]
    #[test]
    fn torch_backend_without_the_feature_is_a_config_error() {
        let result = build_model(&settings(ClassifierBackend::Torch), PreprocessConfig::default());
        assert!(matches!(result, Err(ConfigError::BackendUnavailable(_))));
    }

    #[cfg(feature = "torch")]
    #[test]
    fn missing_model_artifact_is_a_config_error() {
        let result = build_model(&settings(ClassifierBackend::Torch), PreprocessConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingModel(_))));
    }
}
