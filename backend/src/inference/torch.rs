use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use tch::{CModule, Device, Kind, Tensor};

use super::InferenceError;
use super::model::Classifier;
use crate::config::ConfigError;

/// TorchScript classifier. The module receives the NHWC tensor as produced by
/// the preprocessor; exporting a model that expects NCHW needs a permute
/// inside the scripted module.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
    apply_softmax: bool,
}

impl TorchClassifier {
    pub fn load(model_path: &Path, apply_softmax: bool) -> Result<Self, ConfigError> {
        let device = Device::cuda_if_available();
        let module =
            CModule::load_on_device(model_path, device).map_err(|e| ConfigError::ModelLoad {
                path: model_path.display().to_string(),
                reason: e.to_string(),
            })?;
        log::info!(
            "Loaded TorchScript model from {} on {:?}",
            model_path.display(),
            device
        );
        Ok(Self {
            module: Mutex::new(module),
            device,
            apply_softmax,
        })
    }
}

impl Classifier for TorchClassifier {
    fn backend(&self) -> &'static str {
        "torch"
    }

    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_slice(&data)
            .reshape(shape.as_slice())
            .to_device(self.device);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Classifier("model lock poisoned".to_string()))?;
            module
                .forward_ts(&[tensor])
                .map_err(|e| InferenceError::Classifier(e.to_string()))?
        };

        let output = if self.apply_softmax {
            output.softmax(-1, Kind::Float)
        } else {
            output.to_kind(Kind::Float)
        };
        let output_flat = output.to_device(Device::Cpu).reshape([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}
