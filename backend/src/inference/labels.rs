use std::collections::HashSet;
use std::path::Path;

use crate::config::ConfigError;

/// PlantVillage classes in the order the classifier emits them.
pub const PLANT_VILLAGE_LABELS: [&str; 38] = [
    "Apple___Apple_scab",
    "Apple___Black_rot",
    "Apple___Cedar_apple_rust",
    "Apple___healthy",
    "Blueberry___healthy",
    "Cherry_(including_sour)___Powdery_mildew",
    "Cherry_(including_sour)___healthy",
    "Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot",
    "Corn_(maize)___Common_rust_",
    "Corn_(maize)___Northern_Leaf_Blight",
    "Corn_(maize)___healthy",
    "Grape___Black_rot",
    "Grape___Esca_(Black_Measles)",
    "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)",
    "Grape___healthy",
    "Orange___Haunglongbing_(Citrus_greening)",
    "Peach___Bacterial_spot",
    "Peach___healthy",
    "Pepper,_bell___Bacterial_spot",
    "Pepper,_bell___healthy",
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
    "Raspberry___healthy",
    "Soybean___healthy",
    "Squash___Powdery_mildew",
    "Strawberry___Leaf_scorch",
    "Strawberry___healthy",
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___healthy",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self, ConfigError> {
        if labels.is_empty() {
            return Err(ConfigError::InvalidLabels("label set is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(ConfigError::InvalidLabels("blank label".to_string()));
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::InvalidLabels(format!(
                    "duplicate label '{}'",
                    label
                )));
            }
        }
        Ok(Self { labels })
    }

    pub fn builtin() -> Self {
        Self {
            labels: PLANT_VILLAGE_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Reads a YAML sequence of strings.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let labels: Vec<String> =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })?;
        Self::new(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    #[cfg(test)]
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

pub fn is_healthy_label(label: &str) -> bool {
    label.to_lowercase().contains("healthy")
}

/// `Tomato___Early_blight` -> `Tomato Early blight`. Runs of spaces become
/// one space; leading and trailing ones are kept.
pub fn display_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c == '_' { ' ' } else { c })
        .fold(String::with_capacity(label.len()), |mut out, c| {
            if !(c == ' ' && out.ends_with(' ')) {
                out.push(c);
            }
            out
        })
}
