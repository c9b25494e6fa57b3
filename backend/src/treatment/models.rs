use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use shared::{Severity, TreatmentRecord};

use crate::config::ConfigError;

/// Separator between species and condition in PlantVillage labels.
pub const LABEL_SEPARATOR: &str = "___";

#[derive(Debug, Deserialize)]
struct TreatmentEntry {
    label: String,
    #[serde(flatten)]
    record: TreatmentRecord,
}

/// Lowercased key segments used by the fuzzy scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySegments {
    pub species: String,
    /// Condition with any parenthetical suffix removed. `None` when the key
    /// has no separator.
    pub condition: Option<String>,
}

impl KeySegments {
    pub fn from_key(key: &str) -> Self {
        let mut parts = key.split(LABEL_SEPARATOR);
        let species = parts.next().unwrap_or_default().to_lowercase();
        let condition = parts.next().map(|condition| {
            let stripped = match condition.split_once('(') {
                Some((head, _)) => head,
                None => condition,
            };
            stripped.to_lowercase()
        });
        Self { species, condition }
    }
}

/// Ordered treatment table. Iteration order is insertion order and decides
/// which entry wins a fuzzy match.
#[derive(Debug, Clone)]
pub struct TreatmentTable {
    entries: Vec<(String, TreatmentRecord)>,
    segments: Vec<KeySegments>,
    index: HashMap<String, usize>,
    fallback: TreatmentRecord,
}

impl TreatmentTable {
    pub fn new(entries: Vec<(String, TreatmentRecord)>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for (label, _) in &entries {
            if label.trim().is_empty() {
                return Err(ConfigError::InvalidTreatments("blank label".to_string()));
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::InvalidTreatments(format!(
                    "duplicate label '{}'",
                    label
                )));
            }
        }
        Ok(Self::assemble(entries))
    }

    fn assemble(entries: Vec<(String, TreatmentRecord)>) -> Self {
        let segments = entries
            .iter()
            .map(|(label, _)| KeySegments::from_key(label))
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, (label, _))| (label.clone(), position))
            .collect();
        Self {
            entries,
            segments,
            index,
            fallback: fallback_record(),
        }
    }

    pub fn builtin() -> Self {
        let entries = vec![
            (
                "Apple___Apple_scab".to_string(),
                record(
                    &[
                        "Spray fungicides like mancozeb, captan, or myclobutanil during early leaf stages.",
                        "Remove fallen leaves to reduce fungal spores.",
                        "Use resistant apple varieties.",
                    ],
                    &[
                        "Apply neem oil every 10–14 days.",
                        "Use baking soda spray (1 tsp per litre of water).",
                    ],
                    &[
                        "Avoid overhead irrigation.",
                        "Ensure good air circulation by pruning trees.",
                    ],
                    Severity::Medium,
                ),
            ),
            (
                "Potato___Late_blight".to_string(),
                record(
                    &[
                        "Spray copper-based fungicides or chlorothalonil every 7–10 days.",
                        "Remove and destroy infected leaves.",
                        "Improve air flow around plants.",
                    ],
                    &[
                        "Neem oil or baking soda spray for mild cases.",
                        "Use resistant potato varieties.",
                    ],
                    &[
                        "Avoid overhead watering.",
                        "Rotate crops annually to prevent soil-borne infection.",
                    ],
                    Severity::High,
                ),
            ),
            (
                "Tomato___Early_blight".to_string(),
                record(
                    &[
                        "Apply fungicides like chlorothalonil or copper oxychloride weekly.",
                        "Prune infected leaves and dispose away from field.",
                    ],
                    &[
                        "Use neem oil or garlic-based sprays.",
                        "Ensure good spacing for ventilation.",
                    ],
                    &[
                        "Rotate crops and avoid wetting leaves while watering.",
                        "Mulch around plants to reduce soil splash.",
                    ],
                    Severity::Medium,
                ),
            ),
            (
                "Tomato___Leaf_Mold".to_string(),
                record(
                    &[
                        "Use fungicides containing copper or potassium bicarbonate.",
                        "Improve air circulation by pruning lower leaves.",
                    ],
                    &["Neem oil and baking soda spray (weekly)."],
                    &[
                        "Avoid high humidity in greenhouses.",
                        "Use resistant tomato varieties.",
                    ],
                    Severity::Medium,
                ),
            ),
        ];
        Self::assemble(entries)
    }

    /// Reads an ordered YAML list of `{label, treatments, remedies,
    /// prevention, severity}` entries.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: Vec<TreatmentEntry> =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })?;
        Self::new(
            entries
                .into_iter()
                .map(|entry| (entry.label, entry.record))
                .collect(),
        )
    }

    pub fn get(&self, label: &str) -> Option<&TreatmentRecord> {
        self.index.get(label).map(|&position| &self.entries[position].1)
    }

    /// `(key, segments, record)` in table order.
    pub fn candidates(&self) -> impl Iterator<Item = (&str, &KeySegments, &TreatmentRecord)> {
        self.entries
            .iter()
            .zip(self.segments.iter())
            .map(|((label, record), segments)| (label.as_str(), segments, record))
    }

    pub fn fallback(&self) -> &TreatmentRecord {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn record(
    treatments: &[&str],
    remedies: &[&str],
    prevention: &[&str],
    severity: Severity,
) -> TreatmentRecord {
    TreatmentRecord {
        treatments: owned(treatments),
        remedies: owned(remedies),
        prevention: owned(prevention),
        severity,
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn fallback_record() -> TreatmentRecord {
    record(
        &["Consult with a local agricultural extension office"],
        &["General plant care and monitoring"],
        &["Follow good agricultural practices"],
        Severity::Medium,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn key_segments_strip_parentheticals_and_lowercase() {
        let segments = KeySegments::from_key("Grape___Leaf_blight_(Isariopsis_Leaf_Spot)");
        assert_eq!(segments.species, "grape");
        assert_eq!(segments.condition.as_deref(), Some("leaf_blight_"));

        let segments = KeySegments::from_key("Corn_(maize)___Common_rust_");
        assert_eq!(segments.species, "corn_(maize)");
        assert_eq!(segments.condition.as_deref(), Some("common_rust_"));

        let segments = KeySegments::from_key("Unseparated");
        assert_eq!(segments.species, "unseparated");
        assert_eq!(segments.condition, None);
    }

    #[test]
    fn builtin_table_keeps_insertion_order() {
        let table = TreatmentTable::builtin();
        let keys: Vec<&str> = table.candidates().map(|(key, _, _)| key).collect();
        assert_eq!(
            keys,
            vec![
                "Apple___Apple_scab",
                "Potato___Late_blight",
                "Tomato___Early_blight",
                "Tomato___Leaf_Mold"
            ]
        );
        assert_eq!(table.len(), 4);
        assert_eq!(table.get("Potato___Late_blight").unwrap().severity, Severity::High);
        assert!(table.get("potato___late_blight").is_none());
    }

    #[test]
    fn yaml_table_is_loaded_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "- label: Rice___Blast\n  treatments: [Apply tricyclazole]\n  remedies: []\n  prevention: [Balanced nitrogen]\n  severity: high\n\
             - label: Rice___Brown_spot\n  treatments: [Apply mancozeb]\n  remedies: [Potash]\n  prevention: []\n  severity: low\n"
        )
        .unwrap();
        let table = TreatmentTable::from_yaml_file(file.path()).unwrap();
        let keys: Vec<&str> = table.candidates().map(|(key, _, _)| key).collect();
        assert_eq!(keys, vec!["Rice___Blast", "Rice___Brown_spot"]);
        assert_eq!(table.get("Rice___Brown_spot").unwrap().severity, Severity::Low);
    }

    #[test]
    fn invalid_tables_are_rejected() {
        let duplicate = TreatmentTable::new(vec![
            ("A___b".to_string(), fallback_record()),
            ("A___b".to_string(), fallback_record()),
        ]);
        assert!(matches!(duplicate, Err(ConfigError::InvalidTreatments(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "- label: Rice___Blast\n  treatments: []\n  remedies: []\n  prevention: []\n  severity: catastrophic\n"
        )
        .unwrap();
        assert!(matches!(
            TreatmentTable::from_yaml_file(file.path()),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
