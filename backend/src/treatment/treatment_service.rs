use std::sync::Arc;

use shared::TreatmentRecord;

use super::models::TreatmentTable;
use crate::inference::labels::is_healthy_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreatmentMatch<'a> {
    Exact,
    /// Matched the key's species or condition segment.
    Fuzzy(&'a str),
    Fallback,
}

#[derive(Clone)]
pub struct TreatmentService {
    table: Arc<TreatmentTable>,
}

impl TreatmentService {
    pub fn new(table: TreatmentTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn resolve(&self, label: &str) -> &TreatmentRecord {
        let (matched, record) = self.resolve_with_match(label);
        log::debug!(
            "Treatment for {}: {:?} ({} severity)",
            label,
            matched,
            record.severity
        );
        record
    }

    /// Exact key, then the first entry (in table order) whose species or
    /// stripped condition occurs in the label, then the generic record.
    ///
    /// The substring test is loose: `Tomato___Late_blight` resolves to
    /// `Potato___Late_blight` through its condition, and any other Tomato
    /// label resolves to the first Tomato entry.
    pub fn resolve_with_match(&self, label: &str) -> (TreatmentMatch<'_>, &TreatmentRecord) {
        if let Some(record) = self.table.get(label) {
            return (TreatmentMatch::Exact, record);
        }

        let needle = label.to_lowercase();
        for (key, segments, record) in self.table.candidates() {
            let species_hit = needle.contains(segments.species.as_str());
            let condition_hit = segments
                .condition
                .as_deref()
                .is_some_and(|condition| needle.contains(condition));
            if species_hit || condition_hit {
                return (TreatmentMatch::Fuzzy(key), record);
            }
        }

        (TreatmentMatch::Fallback, self.table.fallback())
    }

    /// `None` for healthy labels; the table is not consulted for them.
    pub fn treatment_for(&self, label: &str) -> Option<TreatmentRecord> {
        if is_healthy_label(label) {
            return None;
        }
        Some(self.resolve(label).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Severity;

    fn service() -> TreatmentService {
        TreatmentService::new(TreatmentTable::builtin())
    }

    #[test]
    fn exact_key_returns_its_record() {
        let service = service();
        let (matched, record) = service.resolve_with_match("Potato___Late_blight");
        assert_eq!(matched, TreatmentMatch::Exact);
        assert_eq!(record.severity, Severity::High);
        assert!(record.treatments[0].contains("copper-based fungicide"));
    }

    #[test]
    fn exact_match_wins_over_an_earlier_fuzzy_candidate() {
        // Tomato___Leaf_Mold would also fuzzy-match Tomato___Early_blight,
        // which comes first in the table.
        let service = service();
        let (matched, record) = service.resolve_with_match("Tomato___Leaf_Mold");
        assert_eq!(matched, TreatmentMatch::Exact);
        assert!(record.treatments[0].contains("potassium bicarbonate"));
    }

    #[test]
    fn unknown_tomato_label_falls_to_first_tomato_entry() {
        let service = service();
        let (matched, record) = service.resolve_with_match("Tomato___Spider_mites");
        assert_eq!(matched, TreatmentMatch::Fuzzy("Tomato___Early_blight"));
        assert_eq!(
            record,
            service.resolve_with_match("Tomato___Early_blight").1
        );
    }

    #[test]
    fn condition_segment_matches_across_species() {
        let service = service();
        let (matched, record) = service.resolve_with_match("Tomato___Late_blight");
        // Potato precedes the Tomato entries, and its condition occurs in the label.
        assert_eq!(matched, TreatmentMatch::Fuzzy("Potato___Late_blight"));
        assert_eq!(record.severity, Severity::High);
    }

    #[test]
    fn species_match_is_case_insensitive() {
        let service = service();
        let (matched, _) = service.resolve_with_match("APPLE___Black_rot");
        assert_eq!(matched, TreatmentMatch::Fuzzy("Apple___Apple_scab"));
    }

    #[test]
    fn unrelated_label_gets_the_generic_record() {
        let service = service();
        let (matched, record) = service.resolve_with_match("Grape___Black_rot");
        assert_eq!(matched, TreatmentMatch::Fallback);
        assert_eq!(record.severity, Severity::Medium);
        assert_eq!(
            record.treatments,
            vec!["Consult with a local agricultural extension office".to_string()]
        );
        assert_eq!(record.remedies, vec!["General plant care and monitoring".to_string()]);
        assert_eq!(record.prevention, vec!["Follow good agricultural practices".to_string()]);
    }

    #[test]
    fn healthy_labels_skip_resolution() {
        let service = service();
        // Would fuzzy-match the Tomato entries if resolved.
        assert!(service.treatment_for("Tomato___Healthy").is_none());
        assert!(service.treatment_for("apple___HEALTHY").is_none());
        assert!(service.treatment_for("Potato___Early_blight").is_some());
    }

    #[test]
    fn treatment_for_returns_the_resolved_record() {
        let service = service();
        for label in ["Potato___Late_blight", "Tomato___Spider_mites", "Grape___Black_rot"] {
            assert_eq!(service.treatment_for(label).as_ref(), Some(service.resolve(label)));
        }
    }

    #[test]
    fn keys_without_a_separator_only_match_on_species() {
        let table = TreatmentTable::new(vec![(
            "Mildew".to_string(),
            service().resolve("Apple___Apple_scab").clone(),
        )])
        .unwrap();
        let service = TreatmentService::new(table);
        assert_eq!(
            service.resolve_with_match("Squash___Powdery_mildew").0,
            TreatmentMatch::Fuzzy("Mildew")
        );
        assert_eq!(
            service.resolve_with_match("Squash___Leaf_spot").0,
            TreatmentMatch::Fallback
        );
    }
}
