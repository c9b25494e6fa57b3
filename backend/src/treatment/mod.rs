pub mod models;
pub mod treatment_service;

use crate::config::{ClassifierSettings, ConfigError};
use models::TreatmentTable;

pub fn load_treatments(settings: &ClassifierSettings) -> Result<TreatmentTable, ConfigError> {
    match &settings.treatments_path {
        Some(path) => TreatmentTable::from_yaml_file(path),
        None => Ok(TreatmentTable::builtin()),
    }
}
