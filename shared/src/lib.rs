use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct InferenceRequest {
    /// Raw base64 or a data URL (`data:image/png;base64,...`).
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResponse {
    pub disease: String,
    pub confidence: f64,
    pub is_healthy: bool,
    pub treatment: Option<TreatmentRecord>,
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TreatmentRecord {
    pub treatments: Vec<String>,
    pub remedies: Vec<String>,
    pub prevention: Vec<String>,
    pub severity: Severity,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ChatRequest {
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SpeechRequest {
    pub text: Option<String>,
    pub lang: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SpeechResponse {
    /// Base64-encoded MP3.
    pub audio: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub classifier: String,
    pub classes: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
