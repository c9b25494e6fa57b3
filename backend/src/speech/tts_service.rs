use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SpeechSettings;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("No text provided")]
    EmptyText,
    #[error("Text-to-speech is not configured")]
    NotConfigured,
    #[error("Text-to-speech API error: {0}")]
    Upstream(String),
    #[error("Text-to-speech returned an unexpected response: {0}")]
    MalformedResponse(String),
}

pub const DEFAULT_LANGUAGE: &str = "en";

/// Short UI language codes to Google locales. Unknown codes pass through.
pub fn locale_for(lang: &str) -> &str {
    match lang {
        "en" => "en-US",
        "hi" => "hi-IN",
        "kn" => "kn-IN",
        "te" => "te-IN",
        "ta" => "ta-IN",
        other => other,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

#[derive(Clone)]
pub struct SpeechService {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: Url,
}

impl SpeechService {
    pub fn new(client: reqwest::Client, settings: &SpeechSettings) -> Self {
        Self {
            client,
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns base64-encoded MP3 audio.
    pub async fn synthesize(&self, text: &str, lang: &str) -> Result<String, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }
        let api_key = self.api_key.as_deref().ok_or(SpeechError::NotConfigured)?;

        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: locale_for(lang),
                ssml_gender: "NEUTRAL",
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
            },
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::warn!("Text-to-speech returned {}: {}", status, text);
            return Err(SpeechError::Upstream(format!("{}: {}", status, text)));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::MalformedResponse(e.to_string()))?;
        parsed
            .audio_content
            .filter(|audio| !audio.is_empty())
            .ok_or_else(|| SpeechError::MalformedResponse("missing audioContent".to_string()))
    }
}
