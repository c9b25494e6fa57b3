use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ChatSettings;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("No message provided")]
    EmptyMessage,
    #[error("Gemini API error: {0}")]
    Upstream(String),
    #[error("Gemini returned an unexpected response: {0}")]
    MalformedResponse(String),
    #[error("Gemini API key is not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    Gemini,
    Mock,
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ChatMode::Gemini),
            "mock" => Ok(ChatMode::Mock),
            other => Err(format!("unknown chat mode '{}'", other)),
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

// Checked in order; the first group with a hit answers.
const MOCK_TOPICS: &[(&[&str], &str)] = &[
    (
        &["fertilizer", "nutrient", "npk", "feed"],
        "For healthy plant growth, I recommend using balanced NPK fertilizers (10-10-10) for general crops. For leafy vegetables, use higher nitrogen content (20-10-10). Always test your soil first and apply fertilizer based on soil test results.",
    ),
    (
        &["water", "irrigation", "moisture", "dry"],
        "Water your plants early morning or late evening to reduce evaporation. Most crops need 1-2 inches of water per week. Check soil moisture by inserting your finger 2 inches deep - if it's dry, it's time to water.",
    ),
    (
        &["pest", "insect", "bug", "aphid", "beetle"],
        "Common organic pest control methods include neem oil spray, companion planting with marigolds, and introducing beneficial insects like ladybugs. For severe infestations, consider targeted organic pesticides.",
    ),
    (
        &["soil", "compost", "ph", "drainage"],
        "Healthy soil should be well-draining with good organic matter. Add compost regularly, maintain pH between 6.0-7.0 for most crops, and rotate crops to prevent nutrient depletion.",
    ),
    (
        &["disease", "sick", "infected", "blight", "mold"],
        "For plant disease identification, I recommend using our Disease Detection feature. You can upload a photo of the affected plant, and I'll help identify the disease and provide treatment recommendations.",
    ),
    (
        &["rotation", "rotate", "crop rotation"],
        "Crop rotation is essential for soil health. Rotate between nitrogen-fixing legumes, heavy feeders like corn, and light feeders like root vegetables. A typical 4-year rotation might be: Year 1 - Legumes, Year 2 - Leafy greens, Year 3 - Root crops, Year 4 - Fallow or cover crops.",
    ),
    (
        &["organic", "natural", "chemical-free"],
        "Organic farming focuses on natural methods. Use compost and organic fertilizers, practice companion planting, encourage beneficial insects, and use organic-approved pest control methods like neem oil, diatomaceous earth, and beneficial bacteria.",
    ),
    (
        &["tomato", "tomatoes"],
        "Tomatoes need full sun (6-8 hours), well-draining soil, and consistent watering. Common issues include blossom end rot (add calcium), early blight (improve air circulation), and aphids (use neem oil).",
    ),
    (
        &["potato", "potatoes"],
        "Potatoes prefer cool weather and loose, well-drained soil. Plant in hills or rows, keep soil consistently moist, and watch for Colorado potato beetles and late blight disease.",
    ),
    (
        &["apple", "apples", "apple tree"],
        "Apple trees need full sun, well-drained soil, and regular pruning. Common diseases include apple scab (fungicide treatment), fire blight (prune infected branches), and codling moth (pheromone traps).",
    ),
];

const MOCK_DEFAULT: &str = "That's a great question! For specific agricultural advice, I recommend consulting with your local agricultural extension office. They can provide region-specific guidance based on your climate and soil conditions. You can also use our Disease Detection feature to identify plant problems from photos.";

#[derive(Clone)]
pub struct ChatService {
    client: reqwest::Client,
    mode: ChatMode,
    api_key: Option<String>,
    endpoint: Url,
}

impl ChatService {
    pub fn new(client: reqwest::Client, settings: &ChatSettings) -> Self {
        Self {
            client,
            mode: settings.mode,
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub async fn reply(&self, message: &str) -> Result<String, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        match self.mode {
            ChatMode::Mock => Ok(Self::mock_reply(message).to_string()),
            ChatMode::Gemini => self.gemini_reply(message).await,
        }
    }

    pub fn mock_reply(message: &str) -> &'static str {
        let lower = message.to_lowercase();
        MOCK_TOPICS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(_, answer)| *answer)
            .unwrap_or(MOCK_DEFAULT)
    }

    async fn gemini_reply(&self, message: &str) -> Result<String, ChatError> {
        let api_key = self.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: message }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::warn!("Gemini returned {}: {}", status, text);
            return Err(ChatError::Upstream(format!("{}: {}", status, text)));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| ChatError::MalformedResponse("no candidate text".to_string()))
    }
}
