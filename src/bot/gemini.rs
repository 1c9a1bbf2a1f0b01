//! Gemini API client for text and image prompts.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bot::message::{Attachment, Turn};

/// Generation failure. The relay only ever turns these into a retry notice.
#[derive(Debug)]
pub enum GenerationError {
    Http(String),
    Api(String),
    Parse(String),
    /// The prompt was refused by the safety filters.
    Blocked(String),
    Empty,
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Api(e) => write!(f, "API error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Blocked(reason) => write!(f, "Prompt blocked: {reason}"),
            Self::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for GenerationError {}

/// Produces a model answer for a prompt with prior turns and an optional image.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        history: &[Turn],
        image: Option<&Attachment>,
    ) -> Result<String, GenerationError>;
}

pub struct GeminiClient {
    api_key: String,
    api_base: String,
    text_model: String,
    vision_model: String,
    client: reqwest::Client,
}

#[derive(Serialize, Debug)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Debug)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        api_base: String,
        text_model: String,
        vision_model: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { api_key, api_base, text_model, vision_model, client })
    }

    fn model_for(&self, image: Option<&Attachment>) -> &str {
        if image.is_some() { &self.vision_model } else { &self.text_model }
    }
}

fn build_request(prompt: &str, history: &[Turn], image: Option<&Attachment>) -> GenerateRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|turn| Content {
            role: turn.role.as_str(),
            parts: vec![Part::Text { text: turn.text.clone() }],
        })
        .collect();

    let mut parts = vec![Part::Text { text: prompt.to_string() }];
    if let Some(image) = image {
        parts.push(Part::Inline {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.data),
            },
        });
    }
    contents.push(Content { role: "user", parts });

    GenerateRequest { contents }
}

fn parse_response(body: &str) -> Result<String, GenerationError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(GenerationError::Api(error.message));
    }
    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Blocked(reason));
    }

    let candidates = parsed.candidates.unwrap_or_default();
    let candidate = candidates.into_iter().next().ok_or(GenerationError::Empty)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some("SAFETY") => Err(GenerationError::Blocked("SAFETY".to_string())),
            _ => Err(GenerationError::Empty),
        };
    }
    Ok(text)
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        history: &[Turn],
        image: Option<&Attachment>,
    ) -> Result<String, GenerationError> {
        let model = self.model_for(image);
        info!("✨ Generating with {} ({} prior turns, image: {})", model, history.len(), image.is_some());

        let request = build_request(prompt, history, image);
        let url = format!("{}/models/{}:generateContent?key={}", self.api_base, model, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Http(format!("failed to read response: {}", e.without_url())))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            // Error bodies carry a JSON message; fall back to the raw body.
            return match parse_response(&body) {
                Err(GenerationError::Api(message)) => Err(GenerationError::Api(format!("{status}: {message}"))),
                _ => Err(GenerationError::Api(format!("{status}: {body}"))),
            };
        }

        let text = parse_response(&body)?;
        info!("✨ Generated {} chars", text.len());
        Ok(text)
    }
}
