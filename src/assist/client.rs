//! Gemini REST client
//!
//! Thin typed wrapper over the generateContent endpoint. The `TextModel`
//! trait is the seam the dispatcher is generic over, so tests can substitute
//! a scripted fake without touching the network.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Failure from a single generation attempt.
///
/// The display text carries the upstream status line, which is what the
/// dispatcher's rate-limit classifier matches against.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Non-success HTTP status from the API, with response body detail.
    #[error("{0}")]
    Api(String),
    /// Transport-level failure (DNS, TLS, timeouts).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// 2xx response that carried no usable text.
    #[error("model returned an empty completion")]
    EmptyCompletion,
}

/// One text-generation call per invocation.
pub trait TextModel: Send + Sync + 'static {
    fn generate(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, ModelError>> + Send;
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

/// Client for the hosted Gemini generation API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            model,
        }
    }
}

impl TextModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ModelError::Api(format!(
                "{}: {}",
                status,
                truncate_str(&text, 500)
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            ModelError::Api(format!(
                "unparseable model response: {e}: {}",
                truncate_str(&text, 200)
            ))
        })?;

        parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.is_empty())
            .ok_or(ModelError::EmptyCompletion)
    }
}

/// Truncate a string for error messages (Unicode-safe).
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    if s.chars().count() <= max_chars {
        s
    } else {
        let byte_idx = s
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        &s[..byte_idx]
    }
}
