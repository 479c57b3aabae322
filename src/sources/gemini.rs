use crate::config::Config;
use crate::error::SourceError;
use crate::sources::throttle::Throttle;
use crate::sources::traits::TextModel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const SOURCE: &str = "Gemini";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Text completion through the Gemini `generateContent` endpoint.
///
/// The API key is only ever read from server-side configuration. Without a key
/// the request goes out unauthenticated, which is how a key-owning proxy is used.
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    throttle: Throttle,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create generative model HTTP client")?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.generative_url.trim_end_matches('/'),
            config.generative_model
        );

        Ok(Self {
            client,
            endpoint,
            api_key: config.generative_api_key.clone(),
            throttle: Throttle::new(SOURCE, config.intervals.generative),
        })
    }
}

/// Concatenated text of the first candidate.
fn response_text(body: &str) -> Result<String, SourceError> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| SourceError::malformed(SOURCE, e))?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(SourceError::malformed(SOURCE, "response had no text"));
    }
    Ok(text)
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, SourceError> {
        self.throttle.wait().await;
        debug!(prompt_len = prompt.len(), "Generative model request");

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Unavailable {
                source_name: SOURCE,
                status: response.status().as_u16(),
            });
        }

        response_text(&response.text().await?)
    }
}
