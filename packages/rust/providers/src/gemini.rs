//! Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use articlesmith_shared::{ArticlesmithError, GenerationSettings, Result};

use crate::{TextGenerator, build_client, excerpt};

const TOP_P: f32 = 0.8;
const TOP_K: u32 = 10;

/// Text generation backed by the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// A missing key is reported on the first call, not here.
    pub fn new(
        api_key: Option<String>,
        model: &str,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::new(
            settings.text_api_key.clone(),
            &settings.text_model,
            &settings.text_base_url,
            settings.text_timeout_secs,
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = max_tokens))]
    async fn generate_text(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ArticlesmithError::config("Gemini API key is required"))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
                "topP": TOP_P,
                "topK": TOP_K,
            }
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| ArticlesmithError::transport(format!("gemini: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| {
                ArticlesmithError::transport(format!("gemini: failed to read body: {e}"))
            })?;
        debug!(%status, body = excerpt(&text), "gemini response");

        let data: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let detail = data
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| excerpt(&text).to_string());
            return Err(ArticlesmithError::transport(format!(
                "gemini: HTTP {status}: {detail}"
            )));
        }

        let data = data.ok_or_else(|| {
            ArticlesmithError::provider(format!("gemini: response is not JSON: {}", excerpt(&text)))
        })?;
        extract_text(&data)
    }
}

fn error_message(data: &Value) -> Option<String> {
    data.get("error")
        .map(|e| match e.get("message").and_then(Value::as_str) {
            Some(msg) => msg.to_string(),
            None => e.to_string(),
        })
}

/// Pull the generated text out of any of the response shapes Gemini models emit.
fn extract_text(data: &Value) -> Result<String> {
    if let Some(msg) = error_message(data) {
        return Err(ArticlesmithError::provider(format!("gemini: {msg}")));
    }

    let candidate = &data["candidates"][0];
    let content = &candidate["content"];

    let text = content["parts"][0]["text"]
        .as_str()
        .or_else(|| content["text"].as_str())
        .or_else(|| {
            content["parts"]
                .as_array()
                .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
        })
        .filter(|t| !t.is_empty());

    if let Some(text) = text {
        return Ok(text.to_string());
    }

    if candidate["finishReason"].as_str() == Some("MAX_TOKENS") {
        warn!("gemini response truncated at token limit");
        return Err(ArticlesmithError::provider(
            "gemini: response was truncated due to token limit",
        ));
    }

    if !content.is_null() {
        if let Some(thoughts) = data["usageMetadata"]["thoughtsTokenCount"].as_u64() {
            warn!(thoughts, "gemini spent its budget on thinking tokens");
            return Err(ArticlesmithError::provider(
                "gemini: model used all tokens for thinking and produced no text output",
            ));
        }
    }

    Err(ArticlesmithError::provider(
        "gemini: unexpected response structure",
    ))
}
