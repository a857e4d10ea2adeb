//! Perplexity chat-completions client used for research context.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use articlesmith_shared::{ArticlesmithError, Result};

use crate::{Researcher, build_client, excerpt};

const SYSTEM_PROMPT: &str = "Act as a professional news researcher who is capable of finding \
detailed summaries about a news topic from highly reputable sources.";

pub struct PerplexityClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl PerplexityClient {
    pub fn new(api_key: String, model: &str, base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Researcher for PerplexityClient {
    #[instrument(skip_all, fields(model = %self.model, query = %query))]
    async fn research(&self, query: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": query}
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ArticlesmithError::transport(format!("perplexity: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ArticlesmithError::transport(format!("perplexity: failed to read body: {e}"))
        })?;
        debug!(%status, body = excerpt(&text), "perplexity response");

        if !status.is_success() {
            return Err(ArticlesmithError::transport(format!(
                "perplexity: HTTP {status}: {}",
                excerpt(&text)
            )));
        }

        let data: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if let Some(msg) = data["error"]["message"].as_str() {
            return Err(ArticlesmithError::provider(format!("perplexity: {msg}")));
        }

        // Fall back to the raw body when the completion shape is absent.
        match data["choices"][0]["message"]["content"].as_str() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            _ => Ok(text),
        }
    }
}
