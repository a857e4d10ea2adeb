//! External capabilities used by the generation pipeline.
//!
//! Each capability is an object-safe trait so the pipeline can run against
//! real HTTP clients in production and against mock servers or in-memory
//! fakes in tests:
//! - [`TextGenerator`]: prompt in, text out ([`GeminiClient`])
//! - [`ImageSearch`]: query in, image hits out ([`PexelsClient`], [`UnsplashClient`])
//! - [`Researcher`]: query in, research summary out ([`PerplexityClient`])

mod gemini;
mod images;
mod research;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use articlesmith_shared::{ArticlesmithError, GenerationSettings, Result};

pub use gemini::GeminiClient;
pub use images::{PexelsClient, UnavailableImageSearch, UnsplashClient};
pub use research::PerplexityClient;

/// User-Agent string for outbound requests.
pub const USER_AGENT: &str = concat!("articlesmith/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Text generation (outline and body composition).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, max_tokens: u32, temperature: f32)
    -> Result<String>;
}

/// Stock image search.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Return up to `count` hits, best first. An empty list is not an error.
    async fn search_images(&self, query: &str, count: usize) -> Result<Vec<ImageHit>>;
}

/// Optional research capability that grounds the content prompt.
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, query: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Image hits
// ---------------------------------------------------------------------------

/// Supported image backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    Pexels,
    Unsplash,
}

impl ImageProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pexels => "pexels",
            Self::Unsplash => "unsplash",
        }
    }

    /// Credit line shown under an image. Empty when the photographer is unknown.
    pub fn attribution(self, photographer: &str) -> String {
        let photographer = photographer.trim();
        if photographer.is_empty() {
            return String::new();
        }
        match self {
            Self::Pexels => format!("Photo by {photographer} from Pexels"),
            Self::Unsplash => format!("Photo by {photographer} on Unsplash"),
        }
    }
}

impl std::str::FromStr for ImageProvider {
    type Err = ArticlesmithError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pexels" => Ok(Self::Pexels),
            "unsplash" => Ok(Self::Unsplash),
            other => Err(ArticlesmithError::config(format!(
                "unknown image provider: {other:?} (expected \"pexels\" or \"unsplash\")"
            ))),
        }
    }
}

/// One result from an image search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHit {
    pub provider: ImageProvider,
    pub remote_url: String,
    pub description: String,
    pub photographer: String,
}

impl ImageHit {
    pub fn attribution(&self) -> String {
        self.provider.attribution(&self.photographer)
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with the shared user agent and a per-call timeout.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ArticlesmithError::transport(format!("failed to build HTTP client: {e}")))
}

/// Select the configured image backend.
///
/// An unknown provider name does not fail construction: the returned search
/// reports the configuration error on every call, so image stages degrade
/// instead of aborting the job.
pub fn image_search_from_settings(settings: &GenerationSettings) -> Result<Arc<dyn ImageSearch>> {
    let provider = match settings.image_provider.parse::<ImageProvider>() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(provider = %settings.image_provider, "image search disabled: {e}");
            return Ok(Arc::new(UnavailableImageSearch::new(e.to_string())));
        }
    };

    let search: Arc<dyn ImageSearch> = match provider {
        ImageProvider::Pexels => Arc::new(PexelsClient::new(
            settings.pexels_api_key.clone(),
            &settings.pexels_base_url,
            settings.image_timeout_secs,
        )?),
        ImageProvider::Unsplash => Arc::new(UnsplashClient::new(
            settings.unsplash_api_key.clone(),
            &settings.unsplash_base_url,
            settings.image_timeout_secs,
        )?),
    };
    Ok(search)
}

/// Build the research capability if a key is configured.
pub fn researcher_from_settings(
    settings: &GenerationSettings,
) -> Result<Option<Arc<dyn Researcher>>> {
    let Some(key) = settings.research_api_key.clone() else {
        return Ok(None);
    };
    let client = PerplexityClient::new(
        key,
        &settings.research_model,
        &settings.research_base_url,
        settings.research_timeout_secs,
    )?;
    Ok(Some(Arc::new(client)))
}

/// Truncate a response body for logging.
pub(crate) fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
