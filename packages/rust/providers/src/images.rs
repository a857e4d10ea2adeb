//! Stock image search clients (Pexels, Unsplash).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use articlesmith_shared::{ArticlesmithError, Result};

use crate::{ImageHit, ImageProvider, ImageSearch, build_client, excerpt};

// ---------------------------------------------------------------------------
// Pexels
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
    #[serde(default)]
    alt: Option<String>,
    #[serde(default)]
    photographer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    large: String,
}

pub struct PexelsClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl PexelsClient {
    pub fn new(api_key: Option<String>, base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageSearch for PexelsClient {
    #[instrument(skip_all, fields(provider = "pexels", query = %query, count = count))]
    async fn search_images(&self, query: &str, count: usize) -> Result<Vec<ImageHit>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ArticlesmithError::config("Pexels API key is required"))?;

        let request = self
            .client
            .get(format!("{}/v1/search", self.base_url))
            .header("Authorization", key)
            .query(&search_params(query, count));

        let parsed: PexelsResponse = send_json(request, "pexels").await?;
        let hits: Vec<ImageHit> = parsed
            .photos
            .into_iter()
            .take(count)
            .map(|p| ImageHit {
                provider: ImageProvider::Pexels,
                remote_url: p.src.large,
                description: p.alt.unwrap_or_default(),
                photographer: p.photographer.unwrap_or_default(),
            })
            .collect();

        debug!(hits = hits.len(), "pexels search complete");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Unsplash
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UnsplashResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
    #[serde(default)]
    alt_description: Option<String>,
    #[serde(default)]
    user: Option<UnsplashUser>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashUser {
    #[serde(default)]
    name: Option<String>,
}

pub struct UnsplashClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl UnsplashClient {
    pub fn new(api_key: Option<String>, base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageSearch for UnsplashClient {
    #[instrument(skip_all, fields(provider = "unsplash", query = %query, count = count))]
    async fn search_images(&self, query: &str, count: usize) -> Result<Vec<ImageHit>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ArticlesmithError::config("Unsplash API key is required"))?;

        let request = self
            .client
            .get(format!("{}/search/photos", self.base_url))
            .header("Authorization", format!("Client-ID {key}"))
            .query(&search_params(query, count));

        let parsed: UnsplashResponse = send_json(request, "unsplash").await?;
        let hits: Vec<ImageHit> = parsed
            .results
            .into_iter()
            .take(count)
            .map(|p| ImageHit {
                provider: ImageProvider::Unsplash,
                remote_url: p.urls.regular,
                description: p.alt_description.unwrap_or_default(),
                photographer: p.user.and_then(|u| u.name).unwrap_or_default(),
            })
            .collect();

        debug!(hits = hits.len(), "unsplash search complete");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Unavailable backend
// ---------------------------------------------------------------------------

/// Stand-in used when the configured provider cannot be built.
/// Every search fails with the stored configuration error.
pub struct UnavailableImageSearch {
    reason: String,
}

impl UnavailableImageSearch {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ImageSearch for UnavailableImageSearch {
    async fn search_images(&self, _query: &str, _count: usize) -> Result<Vec<ImageHit>> {
        Err(ArticlesmithError::config(self.reason.clone()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn search_params(query: &str, count: usize) -> [(&'static str, String); 3] {
    [
        ("query", query.to_string()),
        ("per_page", count.max(1).to_string()),
        ("orientation", "landscape".to_string()),
    ]
}

async fn send_json<T: serde::de::DeserializeOwned>(
    request: RequestBuilder,
    provider: &str,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| ArticlesmithError::transport(format!("{provider}: {e}")))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        ArticlesmithError::transport(format!("{provider}: failed to read body: {e}"))
    })?;

    if !status.is_success() {
        return Err(ArticlesmithError::transport(format!(
            "{provider}: HTTP {status}: {}",
            excerpt(&body)
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        ArticlesmithError::provider(format!("{provider}: unrecognized search response: {e}"))
    })
}
