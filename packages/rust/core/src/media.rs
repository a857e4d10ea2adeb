//! Featured and in-content image sourcing.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument, warn};

use articlesmith_markup::strip_tags;
use articlesmith_providers::{ImageHit, ImageSearch};
use articlesmith_shared::{ArticlesmithError, FEATURED_PLACEMENT, ImageAsset, Result};

use crate::assets::AssetStore;

/// Default timeout for image downloads.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Words dropped from headings before searching.
const SEARCH_STOPWORDS: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "how", "what",
    "why", "when", "where", "who",
];

const SEARCH_TERM_WORDS: usize = 3;

/// Image search term for a section heading: tags stripped, lowercased,
/// stopwords removed, first three words kept.
pub fn search_term(heading: &str) -> String {
    strip_tags(heading)
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !SEARCH_STOPWORDS.contains(w))
        .take(SEARCH_TERM_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Downloaded image body.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Fetch an image. Non-2xx is a transport error, an empty body a provider
/// error.
pub async fn download(http: &Client, url: &str) -> Result<Download> {
    let response = http
        .get(url)
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| ArticlesmithError::transport(format!("download {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ArticlesmithError::transport(format!(
            "download {url}: HTTP {status}"
        )));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ArticlesmithError::transport(format!("download {url}: {e}")))?;
    if bytes.is_empty() {
        return Err(ArticlesmithError::provider(format!(
            "download {url}: empty body"
        )));
    }

    Ok(Download {
        bytes: bytes.to_vec(),
        content_type,
    })
}

/// Sources images through a search backend and persists them to an asset
/// store.
pub struct MediaSourcer<'a> {
    pub images: &'a dyn ImageSearch,
    pub assets: &'a dyn AssetStore,
    pub http: &'a Client,
}

impl MediaSourcer<'_> {
    /// Top hit for the primary keyword, stored and marked as featured.
    #[instrument(skip_all, fields(keyword = %keyword))]
    pub async fn featured_image(&self, keyword: &str, title: &str) -> Result<ImageAsset> {
        let hit = self.top_hit(keyword).await?.ok_or_else(|| {
            ArticlesmithError::provider(format!("no featured image found for {keyword:?}"))
        })?;
        let asset = self.persist(hit, title, FEATURED_PLACEMENT).await?;
        info!(local_ref = %asset.local_ref, "featured image stored");
        Ok(asset)
    }

    /// One image per heading, in order, until `cap` images are stored.
    ///
    /// Per-heading failures are logged and skipped.
    #[instrument(skip_all, fields(headings = headings.len(), cap = cap))]
    pub async fn content_images(&self, headings: &[String], cap: usize) -> Vec<ImageAsset> {
        let mut stored = Vec::new();

        for heading in headings {
            if stored.len() >= cap {
                break;
            }

            let term = search_term(heading);
            if term.is_empty() {
                debug!(heading = %heading, "no search term, skipping");
                continue;
            }

            let hit = match self.top_hit(&term).await {
                Ok(Some(hit)) => hit,
                Ok(None) => {
                    warn!(term = %term, "no image found for heading");
                    continue;
                }
                Err(e) => {
                    warn!(term = %term, error = %e, "image search failed for heading");
                    continue;
                }
            };

            match self.persist(hit, &strip_tags(heading), heading).await {
                Ok(asset) => stored.push(asset),
                Err(e) => warn!(heading = %heading, error = %e, "image could not be stored"),
            }
        }

        info!(count = stored.len(), "content images stored");
        stored
    }

    async fn top_hit(&self, query: &str) -> Result<Option<ImageHit>> {
        Ok(self.images.search_images(query, 1).await?.into_iter().next())
    }

    async fn persist(&self, hit: ImageHit, alt_text: &str, placement: &str) -> Result<ImageAsset> {
        let download = download(self.http, &hit.remote_url).await?;
        let local_ref = self
            .assets
            .store(&download.bytes, download.content_type.as_deref())
            .await?;

        Ok(ImageAsset {
            provider: hit.provider.as_str().to_string(),
            attribution: hit.attribution(),
            source_url: hit.remote_url,
            local_ref,
            alt_text: alt_text.to_string(),
            placement: placement.to_string(),
        })
    }
}
