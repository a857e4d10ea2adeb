//! Boundary operations: start a generation and apply its result.
//!
//! `start_generation` runs the pipeline and parks a successful job in the
//! generation cache under a token. `apply_generation` consumes that token
//! exactly once, writing the job into the article store.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use articlesmith_markup::word_count;
use articlesmith_shared::{
    ApplyResponse, ApplyTarget, Article, ArticleStatus, ArticlesmithError, GenerationJob,
    GenerationResponse, GenerationSettings, Result,
};
use articlesmith_storage::Storage;

use crate::assets::FsAssetStore;
use crate::catalog::WorkCatalog;
use crate::pipeline::{Capabilities, ProgressReporter, run_pipeline};

/// Cache token for a job started by `identity` at `unix_secs`.
pub fn generation_token(identity: &str, unix_secs: i64) -> String {
    let identity = identity.trim();
    let identity = if identity.is_empty() { "anonymous" } else { identity };
    format!("generated_{identity}_{unix_secs}")
}

/// Short report of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub title: String,
    pub slug: String,
    pub word_count: usize,
    pub keywords: Vec<String>,
    pub has_featured_image: bool,
    pub content_images: usize,
}

impl GenerationSummary {
    pub fn of(job: &GenerationJob) -> Self {
        Self {
            title: job.title.clone(),
            slug: job.slug.clone(),
            word_count: word_count(&job.content),
            keywords: job.keywords.clone(),
            has_featured_image: job.featured_image.is_some(),
            content_images: job.content_images.len(),
        }
    }
}

/// Runs generations and applies them to the article store.
pub struct GenerationService {
    storage: Arc<Storage>,
    caps: Capabilities,
    settings: GenerationSettings,
}

impl GenerationService {
    pub fn new(storage: Arc<Storage>, caps: Capabilities, settings: GenerationSettings) -> Self {
        Self {
            storage,
            caps,
            settings,
        }
    }

    /// Production wiring: HTTP capabilities, the store as work catalog, and
    /// images written under `assets_dir`.
    pub fn from_settings(
        storage: Arc<Storage>,
        settings: GenerationSettings,
        assets_dir: PathBuf,
    ) -> Result<Self> {
        let works: Arc<dyn WorkCatalog> = storage.clone();
        let assets = Arc::new(FsAssetStore::new(assets_dir));
        let caps = Capabilities::from_settings(&settings, works, assets)?;
        Ok(Self::new(storage, caps, settings))
    }

    /// Generate an article for `topic` and cache it for later application.
    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn start_generation(
        &self,
        topic: &str,
        identity: &str,
        progress: &dyn ProgressReporter,
    ) -> GenerationResponse {
        if topic.trim().is_empty() {
            let err = ArticlesmithError::validation("topic must not be blank");
            return GenerationResponse {
                success: false,
                data: None,
                errors: vec![err.to_string()],
                token: None,
            };
        }

        let job = run_pipeline(topic, &self.caps, &self.settings, progress).await;
        if !job.is_success() {
            return GenerationResponse {
                success: false,
                data: None,
                errors: job.errors,
                token: None,
            };
        }

        let token = generation_token(identity, Utc::now().timestamp());
        if let Err(e) = self.cache_job(&token, &job).await {
            warn!(token = %token, error = %e, "generated job could not be cached");
            let mut errors = job.errors;
            errors.push(e.to_string());
            return GenerationResponse {
                success: false,
                data: None,
                errors,
                token: None,
            };
        }

        info!(token = %token, job_id = %job.id, "generation cached");
        GenerationResponse {
            success: true,
            errors: job.errors.clone(),
            data: Some(job),
            token: Some(token),
        }
    }

    async fn cache_job(&self, token: &str, job: &GenerationJob) -> Result<()> {
        let json = serde_json::to_string(job)
            .map_err(|e| ArticlesmithError::Storage(format!("failed to serialize job: {e}")))?;
        self.storage
            .put_cache_entry(token, &json, self.settings.cache_ttl_secs)
            .await
    }

    /// Write the cached job for `token` into the article store.
    #[instrument(skip_all, fields(token = %token))]
    pub async fn apply_generation(&self, token: &str, target: &ApplyTarget) -> ApplyResponse {
        match self.try_apply(token.trim(), target).await {
            Ok((article_id, message, errors)) => ApplyResponse {
                success: true,
                message: message.to_string(),
                errors,
                article_id: Some(article_id),
            },
            Err(e) => {
                warn!(error = %e, "apply rejected");
                ApplyResponse {
                    success: false,
                    message: e.to_string(),
                    errors: vec![e.to_string()],
                    article_id: None,
                }
            }
        }
    }

    async fn try_apply(
        &self,
        token: &str,
        target: &ApplyTarget,
    ) -> Result<(String, &'static str, Vec<String>)> {
        if token.is_empty() {
            return Err(ArticlesmithError::validation("missing token"));
        }

        let entry = self
            .storage
            .get_cache_entry(token)
            .await?
            .ok_or_else(|| {
                ArticlesmithError::validation("generated content not found or expired")
            })?;
        let job: GenerationJob = serde_json::from_str(&entry.job_json)
            .map_err(|e| ArticlesmithError::Storage(format!("corrupt cache entry: {e}")))?;

        if job.title.trim().is_empty() || job.content.trim().is_empty() {
            return Err(ArticlesmithError::validation(
                "generated content is missing a title or body",
            ));
        }

        let (article_id, message) = match target {
            ApplyTarget::New => self.create_article(&job).await?,
            ApplyTarget::Existing(id) => self.overwrite_article(id.trim(), &job).await?,
        };

        // The article is written; a leftover entry only expires later.
        let mut errors = Vec::new();
        if let Err(e) = self.storage.delete_cache_entry(token).await {
            warn!(error = %e, "applied cache entry could not be deleted");
            errors.push(e.to_string());
        }

        info!(article_id = %article_id, "generation applied");
        Ok((article_id, message, errors))
    }

    async fn create_article(&self, job: &GenerationJob) -> Result<(String, &'static str)> {
        let now = Utc::now();
        let (status, published_at, message) = if self.settings.auto_draft {
            (ArticleStatus::Draft, None, "Article saved as draft")
        } else {
            (ArticleStatus::Published, Some(now), "Article published")
        };

        let article = Article {
            id: job.id.to_string(),
            title: job.title.clone(),
            slug: job.slug.clone(),
            url: format!("/{}/", job.slug),
            content: job.content.clone(),
            excerpt: job.excerpt.clone(),
            status,
            featured_image: job.featured_image.as_ref().map(|i| i.local_ref.clone()),
            primary_keyword: job.primary_keyword.clone(),
            keywords: job.keywords.clone(),
            generated: true,
            generated_at: Some(now),
            published_at,
            updated_at: now,
        };
        self.storage.insert_article(&article).await?;
        Ok((article.id, message))
    }

    async fn overwrite_article(
        &self,
        id: &str,
        job: &GenerationJob,
    ) -> Result<(String, &'static str)> {
        if id.is_empty() {
            return Err(ArticlesmithError::validation("missing article id"));
        }
        let mut article = self
            .storage
            .get_article(id)
            .await?
            .ok_or_else(|| ArticlesmithError::validation(format!("article not found: {id}")))?;

        let now = Utc::now();
        article.title = job.title.clone();
        article.content = job.content.clone();
        article.slug = job.slug.clone();
        article.excerpt = job.excerpt.clone();
        article.keywords = job.keywords.clone();
        article.primary_keyword = job.primary_keyword.clone();
        if let Some(image) = &job.featured_image {
            article.featured_image = Some(image.local_ref.clone());
        }
        article.status = ArticleStatus::Draft;
        article.generated = true;
        article.generated_at = Some(now);
        article.updated_at = now;

        if !self.storage.update_article(&article).await? {
            return Err(ArticlesmithError::validation(format!("article not found: {id}")));
        }
        Ok((article.id, "Article updated and set to draft"))
    }
}
