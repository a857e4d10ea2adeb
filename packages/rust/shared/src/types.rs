//! Core domain types for article generation jobs and the host article store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArticlesmithError, Result};

/// Placement marker for the featured image.
pub const FEATURED_PLACEMENT: &str = "featured";

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for generation job identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Job status and stage
// ---------------------------------------------------------------------------

/// Coarse outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

/// Pipeline stage. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStage {
    Pending,
    ComposingOutline,
    ComposingContent,
    InjectingLinks,
    SourcingMedia,
    Success,
    Failed,
}

impl JobStage {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::ComposingOutline => 1,
            Self::ComposingContent => 2,
            Self::InjectingLinks => 3,
            Self::SourcingMedia => 4,
            Self::Success => 5,
            Self::Failed => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ComposingOutline => "composing-outline",
            Self::ComposingContent => "composing-content",
            Self::InjectingLinks => "injecting-links",
            Self::SourcingMedia => "sourcing-media",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outline, images, links
// ---------------------------------------------------------------------------

/// One heading of an article outline. `position` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub position: usize,
    pub heading: String,
}

impl OutlineItem {
    /// Number a list of headings in order.
    pub fn numbered(headings: impl IntoIterator<Item = String>) -> Vec<Self> {
        headings
            .into_iter()
            .enumerate()
            .map(|(i, heading)| Self {
                position: i + 1,
                heading,
            })
            .collect()
    }
}

/// An image sourced for an article and persisted into durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Provider identifier (`pexels`, `unsplash`).
    pub provider: String,
    /// URL the image was downloaded from.
    pub source_url: String,
    /// Opaque handle returned by the asset store.
    pub local_ref: String,
    pub alt_text: String,
    pub attribution: String,
    /// Heading text, or [`FEATURED_PLACEMENT`].
    pub placement: String,
}

impl ImageAsset {
    pub fn is_featured(&self) -> bool {
        self.placement == FEATURED_PLACEMENT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Internal,
    External,
}

/// A hyperlink produced by the link injector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCandidate {
    pub anchor_text: String,
    pub url: String,
    pub kind: LinkKind,
    /// False when the candidate was left as bare text.
    pub resolved: bool,
}

// ---------------------------------------------------------------------------
// GenerationJob
// ---------------------------------------------------------------------------

/// One in-flight article generation, mutated stage by stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub topic: String,
    pub primary_keyword: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub outline: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    /// First entry is the primary keyword source.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<ImageAsset>,
    #[serde(default)]
    pub content_images: Vec<ImageAsset>,
    pub status: JobStatus,
    pub stage: JobStage,
    #[serde(default)]
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            topic: topic.into(),
            primary_keyword: String::new(),
            title: String::new(),
            slug: String::new(),
            outline: Vec::new(),
            content: String::new(),
            excerpt: String::new(),
            keywords: Vec::new(),
            featured_image: None,
            content_images: Vec::new(),
            status: JobStatus::Pending,
            stage: JobStage::Pending,
            errors: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Move to `next`. Rejects backward moves and moves out of a terminal stage.
    pub fn advance(&mut self, next: JobStage) -> Result<()> {
        if self.stage.is_terminal() || next.rank() <= self.stage.rank() {
            return Err(ArticlesmithError::validation(format!(
                "illegal stage transition {} -> {}",
                self.stage, next
            )));
        }
        self.stage = next;
        self.status = match next {
            JobStage::Success => JobStatus::Success,
            JobStage::Failed => JobStatus::Failed,
            _ => JobStatus::Pending,
        };
        Ok(())
    }

    /// Record a non-fatal error entry.
    pub fn record_error(&mut self, err: &ArticlesmithError) {
        self.errors.push(err.to_string());
    }

    /// Append the triggering error and move to `failed`.
    pub fn fail(&mut self, err: &ArticlesmithError) {
        self.record_error(err);
        if !self.stage.is_terminal() {
            self.stage = JobStage::Failed;
            self.status = JobStatus::Failed;
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Host article store
// ---------------------------------------------------------------------------

/// A published work available as an internal-link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedWork {
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

impl ArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = ArticlesmithError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(ArticlesmithError::validation(format!(
                "unknown article status: {other}"
            ))),
        }
    }
}

/// An article in the host store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Public URL, used when the article becomes an internal-link target.
    #[serde(default)]
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    pub status: ArticleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub primary_keyword: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// True when the body came from a generation job.
    #[serde(default)]
    pub generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Boundary envelopes
// ---------------------------------------------------------------------------

/// Result of `start_generation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub data: Option<GenerationJob>,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Where `apply_generation` writes the generated article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyTarget {
    /// Insert a new article.
    New,
    /// Overwrite an existing article and force it back to draft.
    Existing(String),
}

/// Result of `apply_generation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
}
