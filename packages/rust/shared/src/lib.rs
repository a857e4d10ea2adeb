//! Shared types, error model, and configuration for articlesmith.
//!
//! This crate is the foundation depended on by all other articlesmith crates.
//! It provides:
//! - [`ArticlesmithError`], the unified error type
//! - Domain types ([`GenerationJob`], [`ImageAsset`], [`Article`], [`PublishedWork`])
//! - Configuration ([`AppConfig`], [`GenerationSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GenerationSettings, ImagesConfig, LinksConfig, PublishingConfig, ResearchConfig,
    StorageConfig, TextConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_storage_path, validate_text_api_key,
};
pub use error::{ArticlesmithError, Result};
pub use types::{
    ApplyResponse, ApplyTarget, Article, ArticleStatus, FEATURED_PLACEMENT, GenerationJob,
    GenerationResponse, ImageAsset, JobId, JobStage, JobStatus, LinkCandidate, LinkKind,
    OutlineItem, PublishedWork,
};
