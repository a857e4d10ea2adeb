//! Application configuration for articlesmith.
//!
//! User config lives at `~/.articlesmith/articlesmith.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file, only the names of the env vars
//! that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArticlesmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "articlesmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".articlesmith";

// ---------------------------------------------------------------------------
// Config structs (matching articlesmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation capability.
    #[serde(default)]
    pub text: TextConfig,

    /// Image-search capability.
    #[serde(default)]
    pub images: ImagesConfig,

    /// Optional research capability.
    #[serde(default)]
    pub research: ResearchConfig,

    /// Link injection caps.
    #[serde(default)]
    pub links: LinksConfig,

    /// Publishing behavior and prompt override.
    #[serde(default)]
    pub publishing: PublishingConfig,

    /// Database and asset locations.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[text]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    /// Name of the env var holding the Gemini API key.
    #[serde(default = "default_text_key_env")]
    pub api_key_env: String,

    /// Model id used for every text-generation call.
    #[serde(default = "default_text_model")]
    pub model: String,

    /// API base URL (overridable for testing).
    #[serde(default = "default_text_base_url")]
    pub base_url: String,

    /// Per-call timeout.
    #[serde(default = "default_text_timeout")]
    pub timeout_secs: u64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_text_key_env(),
            model: default_text_model(),
            base_url: default_text_base_url(),
            timeout_secs: default_text_timeout(),
        }
    }
}

fn default_text_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_text_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_text_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_text_timeout() -> u64 {
    60
}

/// `[images]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Active backend: "pexels" or "unsplash".
    #[serde(default = "default_image_provider")]
    pub provider: String,

    #[serde(default = "default_pexels_key_env")]
    pub pexels_api_key_env: String,

    #[serde(default = "default_pexels_base_url")]
    pub pexels_base_url: String,

    #[serde(default = "default_unsplash_key_env")]
    pub unsplash_api_key_env: String,

    #[serde(default = "default_unsplash_base_url")]
    pub unsplash_base_url: String,

    /// Maximum in-body images per article.
    #[serde(default = "default_max_content_images")]
    pub max_content_images: usize,

    /// Per-call timeout for searches and downloads.
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            provider: default_image_provider(),
            pexels_api_key_env: default_pexels_key_env(),
            pexels_base_url: default_pexels_base_url(),
            unsplash_api_key_env: default_unsplash_key_env(),
            unsplash_base_url: default_unsplash_base_url(),
            max_content_images: default_max_content_images(),
            timeout_secs: default_image_timeout(),
        }
    }
}

fn default_image_provider() -> String {
    "pexels".into()
}
fn default_pexels_key_env() -> String {
    "PEXELS_API_KEY".into()
}
fn default_pexels_base_url() -> String {
    "https://api.pexels.com".into()
}
fn default_unsplash_key_env() -> String {
    "UNSPLASH_API_KEY".into()
}
fn default_unsplash_base_url() -> String {
    "https://api.unsplash.com".into()
}
fn default_max_content_images() -> usize {
    2
}
fn default_image_timeout() -> u64 {
    30
}

/// `[research]` section. Leaving the env var unset disables research.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_research_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_research_model")]
    pub model: String,

    #[serde(default = "default_research_base_url")]
    pub base_url: String,

    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_research_key_env(),
            model: default_research_model(),
            base_url: default_research_base_url(),
            timeout_secs: default_image_timeout(),
        }
    }
}

fn default_research_key_env() -> String {
    "PERPLEXITY_API_KEY".into()
}
fn default_research_model() -> String {
    "sonar-pro".into()
}
fn default_research_base_url() -> String {
    "https://api.perplexity.ai".into()
}

/// `[links]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_max_links")]
    pub max_internal: usize,

    #[serde(default = "default_max_links")]
    pub max_external: usize,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            max_internal: default_max_links(),
            max_external: default_max_links(),
        }
    }
}

fn default_max_links() -> usize {
    3
}

/// `[publishing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// New articles created by `apply` are saved as drafts.
    #[serde(default = "default_true")]
    pub auto_draft: bool,

    /// Custom content prompt template. Empty means the built-in default.
    #[serde(default)]
    pub custom_prompt: String,

    /// Lifetime of a generated result in the cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            auto_draft: true,
            custom_prompt: String::new(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cache_ttl() -> u64 {
    3600
}

/// `[storage]` section. Relative paths resolve against the config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            assets_dir: default_assets_dir(),
        }
    }
}

fn default_database_path() -> String {
    "articlesmith.db".into()
}
fn default_assets_dir() -> String {
    "assets".into()
}

// ---------------------------------------------------------------------------
// Generation settings (runtime, resolved once per job)
// ---------------------------------------------------------------------------

/// Runtime configuration for one generation job, resolved from [`AppConfig`]
/// and the environment. Threaded explicitly through every pipeline stage.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub text_api_key: Option<String>,
    pub text_model: String,
    pub text_base_url: String,
    pub text_timeout_secs: u64,

    pub image_provider: String,
    pub pexels_api_key: Option<String>,
    pub pexels_base_url: String,
    pub unsplash_api_key: Option<String>,
    pub unsplash_base_url: String,
    pub image_timeout_secs: u64,
    pub max_content_images: usize,

    pub research_api_key: Option<String>,
    pub research_model: String,
    pub research_base_url: String,
    pub research_timeout_secs: u64,

    pub max_internal_links: usize,
    pub max_external_links: usize,

    pub auto_draft: bool,
    pub custom_prompt: Option<String>,
    pub cache_ttl_secs: u64,
}

impl GenerationSettings {
    /// Resolve settings from config, reading each API key env var once.
    pub fn resolve(config: &AppConfig) -> Self {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings with a custom key lookup (used by tests).
    pub fn resolve_with(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let key = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let custom_prompt = Some(config.publishing.custom_prompt.clone())
            .filter(|p| !p.trim().is_empty());

        Self {
            text_api_key: key(&config.text.api_key_env),
            text_model: config.text.model.clone(),
            text_base_url: config.text.base_url.clone(),
            text_timeout_secs: config.text.timeout_secs,
            image_provider: config.images.provider.clone(),
            pexels_api_key: key(&config.images.pexels_api_key_env),
            pexels_base_url: config.images.pexels_base_url.clone(),
            unsplash_api_key: key(&config.images.unsplash_api_key_env),
            unsplash_base_url: config.images.unsplash_base_url.clone(),
            image_timeout_secs: config.images.timeout_secs,
            max_content_images: config.images.max_content_images,
            research_api_key: key(&config.research.api_key_env),
            research_model: config.research.model.clone(),
            research_base_url: config.research.base_url.clone(),
            research_timeout_secs: config.research.timeout_secs,
            max_internal_links: config.links.max_internal,
            max_external_links: config.links.max_external,
            auto_draft: config.publishing.auto_draft,
            custom_prompt,
            cache_ttl_secs: config.publishing.cache_ttl_secs,
        }
    }

    /// Whether the optional research capability is configured.
    pub fn research_enabled(&self) -> bool {
        self.research_api_key.is_some()
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::resolve_with(&AppConfig::default(), |_| None)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.articlesmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArticlesmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.articlesmith/articlesmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve a configured storage path against the config directory.
pub fn resolve_storage_path(raw: &str) -> Result<PathBuf> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(config_dir()?.join(path))
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ArticlesmithError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ArticlesmithError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ArticlesmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ArticlesmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ArticlesmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the text-generation API key env var is set and non-empty.
pub fn validate_text_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.text.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(()),
        _ => Err(ArticlesmithError::config(format!(
            "Gemini API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://ai.google.dev/gemini-api/docs/api-key"
        ))),
    }
}
