//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use uuid::Uuid;

use articlesmith_core::keyword::slugify;
use articlesmith_core::{GenerationService, GenerationSummary, ProgressReporter};
use articlesmith_shared::{
    AppConfig, ApplyTarget, Article, ArticleStatus, GenerationJob, GenerationSettings, JobStage,
    init_config, load_config, resolve_storage_path, validate_text_api_key,
};
use articlesmith_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// articlesmith: AI-assisted article generation.
#[derive(Parser)]
#[command(
    name = "articlesmith",
    version,
    about = "Generate SEO-ready articles from a topic and apply them to a local article store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate an article for a topic and cache it under a token.
    Generate {
        /// Topic or keyword to write about.
        topic: String,

        /// Identity embedded in the cache token. Defaults to the OS user name.
        #[arg(long)]
        identity: Option<String>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply a cached generation to the article store.
    Apply {
        /// Token printed by `generate`.
        #[arg(long)]
        token: String,

        /// Overwrite this existing article instead of creating one.
        #[arg(long)]
        post: Option<String>,
    },

    /// Manage published works used as internal-link targets.
    Works {
        #[command(subcommand)]
        action: WorksAction,
    },

    /// Generation cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Works subcommands.
#[derive(Subcommand)]
pub(crate) enum WorksAction {
    /// Register an existing article.
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        url: String,

        /// Store as a draft (drafts are never linked).
        #[arg(long)]
        draft: bool,
    },
    /// List stored articles.
    List {
        /// Only show articles with this status (draft or published).
        #[arg(long)]
        status: Option<String>,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Delete expired generation results.
    Purge,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "articlesmith=info",
        1 => "articlesmith=debug",
        _ => "articlesmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            topic,
            identity,
            json,
        } => {
            let identity = identity.unwrap_or_else(|| default_identity(|k| std::env::var(k).ok()));
            cmd_generate(&topic, &identity, json).await
        }
        Command::Apply { token, post } => cmd_apply(&token, post).await,
        Command::Works { action } => match action {
            WorksAction::Add { title, url, draft } => cmd_works_add(&title, &url, draft).await,
            WorksAction::List { status } => cmd_works_list(status.as_deref()).await,
        },
        Command::Cache { action } => match action {
            CacheAction::Purge => cmd_cache_purge().await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// OS user name from `USER` or `USERNAME`, else `"cli"`.
fn default_identity(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["USER", "USERNAME"]
        .into_iter()
        .filter_map(&lookup)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "cli".to_string())
}

async fn open_storage(config: &AppConfig) -> Result<Arc<Storage>> {
    let path = resolve_storage_path(&config.storage.database_path)?;
    Ok(Arc::new(Storage::open(&path).await?))
}

async fn service(config: &AppConfig) -> Result<GenerationService> {
    let storage = open_storage(config).await?;
    let settings = GenerationSettings::resolve(config);
    let assets_dir = resolve_storage_path(&config.storage.assets_dir)?;
    Ok(GenerationService::from_settings(storage, settings, assets_dir)?)
}

async fn cmd_generate(topic: &str, identity: &str, json: bool) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    validate_text_api_key(&config)?;

    info!(topic, identity, "generating article");

    let service = service(&config).await?;
    let reporter = CliProgress::new();
    let response = service.start_generation(topic, identity, &reporter).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let Some(job) = response.data.as_ref().filter(|_| response.success) else {
        return Err(eyre!("generation failed:\n  {}", response.errors.join("\n  ")));
    };

    let summary = GenerationSummary::of(job);
    println!();
    println!("  Article generated!");
    println!("  Title:    {}", summary.title);
    println!("  Slug:     {}", summary.slug);
    println!("  Words:    {}", summary.word_count);
    println!("  Keywords: {}", summary.keywords.join(", "));
    println!(
        "  Images:   {} featured, {} in content",
        if summary.has_featured_image { 1 } else { 0 },
        summary.content_images
    );
    if !response.errors.is_empty() {
        println!("  Warnings:");
        for error in &response.errors {
            println!("    - {error}");
        }
    }
    if let Some(token) = &response.token {
        println!("  Token:    {token}");
        println!();
        println!("  Apply with: articlesmith apply --token {token}");
    }
    println!();

    Ok(())
}

async fn cmd_apply(token: &str, post: Option<String>) -> Result<()> {
    let config = load_config()?;
    let service = service(&config).await?;

    let target = match post {
        Some(id) => ApplyTarget::Existing(id),
        None => ApplyTarget::New,
    };
    let response = service.apply_generation(token, &target).await;
    if !response.success {
        return Err(eyre!("{}", response.message));
    }

    println!("{}", response.message);
    if let Some(id) = &response.article_id {
        println!("  Article: {id}");
    }
    for warning in &response.errors {
        println!("  Warning: {warning}");
    }
    Ok(())
}

async fn cmd_works_add(title: &str, url: &str, draft: bool) -> Result<()> {
    if title.trim().is_empty() || url.trim().is_empty() {
        return Err(eyre!("both --title and --url are required"));
    }

    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let now = Utc::now();
    let (status, published_at) = if draft {
        (ArticleStatus::Draft, None)
    } else {
        (ArticleStatus::Published, Some(now))
    };
    let article = Article {
        id: Uuid::now_v7().to_string(),
        title: title.trim().to_string(),
        slug: slugify(title, now.year()),
        url: url.trim().to_string(),
        content: String::new(),
        excerpt: String::new(),
        status,
        featured_image: None,
        primary_keyword: String::new(),
        keywords: Vec::new(),
        generated: false,
        generated_at: None,
        published_at,
        updated_at: now,
    };
    storage.insert_article(&article).await?;

    info!(id = %article.id, status = status.as_str(), "work registered");
    println!("Registered {} ({})", article.id, status.as_str());
    Ok(())
}

async fn cmd_works_list(status: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let path = resolve_storage_path(&config.storage.database_path)?;
    if !path.exists() {
        println!("No articles yet.");
        return Ok(());
    }

    let status = status.map(str::parse::<ArticleStatus>).transpose()?;
    let storage = Storage::open_readonly(&path).await?;
    let articles = storage.list_articles(status).await?;

    if articles.is_empty() {
        println!("No articles yet.");
        return Ok(());
    }

    println!("{:<38} {:<10} {:<9} TITLE", "ID", "STATUS", "GENERATED");
    for article in &articles {
        println!(
            "{:<38} {:<10} {:<9} {}",
            article.id,
            article.status.as_str(),
            if article.generated { "yes" } else { "no" },
            article.title
        );
    }
    Ok(())
}

async fn cmd_cache_purge() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let removed = storage.purge_expired_cache().await?;
    println!("Removed {removed} expired cache entries");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner.set_message("Deriving title");
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: JobStage) {
        let message = match stage {
            JobStage::ComposingOutline => "Composing outline",
            JobStage::ComposingContent => "Researching and writing content",
            JobStage::InjectingLinks => "Injecting links",
            JobStage::SourcingMedia => "Sourcing images",
            other => other.as_str(),
        };
        self.spinner.set_message(message.to_string());
    }

    fn done(&self, _job: &GenerationJob) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_user_then_username() {
        let both = |k: &str| match k {
            "USER" => Some("ada".to_string()),
            "USERNAME" => Some("ADA-PC".to_string()),
            _ => None,
        };
        assert_eq!(default_identity(both), "ada");

        let windows = |k: &str| (k == "USERNAME").then(|| "grace".to_string());
        assert_eq!(default_identity(windows), "grace");
    }

    #[test]
    fn identity_falls_back_to_cli() {
        assert_eq!(default_identity(|_| None), "cli");
        assert_eq!(default_identity(|_| Some("  ".to_string())), "cli");
    }

    #[test]
    fn generate_identity_flag_is_optional() {
        let cli = Cli::try_parse_from(["articlesmith", "generate", "electric cars"]).unwrap();
        match cli.command {
            Command::Generate { identity, .. } => assert!(identity.is_none()),
            _ => panic!("expected generate"),
        }

        let args = ["articlesmith", "generate", "x", "--identity", "bob"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Generate { identity, .. } => assert_eq!(identity.as_deref(), Some("bob")),
            _ => panic!("expected generate"),
        }
    }
}
