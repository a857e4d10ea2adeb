//! libSQL storage layer (local mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the host article
//! store (published works used as internal-link targets, drafts written by
//! `apply`) and the short-lived generation cache addressed by token.
//!
//! **Access rules:**
//! - CLI commands that write: read-write via [`Storage::open`]
//! - Listing and inspection: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use libsql::{Connection, Database, params};

use articlesmith_shared::{Article, ArticleStatus, ArticlesmithError, PublishedWork, Result};

const ARTICLE_COLUMNS: &str = "id, title, slug, url, content, excerpt, status, featured_image, \
     primary_keyword, keywords_json, generated, generated_at, published_at, updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// A generation result parked under a token until it is applied or expires.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub token: String,
    pub job_json: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArticlesmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ArticlesmithError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ArticlesmithError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Article operations
    // -----------------------------------------------------------------------

    /// Insert a new article.
    pub async fn insert_article(&self, article: &Article) -> Result<()> {
        self.check_writable()?;
        let keywords = serde_json::to_string(&article.keywords)
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        let now = format_timestamp(&Utc::now());

        self.conn
            .execute(
                "INSERT INTO articles (id, title, slug, url, content, excerpt, status, featured_image,
                                       primary_keyword, keywords_json, generated, generated_at,
                                       published_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    article.id.as_str(),
                    article.title.as_str(),
                    article.slug.as_str(),
                    article.url.as_str(),
                    article.content.as_str(),
                    article.excerpt.as_str(),
                    article.status.as_str(),
                    article.featured_image.as_deref(),
                    article.primary_keyword.as_str(),
                    keywords.as_str(),
                    i64::from(article.generated),
                    article.generated_at.map(|t| format_timestamp(&t)),
                    article.published_at.map(|t| format_timestamp(&t)),
                    now.as_str(),
                    format_timestamp(&article.updated_at),
                ],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Overwrite an existing article. Returns `false` if no row has that id.
    pub async fn update_article(&self, article: &Article) -> Result<bool> {
        self.check_writable()?;
        let keywords = serde_json::to_string(&article.keywords)
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        let changed = self
            .conn
            .execute(
                "UPDATE articles SET
                   title = ?2, slug = ?3, url = ?4, content = ?5, excerpt = ?6, status = ?7,
                   featured_image = ?8, primary_keyword = ?9, keywords_json = ?10,
                   generated = ?11, generated_at = ?12, published_at = ?13, updated_at = ?14
                 WHERE id = ?1",
                params![
                    article.id.as_str(),
                    article.title.as_str(),
                    article.slug.as_str(),
                    article.url.as_str(),
                    article.content.as_str(),
                    article.excerpt.as_str(),
                    article.status.as_str(),
                    article.featured_image.as_deref(),
                    article.primary_keyword.as_str(),
                    keywords.as_str(),
                    i64::from(article.generated),
                    article.generated_at.map(|t| format_timestamp(&t)),
                    article.published_at.map(|t| format_timestamp(&t)),
                    format_timestamp(&article.updated_at),
                ],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Get an article by id.
    pub async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_article(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ArticlesmithError::Storage(e.to_string())),
        }
    }

    /// List articles, most recently updated first, optionally filtered by status.
    pub async fn list_articles(&self, status: Option<ArticleStatus>) -> Result<Vec<Article>> {
        let mut rows = match status {
            Some(status) => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE status = ?1
                             ORDER BY updated_at DESC"
                        ),
                        params![status.as_str()],
                    )
                    .await
            }
            None => {
                self.conn
                    .query(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY updated_at DESC"),
                        params![],
                    )
                    .await
            }
        }
        .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    /// Most recent published works, newest first.
    pub async fn recent_published_works(&self, limit: u32) -> Result<Vec<PublishedWork>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, url, published_at FROM articles
                 WHERE status = 'published' AND published_at IS NOT NULL
                 ORDER BY published_at DESC
                 LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let published_at: String = row
                .get(3)
                .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
            results.push(PublishedWork {
                id: row
                    .get::<String>(0)
                    .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
                title: row
                    .get::<String>(1)
                    .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
                url: row
                    .get::<String>(2)
                    .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
                published_at: parse_timestamp(&published_at)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Generation cache operations
    // -----------------------------------------------------------------------

    /// Store a job under `token` for `ttl_secs`. An existing entry is replaced.
    pub async fn put_cache_entry(&self, token: &str, job_json: &str, ttl_secs: u64) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now();
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(ttl);

        self.conn
            .execute(
                "INSERT INTO generation_cache (token, job_json, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(token) DO UPDATE SET
                   job_json = excluded.job_json,
                   created_at = excluded.created_at,
                   expires_at = excluded.expires_at",
                params![token, job_json, format_timestamp(&now), expires_at],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Fetch a live cache entry. Expired entries read as absent and are purged.
    pub async fn get_cache_entry(&self, token: &str) -> Result<Option<CacheEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT token, job_json, created_at, expires_at
                 FROM generation_cache WHERE token = ?1",
                params![token],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(ArticlesmithError::Storage(e.to_string())),
        };

        let expires_at: i64 = row
            .get(3)
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        if expires_at <= Utc::now().timestamp() {
            tracing::debug!(token, "cache entry expired");
            if !self.readonly {
                self.delete_cache_entry(token).await?;
            }
            return Ok(None);
        }

        let created_at: String = row
            .get(2)
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        Ok(Some(CacheEntry {
            token: row
                .get::<String>(0)
                .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
            job_json: row
                .get::<String>(1)
                .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
            created_at: parse_timestamp(&created_at)?,
            expires_at: Utc
                .timestamp_opt(expires_at, 0)
                .single()
                .ok_or_else(|| {
                    ArticlesmithError::Storage(format!("invalid expiry: {expires_at}"))
                })?,
        }))
    }

    /// Delete a cache entry. Returns `true` if one was removed.
    pub async fn delete_cache_entry(&self, token: &str) -> Result<bool> {
        self.check_writable()?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM generation_cache WHERE token = ?1",
                params![token],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        Ok(removed > 0)
    }

    /// Remove every expired cache entry. Returns the number removed.
    pub async fn purge_expired_cache(&self) -> Result<u64> {
        self.check_writable()?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM generation_cache WHERE expires_at <= ?1",
                params![Utc::now().timestamp()],
            )
            .await
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
        if removed > 0 {
            tracing::info!(removed, "purged expired generation cache entries");
        }
        Ok(removed)
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ArticlesmithError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row (selected with [`ARTICLE_COLUMNS`]) to an [`Article`].
fn row_to_article(row: &libsql::Row) -> Result<Article> {
    let status: String = row
        .get(6)
        .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
    let keywords_json: String = row
        .get(9)
        .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;
    let updated_at: String = row
        .get(13)
        .map_err(|e| ArticlesmithError::Storage(e.to_string()))?;

    Ok(Article {
        id: row
            .get::<String>(0)
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
        title: row
            .get::<String>(1)
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
        slug: row
            .get::<String>(2)
            .map_err(|e| ArticlesmithError::Storage(e.to_string()))?,
        url: row.get::<String>(3).unwrap_or_default(),
        content: row.get::<String>(4).unwrap_or_default(),
        excerpt: row.get::<String>(5).unwrap_or_default(),
        status: status.parse()?,
        featured_image: row.get::<String>(7).ok(),
        primary_keyword: row.get::<String>(8).unwrap_or_default(),
        keywords: serde_json::from_str(&keywords_json)
            .map_err(|e| ArticlesmithError::Storage(format!("invalid keywords: {e}")))?,
        generated: row.get::<i64>(10).unwrap_or(0) != 0,
        generated_at: row
            .get::<String>(11)
            .ok()
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        published_at: row
            .get::<String>(12)
            .ok()
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("as_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn article(title: &str, status: ArticleStatus) -> Article {
        let slug = title.to_lowercase().replace(' ', "-");
        Article {
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            url: format!("https://blog.test/{slug}"),
            slug,
            content: "<p>body</p>".into(),
            excerpt: "body".into(),
            status,
            featured_image: None,
            primary_keyword: String::new(),
            keywords: vec![],
            generated: false,
            generated_at: None,
            published_at: match status {
                ArticleStatus::Published => Some(Utc::now()),
                ArticleStatus::Draft => None,
            },
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("as_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn article_crud() {
        let storage = test_storage().await;
        let mut a = article("Electric Cars", ArticleStatus::Draft);
        a.keywords = vec!["electric cars".into()];
        a.featured_image = Some("assets/abc.jpg".into());
        storage.insert_article(&a).await.expect("insert");

        let found = storage.get_article(&a.id).await.expect("get").expect("present");
        assert_eq!(found.title, "Electric Cars");
        assert_eq!(found.status, ArticleStatus::Draft);
        assert_eq!(found.keywords, vec!["electric cars".to_string()]);
        assert_eq!(found.featured_image.as_deref(), Some("assets/abc.jpg"));
        assert!(found.published_at.is_none());

        let updated = Article {
            title: "Electric Cars Revisited".into(),
            generated: true,
            generated_at: Some(Utc::now()),
            ..found
        };
        assert!(storage.update_article(&updated).await.expect("update"));
        let found = storage.get_article(&a.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Electric Cars Revisited");
        assert!(found.generated);

        let missing = article("Ghost", ArticleStatus::Draft);
        assert!(!storage.update_article(&missing).await.expect("update missing"));
        assert!(storage.get_article(&missing.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_articles_filters_by_status() {
        let storage = test_storage().await;
        storage
            .insert_article(&article("One", ArticleStatus::Draft))
            .await
            .unwrap();
        storage
            .insert_article(&article("Two", ArticleStatus::Published))
            .await
            .unwrap();

        assert_eq!(storage.list_articles(None).await.unwrap().len(), 2);
        let drafts = storage
            .list_articles(Some(ArticleStatus::Draft))
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "One");
    }

    #[tokio::test]
    async fn recent_published_works_newest_first() {
        let storage = test_storage().await;
        let mut older = article("Older Post", ArticleStatus::Published);
        older.published_at = Some(Utc::now() - Duration::days(3));
        let newer = article("Newer Post", ArticleStatus::Published);
        let draft = article("Draft Post", ArticleStatus::Draft);
        for a in [&older, &newer, &draft] {
            storage.insert_article(a).await.unwrap();
        }

        let works = storage.recent_published_works(50).await.unwrap();
        assert_eq!(works.len(), 2);
        assert_eq!(works[0].title, "Newer Post");
        assert_eq!(works[1].url, "https://blog.test/older-post");

        assert_eq!(storage.recent_published_works(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cache_put_get_delete() {
        let storage = test_storage().await;
        assert!(storage.get_cache_entry("t1").await.unwrap().is_none());

        storage
            .put_cache_entry("t1", r#"{"title":"x"}"#, 3600)
            .await
            .expect("put");
        let entry = storage.get_cache_entry("t1").await.unwrap().expect("live");
        assert_eq!(entry.job_json, r#"{"title":"x"}"#);
        assert!(entry.expires_at > entry.created_at);

        // Same token overwrites.
        storage
            .put_cache_entry("t1", r#"{"title":"y"}"#, 3600)
            .await
            .unwrap();
        let entry = storage.get_cache_entry("t1").await.unwrap().unwrap();
        assert!(entry.job_json.contains('y'));

        assert!(storage.delete_cache_entry("t1").await.unwrap());
        assert!(!storage.delete_cache_entry("t1").await.unwrap());
        assert!(storage.get_cache_entry("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let storage = test_storage().await;
        storage.put_cache_entry("old", "{}", 0).await.unwrap();
        assert!(storage.get_cache_entry("old").await.unwrap().is_none());
        // Lazily purged on read.
        assert!(!storage.delete_cache_entry("old").await.unwrap());
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let storage = test_storage().await;
        storage.put_cache_entry("a", "{}", 0).await.unwrap();
        storage.put_cache_entry("b", "{}", 0).await.unwrap();
        storage.put_cache_entry("live", "{}", 3600).await.unwrap();

        assert_eq!(storage.purge_expired_cache().await.unwrap(), 2);
        assert!(storage.get_cache_entry("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("as_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_article(&article("Seed", ArticleStatus::Published))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_articles(None).await.unwrap().len(), 1);
        let result = ro.put_cache_entry("t", "{}", 60).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
