//! SQL migration definitions for the articlesmith database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: articles, generation_cache",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Host article store: published works and generated drafts
CREATE TABLE IF NOT EXISTS articles (
    id              TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    slug            TEXT NOT NULL,
    url             TEXT NOT NULL DEFAULT '',
    content         TEXT NOT NULL DEFAULT '',
    excerpt         TEXT NOT NULL DEFAULT '',
    status          TEXT NOT NULL,
    featured_image  TEXT,
    primary_keyword TEXT NOT NULL DEFAULT '',
    keywords_json   TEXT NOT NULL DEFAULT '[]',
    generated       INTEGER NOT NULL DEFAULT 0,
    generated_at    TEXT,
    published_at    TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_status_published
    ON articles(status, published_at);

-- Short-lived generation results addressed by token
CREATE TABLE IF NOT EXISTS generation_cache (
    token      TEXT PRIMARY KEY,
    job_json   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_generation_cache_expires
    ON generation_cache(expires_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
