//! SQL migration definitions for the Refinery content database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: content table with domain/url lookup indexes",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One enriched record per processed page, keyed by id.
-- structured_json / keywords_json hold the serialized StructuredContent
-- and keyword list; embeddings are never persisted.
CREATE TABLE IF NOT EXISTS content (
    id                 TEXT PRIMARY KEY,
    url                TEXT NOT NULL,
    domain             TEXT NOT NULL,
    title              TEXT NOT NULL,
    content            TEXT NOT NULL,
    word_count         INTEGER NOT NULL,
    scraped_at         TEXT NOT NULL,
    structured_json    TEXT NOT NULL,
    keywords_json      TEXT NOT NULL,
    processed_at       TEXT NOT NULL,
    processing_time_ms INTEGER NOT NULL,
    model              TEXT NOT NULL,
    success            INTEGER NOT NULL,
    error              TEXT
);

-- Most-recent-first lookups by domain and by url
CREATE INDEX IF NOT EXISTS idx_content_domain_processed
    ON content(domain, processed_at DESC);
CREATE INDEX IF NOT EXISTS idx_content_url_processed
    ON content(url, processed_at DESC);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
