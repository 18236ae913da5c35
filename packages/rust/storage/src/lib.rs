//! libSQL storage gateway for enriched content records.
//!
//! [`ContentStore`] is the persistence contract consumed by the pipeline
//! orchestrator; [`LibsqlStore`] implements it over a local libSQL database.
//!
//! **Read-path contract:** every lookup returns an empty/absent result on
//! internal error instead of propagating it, trading silent degradation for
//! availability. Callers must treat an empty result as "not found *or*
//! transient error", never as proof of absence. Write paths still surface
//! their errors.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use libsql::{Connection, Database, Row, params};
use tracing::{debug, error, info, warn};

use refinery_shared::{ContentRecord, ProcessedResult, RefineryError, Result};

// ---------------------------------------------------------------------------
// ContentStore contract
// ---------------------------------------------------------------------------

/// Durable persistence of one enriched record per processed item.
///
/// Injected into the pipeline orchestrator; substitute with an in-memory
/// fake in tests.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Idempotent upsert keyed by `id`. Returns the stored record.
    async fn store(&self, result: &ProcessedResult) -> Result<ContentRecord>;

    /// Best-effort bulk store: persists each item independently, logs and
    /// skips per-item failures, returns the successfully stored subset.
    async fn store_many(&self, results: &[ProcessedResult]) -> Vec<ContentRecord> {
        let mut stored = Vec::with_capacity(results.len());
        for result in results {
            match self.store(result).await {
                Ok(record) => stored.push(record),
                Err(e) => {
                    warn!(id = %result.id, error = %e, "failed to store item, continuing");
                }
            }
        }
        stored
    }

    /// Point lookup by primary key.
    async fn get_by_id(&self, id: &str) -> Option<ContentRecord>;

    /// Records for a domain, most recently processed first.
    async fn get_by_domain(&self, domain: &str, limit: Option<u32>) -> Vec<ContentRecord>;

    /// Records for a URL, most recently processed first.
    async fn get_by_url(&self, url: &str) -> Vec<ContentRecord>;

    /// Whether any record exists for `url`. False may also mean the check
    /// itself failed.
    async fn exists(&self, url: &str) -> bool;

    /// Delete by primary key. Returns true iff a record was removed.
    async fn delete(&self, id: &str) -> bool;

    /// Replace the keyword list for `id`, returning the updated record.
    async fn update_keywords(&self, id: &str, keywords: &[String]) -> Option<ContentRecord>;
}

// ---------------------------------------------------------------------------
// LibsqlStore
// ---------------------------------------------------------------------------

/// Content store backed by a local libSQL database.
pub struct LibsqlStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl LibsqlStore {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RefineryError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RefineryError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| RefineryError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    RefineryError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
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

    fn record_from_row(row: &Row) -> Result<ContentRecord> {
        let storage_err = |e: String| RefineryError::Storage(e);

        let structured_json: String =
            row.get(7).map_err(|e| storage_err(e.to_string()))?;
        let keywords_json: String = row.get(8).map_err(|e| storage_err(e.to_string()))?;

        Ok(ContentRecord {
            id: row.get(0).map_err(|e| storage_err(e.to_string()))?,
            url: row.get(1).map_err(|e| storage_err(e.to_string()))?,
            domain: row.get(2).map_err(|e| storage_err(e.to_string()))?,
            original_content: refinery_shared::OriginalContent {
                title: row.get(3).map_err(|e| storage_err(e.to_string()))?,
                content: row.get(4).map_err(|e| storage_err(e.to_string()))?,
                word_count: row.get::<u32>(5).map_err(|e| storage_err(e.to_string()))?,
                scraped_at: row.get(6).map_err(|e| storage_err(e.to_string()))?,
            },
            structured: serde_json::from_str(&structured_json)
                .map_err(|e| storage_err(format!("corrupt structured_json: {e}")))?,
            keywords: serde_json::from_str(&keywords_json)
                .map_err(|e| storage_err(format!("corrupt keywords_json: {e}")))?,
            processed_at: row.get(9).map_err(|e| storage_err(e.to_string()))?,
            processing_time: row.get::<i64>(10).map_err(|e| storage_err(e.to_string()))? as u64,
            model: row.get(11).map_err(|e| storage_err(e.to_string()))?,
            success: row.get::<i64>(12).map_err(|e| storage_err(e.to_string()))? != 0,
            error: row
                .get::<Option<String>>(13)
                .map_err(|e| storage_err(e.to_string()))?,
        })
    }

    const SELECT_COLUMNS: &'static str = "id, url, domain, title, content, word_count, \
         scraped_at, structured_json, keywords_json, processed_at, processing_time_ms, \
         model, success, error";

    async fn try_get_by_id(&self, id: &str) -> Result<Option<ContentRecord>> {
        let sql = format!(
            "SELECT {} FROM content WHERE id = ?1",
            Self::SELECT_COLUMNS
        );
        let mut rows = self
            .conn
            .query(&sql, params![id])
            .await
            .map_err(|e| RefineryError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(Self::record_from_row(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(RefineryError::Storage(e.to_string())),
        }
    }

    async fn try_query_many(
        &self,
        sql: &str,
        args: impl libsql::params::IntoParams,
    ) -> Result<Vec<ContentRecord>> {
        let mut rows = self
            .conn
            .query(sql, args)
            .await
            .map_err(|e| RefineryError::Storage(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| RefineryError::Storage(e.to_string()))?
        {
            records.push(Self::record_from_row(&row)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl ContentStore for LibsqlStore {
    async fn store(&self, result: &ProcessedResult) -> Result<ContentRecord> {
        let record = ContentRecord::from(result);

        let structured_json = serde_json::to_string(&record.structured)
            .map_err(|e| RefineryError::Storage(format!("serialize structured: {e}")))?;
        let keywords_json = serde_json::to_string(&record.keywords)
            .map_err(|e| RefineryError::Storage(format!("serialize keywords: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO content (id, url, domain, title, content, word_count, scraped_at,
                     structured_json, keywords_json, processed_at, processing_time_ms, model,
                     success, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(id) DO UPDATE SET
                   url = excluded.url,
                   domain = excluded.domain,
                   title = excluded.title,
                   content = excluded.content,
                   word_count = excluded.word_count,
                   scraped_at = excluded.scraped_at,
                   structured_json = excluded.structured_json,
                   keywords_json = excluded.keywords_json,
                   processed_at = excluded.processed_at,
                   processing_time_ms = excluded.processing_time_ms,
                   model = excluded.model,
                   success = excluded.success,
                   error = excluded.error",
                params![
                    record.id.as_str(),
                    record.url.as_str(),
                    record.domain.as_str(),
                    record.original_content.title.as_str(),
                    record.original_content.content.as_str(),
                    i64::from(record.original_content.word_count),
                    record.original_content.scraped_at.as_str(),
                    structured_json.as_str(),
                    keywords_json.as_str(),
                    record.processed_at.as_str(),
                    record.processing_time as i64,
                    record.model.as_str(),
                    i64::from(record.success),
                    record.error.as_deref(),
                ],
            )
            .await
            .map_err(|e| RefineryError::Storage(e.to_string()))?;

        debug!(id = %record.id, url = %record.url, "stored content record");
        Ok(record)
    }

    async fn get_by_id(&self, id: &str) -> Option<ContentRecord> {
        match self.try_get_by_id(id).await {
            Ok(record) => record,
            Err(e) => {
                error!(id, error = %e, "lookup by id failed, returning absent");
                None
            }
        }
    }

    async fn get_by_domain(&self, domain: &str, limit: Option<u32>) -> Vec<ContentRecord> {
        let sql = format!(
            "SELECT {} FROM content WHERE domain = ?1 ORDER BY processed_at DESC LIMIT ?2",
            Self::SELECT_COLUMNS
        );
        // Negative limit means unbounded in SQLite
        let limit = limit.map_or(-1_i64, i64::from);

        match self.try_query_many(&sql, params![domain, limit]).await {
            Ok(records) => records,
            Err(e) => {
                error!(domain, error = %e, "lookup by domain failed, returning empty");
                Vec::new()
            }
        }
    }

    async fn get_by_url(&self, url: &str) -> Vec<ContentRecord> {
        let sql = format!(
            "SELECT {} FROM content WHERE url = ?1 ORDER BY processed_at DESC",
            Self::SELECT_COLUMNS
        );

        match self.try_query_many(&sql, params![url]).await {
            Ok(records) => records,
            Err(e) => {
                error!(url, error = %e, "lookup by url failed, returning empty");
                Vec::new()
            }
        }
    }

    async fn exists(&self, url: &str) -> bool {
        let result = self
            .conn
            .query("SELECT 1 FROM content WHERE url = ?1 LIMIT 1", params![url])
            .await;

        match result {
            Ok(mut rows) => matches!(rows.next().await, Ok(Some(_))),
            Err(e) => {
                error!(url, error = %e, "existence check failed, returning false");
                false
            }
        }
    }

    async fn delete(&self, id: &str) -> bool {
        match self
            .conn
            .execute("DELETE FROM content WHERE id = ?1", params![id])
            .await
        {
            Ok(affected) => affected > 0,
            Err(e) => {
                error!(id, error = %e, "delete failed");
                false
            }
        }
    }

    async fn update_keywords(&self, id: &str, keywords: &[String]) -> Option<ContentRecord> {
        let keywords_json = match serde_json::to_string(keywords) {
            Ok(json) => json,
            Err(e) => {
                error!(id, error = %e, "serialize keywords failed");
                return None;
            }
        };

        let updated = self
            .conn
            .execute(
                "UPDATE content SET keywords_json = ?2 WHERE id = ?1",
                params![id, keywords_json.as_str()],
            )
            .await;

        match updated {
            Ok(0) => None,
            Ok(_) => self.get_by_id(id).await,
            Err(e) => {
                error!(id, error = %e, "keyword update failed");
                None
            }
        }
    }
}
