//! The enrichment pipeline orchestrator.
//!
//! `process_item` drives one page through structuring, keyword extraction,
//! and embedding generation, degrading to a placeholder result on any step
//! failure. `process_batch` runs items strictly sequentially and persists
//! each one before the next begins. Neither entry point ever fails: all
//! failure is captured inside the returned records.

use std::sync::Arc;
use std::time::Instant;

use chrono::SecondsFormat;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use refinery_enrichment::{DEFAULT_MAX_KEYWORDS, EnrichmentBackend, truncate_chars};
use refinery_shared::{
    FAILED_SUMMARY, OriginalContent, ProcessedResult, ProcessingMetadata, ProcessingOptions,
    ProcessingResponse, Result, ScrapeStatus, ScrapedItem, StructuredContent,
};
use refinery_storage::ContentStore;

use crate::ident::{Clock, IdGenerator, SystemClock, UuidIdGenerator};

/// Character bound for the raw-content excerpt inside embedding input.
const EMBED_CONTENT_EXCERPT_CHARS: usize = 3000;

/// Id prefix for results that completed enrichment.
const ID_PREFIX_PROCESSED: &str = "processed";

/// Id prefix for degraded results.
const ID_PREFIX_ERROR: &str = "error";

/// Fallback error for items the scraper marked failed without a message.
const SCRAPE_FAILED_ERROR: &str = "Scraping failed";

// ---------------------------------------------------------------------------
// EnrichmentSlots
// ---------------------------------------------------------------------------

/// Per-item step outputs. Each slot is filled explicitly when its step
/// completes, so assembly never indexes into a positional task list.
#[derive(Debug, Default)]
struct EnrichmentSlots {
    structured: Option<StructuredContent>,
    keywords: Option<Vec<String>>,
    embeddings: Option<Vec<f32>>,
}

// ---------------------------------------------------------------------------
// ContentProcessor
// ---------------------------------------------------------------------------

/// Drives per-item enrichment and batch aggregation.
///
/// Holds no state between batches; both adapters are stateless handles.
pub struct ContentProcessor {
    backend: Arc<dyn EnrichmentBackend>,
    store: Arc<dyn ContentStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl ContentProcessor {
    /// Create a processor with system id/time sources.
    pub fn new(backend: Arc<dyn EnrichmentBackend>, store: Arc<dyn ContentStore>) -> Self {
        Self::with_parts(
            backend,
            store,
            Arc::new(UuidIdGenerator),
            Arc::new(SystemClock),
        )
    }

    /// Create a processor with every capability injected (tests).
    pub fn with_parts(
        backend: Arc<dyn EnrichmentBackend>,
        store: Arc<dyn ContentStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            store,
            ids,
            clock,
        }
    }

    /// Process a single scraped item. Never fails: every failure mode is
    /// captured inside the returned record's metadata.
    #[instrument(skip_all, fields(url = %item.url))]
    pub async fn process_item(
        &self,
        item: &ScrapedItem,
        options: &ProcessingOptions,
    ) -> ProcessedResult {
        let started = Instant::now();

        // Disqualified input: rejected before any backend call.
        if item.status == ScrapeStatus::Failed {
            let message = item
                .error
                .clone()
                .unwrap_or_else(|| SCRAPE_FAILED_ERROR.into());
            warn!(error = %message, "skipping failed scrape");
            return self.failure_result(item, options, message, started);
        }

        match self.enrich(item, options).await {
            Ok(slots) => self.success_result(item, options, slots, started),
            Err(e) => {
                error!(error = %e, "enrichment failed");
                self.failure_result(item, options, e.to_string(), started)
            }
        }
    }

    /// Run the enabled enrichment steps for one item.
    ///
    /// Structuring and keyword extraction are independent reads against the
    /// backend and run concurrently; embedding generation is sequenced after
    /// both because it consumes the structured summary.
    async fn enrich(
        &self,
        item: &ScrapedItem,
        options: &ProcessingOptions,
    ) -> Result<EnrichmentSlots> {
        let structure_step = async {
            if options.structure_content {
                self.backend
                    .structure(&item.content, &item.title)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };
        let keywords_step = async {
            if options.extract_keywords {
                self.backend
                    .extract_keywords(&item.content, &item.title, DEFAULT_MAX_KEYWORDS)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };

        let (structured, keywords) = tokio::join!(structure_step, keywords_step);
        let mut slots = EnrichmentSlots {
            structured: structured?,
            keywords: keywords?,
            embeddings: None,
        };

        // Never embed without a structured summary: the vector would be
        // built from raw content only and degrade retrieval quality.
        if options.generate_embeddings {
            if let Some(structured) = &slots.structured {
                let text = embedding_text(&item.title, &item.content, structured);
                slots.embeddings = Some(self.backend.embed(&text).await?);
            }
        }

        Ok(slots)
    }

    /// Process a batch of items strictly sequentially, persisting each
    /// result before the next item begins. Never fails; item-level and
    /// storage-level failures are collected into the response's error list.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn process_batch(
        &self,
        items: &[ScrapedItem],
        options: &ProcessingOptions,
    ) -> ProcessingResponse {
        let started = Instant::now();
        info!(model = %options.model, "processing batch");

        let mut results: Vec<ProcessedResult> = Vec::with_capacity(items.len());
        let mut errors: Vec<String> = Vec::new();

        for item in items {
            let processed = self.process_item(item, options).await;

            match self.store.store(&processed).await {
                Ok(record) => debug!(id = %record.id, "stored processed result"),
                Err(e) => {
                    warn!(url = %processed.url, error = %e, "failed to store result");
                    errors.push(format!("Storage failed for {}: {e}", processed.url));
                }
            }

            if !processed.processing_metadata.success {
                if let Some(error) = &processed.processing_metadata.error {
                    errors.push(format!("{}: {error}", item.url));
                }
            }

            results.push(processed);
        }

        let response = ProcessingResponse {
            success: !results.is_empty(),
            timestamp: self.timestamp(),
            results_processed: results.len(),
            results,
            execution_time: started.elapsed().as_millis() as u64,
            errors: if errors.is_empty() { None } else { Some(errors) },
        };

        info!(
            results = response.results_processed,
            errors = response.errors.as_ref().map_or(0, Vec::len),
            elapsed_ms = response.execution_time,
            "batch complete"
        );
        response
    }

    fn success_result(
        &self,
        item: &ScrapedItem,
        options: &ProcessingOptions,
        slots: EnrichmentSlots,
        started: Instant,
    ) -> ProcessedResult {
        let structured = slots.structured.unwrap_or_else(|| {
            StructuredContent::placeholder(&item.title, format!("Content from {}", item.title))
        });
        let keywords = slots.keywords.unwrap_or_else(|| item.keywords.clone());

        ProcessedResult {
            id: item
                .id
                .clone()
                .unwrap_or_else(|| self.ids.generate(ID_PREFIX_PROCESSED)),
            url: item.url.clone(),
            domain: resolve_domain(item),
            original_content: original_content(item),
            structured,
            keywords,
            embeddings: slots.embeddings,
            processing_metadata: self.metadata(options, started, true, None),
        }
    }

    /// Degraded result shape shared by the disqualified-input and
    /// step-failure paths. Id, domain, and original content are derived
    /// exactly as on success, so failure never loses traceability.
    fn failure_result(
        &self,
        item: &ScrapedItem,
        options: &ProcessingOptions,
        error: String,
        started: Instant,
    ) -> ProcessedResult {
        ProcessedResult {
            id: item
                .id
                .clone()
                .unwrap_or_else(|| self.ids.generate(ID_PREFIX_ERROR)),
            url: item.url.clone(),
            domain: resolve_domain(item),
            original_content: original_content(item),
            structured: StructuredContent::placeholder(&item.title, FAILED_SUMMARY),
            keywords: item.keywords.clone(),
            embeddings: None,
            processing_metadata: self.metadata(options, started, false, Some(error)),
        }
    }

    fn metadata(
        &self,
        options: &ProcessingOptions,
        started: Instant,
        success: bool,
        error: Option<String>,
    ) -> ProcessingMetadata {
        ProcessingMetadata {
            processed_at: self.timestamp(),
            processing_time: started.elapsed().as_millis() as u64,
            model: options.model.clone(),
            success,
            error,
        }
    }

    fn timestamp(&self) -> String {
        self.clock
            .now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

// ---------------------------------------------------------------------------
// Derivation helpers
// ---------------------------------------------------------------------------

fn resolve_domain(item: &ScrapedItem) -> String {
    item.domain
        .clone()
        .unwrap_or_else(|| derive_domain(&item.url))
}

/// Host component of `url`, or empty when the URL does not parse. A
/// malformed URL never loses the item.
fn derive_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_default()
}

fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

fn original_content(item: &ScrapedItem) -> OriginalContent {
    OriginalContent {
        title: item.title.clone(),
        content: item.content.clone(),
        word_count: item.word_count.unwrap_or_else(|| count_words(&item.content)),
        scraped_at: item.scraped_at.clone(),
    }
}

/// Combined input for embedding generation: structured fields plus a
/// truncated raw-content excerpt.
fn embedding_text(title: &str, content: &str, structured: &StructuredContent) -> String {
    [
        format!("Title: {title}"),
        format!("Summary: {}", structured.summary),
        format!("Topics: {}", structured.main_topics.join(", ")),
        format!("Insights: {}", structured.key_insights.join(". ")),
        format!(
            "Content: {}",
            truncate_chars(content, EMBED_CONTENT_EXCERPT_CHARS)
        ),
    ]
    .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use refinery_shared::{ContentRecord, DEFAULT_MODEL, RefineryError, Sentiment};

    // -- Fakes --------------------------------------------------------------

    /// Deterministic backend; failures are keyed by item title.
    #[derive(Default)]
    struct FakeBackend {
        structure_calls: AtomicUsize,
        keyword_calls: AtomicUsize,
        embed_calls: AtomicUsize,
        fail_structure_for: Option<String>,
        fail_keywords_for: Option<String>,
        fail_embed_for: Option<String>,
    }

    #[async_trait]
    impl EnrichmentBackend for FakeBackend {
        async fn structure(&self, content: &str, title: &str) -> Result<StructuredContent> {
            self.structure_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_structure_for.as_deref() == Some(title) {
                return Err(RefineryError::enrichment(
                    "Failed to structure content: backend unavailable",
                ));
            }
            Ok(StructuredContent {
                title: title.into(),
                summary: format!("Summary of {} characters.", content.len()),
                main_topics: vec!["alpha".into(), "beta".into(), "gamma".into()],
                key_insights: vec!["an insight".into()],
                data_points: None,
                sentiment: Sentiment::Neutral,
            })
        }

        async fn extract_keywords(
            &self,
            _content: &str,
            title: &str,
            max_keywords: usize,
        ) -> Result<Vec<String>> {
            self.keyword_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_keywords_for.as_deref() == Some(title) {
                return Err(RefineryError::enrichment(
                    "Failed to extract keywords: backend unavailable",
                ));
            }
            Ok(["extracted", "keywords", "here"]
                .iter()
                .take(max_keywords)
                .map(|k| k.to_string())
                .collect())
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_embed_for {
                if text.contains(marker.as_str()) {
                    return Err(RefineryError::enrichment(
                        "Failed to generate embeddings: backend unavailable",
                    ));
                }
            }
            Ok(vec![0.25; 8])
        }
    }

    /// In-memory store; failures are keyed by result url.
    #[derive(Default)]
    struct FakeStore {
        stored: Mutex<Vec<ContentRecord>>,
        fail_for_url: Option<String>,
    }

    impl FakeStore {
        fn stored_ids(&self) -> Vec<String> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ContentStore for FakeStore {
        async fn store(&self, result: &ProcessedResult) -> Result<ContentRecord> {
            if self.fail_for_url.as_deref() == Some(result.url.as_str()) {
                return Err(RefineryError::Storage("table unavailable".into()));
            }
            let record = ContentRecord::from(result);
            self.stored.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn get_by_id(&self, id: &str) -> Option<ContentRecord> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
        }

        async fn get_by_domain(&self, domain: &str, _limit: Option<u32>) -> Vec<ContentRecord> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.domain == domain)
                .cloned()
                .collect()
        }

        async fn get_by_url(&self, url: &str) -> Vec<ContentRecord> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url == url)
                .cloned()
                .collect()
        }

        async fn exists(&self, url: &str) -> bool {
            !self.get_by_url(url).await.is_empty()
        }

        async fn delete(&self, id: &str) -> bool {
            let mut stored = self.stored.lock().unwrap();
            let before = stored.len();
            stored.retain(|r| r.id != id);
            stored.len() < before
        }

        async fn update_keywords(&self, _id: &str, _keywords: &[String]) -> Option<ContentRecord> {
            None
        }
    }

    /// Sequential ids: `<prefix>_0`, `<prefix>_1`, ...
    #[derive(Default)]
    struct SeqIds(AtomicUsize);

    impl IdGenerator for SeqIds {
        fn generate(&self, prefix: &str) -> String {
            format!("{prefix}_{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Default for FixedClock {
        fn default() -> Self {
            Self(
                DateTime::parse_from_rfc3339("2025-09-14T20:00:00.000Z")
                    .unwrap()
                    .with_timezone(&Utc),
            )
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    // -- Fixtures -----------------------------------------------------------

    fn sample_item() -> ScrapedItem {
        ScrapedItem {
            name: Some("Example Website".into()),
            url: "https://example.com".into(),
            title: "Example Domain".into(),
            content: "This domain is for use in illustrative examples in documents.".into(),
            content_length: Some(60),
            scraped_at: "2025-09-14T19:47:31.632Z".into(),
            keywords: vec!["example".into(), "domain".into()],
            status: ScrapeStatus::Success,
            error: None,
            id: None,
            domain: None,
            word_count: None,
        }
    }

    fn failed_item(error: Option<&str>) -> ScrapedItem {
        ScrapedItem {
            url: "https://example.com/broken".into(),
            title: "Broken Page".into(),
            content: String::new(),
            status: ScrapeStatus::Failed,
            error: error.map(String::from),
            ..sample_item()
        }
    }

    fn processor(backend: Arc<FakeBackend>, store: Arc<FakeStore>) -> ContentProcessor {
        ContentProcessor::with_parts(
            backend,
            store,
            Arc::new(SeqIds::default()),
            Arc::new(FixedClock::default()),
        )
    }

    // -- process_item -------------------------------------------------------

    #[tokio::test]
    async fn happy_path_enriches_everything() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let result = p
            .process_item(&sample_item(), &ProcessingOptions::default())
            .await;

        assert!(result.processing_metadata.success);
        assert!(result.processing_metadata.error.is_none());
        assert_eq!(result.processing_metadata.model, DEFAULT_MODEL);
        assert_eq!(result.domain, "example.com");
        assert_eq!(result.original_content.word_count, 10);
        assert_eq!(result.structured.main_topics.len(), 3);
        assert_eq!(result.keywords, vec!["extracted", "keywords", "here"]);
        assert!(!result.embeddings.as_ref().expect("embeddings").is_empty());
        assert!(result.id.starts_with("processed_"));

        assert_eq!(backend.structure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.keyword_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.embed_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_scrape_short_circuits_without_backend_calls() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let result = p
            .process_item(&failed_item(Some("timeout")), &ProcessingOptions::default())
            .await;

        assert!(!result.processing_metadata.success);
        assert_eq!(result.processing_metadata.error.as_deref(), Some("timeout"));
        assert_eq!(result.structured.summary, FAILED_SUMMARY);
        assert_eq!(result.structured.sentiment, Sentiment::Neutral);
        assert!(result.structured.main_topics.is_empty());
        assert!(result.embeddings.is_none());
        assert!(result.id.starts_with("error_"));
        // Keywords fall back to the item's own
        assert_eq!(result.keywords, vec!["example", "domain"]);

        assert_eq!(backend.structure_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.keyword_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.embed_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_scrape_without_message_gets_generic_error() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let result = p
            .process_item(&failed_item(None), &ProcessingOptions::default())
            .await;

        assert_eq!(
            result.processing_metadata.error.as_deref(),
            Some("Scraping failed")
        );
    }

    #[tokio::test]
    async fn embeddings_disabled_skips_embed_call() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let options = ProcessingOptions {
            generate_embeddings: false,
            ..ProcessingOptions::default()
        };
        let result = p.process_item(&sample_item(), &options).await;

        assert!(result.processing_metadata.success);
        assert!(result.embeddings.is_none());
        assert_eq!(backend.embed_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn embeddings_require_structured_content() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let options = ProcessingOptions {
            structure_content: false,
            ..ProcessingOptions::default()
        };
        let result = p.process_item(&sample_item(), &options).await;

        assert!(result.processing_metadata.success);
        assert!(result.embeddings.is_none());
        assert_eq!(backend.structure_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.embed_calls.load(Ordering::SeqCst), 0);
        // Placeholder structure for the skipped step
        assert_eq!(result.structured.summary, "Content from Example Domain");
    }

    #[tokio::test]
    async fn structure_failure_degrades_item() {
        let backend = Arc::new(FakeBackend {
            fail_structure_for: Some("Example Domain".into()),
            ..FakeBackend::default()
        });
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let result = p
            .process_item(&sample_item(), &ProcessingOptions::default())
            .await;

        assert!(!result.processing_metadata.success);
        assert!(
            result
                .processing_metadata
                .error
                .as_deref()
                .unwrap()
                .contains("Failed to structure content")
        );
        assert_eq!(result.structured.summary, FAILED_SUMMARY);
        assert!(result.embeddings.is_none());
        assert_eq!(backend.embed_calls.load(Ordering::SeqCst), 0);
        // Traceability survives the failure
        assert_eq!(result.url, "https://example.com");
        assert_eq!(result.domain, "example.com");
        assert_eq!(result.original_content.word_count, 10);
    }

    #[tokio::test]
    async fn keyword_failure_degrades_item() {
        let backend = Arc::new(FakeBackend {
            fail_keywords_for: Some("Example Domain".into()),
            ..FakeBackend::default()
        });
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let result = p
            .process_item(&sample_item(), &ProcessingOptions::default())
            .await;

        assert!(!result.processing_metadata.success);
        assert!(
            result
                .processing_metadata
                .error
                .as_deref()
                .unwrap()
                .contains("Failed to extract keywords")
        );
        assert_eq!(result.structured.summary, FAILED_SUMMARY);
        assert!(result.embeddings.is_none());
        assert_eq!(backend.embed_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn embed_failure_degrades_item() {
        // The embedding input always carries the structured summary.
        let backend = Arc::new(FakeBackend {
            fail_embed_for: Some("Summary of".into()),
            ..FakeBackend::default()
        });
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let result = p
            .process_item(&sample_item(), &ProcessingOptions::default())
            .await;

        assert!(!result.processing_metadata.success);
        assert!(
            result
                .processing_metadata
                .error
                .as_deref()
                .unwrap()
                .contains("Failed to generate embeddings")
        );
        assert!(result.embeddings.is_none());
        assert_eq!(backend.embed_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keyword_extraction_disabled_falls_back_to_item_keywords() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend.clone(), store);

        let options = ProcessingOptions {
            extract_keywords: false,
            ..ProcessingOptions::default()
        };
        let result = p.process_item(&sample_item(), &options).await;

        assert!(result.processing_metadata.success);
        assert_eq!(result.keywords, vec!["example", "domain"]);
        assert_eq!(backend.keyword_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn input_id_and_domain_are_reused() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let item = ScrapedItem {
            id: Some("example-1".into()),
            domain: Some("already.example.net".into()),
            word_count: Some(42),
            ..sample_item()
        };
        let result = p.process_item(&item, &ProcessingOptions::default()).await;

        assert_eq!(result.id, "example-1");
        assert_eq!(result.domain, "already.example.net");
        assert_eq!(result.original_content.word_count, 42);
    }

    #[tokio::test]
    async fn repeat_processing_is_identical_modulo_generated_fields() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let item = sample_item();
        let options = ProcessingOptions::default();
        let first = p.process_item(&item, &options).await;
        let second = p.process_item(&item, &options).await;

        assert_ne!(first.id, second.id); // auto-generated ids differ
        assert_eq!(first.url, second.url);
        assert_eq!(first.domain, second.domain);
        assert_eq!(first.original_content, second.original_content);
        assert_eq!(first.structured, second.structured);
        assert_eq!(first.keywords, second.keywords);
        assert_eq!(first.embeddings, second.embeddings);
        assert_eq!(
            first.processing_metadata.success,
            second.processing_metadata.success
        );
        assert_eq!(
            first.processing_metadata.model,
            second.processing_metadata.model
        );
    }

    // -- process_batch ------------------------------------------------------

    #[tokio::test]
    async fn batch_yields_one_result_per_item_in_input_order() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store.clone());

        let items = vec![
            ScrapedItem {
                url: "https://example.com/a".into(),
                ..sample_item()
            },
            failed_item(Some("timeout")),
            ScrapedItem {
                url: "https://example.com/c".into(),
                ..sample_item()
            },
        ];
        let response = p
            .process_batch(&items, &ProcessingOptions::default())
            .await;

        assert!(response.success);
        assert_eq!(response.results_processed, 3);
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[0].url, "https://example.com/a");
        assert_eq!(response.results[1].url, "https://example.com/broken");
        assert_eq!(response.results[2].url, "https://example.com/c");

        // Failure placeholders are persisted too, in input order.
        assert_eq!(store.stored_ids().len(), 3);
        assert!(store.stored_ids()[1].starts_with("error_"));
    }

    #[tokio::test]
    async fn single_item_batch_happy_path() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let response = p
            .process_batch(&[sample_item()], &ProcessingOptions::default())
            .await;

        assert!(response.success);
        assert_eq!(response.results_processed, 1);
        assert!(response.errors.is_none());

        let result = &response.results[0];
        assert!(result.processing_metadata.success);
        assert_eq!(result.domain, "example.com");
        assert!(!result.embeddings.as_ref().expect("embeddings").is_empty());
    }

    #[tokio::test]
    async fn failed_item_is_reported_in_batch_errors() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let response = p
            .process_batch(&[failed_item(Some("timeout"))], &ProcessingOptions::default())
            .await;

        assert!(response.success);
        assert_eq!(response.results_processed, 1);
        assert!(!response.results[0].processing_metadata.success);
        assert_eq!(
            response.errors,
            Some(vec!["https://example.com/broken: timeout".into()])
        );
    }

    #[tokio::test]
    async fn storage_failure_keeps_item_in_results() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore {
            fail_for_url: Some("https://example.com/b".into()),
            ..FakeStore::default()
        });
        let p = processor(backend, store.clone());

        let items = vec![
            ScrapedItem {
                url: "https://example.com/a".into(),
                ..sample_item()
            },
            ScrapedItem {
                url: "https://example.com/b".into(),
                ..sample_item()
            },
        ];
        let response = p
            .process_batch(&items, &ProcessingOptions::default())
            .await;

        assert_eq!(response.results.len(), 2);
        assert!(response.results[0].processing_metadata.success);
        assert!(response.results[1].processing_metadata.success);

        let errors = response.errors.expect("errors");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Storage failed for https://example.com/b"));
        assert_eq!(store.stored_ids().len(), 1);
    }

    #[tokio::test]
    async fn partial_backend_failure_degrades_only_that_item() {
        let backend = Arc::new(FakeBackend {
            fail_structure_for: Some("Second Page".into()),
            ..FakeBackend::default()
        });
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let items = vec![
            sample_item(),
            ScrapedItem {
                url: "https://example.com/second".into(),
                title: "Second Page".into(),
                ..sample_item()
            },
        ];
        let response = p
            .process_batch(&items, &ProcessingOptions::default())
            .await;

        assert_eq!(response.results_processed, 2);
        assert!(response.results[0].processing_metadata.success);
        assert!(!response.results[1].processing_metadata.success);

        let errors = response.errors.expect("errors");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("https://example.com/second: "));
    }

    #[tokio::test]
    async fn empty_batch_is_unsuccessful_with_no_errors() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let response = p.process_batch(&[], &ProcessingOptions::default()).await;

        assert!(!response.success);
        assert_eq!(response.results_processed, 0);
        assert!(response.errors.is_none());
    }

    #[tokio::test]
    async fn all_items_failing_is_still_a_successful_batch() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(FakeStore::default());
        let p = processor(backend, store);

        let items = vec![failed_item(Some("timeout")), failed_item(Some("dns error"))];
        let response = p
            .process_batch(&items, &ProcessingOptions::default())
            .await;

        assert!(response.success);
        assert_eq!(response.results_processed, 2);
        assert_eq!(response.errors.as_ref().map(Vec::len), Some(2));
    }

    // -- Helpers ------------------------------------------------------------

    #[test]
    fn derive_domain_from_url_host() {
        assert_eq!(derive_domain("https://example.com/page"), "example.com");
        assert_eq!(derive_domain("https://sub.example.co.uk"), "sub.example.co.uk");
        assert_eq!(derive_domain("not a url"), "");
    }

    #[test]
    fn count_words_splits_on_whitespace() {
        assert_eq!(count_words("This domain is for use"), 5);
        assert_eq!(count_words("  spaced \t out \n words "), 3);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn embedding_text_combines_structured_fields() {
        let structured = StructuredContent {
            title: "Example".into(),
            summary: "A summary.".into(),
            main_topics: vec!["one".into(), "two".into()],
            key_insights: vec!["first".into(), "second".into()],
            data_points: None,
            sentiment: Sentiment::Neutral,
        };
        let text = embedding_text("Example", "raw content", &structured);

        assert!(text.contains("Title: Example"));
        assert!(text.contains("Summary: A summary."));
        assert!(text.contains("Topics: one, two"));
        assert!(text.contains("Insights: first. second"));
        assert!(text.contains("Content: raw content"));
    }
}
