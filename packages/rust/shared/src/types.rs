//! Core domain types for the Refinery enrichment pipeline.
//!
//! Everything here crosses a process boundary: the scraper hands us
//! [`ScrapedItem`]s, the pipeline emits [`ProcessedResult`]s, and the storage
//! layer persists [`ContentRecord`]s. All types serialize as camelCase JSON
//! to match the surrounding services.

use serde::{Deserialize, Serialize};

/// Default chat model for structuring and keyword extraction.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Fixed embedding model; its vector dimension is what downstream
/// consumers index against, so it is not batch-configurable.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Summary placeholder stamped on every failed result.
pub const FAILED_SUMMARY: &str = "Processing failed";

// ---------------------------------------------------------------------------
// Scraper input
// ---------------------------------------------------------------------------

/// Outcome reported by the upstream scraper for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Failed,
}

/// One scraped page as delivered by the upstream scraper service.
///
/// Read-only input: the pipeline never mutates these. Items with
/// `status = failed` are rejected before any enrichment call is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedItem {
    /// Scraper-configured site name; carried through but unused here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    /// Raw content length reported by the scraper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub scraped_at: String,
    /// Keywords the scraper already attached, used as a fallback when
    /// extraction is disabled or fails.
    #[serde(default)]
    pub keywords: Vec<String>,
    pub status: ScrapeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Upstream record ID; reused verbatim when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
}

// ---------------------------------------------------------------------------
// Processing options
// ---------------------------------------------------------------------------

/// Per-batch processing configuration. Applies uniformly to every item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    pub generate_embeddings: bool,
    pub extract_keywords: bool,
    pub structure_content: bool,
    /// Chat model for structuring and keyword extraction.
    pub model: String,
    /// Accepted for forward compatibility; keyword extraction keeps its
    /// fixed completion budget regardless.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            generate_embeddings: true,
            extract_keywords: true,
            structure_content: true,
            model: DEFAULT_MODEL.into(),
            max_tokens: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Structured content
// ---------------------------------------------------------------------------

/// Overall sentiment of a page's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

/// A discrete figure extracted from the content (number, percentage, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Schema-conformant structure derived from raw page content.
///
/// Produced by the enrichment backend; hand-built only via
/// [`StructuredContent::placeholder`] on the degraded paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContent {
    pub title: String,
    /// Concise 2-3 sentence summary.
    pub summary: String,
    /// 3-5 main topics covered.
    pub main_topics: Vec<String>,
    pub key_insights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<Vec<DataPoint>>,
    #[serde(default)]
    pub sentiment: Sentiment,
}

impl StructuredContent {
    /// Minimal non-enriched structure used when structuring is skipped
    /// or the item failed.
    pub fn placeholder(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            main_topics: Vec::new(),
            key_insights: Vec::new(),
            data_points: None,
            sentiment: Sentiment::Neutral,
        }
    }
}

// ---------------------------------------------------------------------------
// Processed output
// ---------------------------------------------------------------------------

/// The scraped page fields preserved verbatim on the output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalContent {
    pub title: String,
    pub content: String,
    pub word_count: u32,
    pub scraped_at: String,
}

/// Per-item processing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    pub processed_at: String,
    /// Wall-clock milliseconds spent on this item.
    pub processing_time: u64,
    pub model: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The unit of output and persistence: one enriched record per input item.
///
/// Created once, never mutated. `success = false` implies the structured
/// summary is [`FAILED_SUMMARY`] and `embeddings` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedResult {
    pub id: String,
    pub url: String,
    pub domain: String,
    pub original_content: OriginalContent,
    pub structured: StructuredContent,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<f32>>,
    pub processing_metadata: ProcessingMetadata,
}

/// Batch-level aggregate returned from `process_batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResponse {
    /// True iff at least one `ProcessedResult` was produced, including
    /// failure placeholders.
    pub success: bool,
    pub timestamp: String,
    pub results_processed: usize,
    /// Input order is preserved.
    pub results: Vec<ProcessedResult>,
    /// Batch wall-clock milliseconds.
    pub execution_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Stored record
// ---------------------------------------------------------------------------

/// The persisted flattening of a [`ProcessedResult`].
///
/// Embedding vectors are intentionally not persisted; they are returned to
/// the caller only. Logical lookup attributes: `id`, `domain`, `url`,
/// `processed_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: String,
    pub url: String,
    pub domain: String,
    pub original_content: OriginalContent,
    pub structured: StructuredContent,
    pub keywords: Vec<String>,
    pub processed_at: String,
    pub processing_time: u64,
    pub model: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ProcessedResult> for ContentRecord {
    fn from(result: &ProcessedResult) -> Self {
        Self {
            id: result.id.clone(),
            url: result.url.clone(),
            domain: result.domain.clone(),
            original_content: result.original_content.clone(),
            structured: result.structured.clone(),
            keywords: result.keywords.clone(),
            processed_at: result.processing_metadata.processed_at.clone(),
            processing_time: result.processing_metadata.processing_time,
            model: result.processing_metadata.model.clone(),
            success: result.processing_metadata.success,
            error: result.processing_metadata.error.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request envelope
// ---------------------------------------------------------------------------

/// The scraper batch payload: metadata about the scrape run plus its results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeBatch {
    pub success: bool,
    pub timestamp: String,
    pub sites_processed: u32,
    pub total_sites_configured: u32,
    pub results: Vec<ScrapedItem>,
    pub execution_time: u64,
}

/// HTTP-shaped wrapper the scraper emits around its batch payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeEnvelope {
    pub status_code: u16,
    pub body: ScrapeBatch,
}

/// A validated batch-processing request as received by the boundary layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub scraping_response: ScrapeEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ProcessingOptions>,
}
