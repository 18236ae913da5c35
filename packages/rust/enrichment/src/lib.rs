//! Enrichment backend adapter for Refinery.
//!
//! Defines the [`EnrichmentBackend`] contract consumed by the pipeline
//! orchestrator, plus the OpenAI HTTP implementation. This layer is pure
//! request/response with no retries or caching; a backend error is wrapped
//! with a descriptive prefix and handed back to the caller.

mod openai;

use async_trait::async_trait;

use refinery_shared::{Result, StructuredContent};

pub use openai::OpenAiBackend;

/// Character bound for content sent to the structuring prompt.
pub const STRUCTURE_CONTENT_CHARS: usize = 4000;

/// Character bound for content sent to the keyword prompt.
pub const KEYWORD_CONTENT_CHARS: usize = 2000;

/// Character bound for embedding input (stays well under the model's
/// token limit).
pub const EMBED_INPUT_CHARS: usize = 6000;

/// Keywords requested per item.
pub const DEFAULT_MAX_KEYWORDS: usize = 10;

/// Abstracts the text/embedding generation capability.
///
/// Implementations are injected into the pipeline orchestrator, which
/// enables substitution with scripted fakes in tests. All three operations
/// are stateless request/response calls; errors carry an operation-specific
/// prefix so batch error lists stay readable.
#[async_trait]
pub trait EnrichmentBackend: Send + Sync {
    /// Derive a schema-conformant structure from raw page content.
    ///
    /// Content is truncated to [`STRUCTURE_CONTENT_CHARS`] before the call.
    /// Fails if the backend errors or returns output that does not conform
    /// to the [`StructuredContent`] schema.
    async fn structure(&self, content: &str, title: &str) -> Result<StructuredContent>;

    /// Extract up to `max_keywords` plain keyword strings.
    ///
    /// Content is truncated to [`KEYWORD_CONTENT_CHARS`]. Order is as
    /// returned by the backend; this layer does not deduplicate.
    async fn extract_keywords(
        &self,
        content: &str,
        title: &str,
        max_keywords: usize,
    ) -> Result<Vec<String>>;

    /// Generate a fixed-dimension embedding vector for `text`.
    ///
    /// Input is truncated to [`EMBED_INPUT_CHARS`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Truncate `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
