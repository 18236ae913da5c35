//! OpenAI implementation of the enrichment backend.
//!
//! Uses the chat completions endpoint with a JSON-schema response format
//! for structuring, a plain completion for keyword extraction, and the
//! embeddings endpoint for vectors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use refinery_shared::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL, RefineryError, Result, StructuredContent,
};

use crate::{
    EMBED_INPUT_CHARS, EnrichmentBackend, KEYWORD_CONTENT_CHARS, STRUCTURE_CONTENT_CHARS,
    truncate_chars,
};

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("Refinery/", env!("CARGO_PKG_VERSION"));

/// Default API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Request timeout. The orchestrator adds no timeout of its own, so this
/// is the only bound on a hung backend call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling temperature for both chat operations.
const TEMPERATURE: f32 = 0.1;

/// Fixed completion budget for keyword extraction.
const KEYWORD_COMPLETION_TOKENS: u32 = 200;

// ---------------------------------------------------------------------------
// OpenAiBackend
// ---------------------------------------------------------------------------

/// Enrichment backend over the OpenAI HTTP API.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
}

impl OpenAiBackend {
    /// Create a backend with its own HTTP client and default models.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RefineryError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, api_key))
    }

    /// Create a backend reusing an existing HTTP client (connection pooling
    /// across requests).
    pub fn with_client(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
        }
    }

    /// Set the chat model used for structuring and keyword extraction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Override the API base URL (alternate gateways, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The chat model this backend sends completions to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST a chat completion and return the assistant message content.
    async fn chat(&self, request: &ChatRequest<'_>) -> std::result::Result<String, String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {}", truncate_chars(&body, 200)));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "response contained no completion".into())
    }
}

#[async_trait]
impl EnrichmentBackend for OpenAiBackend {
    #[instrument(skip_all, fields(title = %title, model = %self.model))]
    async fn structure(&self, content: &str, title: &str) -> Result<StructuredContent> {
        let body = truncate_chars(content, STRUCTURE_CONTENT_CHARS);
        let suffix = if body.len() < content.len() { " ..." } else { "" };

        let prompt = format!(
            "Analyze and structure the following scraped web content.\n\
             The content appears to be from: \"{title}\"\n\n\
             Extract key information and organize it according to the schema.\n\
             Focus on:\n\
             - Financial/economic data if present\n\
             - Key statistics and metrics\n\
             - Important dates and figures\n\
             - Main topics and themes\n\n\
             Content to analyze:\n{body}{suffix}"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: None,
            response_format: Some(structured_content_format()),
        };

        let text = self.chat(&request).await.map_err(|e| {
            RefineryError::enrichment(format!("Failed to structure content: {e}"))
        })?;

        let structured: StructuredContent = serde_json::from_str(&text).map_err(|e| {
            RefineryError::enrichment(format!(
                "Failed to structure content: schema-invalid output: {e}"
            ))
        })?;

        debug!(topics = structured.main_topics.len(), "content structured");
        Ok(structured)
    }

    #[instrument(skip_all, fields(title = %title, model = %self.model))]
    async fn extract_keywords(
        &self,
        content: &str,
        title: &str,
        max_keywords: usize,
    ) -> Result<Vec<String>> {
        let body = truncate_chars(content, KEYWORD_CONTENT_CHARS);
        let suffix = if body.len() < content.len() { " ..." } else { "" };

        let prompt = format!(
            "Extract {max_keywords} relevant keywords from the following content.\n\
             Title: \"{title}\"\n\n\
             Focus on:\n\
             - Technical terms and concepts\n\
             - Important entities (companies, people, places)\n\
             - Financial/economic terms if present\n\
             - Domain-specific terminology\n\n\
             Return only the keywords, one per line, without numbers or bullet points.\n\n\
             Content:\n{body}{suffix}"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: Some(KEYWORD_COMPLETION_TOKENS),
            response_format: None,
        };

        let text = self.chat(&request).await.map_err(|e| {
            RefineryError::enrichment(format!("Failed to extract keywords: {e}"))
        })?;

        Ok(parse_keywords(&text, max_keywords))
    }

    #[instrument(skip_all, fields(model = %self.embedding_model, input_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = truncate_chars(text, EMBED_INPUT_CHARS);

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input,
        };

        let wrap = |e: String| {
            RefineryError::enrichment(format!("Failed to generate embeddings: {e}"))
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| wrap(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(wrap(format!("HTTP {status}: {}", truncate_chars(&body, 200))));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| wrap(e.to_string()))?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| wrap("response contained no embedding".into()))?;

        debug!(dimensions = embedding.len(), "embedding generated");
        Ok(embedding)
    }
}

/// Split a completion into keyword lines: trimmed, empties dropped,
/// capped at `max_keywords`.
fn parse_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(max_keywords)
        .map(String::from)
        .collect()
}

/// JSON-schema response format mirroring [`StructuredContent`].
fn structured_content_format() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "structured_content",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Main title or heading of the content"
                    },
                    "summary": {
                        "type": "string",
                        "description": "Concise summary of the main content (2-3 sentences)"
                    },
                    "mainTopics": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "3-5 main topics covered in the content"
                    },
                    "keyInsights": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Important insights or key takeaways"
                    },
                    "dataPoints": {
                        "type": ["array", "null"],
                        "description": "Structured data points found in the content (numbers, percentages, dates, etc.)",
                        "items": {
                            "type": "object",
                            "properties": {
                                "label": { "type": "string" },
                                "value": { "type": "string" },
                                "category": { "type": ["string", "null"] }
                            },
                            "required": ["label", "value", "category"],
                            "additionalProperties": false
                        }
                    },
                    "sentiment": {
                        "type": "string",
                        "enum": ["positive", "negative", "neutral"],
                        "description": "Overall sentiment of the content"
                    }
                },
                "required": [
                    "title", "summary", "mainTopics", "keyInsights", "dataPoints", "sentiment"
                ],
                "additionalProperties": false
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
