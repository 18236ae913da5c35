//! HTTP routes and request handling for the Refinery boundary layer.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpResponse, Responder, get, post, web};
use serde_json::json;
use tracing::{error, info};

use refinery_core::ContentProcessor;
use refinery_enrichment::OpenAiBackend;
use refinery_shared::{
    AppConfig, ProcessingOptions, ProcessingRequest, RefineryError, Result,
};
use refinery_storage::ContentStore;

/// User-Agent for outbound enrichment requests.
const USER_AGENT: &str = concat!("Refinery/", env!("CARGO_PKG_VERSION"));

/// Outbound request timeout; the only bound on a hung backend call.
const BACKEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Request body size limit for /process.
const JSON_PAYLOAD_LIMIT: usize = 16 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared server state: config, credentials, store handle, and a pooled
/// HTTP client reused by every per-request backend.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub api_key: Option<String>,
    pub store: Arc<dyn ContentStore>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        api_key: Option<String>,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(BACKEND_TIMEOUT)
            .build()
            .map_err(|e| RefineryError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            api_key,
            store,
            http,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Static liveness probe.
#[get("/health")]
pub async fn health() -> impl Responder {
    web::Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "refinery-pipeline",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Batch enrichment endpoint.
///
/// The request is already schema-validated by the JSON extractor; the only
/// check left here is credentials. Pipeline failures never surface as HTTP
/// errors; they are encoded in the response's per-item metadata and error
/// list.
#[post("/process")]
pub async fn process(
    payload: web::Json<ProcessingRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let request = payload.into_inner();
    let items = &request.scraping_response.body.results;
    info!(items = items.len(), "processing request received");

    let Some(api_key) = state.api_key.clone() else {
        error!("OpenAI API key not configured");
        return HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": "AI service not configured",
        }));
    };

    // Absent options fall back to the server's configured model.
    let options = request.options.unwrap_or_else(|| ProcessingOptions {
        model: state.config.openai.model.clone(),
        ..ProcessingOptions::default()
    });

    let backend = OpenAiBackend::with_client(state.http.clone(), api_key)
        .with_model(&options.model)
        .with_embedding_model(&state.config.openai.embedding_model);

    let processor = ContentProcessor::new(Arc::new(backend), state.store.clone());
    let response = processor.process_batch(items, &options).await;

    info!(
        success = response.success,
        results = response.results_processed,
        "processing completed"
    );
    HttpResponse::Ok().json(response)
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "error": "Not found",
        "message": "The requested endpoint does not exist",
    }))
}

/// JSON extractor config: payload limit plus the 400 response shape for
/// malformed requests.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_PAYLOAD_LIMIT)
        .error_handler(|err, _req| {
            let details = err.to_string();
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": "Invalid request format",
                    "details": details,
                })),
            )
            .into()
        })
}
