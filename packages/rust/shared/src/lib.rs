//! Shared types, error model, and configuration for Refinery.
//!
//! This crate is the foundation depended on by all other Refinery crates.
//! It provides:
//! - [`RefineryError`] — the unified error type
//! - Domain and wire types ([`ScrapedItem`], [`ProcessedResult`],
//!   [`ProcessingResponse`], [`ContentRecord`], ...)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OpenAiConfig, ServerConfig, StorageConfig, api_key, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{RefineryError, Result};
pub use types::{
    ContentRecord, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL, DataPoint, FAILED_SUMMARY,
    OriginalContent, ProcessedResult, ProcessingMetadata, ProcessingOptions, ProcessingRequest,
    ProcessingResponse, ScrapeBatch, ScrapeEnvelope, ScrapeStatus, ScrapedItem, Sentiment,
    StructuredContent,
};
