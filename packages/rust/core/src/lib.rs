//! Core pipeline orchestration for Refinery.
//!
//! This crate owns the enrichment control flow: per-item step ordering and
//! graceful degradation ([`ContentProcessor::process_item`]) and sequential
//! batch processing with persistence ([`ContentProcessor::process_batch`]).
//! The enrichment backend and storage gateway are injected at construction.

pub mod ident;
pub mod processor;

pub use ident::{Clock, IdGenerator, SystemClock, UuidIdGenerator};
pub use processor::ContentProcessor;
