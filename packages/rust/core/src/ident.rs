//! Injected identifier and time capabilities.
//!
//! The pipeline stamps fallback ids and timestamps on every result; both
//! sources are abstracted behind small traits so tests can substitute
//! deterministic implementations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generates unique record identifiers with a path-distinguishing prefix.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, prefix: &str) -> String;
}

/// Time-ordered unique ids: `<prefix>_<uuid-v7>`.
#[derive(Debug, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self, prefix: &str) -> String {
        format!("{prefix}_{}", Uuid::now_v7().simple())
    }
}

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
