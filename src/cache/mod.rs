//! On-disk snapshot cache.
//!
//! # Data Flow
//! ```text
//! expensive computation (existence, compiled settings, parsed source)
//!     → Dependencies collected while computing
//!     → store.rs writes CacheSnapshot { dependencies, payload }
//!         under <cache>/<namespace>/<key>.mpk
//!
//! next request
//!     → store.rs reads snapshot
//!     → fresh iff every dependency still has the stamp (mtime, length,
//!       presence) recorded when it was consulted
//!     → fresh: payload served, computation skipped
//!     → stale: recomputed (stale payload may still serve as last-good)
//! ```
//!
//! # Design Decisions
//! - The cache is the only state shared between requests (many processes)
//! - Every write failure is swallowed by callers; caching is best-effort
//! - MessagePack envelope keeps snapshots compact and fast to decode

pub mod snapshot;
pub mod store;

pub use snapshot::{Cached, CacheSnapshot, Dependencies, Dependency};
pub use store::{CacheError, CacheStore, Namespace};

use crate::observability::{FarmLog, LogKind};

/// Swallow a snapshot write result, leaving a trace of real failures.
///
/// Losing the lock race is routine and only logged at debug level.
pub fn report_write(result: Result<(), CacheError>, log: &mut FarmLog) {
    match result {
        Ok(()) => {}
        Err(CacheError::Locked(path)) => {
            tracing::debug!(path = %path.display(), "Snapshot locked by another writer, not caching");
        }
        Err(e) => log.push(LogKind::Cache, format!("cache write skipped: {}", e)),
    }
}
