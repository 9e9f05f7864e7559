//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (FarmLog entries mirrored as tracing events)
//!     → metrics.rs (cache and parse counters)
//!     → tracing.rs (one span per request)
//!
//! Consumers:
//!     → Caller of the engine (log list returned with every result)
//!     → Subscriber installed by the binary (stderr, text or JSON)
//!     → Metrics recorder installed by the host, if any
//! ```
//!
//! # Design Decisions
//! - The core produces messages; delivery is the caller's concern
//! - Metrics are cheap (facade calls, no-ops without a recorder)

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{FarmLog, LogEntry, LogKind};
