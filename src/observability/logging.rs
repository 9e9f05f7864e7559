//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem for the binary
//! - Collect the per-request log list returned alongside a result
//! - Mirror every collected entry as a `tracing` event
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - The library never installs a subscriber; delivery belongs to the caller

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;

/// Category of a collected log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// A component could not be activated and was switched off.
    Component,
    /// A structured source was missing, unparseable, or served stale.
    Source,
    /// A snapshot could not be read or written.
    Cache,
    /// A variable lookup failed without making the tenant missing.
    Existence,
    /// The failure that aborted the request.
    Fatal,
}

/// One collected log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
}

/// Log list owned by a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmLog {
    entries: Vec<LogEntry>,
}

impl FarmLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry and emit it as a tracing event.
    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            LogKind::Fatal => tracing::error!(kind = ?kind, "{}", message),
            _ => tracing::warn!(kind = ?kind, "{}", message),
        }
        self.entries.push(LogEntry { kind, message });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries of the given kind.
    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Plain messages, in the order they were recorded.
    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Install the global subscriber for the binary.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("wikifarm={}", config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("logging already initialised: {}", e);
    }
}
