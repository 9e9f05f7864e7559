//! Metrics collection.
//!
//! # Metrics
//! - `wikifarm_cache_hits_total` (counter): fresh snapshots served, by kind
//! - `wikifarm_cache_misses_total` (counter): snapshots absent or stale, by kind
//! - `wikifarm_cache_write_failures_total` (counter): swallowed write failures
//! - `wikifarm_source_parses_total` (counter): structured files parsed, by format
//! - `wikifarm_component_errors_total` (counter): components switched off
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; no-ops until the host installs a recorder
//! - Labels are static strings to keep cardinality bounded

pub fn record_cache_hit(kind: &'static str) {
    ::metrics::counter!("wikifarm_cache_hits_total", "kind" => kind).increment(1);
}

pub fn record_cache_miss(kind: &'static str) {
    ::metrics::counter!("wikifarm_cache_misses_total", "kind" => kind).increment(1);
}

pub fn record_cache_write_failure(kind: &'static str) {
    ::metrics::counter!("wikifarm_cache_write_failures_total", "kind" => kind).increment(1);
}

pub fn record_source_parse(format: &'static str) {
    ::metrics::counter!("wikifarm_source_parses_total", "format" => format).increment(1);
}

pub fn record_component_error() {
    ::metrics::counter!("wikifarm_component_errors_total").increment(1);
}
