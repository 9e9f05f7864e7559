//! Host/path pattern matching.
//!
//! # Responsibilities
//! - Compile a family's `server` pattern once per request
//! - Match host (case-insensitive) and path (case-sensitive) together
//! - Extract named capture groups as lower-case variables
//!
//! # Design Decisions
//! - The pattern is split at its first `/`: host part, then a path part that
//!   is required when present
//! - The candidate is `host/path/`; the trailing slash forces the match to end
//!   on a path boundary even for host-only patterns
//! - Matching is anchored at the start only; unmatched path text is kept as
//!   the remainder carried across redirects

use regex::Regex;

use crate::resolver::template::Variables;

/// A compiled `server` pattern.
#[derive(Debug, Clone)]
pub struct HostPattern {
    regex: Regex,
}

/// Result of matching a request against a [`HostPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Named captures, lower-case keys.
    pub captures: Variables,
    /// Canonical host[/path] that matched.
    pub server_key: String,
    /// Path text after the matched part, without surrounding slashes.
    pub remainder: String,
}

impl HostPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let expr = match pattern.split_once('/') {
            Some((host, path)) => format!("^(?i:{})/{}/", host, path),
            None => format!("^(?i:{})/", pattern),
        };
        Ok(Self {
            regex: Regex::new(&expr)?,
        })
    }

    /// Match a request; `host` is lower-cased here.
    pub fn matches(&self, host: &str, path: &str) -> Option<PatternMatch> {
        let candidate = candidate(host, path);
        let caps = self.regex.captures(&candidate)?;
        let whole = caps.get(0)?;

        let mut captures = Variables::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                captures.insert(name.to_lowercase(), m.as_str());
            }
        }

        let server_key = whole.as_str().trim_end_matches('/').to_string();
        let remainder = candidate[whole.end()..].trim_matches('/').to_string();
        Some(PatternMatch {
            captures,
            server_key,
            remainder,
        })
    }
}

fn candidate(host: &str, path: &str) -> String {
    let path = path.trim_matches('/');
    let mut candidate = format!("{}/{}", host.to_lowercase(), path);
    if !candidate.ends_with('/') {
        candidate.push('/');
    }
    candidate
}
