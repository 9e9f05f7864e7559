//! Farm lookup and redirect following.
//!
//! # Responsibilities
//! - Load the ordered family list from the farms file
//! - Find the first family whose pattern matches a request
//! - Follow redirect families with a decrementing hop budget
//!
//! # Design Decisions
//! - Families are tried in declaration order; first match wins
//! - An unloadable farms file is an error, distinct from "no family matched"
//! - Redirects are an explicit loop, never recursion; running out of budget
//!   is an error, not a not-found

use std::path::Path;

use serde_json::Value;

use crate::error::{FarmError, FarmResult};
use crate::observability::FarmLog;
use crate::resolver::template::Variables;
use crate::routing::family::{FamilyDefinition, FamilyRole};
use crate::routing::matcher::{HostPattern, PatternMatch};
use crate::source::SourceReader;

/// One family entry with its compiled pattern and raw definition.
#[derive(Debug, Clone)]
struct FarmEntry {
    name: String,
    pattern: HostPattern,
    raw: Value,
}

/// The ordered family list of a farm.
#[derive(Debug, Clone)]
pub struct Farms {
    entries: Vec<FarmEntry>,
    skipped: Vec<String>,
}

impl Farms {
    /// Load the farms file.
    ///
    /// A family without a `server` key cannot be matched; it is skipped with
    /// a trace warning and listed by [`Farms::skipped`]. It does not enter the
    /// request log, since the farms file is loaded on every request.
    pub fn load(reader: &SourceReader, path: &Path, log: &mut FarmLog) -> FarmResult<Self> {
        let no_farms = |reason: String| FarmError::NoFarms {
            path: path.display().to_string(),
            reason,
        };

        let value = reader.read(path, log).map_err(|e| no_farms(e.to_string()))?;
        let Value::Object(families) = value else {
            return Err(no_farms("expected a dictionary of families".to_string()));
        };

        let mut entries = Vec::with_capacity(families.len());
        let mut skipped = Vec::new();
        for (name, raw) in families {
            let Some(server) = raw.get("server").and_then(Value::as_str) else {
                tracing::warn!(family = %name, "Family has no server pattern, ignored");
                skipped.push(name);
                continue;
            };
            let pattern = HostPattern::compile(server).map_err(|e| FarmError::InvalidPattern {
                family: name.clone(),
                reason: e.to_string(),
            })?;
            entries.push(FarmEntry { name, pattern, raw });
        }

        if entries.is_empty() {
            return Err(no_farms("no usable family".to_string()));
        }
        Ok(Self { entries, skipped })
    }

    /// Families ignored because they have no server pattern.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    fn find(&self, host: &str, path: &str) -> Option<(&FarmEntry, PatternMatch)> {
        self.entries
            .iter()
            .find_map(|entry| entry.pattern.matches(host, path).map(|m| (entry, m)))
    }
}

/// A request routed to a tenant family.
#[derive(Debug, Clone)]
pub struct FarmMatch {
    pub family: FamilyDefinition,
    pub captures: Variables,
    pub server_key: String,
    /// Host after redirects.
    pub host: String,
    pub redirects: u32,
}

/// Routes requests over a loaded farm.
#[derive(Debug)]
pub struct FarmRouter<'a> {
    farms: &'a Farms,
    max_redirects: u32,
}

impl<'a> FarmRouter<'a> {
    pub fn new(farms: &'a Farms, max_redirects: u32) -> Self {
        Self {
            farms,
            max_redirects,
        }
    }

    /// Find the tenant family serving `host` + `path`.
    ///
    /// `Ok(None)` means no family matched.
    pub fn route(&self, host: &str, path: &str) -> FarmResult<Option<FarmMatch>> {
        let mut host = host.to_lowercase();
        let mut path = path.to_string();
        let mut budget = self.max_redirects;
        let mut redirects = 0;

        loop {
            let Some((entry, matched)) = self.farms.find(&host, &path) else {
                tracing::debug!(host = %host, path = %path, "No family matched");
                return Ok(None);
            };

            let family = FamilyDefinition::from_value(&entry.name, &entry.raw)?;
            let redirect = match family.role()? {
                FamilyRole::Redirect(target) => Some(matched.captures.substitute(target)),
                FamilyRole::Tenant { .. } => None,
            };
            let Some(target) = redirect else {
                tracing::debug!(family = %entry.name, server_key = %matched.server_key, "Family matched");
                return Ok(Some(FarmMatch {
                    family,
                    captures: matched.captures,
                    server_key: matched.server_key,
                    host,
                    redirects,
                }));
            };

            if budget == 0 {
                return Err(FarmError::RedirectLoop {
                    host,
                    max: self.max_redirects,
                });
            }
            budget -= 1;
            redirects += 1;

            let (next_host, next_path) = match target.split_once('/') {
                Some((h, p)) => (h.to_string(), join_path(p, &matched.remainder)),
                None => (target.clone(), matched.remainder.clone()),
            };
            tracing::debug!(from = %host, to = %next_host, family = %entry.name, "Following redirect");
            host = next_host.to_lowercase();
            path = next_path;
        }
    }
}

fn join_path(prefix: &str, rest: &str) -> String {
    match (prefix.trim_matches('/'), rest) {
        (p, "") => p.to_string(),
        ("", r) => r.to_string(),
        (p, r) => format!("{}/{}", p, r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn farms_from(json: &str) -> (tempfile::TempDir, Farms, FarmLog) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farms.json");
        fs::write(&path, json).unwrap();
        let mut log = FarmLog::new();
        let farms = Farms::load(&SourceReader::new(None), &path, &mut log).unwrap();
        (dir, farms, log)
    }

    #[test]
    fn test_first_match_wins() {
        let (_dir, farms, _) = farms_from(
            r#"{
                "specific": {"server": "admin\\.example\\.org", "suffix": "admin", "identifier": "admin"},
                "generic": {"server": "(?P<wiki>[a-z]+)\\.example\\.org", "suffix": "wiki", "identifier": "$wiki"}
            }"#,
        );
        let router = FarmRouter::new(&farms, 5);

        let m = router.route("admin.example.org", "/").unwrap().unwrap();
        assert_eq!(m.family.name, "specific");

        let m = router.route("en.example.org", "/").unwrap().unwrap();
        assert_eq!(m.family.name, "generic");
        assert_eq!(m.captures.get("wiki"), Some("en"));

        assert!(router.route("en.other.org", "/").unwrap().is_none());
    }

    #[test]
    fn test_redirect_is_followed() {
        let (_dir, farms, _) = farms_from(
            r#"{
                "old": {"server": "(?P<wiki>[a-z]+)\\.old\\.org", "redirect": "$wiki.example.org"},
                "new": {"server": "(?P<wiki>[a-z]+)\\.example\\.org", "suffix": "wiki", "identifier": "$wiki"}
            }"#,
        );
        let m = FarmRouter::new(&farms, 5)
            .route("fr.old.org", "/index.php")
            .unwrap()
            .unwrap();
        assert_eq!(m.family.name, "new");
        assert_eq!(m.server_key, "fr.example.org");
        assert_eq!(m.redirects, 1);
    }

    #[test]
    fn test_self_redirect_is_an_error() {
        let (_dir, farms, _) = farms_from(
            r#"{"loop": {"server": "loop\\.example\\.org", "redirect": "loop.example.org"}}"#,
        );
        let err = FarmRouter::new(&farms, 3).route("loop.example.org", "/").unwrap_err();
        assert_eq!(
            err,
            FarmError::RedirectLoop { host: "loop.example.org".into(), max: 3 }
        );
    }

    #[test]
    fn test_unusable_farms_file() {
        let dir = tempfile::tempdir().unwrap();
        let reader = SourceReader::new(None);
        let mut log = FarmLog::new();

        let missing = dir.path().join("farms.toml");
        assert!(matches!(
            Farms::load(&reader, &missing, &mut log),
            Err(FarmError::NoFarms { .. })
        ));

        fs::write(&missing, "[broken").unwrap();
        assert!(matches!(
            Farms::load(&reader, &missing, &mut log),
            Err(FarmError::NoFarms { .. })
        ));
    }

    #[test]
    fn test_family_without_server_is_skipped() {
        let (_dir, farms, log) = farms_from(
            r#"{
                "broken": {"suffix": "x"},
                "ok": {"server": "a\\.org", "suffix": "a", "identifier": "a"}
            }"#,
        );
        assert_eq!(farms.names().collect::<Vec<_>>(), vec!["ok"]);
        assert_eq!(farms.skipped(), ["broken".to_string()]);
        assert!(log.is_empty());
    }

    #[test]
    fn test_matched_family_missing_key_is_fatal() {
        let (_dir, farms, _) = farms_from(r#"{"half": {"server": "a\\.org", "suffix": "a"}}"#);
        let err = FarmRouter::new(&farms, 5).route("a.org", "/").unwrap_err();
        assert!(matches!(err, FarmError::MissingKey { .. }));
    }
}
