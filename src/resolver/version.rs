//! Version resolution.
//!
//! # Precedence
//! ```text
//! (a) fresh existence snapshot         (handled by the engine before resolving)
//! (b) single-version mode              → "" if existence is explicit
//! (c) deployments override             → skipped for maintenance runs
//! (d) version mapped by a variable source
//! (e) versions source: identifier, then suffix*, then "default"*
//!     (* only when existence is explicit)
//! ```
//! Every candidate must name an installation under the code root.
//!
//! Web requests keep the deployments file in step with the static answer:
//! a tenant without a usable entry gets one added, an unusable entry is
//! replaced or removed. Identical content is never rewritten. The edit is
//! applied to the file as re-read under its write lock, so concurrent
//! requests adding different tenants do not drop each other's entries.
//!
//! Every installation checked is a presence dependency of the result.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::cache::{CacheError, Dependencies};
use crate::error::{FarmError, FarmResult};
use crate::observability::{FarmLog, LogKind};
use crate::resolver::existence::Existence;
use crate::resolver::template::Variables;
use crate::resolver::{Operation, VariableResolver};
use crate::routing::FamilyDefinition;
use crate::source::SourceError;

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrigin {
    SingleVersion,
    Deployments,
    Variable,
    Versions,
}

/// The version serving a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: String,
    pub code_path: Option<PathBuf>,
    pub origin: VersionOrigin,
}

/// Installed versions under a code root.
#[derive(Debug, Clone, Copy)]
pub struct Installations<'a> {
    root: &'a Path,
    marker: &'a str,
}

impl<'a> Installations<'a> {
    pub fn new(root: &'a Path, marker: &'a str) -> Self {
        Self { root, marker }
    }

    /// True when `version` names a directory holding a host installation.
    ///
    /// The installation marker is tracked as a presence dependency, so
    /// installing or removing the version invalidates what was derived here.
    pub fn is_installation(&self, version: &str, deps: &mut Dependencies) -> bool {
        let plain = !version.is_empty()
            && version != "."
            && version != ".."
            && !version.contains(['/', '\\']);
        if !plain {
            return false;
        }
        let marker = self.root.join(version).join(self.marker);
        deps.track_presence(&marker);
        marker.exists()
    }

    pub fn path(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }
}

/// Inputs of a version lookup, gathered by the variable pass.
pub(crate) struct VersionQuery<'q> {
    pub family: &'q FamilyDefinition,
    pub variables: &'q Variables,
    pub identifier: &'q str,
    pub suffix: &'q str,
    pub existence: Existence,
    pub mapped: Option<String>,
}

impl<'a> VariableResolver<'a> {
    pub(crate) fn resolve_version(
        &self,
        query: VersionQuery<'_>,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) -> FarmResult<Option<ResolvedVersion>> {
        let paths = &self.config.paths;
        let Some(code_root) = paths.code_root.as_deref() else {
            if !query.existence.is_explicit() {
                return Ok(None);
            }
            return Ok(Some(ResolvedVersion {
                version: String::new(),
                code_path: paths.code_dir.clone(),
                origin: VersionOrigin::SingleVersion,
            }));
        };
        let installs = Installations::new(code_root, &self.config.components.installation_marker);
        let found = |version: String, origin| ResolvedVersion {
            code_path: Some(installs.path(&version)),
            version,
            origin,
        };

        let mut deployments = None;
        if self.operation == Operation::Web {
            if let Some(template) = &query.family.deployments {
                let path = self.source_path(&query.variables.substitute(template));
                let map = self.read_dictionary(&path, false, deps, log)?.unwrap_or_default();
                match map.get(query.identifier).and_then(Value::as_str) {
                    Some(version) if installs.is_installation(version, deps) => {
                        return Ok(Some(found(version.to_string(), VersionOrigin::Deployments)));
                    }
                    Some(version) => tracing::debug!(
                        identifier = %query.identifier,
                        version = %version,
                        "Deployed version is not installed"
                    ),
                    None => {}
                }
                deployments = Some((path, map));
            }
        }

        let mapped = query
            .mapped
            .clone()
            .filter(|version| installs.is_installation(version, deps));
        let declared = match mapped {
            Some(version) => Some((version, VersionOrigin::Variable)),
            None => self.lookup_versions(&query, &installs, deps, log)?,
        };

        if let Some((path, map)) = deployments {
            let desired = declared.as_ref().map(|(version, _)| version.as_str());
            self.sync_deployments(&path, &map, query.identifier, desired, deps, log);
        }

        match declared {
            Some((version, origin)) => Ok(Some(found(version, origin))),
            None if query.existence.is_explicit() => Err(FarmError::MissingVersion {
                identifier: query.identifier.to_string(),
            }),
            None => Ok(None),
        }
    }

    fn lookup_versions(
        &self,
        query: &VersionQuery<'_>,
        installs: &Installations<'_>,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) -> FarmResult<Option<(String, VersionOrigin)>> {
        let Some(template) = &query.family.versions else {
            return Ok(None);
        };
        let path = self.source_path(&query.variables.substitute(template));
        let versions = self.read_dictionary(&path, true, deps, log)?.unwrap_or_default();

        let explicit = query.existence.is_explicit();
        let keys = [
            (query.identifier, true),
            (query.suffix, explicit),
            ("default", explicit),
        ];
        for (key, allowed) in keys {
            if !allowed {
                continue;
            }
            let Some(version) = versions.get(key).and_then(Value::as_str) else {
                continue;
            };
            if installs.is_installation(version, deps) {
                return Ok(Some((version.to_string(), VersionOrigin::Versions)));
            }
            log.push(
                LogKind::Source,
                format!(
                    "version '{}' declared for '{}' in {} is not an installation",
                    version,
                    key,
                    path.display()
                ),
            );
        }
        Ok(None)
    }

    /// Bring the identifier's deployments entry in line with `desired`.
    ///
    /// `seen` is the content read earlier in this request; the file is only
    /// locked and re-read when that content needs a change.
    fn sync_deployments(
        &self,
        path: &Path,
        seen: &Map<String, Value>,
        identifier: &str,
        desired: Option<&str>,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) {
        let wanted = desired.map(|version| Value::String(version.to_string()));
        if seen.get(identifier) == wanted.as_ref() {
            return;
        }

        let edit = |map: &mut Map<String, Value>| match wanted {
            Some(value) => {
                map.insert(identifier.to_string(), value);
            }
            None => {
                map.remove(identifier);
            }
        };
        match self.reader.update_dictionary(path, edit) {
            Ok(true) => {
                deps.refresh(path);
                tracing::info!(
                    identifier = %identifier,
                    version = ?desired,
                    path = %path.display(),
                    "Deployments updated"
                );
            }
            Ok(false) => deps.refresh(path),
            Err(SourceError::Cache(CacheError::Locked(_))) => tracing::debug!(
                path = %path.display(),
                "Deployments locked by another writer, not updating"
            ),
            Err(e) => log.push(LogKind::Source, format!("cannot update deployments: {}", e)),
        }
    }

    /// Read a dictionary source. A missing optional file is `Ok(None)`.
    pub(crate) fn read_dictionary(
        &self,
        path: &Path,
        required: bool,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) -> FarmResult<Option<Map<String, Value>>> {
        deps.track(path);
        let unusable = |reason: String| FarmError::UnparseableSource {
            path: path.display().to_string(),
            reason,
        };
        match self.reader.read(path, log) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(unusable("expected a dictionary".to_string())),
            Err(SourceError::NotFound(_)) if !required => Ok(None),
            Err(e) => Err(unusable(e.to_string())),
        }
    }
}
