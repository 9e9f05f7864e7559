//! Tenant identity and version resolution.
//!
//! # Data Flow
//! ```text
//! FarmMatch (family + captures + server key)
//!     → template.rs substitutes $suffix / $identifier from the captures
//!     → existence.rs checks each declared variable against its source,
//!       tracking the tri-state explicit existence
//!     → version.rs picks the serving version (deployments, mapped value,
//!       versions source) and syncs the deployments file
//!     → TenantContext, or Missing when the tenant does not exist
//! ```
//!
//! # Design Decisions
//! - A clean membership failure is a result (`Missing`), never an error
//! - An unusable declared source is fatal: it would otherwise hide tenants
//! - Every source consulted is recorded as a dependency of the outcome so
//!   the existence memo goes stale when any of them changes

pub mod existence;
pub mod template;
pub mod version;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Dependencies;
use crate::config::EngineConfig;
use crate::error::{FarmError, FarmResult};
use crate::observability::{FarmLog, LogKind};
use crate::routing::{FamilyDefinition, FamilyRole, FarmMatch, VariableDeclaration};
use crate::source::{SourceError, SourceReader};

pub use existence::{check_membership, Existence, Membership};
pub use template::Variables;
pub use version::{Installations, ResolvedVersion, VersionOrigin};

use version::VersionQuery;

/// Resolve a substituted path template relative to the config directory.
pub fn source_path(config: &EngineConfig, substituted: &str) -> PathBuf {
    let path = Path::new(substituted);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config.paths.config_dir.join(path)
    }
}

/// Entry point the request comes through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A web request; the live deployments override applies.
    #[default]
    Web,
    /// Maintenance and migrations; always target the statically declared version.
    Maintenance,
}

/// Everything known about the tenant a request addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub family: String,
    pub captures: Variables,
    /// Captures plus the upper-case engine variables.
    pub variables: Variables,
    pub suffix: String,
    pub identifier: String,
    /// Empty in single-version mode.
    pub version: String,
    pub code_path: Option<PathBuf>,
    pub server_key: String,
    pub existence: Existence,
    pub data_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

/// Result of resolving a matched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Found(TenantContext),
    /// The tenant does not exist. `variables` can still render a not-found page.
    Missing {
        existence: Existence,
        variables: Variables,
    },
}

/// Resolves the identity and version of the tenant behind a [`FarmMatch`].
#[derive(Debug)]
pub struct VariableResolver<'a> {
    reader: &'a SourceReader,
    config: &'a EngineConfig,
    operation: Operation,
}

impl<'a> VariableResolver<'a> {
    pub fn new(reader: &'a SourceReader, config: &'a EngineConfig, operation: Operation) -> Self {
        Self {
            reader,
            config,
            operation,
        }
    }

    /// Resolve identity, existence and version.
    ///
    /// Every file consulted is tracked in `deps`.
    pub fn resolve(
        &self,
        matched: &FarmMatch,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) -> FarmResult<ResolveOutcome> {
        let family = &matched.family;
        let (suffix_template, identifier_template) = match family.role()? {
            FamilyRole::Tenant { suffix, identifier } => (suffix, identifier),
            FamilyRole::Redirect(_) => {
                return Err(FarmError::InvalidFamily {
                    family: family.name.clone(),
                    reason: "a redirecting family cannot resolve a tenant".to_string(),
                })
            }
        };

        let mut variables = matched.captures.clone();
        variables.insert(template::SERVER, matched.server_key.clone());
        variables.insert(
            template::CONFIG,
            self.config.paths.config_dir.to_string_lossy().into_owned(),
        );
        let suffix = variables.substitute(suffix_template);
        variables.insert(template::SUFFIX, suffix.clone());
        let identifier = variables.substitute(identifier_template);
        variables.insert(template::WIKIID, identifier.clone());

        let identity_names = matched.captures.referenced_by(identifier_template);
        let mut existence = Existence::Unknown;
        let mut mapped = None;

        for declaration in &family.variables {
            if declaration.is_advisory() {
                continue;
            }
            let value = matched.captures.get(&declaration.variable).unwrap_or_default();
            let choices = self.variable_choices(declaration, &variables, deps, log)?;
            let membership =
                check_membership(&choices, value).map_err(|reason| FarmError::UnparseableSource {
                    path: self.describe_source(declaration, &variables),
                    reason,
                })?;

            match membership {
                Membership::Member { mapped: version } => {
                    existence.affirm();
                    if mapped.is_none() {
                        mapped = version;
                    }
                }
                Membership::NotMember if identity_names.contains(&declaration.variable) => {
                    existence.deny();
                    tracing::debug!(
                        variable = %declaration.variable,
                        value = %value,
                        identifier = %identifier,
                        "Identifier variable not listed"
                    );
                    return Ok(ResolveOutcome::Missing {
                        existence,
                        variables,
                    });
                }
                Membership::NotMember if existence.is_explicit() => {
                    log.push(
                        LogKind::Existence,
                        format!(
                            "'{}' is not a listed value of '{}' but '{}' is declared to exist",
                            value, declaration.variable, identifier
                        ),
                    );
                }
                Membership::NotMember => {
                    return Ok(ResolveOutcome::Missing {
                        existence,
                        variables,
                    });
                }
            }
        }

        let query = VersionQuery {
            family,
            variables: &variables,
            identifier: &identifier,
            suffix: &suffix,
            existence,
            mapped,
        };
        let Some(resolved) = self.resolve_version(query, deps, log)? else {
            return Ok(ResolveOutcome::Missing {
                existence,
                variables,
            });
        };

        variables.insert(template::VERSION, resolved.version.clone());
        if let Some(code) = &resolved.code_path {
            variables.insert(template::CODE, code.to_string_lossy().into_owned());
        }
        let data_dir = self.templated_path(family.data.as_deref(), &variables);
        if let Some(data) = &data_dir {
            variables.insert(template::DATA, data.to_string_lossy().into_owned());
        }
        let cache_dir = self.templated_path(family.cache.as_deref(), &variables);
        if let Some(cache) = &cache_dir {
            variables.insert(template::CACHE, cache.to_string_lossy().into_owned());
        }

        tracing::debug!(
            identifier = %identifier,
            version = %resolved.version,
            origin = ?resolved.origin,
            "Tenant resolved"
        );
        Ok(ResolveOutcome::Found(TenantContext {
            family: family.name.clone(),
            captures: matched.captures.clone(),
            variables,
            suffix,
            identifier,
            version: resolved.version,
            code_path: resolved.code_path,
            server_key: matched.server_key.clone(),
            existence,
            data_dir,
            cache_dir,
        }))
    }

    /// The family's not-found page, when declared and present on disk.
    pub fn not_found_page(&self, family: &FamilyDefinition, variables: &Variables) -> Option<PathBuf> {
        self.templated_path(family.not_found.as_deref(), variables)
            .filter(|page| page.is_file())
    }

    pub(crate) fn source_path(&self, substituted: &str) -> PathBuf {
        source_path(self.config, substituted)
    }

    fn templated_path(&self, template: Option<&str>, variables: &Variables) -> Option<PathBuf> {
        template.map(|t| self.source_path(&variables.substitute(t)))
    }

    fn variable_choices(
        &self,
        declaration: &VariableDeclaration,
        variables: &Variables,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) -> FarmResult<Value> {
        if let Some(values) = &declaration.values {
            return Ok(values.clone());
        }
        let Some(file) = &declaration.file else {
            return Ok(Value::Null);
        };
        let path = self.source_path(&variables.substitute(file));
        deps.track(&path);
        self.reader.read(&path, log).map_err(|e| {
            let reason = match e {
                SourceError::NotFound(_) => "declared but missing".to_string(),
                other => other.to_string(),
            };
            FarmError::UnparseableSource {
                path: path.display().to_string(),
                reason,
            }
        })
    }

    fn describe_source(&self, declaration: &VariableDeclaration, variables: &Variables) -> String {
        match &declaration.file {
            Some(file) => self.source_path(&variables.substitute(file)).display().to_string(),
            None => format!("inline values of '{}'", declaration.variable),
        }
    }
}
