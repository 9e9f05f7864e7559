//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! FarmRequest (host, path, operation, registry support?)
//!     → Farms::load + FarmRouter        (farms file, redirects)
//!     → wikis/<serverKey> memo          (web requests only)
//!         or VariableResolver           (identity, existence, version)
//!     → ConfigCompiler                  (config/<serverKey> snapshot)
//!     → environment/<serverKey> memo    (last reported registry support)
//!     → ComponentActivator              (plan, written back)
//!     → Artifact
//! ```
//!
//! # Design Decisions
//! - Each request owns its reader, log and intermediate values; only the
//!   cache directory is shared between requests
//! - Fatal errors abort before any snapshot of the failing stage is written
//!   and are also recorded as the last log entry
//! - Maintenance runs neither read nor write the existence memo, since they
//!   resolve versions differently from web requests

pub mod artifact;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::{self, CacheStore, Dependencies, Namespace};
use crate::compiler::{ConfigCompiler, MergedConfiguration};
use crate::components::{ActivationPlan, ComponentActivator, DependencyManifest, Detector};
use crate::config::EngineConfig;
use crate::error::{FarmError, FarmResult};
use crate::observability::{tracing::request_span, FarmLog, LogKind};
use crate::resolver::{Operation, ResolveOutcome, TenantContext, VariableResolver, Variables};
use crate::routing::{FarmMatch, FarmRouter, Farms};
use crate::source::SourceReader;

pub use artifact::{ActivatedComponent, Artifact};

/// One request to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmRequest {
    pub host: String,
    pub path: String,
    pub operation: Operation,
    /// Whether the host supports registry activation, once it knows.
    pub registry_supported: Option<bool>,
}

impl FarmRequest {
    pub fn web(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            operation: Operation::Web,
            registry_supported: None,
        }
    }

    pub fn maintenance(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation: Operation::Maintenance,
            ..Self::web(host, path)
        }
    }

    pub fn with_registry(mut self, supported: bool) -> Self {
        self.registry_supported = Some(supported);
        self
    }
}

/// A tenant that does not exist, or a request no family matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotFound {
    pub server_key: Option<String>,
    pub family: Option<String>,
    /// Family-declared not-found page, when present on disk.
    pub page: Option<PathBuf>,
}

/// Everything computed for an existing tenant.
#[derive(Debug, Clone)]
pub struct CompiledWiki {
    pub context: TenantContext,
    pub config: MergedConfiguration,
    pub plan: ActivationPlan,
    pub artifact: Artifact,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Box<CompiledWiki>),
    NotFound(NotFound),
}

/// Result of one request with its soft-failure log.
#[derive(Debug)]
pub struct FarmResponse {
    pub outcome: FarmResult<Resolution>,
    pub log: FarmLog,
    /// Files parsed from source while serving the request.
    pub parses: usize,
}

/// Memoized existence of the tenant behind a server key.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ExistenceRecord {
    Exists(TenantContext),
    Missing { variables: Variables },
}

/// Resolves requests against one farm.
#[derive(Debug, Clone)]
pub struct FarmEngine {
    config: EngineConfig,
    cache: Option<CacheStore>,
}

impl FarmEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = config.paths.cache_dir.clone().map(CacheStore::new);
        Self { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn handle(&self, request: &FarmRequest) -> FarmResponse {
        let span = request_span(&request.host, &request.path);
        let _guard = span.enter();

        let reader = SourceReader::new(self.cache.clone());
        let mut log = FarmLog::new();
        let outcome = self.run(&reader, request, &mut log);
        match &outcome {
            Ok(Resolution::Found(wiki)) => tracing::info!(
                identifier = %wiki.context.identifier,
                version = %wiki.context.version,
                components = wiki.artifact.components.len(),
                settled = wiki.plan.is_settled(),
                soft_failures = log.entries().len(),
                "Tenant compiled"
            ),
            Ok(Resolution::NotFound(missing)) => tracing::info!(
                server_key = ?missing.server_key,
                family = ?missing.family,
                "Tenant not found"
            ),
            Err(e) => log.push(LogKind::Fatal, e.to_string()),
        }

        FarmResponse {
            outcome,
            log,
            parses: reader.parse_count(),
        }
    }

    fn run(&self, reader: &SourceReader, request: &FarmRequest, log: &mut FarmLog) -> FarmResult<Resolution> {
        let farms_path = self.config.farms_path();
        let mut deps = Dependencies::new();
        deps.track(&farms_path);
        let farms = Farms::load(reader, &farms_path, log)?;
        let router = FarmRouter::new(&farms, self.config.routing.max_redirects);
        let Some(matched) = router.route(&request.host, &request.path)? else {
            return Ok(Resolution::NotFound(NotFound {
                server_key: None,
                family: None,
                page: None,
            }));
        };

        let resolver = VariableResolver::new(reader, &self.config, request.operation);
        let (record, deps) = self.existence(&resolver, &matched, request.operation, deps, log)?;
        let ctx = match record {
            ExistenceRecord::Exists(ctx) => ctx,
            ExistenceRecord::Missing { variables } => {
                return Ok(Resolution::NotFound(NotFound {
                    server_key: Some(matched.server_key.clone()),
                    family: Some(matched.family.name.clone()),
                    page: resolver.not_found_page(&matched.family, &variables),
                }));
            }
        };

        let compiler = ConfigCompiler::new(reader, &self.config, self.cache.as_ref());
        let mut merged = compiler.compile(&matched.family, &ctx, &deps, log);

        let registry_supported = self.environment(&ctx.server_key, request.registry_supported, log);
        let layout = &self.config.components;
        let detector = Detector::new(layout, ctx.code_path.as_deref(), reader);
        let manifest = match &ctx.code_path {
            Some(code) => DependencyManifest::load(
                reader,
                &code.join(&layout.dependency_manifest),
                &mut Dependencies::new(),
                log,
            ),
            None => DependencyManifest::default(),
        };
        let plan = ComponentActivator::new(detector, &manifest, &layout.self_component).activate(
            &mut merged,
            registry_supported,
            log,
        );
        let artifact = Artifact::build(&ctx, &merged, &plan, &detector, layout);

        Ok(Resolution::Found(Box::new(CompiledWiki {
            context: ctx,
            config: merged,
            plan,
            artifact,
        })))
    }

    /// Existence and identity, from the `wikis` memo when possible.
    fn existence(
        &self,
        resolver: &VariableResolver<'_>,
        matched: &FarmMatch,
        operation: Operation,
        mut deps: Dependencies,
        log: &mut FarmLog,
    ) -> FarmResult<(ExistenceRecord, Dependencies)> {
        let memo = self.cache.as_ref().filter(|_| operation == Operation::Web);
        if let Some(store) = memo {
            if let Some(cached) = store.load_fresh::<ExistenceRecord>(Namespace::Wikis, &matched.server_key) {
                tracing::debug!(server_key = %matched.server_key, "Existence served from cache");
                return Ok((cached.payload, cached.dependencies));
            }
        }

        let record = match resolver.resolve(matched, &mut deps, log)? {
            ResolveOutcome::Found(ctx) => ExistenceRecord::Exists(ctx),
            ResolveOutcome::Missing { variables, .. } => ExistenceRecord::Missing { variables },
        };
        if let Some(store) = memo {
            cache::report_write(
                store.store(Namespace::Wikis, &matched.server_key, &record, &deps),
                log,
            );
        }
        Ok((record, deps))
    }

    /// Registry support reported now, or remembered from an earlier request.
    fn environment(&self, server_key: &str, reported: Option<bool>, log: &mut FarmLog) -> Option<bool> {
        let Some(store) = self.cache.as_ref() else {
            return reported;
        };
        let remembered = store
            .load::<bool>(Namespace::Environment, server_key)
            .map(|cached| cached.payload);
        match reported {
            Some(supported) => {
                if remembered != Some(supported) {
                    cache::report_write(
                        store.store(Namespace::Environment, server_key, &supported, &Dependencies::new()),
                        log,
                    );
                }
                Some(supported)
            }
            None => remembered,
        }
    }
}
