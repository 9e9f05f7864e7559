//! Configuration compilation.
//!
//! # Data Flow
//! ```text
//! TenantContext + family config sources (declaration order)
//!     → executable sources        → include_files (verbatim, substituted)
//!     → selector.rs               → literal priority, or wildcard keys
//!     → SourceReader              → dictionary of settings
//!     → priority.rs ledger        → settings / arrays (+name) by priority
//!     → enable-<kind>-<Name>      → component candidates
//!     → MergedConfiguration
//!
//! config/<serverKey> snapshot
//!     → fresh and same fingerprint: served without reading any source
//! ```
//!
//! # Design Decisions
//! - Declaration order only breaks ties; priority decides overrides
//! - A broken settings file is logged and skipped, never fatal
//! - The snapshot fingerprint covers everything besides file content that
//!   changes the result (family, identifier, suffix, version)

pub mod merge;
pub mod priority;
pub mod selector;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{self, CacheStore, Dependencies, Namespace};
use crate::components::candidate::{self, ComponentCandidate, ComponentKind};
use crate::config::EngineConfig;
use crate::observability::{FarmLog, LogKind};
use crate::resolver::{self, TenantContext};
use crate::routing::{ConfigSourceDescriptor, FamilyDefinition};
use crate::source::{SourceError, SourceReader};

pub use merge::{merge_array_diff, merged};
pub use priority::{Ledger, Priority};
pub use selector::{Selector, WildcardKeys};

/// Leading character of an array-diff setting name.
pub const ARRAY_MARKER: char = '+';

/// Settings, array-diffs and components accumulated for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedConfiguration {
    pub settings: Ledger,
    pub arrays: Ledger,
    /// Keyed `extension-<Name>` / `skin-<Name>`.
    pub components: BTreeMap<String, ComponentCandidate>,
    /// Components whose code the dependency manager loads, in activation order.
    pub dependency_managed: Vec<String>,
    pub include_files: Vec<PathBuf>,
    next_sequence: i64,
}

impl MergedConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one setting of a literal-selector source.
    pub fn apply(&mut self, name: &str, priority: Priority, value: Value) {
        if let Some(array) = name.strip_prefix(ARRAY_MARKER) {
            self.arrays.merge_apply(array, priority, value);
        } else if self.settings.apply(name, priority, value) {
            self.register_control(name);
        }
    }

    /// Apply one setting of a wildcard-selector source.
    ///
    /// `values` maps selector keys to values; the best key this tenant
    /// selects is applied. When none applies, the tentative entry for the
    /// setting is withdrawn again, with any component it registered.
    pub fn apply_selected(&mut self, name: &str, keys: &WildcardKeys, values: &Map<String, Value>) {
        let (is_array, bare) = match name.strip_prefix(ARRAY_MARKER) {
            Some(array) => (true, array),
            None => (false, name),
        };
        let ledger = if is_array { &mut self.arrays } else { &mut self.settings };
        let tentative = ledger.placeholder(bare);

        let applied = match keys.select(values) {
            Some((priority, value)) if is_array => ledger.merge_apply(bare, priority, value.clone()),
            Some((priority, value)) => ledger.apply(bare, priority, value.clone()),
            None => false,
        };

        if applied {
            if !is_array {
                self.register_control(bare);
            }
        } else if ledger.discard_placeholder(bare) && tentative && !is_array {
            if let Some((kind, component)) = candidate::parse_control_setting(bare) {
                let key = candidate::component_key(kind, component);
                self.components.remove(&key);
            }
        }
    }

    /// Register a candidate unless it is known already. Returns whether it was new.
    pub fn register_candidate(&mut self, kind: ComponentKind, name: &str) -> bool {
        let key = candidate::component_key(kind, name);
        if self.components.contains_key(&key) {
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.components
            .insert(key, ComponentCandidate::new(kind, name, sequence));
        true
    }

    /// Value of a component's controlling setting.
    pub fn control_value(&self, kind: ComponentKind, name: &str) -> Option<&Value> {
        self.settings.get(&candidate::control_setting(kind, name))
    }

    fn register_control(&mut self, setting: &str) {
        if let Some((kind, name)) = candidate::parse_control_setting(setting) {
            self.register_candidate(kind, name);
        }
    }
}

/// What a compiled snapshot was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub family: String,
    pub identifier: String,
    pub suffix: String,
    pub version: String,
}

impl Fingerprint {
    pub fn of(ctx: &TenantContext) -> Self {
        Self {
            family: ctx.family.clone(),
            identifier: ctx.identifier.clone(),
            suffix: ctx.suffix.clone(),
            version: ctx.version.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CompiledSnapshot {
    fingerprint: Fingerprint,
    config: MergedConfiguration,
}

/// Merges a family's configuration sources for one tenant.
#[derive(Debug)]
pub struct ConfigCompiler<'a> {
    reader: &'a SourceReader,
    config: &'a EngineConfig,
    cache: Option<&'a CacheStore>,
}

impl<'a> ConfigCompiler<'a> {
    pub fn new(reader: &'a SourceReader, config: &'a EngineConfig, cache: Option<&'a CacheStore>) -> Self {
        Self {
            reader,
            config,
            cache,
        }
    }

    /// Compile, serving the `config/<serverKey>` snapshot when it is still valid.
    ///
    /// `upstream` holds the files the tenant context itself came from (at
    /// least the farms file); they become dependencies of the snapshot.
    pub fn compile(
        &self,
        family: &FamilyDefinition,
        ctx: &TenantContext,
        upstream: &Dependencies,
        log: &mut FarmLog,
    ) -> MergedConfiguration {
        let fingerprint = Fingerprint::of(ctx);
        if let Some(store) = self.cache {
            if let Some(cached) = store.load_fresh::<CompiledSnapshot>(Namespace::Config, &ctx.server_key) {
                if cached.payload.fingerprint == fingerprint {
                    tracing::debug!(server_key = %ctx.server_key, "Compiled configuration served from cache");
                    return cached.payload.config;
                }
                tracing::debug!(server_key = %ctx.server_key, "Compiled snapshot belongs to another tenant state");
            }
        }

        let mut deps = upstream.clone();
        let merged = self.compile_sources(family, ctx, &mut deps, log);

        if let Some(store) = self.cache {
            let snapshot = CompiledSnapshot {
                fingerprint,
                config: merged,
            };
            cache::report_write(
                store.store(Namespace::Config, &ctx.server_key, &snapshot, &deps),
                log,
            );
            return snapshot.config;
        }
        merged
    }

    /// Merge every source without consulting the snapshot cache.
    pub fn compile_sources(
        &self,
        family: &FamilyDefinition,
        ctx: &TenantContext,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) -> MergedConfiguration {
        let mut merged = MergedConfiguration::new();

        let own = &self.config.components.self_component;
        merged.settings.apply(
            &candidate::control_setting(ComponentKind::Extension, own),
            priority::DEFAULT,
            Value::Bool(true),
        );
        merged.register_candidate(ComponentKind::Extension, own);

        for source in &family.config {
            let path = resolver::source_path(self.config, &ctx.variables.substitute(&source.file));
            if source.executable {
                merged.include_files.push(path);
                continue;
            }
            self.merge_source(source, path, ctx, &mut merged, deps, log);
        }

        tracing::debug!(
            identifier = %ctx.identifier,
            settings = merged.settings.len(),
            arrays = merged.arrays.len(),
            components = merged.components.len(),
            "Configuration compiled"
        );
        merged
    }

    fn merge_source(
        &self,
        source: &ConfigSourceDescriptor,
        path: PathBuf,
        ctx: &TenantContext,
        merged: &mut MergedConfiguration,
        deps: &mut Dependencies,
        log: &mut FarmLog,
    ) {
        let Some(key) = &source.key else {
            return;
        };
        let selector = match Selector::parse(&ctx.variables.substitute(key)) {
            Ok(selector) => selector,
            Err(e) => {
                log.push(
                    LogKind::Source,
                    format!("invalid selector '{}' for {}: {}", key, path.display(), e),
                );
                return;
            }
        };

        let literal = match &selector {
            Selector::Literal(literal) => {
                match selector::literal_priority(literal, &ctx.identifier, &ctx.suffix) {
                    Some(priority) => Some(priority),
                    None => return,
                }
            }
            Selector::Wildcard(_) => None,
        };

        deps.track(&path);
        let settings = match self.reader.read(&path, log) {
            Ok(Value::Object(settings)) => settings,
            Ok(_) => {
                log.push(
                    LogKind::Source,
                    format!("{} is not a dictionary of settings", path.display()),
                );
                return;
            }
            Err(SourceError::NotFound(_)) => {
                tracing::debug!(path = %path.display(), "Configuration source absent");
                return;
            }
            Err(e) => {
                log.push(LogKind::Source, format!("configuration source skipped: {}", e));
                return;
            }
        };

        match (selector, literal) {
            (Selector::Wildcard(pattern), _) => {
                let default_selector = source
                    .default
                    .as_deref()
                    .map(|d| ctx.variables.substitute(d));
                let keys = WildcardKeys::derive(
                    &pattern,
                    &ctx.identifier,
                    &ctx.suffix,
                    default_selector.as_deref(),
                );
                for (name, values) in settings {
                    match values {
                        Value::Object(values) => merged.apply_selected(&name, &keys, &values),
                        _ => log.push(
                            LogKind::Source,
                            format!(
                                "setting '{}' in {} must map selector keys to values",
                                name,
                                path.display()
                            ),
                        ),
                    }
                }
            }
            (Selector::Literal(_), Some(priority)) => {
                for (name, value) in settings {
                    merged.apply(&name, priority, value);
                }
            }
            (Selector::Literal(_), None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Existence, Variables};
    use serde_json::json;
    use std::fs;

    fn context(config_dir: &std::path::Path) -> TenantContext {
        let mut variables = Variables::new();
        variables.insert("wiki", "en");
        variables.insert(resolver::template::SUFFIX, "pedia");
        variables.insert(resolver::template::WIKIID, "enpedia");
        variables.insert(
            resolver::template::CONFIG,
            config_dir.to_string_lossy().into_owned(),
        );
        TenantContext {
            family: "pedias".into(),
            captures: Variables::new(),
            variables,
            suffix: "pedia".into(),
            identifier: "enpedia".into(),
            version: "1.35".into(),
            code_path: None,
            server_key: "en.pedia.org".into(),
            existence: Existence::Affirmed,
            data_dir: None,
            cache_dir: None,
        }
    }

    fn family(config: Value) -> FamilyDefinition {
        FamilyDefinition::from_value(
            "pedias",
            &json!({"server": "x", "suffix": "$SUFFIX", "identifier": "$WIKIID", "config": config}),
        )
        .unwrap()
    }

    fn compile(dir: &std::path::Path, config: Value) -> (MergedConfiguration, FarmLog) {
        let engine = EngineConfig::with_config_dir(dir);
        let reader = SourceReader::new(None);
        let mut log = FarmLog::new();
        let merged = ConfigCompiler::new(&reader, &engine, None).compile(
            &family(config),
            &context(dir),
            &Dependencies::new(),
            &mut log,
        );
        (merged, log)
    }

    #[test]
    fn test_wildcard_default_beats_literal_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.json"), r#"{"timeout": 100}"#).unwrap();
        fs::write(dir.path().join("over.json"), r#"{"timeout": {"default": 200}}"#).unwrap();

        let (merged, _) = compile(
            dir.path(),
            json!([
                {"file": "base.json", "key": "default"},
                {"file": "over.json", "key": "*$SUFFIX", "default": "$SUFFIX"}
            ]),
        );
        assert_eq!(merged.settings.get("timeout"), Some(&json!(200)));
        assert_eq!(merged.settings.priority("timeout"), Some(priority::SUFFIX));
    }

    #[test]
    fn test_later_lower_priority_source_loses() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wiki.json"), r#"{"name": "English"}"#).unwrap();
        fs::write(dir.path().join("base.json"), r#"{"name": "Generic", "lang": "en"}"#).unwrap();
        fs::write(dir.path().join("other.json"), r#"{"name": "French"}"#).unwrap();

        let (merged, _) = compile(
            dir.path(),
            json!([
                {"file": "wiki.json", "key": "$WIKIID"},
                {"file": "base.json", "key": "default"},
                {"file": "other.json", "key": "frpedia"}
            ]),
        );
        assert_eq!(merged.settings.get("name"), Some(&json!("English")));
        assert_eq!(merged.settings.get("lang"), Some(&json!("en")));
    }

    #[test]
    fn test_arrays_and_components() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            "\"+groups\" = { user = { edit = true } }\n\"enable-extension-Foo\" = true\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("suffix.json"),
            r#"{"+groups": {"user": {"edit": false}}, "enable-skin-Vector": "registry"}"#,
        )
        .unwrap();

        let (merged, _) = compile(
            dir.path(),
            json!([
                {"file": "base.toml", "key": "default"},
                {"file": "suffix.json", "key": "$SUFFIX"},
                {"file": "hooks/$WIKIID.php", "executable": true}
            ]),
        );
        assert_eq!(merged.arrays.get("groups"), Some(&json!({"user": {"edit": false}})));
        let keys: Vec<_> = merged.components.keys().cloned().collect();
        assert_eq!(keys, vec!["extension-Foo", "extension-WikiFarm", "skin-Vector"]);
        assert_eq!(merged.components["extension-WikiFarm"].sequence, 0);
        assert_eq!(merged.include_files, vec![dir.path().join("hooks/enpedia.php")]);
    }

    #[test]
    fn test_unselected_wildcard_setting_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("wild.json"),
            r#"{"enable-extension-Bar": {"frpedia": true}, "logo": {"en": "en.png"}}"#,
        )
        .unwrap();

        let (merged, _) = compile(dir.path(), json!([{"file": "wild.json", "key": "*pedia"}]));
        assert!(merged.settings.get("enable-extension-Bar").is_none());
        assert!(!merged.components.contains_key("extension-Bar"));
        assert_eq!(merged.settings.get("logo"), Some(&json!("en.png")));
    }

    #[test]
    fn test_broken_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("base.json"), r#"{"ok": true}"#).unwrap();

        let (merged, log) = compile(
            dir.path(),
            json!([
                {"file": "broken.json", "key": "default"},
                {"file": "missing.json", "key": "default"},
                {"file": "base.json", "key": "default"}
            ]),
        );
        assert_eq!(merged.settings.get("ok"), Some(&json!(true)));
        assert_eq!(log.count(LogKind::Source), 1);
    }

    #[test]
    fn test_snapshot_served_for_same_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.json"), r#"{"timeout": 100}"#).unwrap();
        let engine = EngineConfig::with_config_dir(dir.path());
        let store = CacheStore::new(dir.path().join("cache"));
        let fam = family(json!([{"file": "base.json", "key": "default"}]));
        let ctx = context(dir.path());

        let mut log = FarmLog::new();
        let first_reader = SourceReader::new(None);
        let first = ConfigCompiler::new(&first_reader, &engine, Some(&store))
            .compile(&fam, &ctx, &Dependencies::new(), &mut log);

        let second_reader = SourceReader::new(None);
        let second = ConfigCompiler::new(&second_reader, &engine, Some(&store))
            .compile(&fam, &ctx, &Dependencies::new(), &mut log);
        assert_eq!(first, second);
        assert_eq!(second_reader.parse_count(), 0);

        let mut upgraded = ctx.clone();
        upgraded.version = "1.36".into();
        let third_reader = SourceReader::new(None);
        ConfigCompiler::new(&third_reader, &engine, Some(&store))
            .compile(&fam, &upgraded, &Dependencies::new(), &mut log);
        assert_eq!(third_reader.parse_count(), 1);
    }
}
