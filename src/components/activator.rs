//! Component activation.
//!
//! # State Transitions
//! ```text
//! Unresolved → Deactivated          control setting is false
//! Unresolved → Composer             true / "composer" and a package is installed
//! Unresolved → Inline               "inline", or true without a usable registry
//! Unresolved → Registry             "registry", or true, with manifest + host support
//! Unresolved → AwaitingEnvironment  the choice hinges on host support not yet known
//! Unresolved → Error                nothing usable; logged and left inactive
//! AwaitingEnvironment → Inline | Registry | Error   (ActivationPlan::settle)
//! ```
//! The engine's own entry falls back to Inline instead of Error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compiler::MergedConfiguration;
use crate::components::candidate::{self, ComponentCandidate, ComponentKind, Mechanism};
use crate::components::detect::{Detector, Footprint};
use crate::components::manifest::DependencyManifest;
use crate::components::ordering;
use crate::observability::{metrics, FarmLog, LogKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    Unresolved,
    Deactivated,
    AwaitingEnvironment,
    Composer,
    Inline,
    Registry,
    Error,
}

impl ActivationState {
    pub fn mechanism(&self) -> Option<Mechanism> {
        match self {
            ActivationState::Composer => Some(Mechanism::Composer),
            ActivationState::Inline => Some(Mechanism::Inline),
            ActivationState::Registry => Some(Mechanism::Registry),
            _ => None,
        }
    }
}

/// Parsed value of an `enable-<kind>-<Name>` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Off,
    On,
    Composer,
    Inline,
    Registry,
    Invalid,
}

impl Control {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Control::Off,
            Some(Value::Bool(true)) => Control::On,
            Some(Value::String(s)) => match s.as_str() {
                "composer" => Control::Composer,
                "inline" => Control::Inline,
                "registry" => Control::Registry,
                _ => Control::Invalid,
            },
            Some(_) => Control::Invalid,
        }
    }
}

/// Decide how one component activates.
///
/// `registry_supported` is `None` while the host has not reported whether it
/// supports registry activation.
pub fn decide(
    control: Control,
    footprint: &Footprint,
    registry_supported: Option<bool>,
    is_self: bool,
) -> ActivationState {
    use ActivationState as S;

    let registry = |fallback: S| match registry_supported {
        None => S::AwaitingEnvironment,
        Some(true) => S::Registry,
        Some(false) => fallback,
    };
    let inline_or_error = if footprint.inline { S::Inline } else { S::Error };

    let state = match control {
        Control::Off => return S::Deactivated,
        Control::Invalid => S::Error,
        Control::On | Control::Composer if footprint.package.is_some() => S::Composer,
        Control::Composer => S::Error,
        Control::Inline => inline_or_error,
        Control::Registry if footprint.registry => registry(S::Error),
        Control::Registry => S::Error,
        Control::On if footprint.registry => registry(inline_or_error),
        Control::On => inline_or_error,
    };
    if state == S::Error && is_self {
        S::Inline
    } else {
        state
    }
}

/// One component in the activation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedComponent {
    pub key: String,
    pub kind: ComponentKind,
    pub name: String,
    pub state: ActivationState,
    pub sequence: i64,
    control: Control,
    footprint: Footprint,
    is_self: bool,
}

impl PlannedComponent {
    pub fn new(
        key: impl Into<String>,
        kind: ComponentKind,
        name: impl Into<String>,
        state: ActivationState,
        sequence: i64,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            name: name.into(),
            state,
            sequence,
            control: Control::On,
            footprint: Footprint::default(),
            is_self: false,
        }
    }
}

/// Ordered activation decisions for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPlan {
    entries: Vec<PlannedComponent>,
    graph: BTreeMap<String, Vec<String>>,
}

impl ActivationPlan {
    /// Every candidate, in activation order.
    pub fn entries(&self) -> &[PlannedComponent] {
        &self.entries
    }

    pub fn is_settled(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| e.state == ActivationState::AwaitingEnvironment)
    }

    /// Decide every deferred component now that host support is known.
    ///
    /// Uses only what was detected when the plan was built.
    pub fn settle(&mut self, registry_supported: bool, log: &mut FarmLog) {
        for entry in &mut self.entries {
            if entry.state != ActivationState::AwaitingEnvironment {
                continue;
            }
            entry.state = decide(entry.control, &entry.footprint, Some(registry_supported), entry.is_self);
            if entry.state == ActivationState::Error {
                report_unusable(entry, log);
            }
        }
        self.entries = ordering::order(std::mem::take(&mut self.entries), &self.graph);
    }

    /// Record mechanisms, final sequences and the dependency-managed list.
    pub fn write_back(&self, merged: &mut MergedConfiguration) {
        merged.dependency_managed.clear();
        for entry in &self.entries {
            let candidate = merged
                .components
                .entry(entry.key.clone())
                .or_insert_with(|| ComponentCandidate::new(entry.kind, entry.name.clone(), entry.sequence));
            candidate.mechanism = entry.state.mechanism();
            candidate.sequence = entry.sequence;
            if entry.state == ActivationState::Composer {
                merged.dependency_managed.push(entry.key.clone());
            }
        }
    }
}

/// Builds activation plans from detected footprints.
#[derive(Debug)]
pub struct ComponentActivator<'a> {
    detector: Detector<'a>,
    manifest: &'a DependencyManifest,
    self_key: String,
}

impl<'a> ComponentActivator<'a> {
    pub fn new(detector: Detector<'a>, manifest: &'a DependencyManifest, self_component: &str) -> Self {
        Self {
            detector,
            manifest,
            self_key: candidate::component_key(ComponentKind::Extension, self_component),
        }
    }

    /// Decide, walk dependencies, order, and write the result back into `merged`.
    pub fn activate(
        &self,
        merged: &mut MergedConfiguration,
        registry_supported: Option<bool>,
        log: &mut FarmLog,
    ) -> ActivationPlan {
        let mut entries: Vec<PlannedComponent> = merged
            .components
            .iter()
            .map(|(key, c)| {
                let control = Control::from_value(merged.control_value(c.kind, &c.name));
                let footprint = self.detector.detect(c.kind, &c.name, log);
                let is_self = *key == self.self_key;
                let state = decide(control, &footprint, registry_supported, is_self);
                PlannedComponent {
                    key: key.clone(),
                    kind: c.kind,
                    name: c.name.clone(),
                    state,
                    sequence: c.sequence,
                    control,
                    footprint,
                    is_self,
                }
            })
            .collect();

        for entry in &entries {
            if entry.state == ActivationState::Error {
                report_unusable(entry, log);
            }
        }

        let graph = self.walk_dependencies(&mut entries, log);
        let plan = ActivationPlan {
            entries: ordering::order(entries, &graph),
            graph,
        };
        plan.write_back(merged);
        plan
    }

    /// Pull in the dependencies of every dependency-managed component.
    fn walk_dependencies(
        &self,
        entries: &mut Vec<PlannedComponent>,
        log: &mut FarmLog,
    ) -> BTreeMap<String, Vec<String>> {
        let mut graph = BTreeMap::new();
        let mut queue: Vec<String> = entries
            .iter()
            .filter(|e| e.state == ActivationState::Composer)
            .map(|e| e.key.clone())
            .collect();
        let mut next_auto = -1;

        while let Some(key) = queue.pop() {
            if graph.contains_key(&key) {
                continue;
            }
            let dependencies = self.manifest.dependencies_of(&key).to_vec();
            for dep in &dependencies {
                match entries.iter_mut().find(|e| e.key == *dep) {
                    Some(existing) if existing.state == ActivationState::Composer => {}
                    Some(existing) => {
                        tracing::debug!(component = %dep, required_by = %key, "Switching to dependency-managed activation");
                        existing.state = ActivationState::Composer;
                        queue.push(dep.clone());
                    }
                    None => {
                        let Some((kind, name)) = candidate::parse_component_key(dep) else {
                            log.push(
                                LogKind::Component,
                                format!("'{}' depends on unknown component key '{}'", key, dep),
                            );
                            continue;
                        };
                        let mut pulled =
                            PlannedComponent::new(dep.clone(), kind, name, ActivationState::Composer, next_auto);
                        pulled.footprint = self.detector.detect(kind, name, log);
                        next_auto -= 1;
                        entries.push(pulled);
                        queue.push(dep.clone());
                    }
                }
            }
            graph.insert(key, dependencies);
        }
        graph
    }
}

fn report_unusable(entry: &PlannedComponent, log: &mut FarmLog) {
    metrics::record_component_error();
    let reason = match entry.control {
        Control::Invalid => "its control setting is not true, false, \"composer\", \"inline\" or \"registry\"",
        _ => "no usable activation mechanism was found",
    };
    log.push(
        LogKind::Component,
        format!("component '{}' is deactivated: {}", entry.key, reason),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::priority;
    use crate::config::ComponentLayout;
    use crate::source::SourceReader;
    use serde_json::json;
    use std::fs;

    fn state_of(plan: &ActivationPlan, key: &str) -> ActivationState {
        plan.entries().iter().find(|e| e.key == key).unwrap().state
    }
    use std::path::Path;

    fn fp(package: bool, inline: bool, registry: bool) -> Footprint {
        Footprint {
            package: package.then(|| "acme/pkg".to_string()),
            inline,
            registry,
        }
    }

    #[test]
    fn test_decide() {
        use ActivationState as S;
        assert_eq!(decide(Control::Off, &fp(true, true, true), Some(true), false), S::Deactivated);
        assert_eq!(decide(Control::On, &fp(true, true, true), None, false), S::Composer);
        assert_eq!(decide(Control::On, &fp(false, true, true), None, false), S::AwaitingEnvironment);
        assert_eq!(decide(Control::On, &fp(false, true, true), Some(true), false), S::Registry);
        assert_eq!(decide(Control::On, &fp(false, true, true), Some(false), false), S::Inline);
        assert_eq!(decide(Control::On, &fp(false, true, false), None, false), S::Inline);
        assert_eq!(decide(Control::Inline, &fp(false, true, true), Some(true), false), S::Inline);
        assert_eq!(decide(Control::Registry, &fp(false, true, true), Some(false), false), S::Error);
        assert_eq!(decide(Control::Composer, &fp(false, true, true), Some(true), false), S::Error);
        assert_eq!(decide(Control::On, &fp(false, false, false), None, false), S::Error);
        assert_eq!(decide(Control::On, &fp(false, false, false), None, true), S::Inline);
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn merged_with(settings: &[(&str, Value)]) -> MergedConfiguration {
        let mut merged = MergedConfiguration::new();
        for (name, value) in settings {
            merged.apply(name, priority::DEFAULT, value.clone());
        }
        merged
    }

    #[test]
    fn test_missing_component_is_deactivated_with_one_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ComponentLayout::default();
        let reader = SourceReader::new(None);
        let manifest = DependencyManifest::default();
        let activator =
            ComponentActivator::new(Detector::new(&layout, Some(dir.path()), &reader), &manifest, "WikiFarm");

        let mut merged = merged_with(&[("enable-extension-Foo", json!(true))]);
        let mut log = FarmLog::new();
        let plan = activator.activate(&mut merged, Some(true), &mut log);

        assert_eq!(state_of(&plan, "extension-Foo"), ActivationState::Error);
        assert_eq!(log.count(LogKind::Component), 1);
        assert_eq!(merged.components["extension-Foo"].mechanism, None);
    }

    #[test]
    fn test_dependencies_are_pulled_in_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path();
        for (dir_name, name) in [("extensions", "A"), ("extensions", "B")] {
            let comp = code.join(dir_name).join(name);
            fs::create_dir_all(&comp).unwrap();
            fs::write(
                comp.join("composer.json"),
                format!(r#"{{"name": "acme/{}"}}"#, name.to_lowercase()),
            )
            .unwrap();
            fs::create_dir_all(code.join("vendor/acme").join(name.to_lowercase())).unwrap();
        }
        touch(&code.join("skins/Base/Base.php"));

        let layout = ComponentLayout::default();
        let reader = SourceReader::new(None);
        let manifest = DependencyManifest::from_pairs([
            ("extension-A", vec!["extension-B", "extension-Lib"]),
            ("extension-B", vec!["skin-Base"]),
        ]);
        let activator =
            ComponentActivator::new(Detector::new(&layout, Some(code), &reader), &manifest, "WikiFarm");

        let mut merged = merged_with(&[
            ("enable-extension-A", json!(true)),
            ("enable-skin-Base", json!("inline")),
        ]);
        let mut log = FarmLog::new();
        let plan = activator.activate(&mut merged, Some(false), &mut log);

        assert!(plan.entries().iter().all(|e| e.state.mechanism().is_some()));
        let seq = |key: &str| merged.components[key].sequence;
        assert!(seq("extension-B") < seq("extension-A"));
        assert!(seq("extension-Lib") < seq("extension-A"));
        assert!(seq("skin-Base") < seq("extension-B"));
        assert_eq!(merged.components["skin-Base"].mechanism, Some(Mechanism::Composer));
        assert_eq!(
            merged.dependency_managed,
            vec!["skin-Base", "extension-Lib", "extension-B", "extension-A"]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_settle_resolves_deferred_components() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("extensions/Reg/extension.json"));
        touch(&dir.path().join("extensions/Reg/Reg.php"));

        let layout = ComponentLayout::default();
        let reader = SourceReader::new(None);
        let manifest = DependencyManifest::default();
        let activator =
            ComponentActivator::new(Detector::new(&layout, Some(dir.path()), &reader), &manifest, "WikiFarm");

        let mut merged = merged_with(&[("enable-extension-Reg", json!(true))]);
        let mut log = FarmLog::new();
        let mut plan = activator.activate(&mut merged, None, &mut log);
        assert!(!plan.is_settled());

        plan.settle(true, &mut log);
        assert!(plan.is_settled());
        assert_eq!(state_of(&plan, "extension-Reg"), ActivationState::Registry);
        plan.write_back(&mut merged);
        assert_eq!(merged.components["extension-Reg"].mechanism, Some(Mechanism::Registry));
        assert!(log.is_empty());
    }
}
