//! The artifact handed to the host application.
//!
//! Apply the settings as top-level bindings, merge the array-diffs into the
//! host's own defaults, activate the components in order, then run the
//! include files in order.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compiler::{merge_array_diff, MergedConfiguration};
use crate::components::{candidate, ActivationPlan, ActivationState, ComponentKind, Detector, Mechanism};
use crate::config::ComponentLayout;
use crate::resolver::TenantContext;

/// One component to activate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatedComponent {
    pub name: String,
    pub kind: ComponentKind,
    pub mechanism: Mechanism,
    /// Inline entry file or registry manifest; `None` for dependency-managed code.
    pub target: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub identifier: String,
    pub suffix: String,
    pub version: String,
    pub code_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub settings: Map<String, Value>,
    pub arrays: Map<String, Value>,
    /// In activation order.
    pub components: Vec<ActivatedComponent>,
    /// Components waiting for the host to report registry support.
    pub pending: Vec<String>,
    pub dependency_managed: Vec<String>,
    pub include_files: Vec<PathBuf>,
}

impl Artifact {
    pub fn build(
        ctx: &TenantContext,
        merged: &MergedConfiguration,
        plan: &ActivationPlan,
        detector: &Detector<'_>,
        layout: &ComponentLayout,
    ) -> Self {
        let settings = merged
            .settings
            .iter()
            .filter(|(name, _)| candidate::parse_control_setting(name).is_none())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let arrays = merged
            .arrays
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        let mut components = Vec::new();
        let mut pending = Vec::new();
        for entry in plan.entries() {
            if entry.state == ActivationState::AwaitingEnvironment {
                pending.push(entry.key.clone());
            }
            let Some(mechanism) = entry.state.mechanism() else {
                continue;
            };
            let dir = detector.component_dir(entry.kind, &entry.name);
            let target = match (mechanism, dir) {
                (Mechanism::Inline, Some(dir)) => Some(dir.join(layout.inline_entry.replace("$NAME", &entry.name))),
                (Mechanism::Registry, Some(dir)) => Some(dir.join(match entry.kind {
                    ComponentKind::Extension => &layout.extension_manifest,
                    ComponentKind::Skin => &layout.skin_manifest,
                })),
                _ => None,
            };
            components.push(ActivatedComponent {
                name: entry.name.clone(),
                kind: entry.kind,
                mechanism,
                target,
            });
        }

        Self {
            identifier: ctx.identifier.clone(),
            suffix: ctx.suffix.clone(),
            version: ctx.version.clone(),
            code_path: ctx.code_path.clone(),
            data_dir: ctx.data_dir.clone(),
            cache_dir: ctx.cache_dir.clone(),
            settings,
            arrays,
            components,
            pending,
            dependency_managed: merged.dependency_managed.clone(),
            include_files: merged.include_files.clone(),
        }
    }

    /// Merge the array-diffs into the host's defaults.
    pub fn apply_arrays(&self, host_defaults: &mut Map<String, Value>) {
        for (name, diff) in &self.arrays {
            match host_defaults.get_mut(name) {
                Some(existing) => merge_array_diff(existing, diff.clone()),
                None => {
                    host_defaults.insert(name.clone(), diff.clone());
                }
            }
        }
    }
}
