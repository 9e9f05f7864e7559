//! On-disk detection of activation mechanisms.
//!
//! # Responsibilities
//! - Locate a component's directory inside the tenant's code path
//! - Find a dependency-manager package installed for it
//! - Check for the inline entry file and the registry manifest

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::components::candidate::ComponentKind;
use crate::config::ComponentLayout;
use crate::observability::FarmLog;
use crate::source::SourceReader;

/// What exists on disk for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footprint {
    /// Name of the installed dependency-manager package.
    pub package: Option<String>,
    /// The fixed-name inline entry file exists.
    pub inline: bool,
    /// The registry manifest exists.
    pub registry: bool,
}

impl Footprint {
    pub fn is_empty(&self) -> bool {
        self.package.is_none() && !self.inline && !self.registry
    }
}

/// Inspects a code directory for component footprints.
#[derive(Debug, Clone, Copy)]
pub struct Detector<'a> {
    layout: &'a ComponentLayout,
    code_path: Option<&'a Path>,
    reader: &'a SourceReader,
}

impl<'a> Detector<'a> {
    pub fn new(layout: &'a ComponentLayout, code_path: Option<&'a Path>, reader: &'a SourceReader) -> Self {
        Self {
            layout,
            code_path,
            reader,
        }
    }

    pub fn component_dir(&self, kind: ComponentKind, name: &str) -> Option<PathBuf> {
        let dir = match kind {
            ComponentKind::Extension => &self.layout.extensions_dir,
            ComponentKind::Skin => &self.layout.skins_dir,
        };
        self.code_path.map(|code| code.join(dir).join(name))
    }

    pub fn detect(&self, kind: ComponentKind, name: &str, log: &mut FarmLog) -> Footprint {
        let Some(dir) = self.component_dir(kind, name) else {
            return Footprint::default();
        };
        let manifest = match kind {
            ComponentKind::Extension => &self.layout.extension_manifest,
            ComponentKind::Skin => &self.layout.skin_manifest,
        };
        let inline_entry = self.layout.inline_entry.replace("$NAME", name);

        Footprint {
            package: self.installed_package(&dir, log),
            inline: dir.join(inline_entry).is_file(),
            registry: dir.join(manifest).is_file(),
        }
    }

    fn installed_package(&self, dir: &Path, log: &mut FarmLog) -> Option<String> {
        let code = self.code_path?;
        let manifest = dir.join(&self.layout.package_manifest);
        if !manifest.is_file() {
            return None;
        }
        let package = match self.reader.read(&manifest, log) {
            Ok(value) => value.get("name").and_then(Value::as_str).map(str::to_string),
            Err(e) => {
                tracing::debug!(path = %manifest.display(), error = %e, "Unreadable package manifest");
                None
            }
        }?;
        code.join(&self.layout.vendor_dir)
            .join(&package)
            .is_dir()
            .then_some(package)
    }
}
