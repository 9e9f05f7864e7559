//! Component candidates and their naming conventions.
//!
//! A component is keyed `extension-<Name>` or `skin-<Name>`; its controlling
//! setting is the same key prefixed with `enable-`.

use serde::{Deserialize, Serialize};

const CONTROL_PREFIX: &str = "enable-";

/// Kind of optional component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Extension,
    Skin,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Extension => "extension",
            ComponentKind::Skin => "skin",
        }
    }

    /// Skins sort before extensions.
    pub fn weight(&self) -> u8 {
        match self {
            ComponentKind::Skin => 0,
            ComponentKind::Extension => 1,
        }
    }
}

/// How a component gets activated in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    /// Installed by the dependency manager; loaded through its autoloader.
    Composer,
    /// Fixed-name source file included at load time.
    Inline,
    /// Deferred, host-managed activation by name.
    Registry,
}

/// A component requested by the merged configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCandidate {
    pub name: String,
    pub kind: ComponentKind,
    pub mechanism: Option<Mechanism>,
    /// Negative for components pulled in only as dependencies.
    pub sequence: i64,
}

impl ComponentCandidate {
    pub fn new(kind: ComponentKind, name: impl Into<String>, sequence: i64) -> Self {
        Self {
            name: name.into(),
            kind,
            mechanism: None,
            sequence,
        }
    }
}

/// `extension-Foo` / `skin-Bar`.
pub fn component_key(kind: ComponentKind, name: &str) -> String {
    format!("{}-{}", kind.as_str(), name)
}

/// Split a component key into kind and name.
pub fn parse_component_key(key: &str) -> Option<(ComponentKind, &str)> {
    let (kind, name) = if let Some(name) = key.strip_prefix("extension-") {
        (ComponentKind::Extension, name)
    } else if let Some(name) = key.strip_prefix("skin-") {
        (ComponentKind::Skin, name)
    } else {
        return None;
    };
    (!name.is_empty()).then_some((kind, name))
}

/// The setting that controls a component.
pub fn control_setting(kind: ComponentKind, name: &str) -> String {
    format!("{}{}", CONTROL_PREFIX, component_key(kind, name))
}

/// Recognise `enable-extension-<Name>` / `enable-skin-<Name>`.
pub fn parse_control_setting(setting: &str) -> Option<(ComponentKind, &str)> {
    setting.strip_prefix(CONTROL_PREFIX).and_then(parse_component_key)
}
