//! Configuration schema definitions.
//!
//! This module defines the engine's own settings: where the farm lives on
//! disk, how components are laid out inside a code directory, and logging.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the farm engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Filesystem locations.
    pub paths: PathsConfig,

    /// Host/path routing limits.
    pub routing: RoutingConfig,

    /// On-disk layout of optional components.
    pub components: ComponentLayout,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Build a configuration rooted at `config_dir` with every other field defaulted.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.paths.config_dir = config_dir.into();
        config
    }

    /// Absolute path of the farms definition file.
    pub fn farms_path(&self) -> PathBuf {
        self.paths.config_dir.join(&self.paths.farms_file)
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the farms file and every relative source path.
    pub config_dir: PathBuf,

    /// Farms definition file, relative to `config_dir`.
    pub farms_file: PathBuf,

    /// Root holding one directory per installed version.
    /// `None` runs the farm in single-version mode.
    pub code_root: Option<PathBuf>,

    /// The host's own installation, used in single-version mode.
    pub code_dir: Option<PathBuf>,

    /// Snapshot directory. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::new(),
            farms_file: PathBuf::from("farms.toml"),
            code_root: None,
            code_dir: None,
            cache_dir: None,
        }
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Maximum number of redirect hops followed before giving up.
    pub max_redirects: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { max_redirects: 5 }
    }
}

/// Where components and their manifests live inside a version's code directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComponentLayout {
    pub extensions_dir: String,
    pub skins_dir: String,

    /// Registry manifest file name for extensions.
    pub extension_manifest: String,

    /// Registry manifest file name for skins.
    pub skin_manifest: String,

    /// Fixed-name source file for inline activation; `$NAME` is the component name.
    pub inline_entry: String,

    /// Package manifest written by the dependency manager.
    pub package_manifest: String,

    /// Directory the dependency manager installs packages into.
    pub vendor_dir: String,

    /// Per-version map of component → dependencies, relative to the code path.
    pub dependency_manifest: String,

    /// Entry that must exist for a directory to count as an installation.
    pub installation_marker: String,

    /// Name under which the engine registers itself as an extension.
    pub self_component: String,
}

impl Default for ComponentLayout {
    fn default() -> Self {
        Self {
            extensions_dir: "extensions".to_string(),
            skins_dir: "skins".to_string(),
            extension_manifest: "extension.json".to_string(),
            skin_manifest: "skin.json".to_string(),
            inline_entry: "$NAME.php".to_string(),
            package_manifest: "composer.json".to_string(),
            vendor_dir: "vendor".to_string(),
            dependency_manifest: "vendor/component-dependencies.json".to_string(),
            installation_marker: "includes".to_string(),
            self_component: "WikiFarm".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
