//! Shared fixtures for integration tests.
//!
//! A fixture lays out a complete farm in a temporary directory:
//! `config/` (farms file and sources), `code/<version>/` installations and
//! `cache/` for snapshots.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::{json, Value};
use tempfile::TempDir;

use wikifarm::engine::{CompiledWiki, FarmEngine, FarmRequest, FarmResponse, NotFound, Resolution};
use wikifarm::EngineConfig;

pub struct FarmFixture {
    pub dir: TempDir,
    pub config: EngineConfig,
}

impl FarmFixture {
    /// Empty farm with versions 1.35 and 1.36 installed and caching enabled.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();

        let mut config = EngineConfig::with_config_dir(config_dir);
        config.paths.farms_file = "farms.json".into();
        config.paths.code_root = Some(dir.path().join("code"));
        config.paths.cache_dir = Some(dir.path().join("cache"));

        let fixture = Self { dir, config };
        fixture.install_version("1.35");
        fixture.install_version("1.36");
        fixture
    }

    /// Farm with the standard `example.org` family and a handful of sources.
    pub fn standard() -> Self {
        let fixture = Self::new();
        fixture.farms(standard_farms());
        fixture.write("wikis.list", "en\nfr\n");
        fixture.write("versions.json", r#"{"enwiki": "1.35", "frwiki": "1.35", "default": "1.36"}"#);
        fixture.write("settings.toml", "timeout = 100\nsitename = \"Farm\"\n\"enable-skin-Vector\" = true\n");
        fixture.write(
            "overrides.json",
            r#"{"timeout": {"default": 200}, "sitename": {"en": "English", "fr": "Français"}}"#,
        );
        fixture.write("enwiki.json", r#"{"+namespaces": {"100": "Portal"}}"#);
        fixture.component("1.35", "skins", "Vector", &["Vector.php"]);
        fixture
    }

    pub fn without_cache(mut self) -> Self {
        self.config.paths.cache_dir = None;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config.paths.config_dir
    }

    pub fn code_root(&self) -> PathBuf {
        self.dir.path().join("code")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn install_version(&self, version: &str) {
        fs::create_dir_all(self.code_root().join(version).join("includes")).unwrap();
    }

    pub fn farms(&self, farms: Value) {
        self.write("farms.json", &serde_json::to_string_pretty(&farms).unwrap());
    }

    /// Write a file under the config directory.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.config_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Rewrite a file and date it in the future, so every snapshot derived
    /// from it is older.
    pub fn rewrite_later(&self, name: &str, content: &str) -> PathBuf {
        let path = self.write(name, content);
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
        path
    }

    /// Create `<code>/<version>/<dir>/<name>/` with the given files.
    pub fn component(&self, version: &str, dir: &str, name: &str, files: &[&str]) -> PathBuf {
        let root = self.code_root().join(version).join(dir).join(name);
        fs::create_dir_all(&root).unwrap();
        for file in files {
            fs::write(root.join(file), "{}").unwrap();
        }
        root
    }

    /// Component installed through the dependency manager as `acme/<name>`.
    pub fn package(&self, version: &str, dir: &str, name: &str) {
        let root = self.component(version, dir, name, &[]);
        let package = format!("acme/{}", name.to_lowercase());
        fs::write(
            root.join("composer.json"),
            json!({ "name": package }).to_string(),
        )
        .unwrap();
        fs::create_dir_all(self.code_root().join(version).join("vendor").join(&package)).unwrap();
    }

    pub fn dependency_manifest(&self, version: &str, manifest: Value) {
        let path = self
            .code_root()
            .join(version)
            .join("vendor/component-dependencies.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, manifest.to_string()).unwrap();
    }

    pub fn engine(&self) -> FarmEngine {
        FarmEngine::new(self.config.clone())
    }

    pub fn handle(&self, request: FarmRequest) -> FarmResponse {
        self.engine().handle(&request)
    }

    pub fn web(&self, host: &str) -> FarmResponse {
        self.handle(FarmRequest::web(host, "/"))
    }
}

pub fn standard_farms() -> Value {
    json!({
        "legacy": {
            "server": "(?P<wiki>[a-z]+)\\.old\\.org",
            "redirect": "$wiki.example.org"
        },
        "wikis": {
            "server": "(?P<wiki>[a-z]+)\\.example\\.org",
            "variables": [{"variable": "wiki", "file": "wikis.list"}],
            "suffix": "wiki",
            "identifier": "$wikiwiki",
            "versions": "versions.json",
            "deployments": "deployments.json",
            "config": [
                {"file": "settings.toml", "key": "default"},
                {"file": "overrides.json", "key": "*wiki", "default": "wiki"},
                {"file": "$WIKIID.json", "key": "$WIKIID"},
                {"file": "hooks.php", "executable": true}
            ],
            "data": "/srv/data/$WIKIID",
            "not_found": "missing.html"
        }
    })
}

pub fn found(response: &FarmResponse) -> Box<CompiledWiki> {
    match &response.outcome {
        Ok(Resolution::Found(wiki)) => wiki.clone(),
        other => panic!("expected a compiled tenant, got {:?}", other),
    }
}

pub fn not_found(response: &FarmResponse) -> NotFound {
    match &response.outcome {
        Ok(Resolution::NotFound(missing)) => missing.clone(),
        other => panic!("expected not found, got {:?}", other),
    }
}
