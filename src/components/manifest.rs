//! Per-version dependency manifest written by the packaging step.
//!
//! Dictionary of component key → list of component keys it depends on,
//! e.g. `"extension-Foo" = ["skin-Bar"]`.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::cache::Dependencies;
use crate::observability::{FarmLog, LogKind};
use crate::source::{SourceError, SourceReader};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    dependencies: BTreeMap<String, Vec<String>>,
}

impl DependencyManifest {
    /// Read the manifest at `path`. Absent means no dependencies.
    pub fn load(reader: &SourceReader, path: &Path, deps: &mut Dependencies, log: &mut FarmLog) -> Self {
        deps.track(path);
        let value = match reader.read(path, log) {
            Ok(value) => value,
            Err(SourceError::NotFound(_)) => return Self::default(),
            Err(e) => {
                log.push(LogKind::Source, format!("dependency manifest ignored: {}", e));
                return Self::default();
            }
        };
        let Value::Object(map) = value else {
            log.push(
                LogKind::Source,
                format!("dependency manifest {} is not a dictionary", path.display()),
            );
            return Self::default();
        };

        let dependencies = map
            .into_iter()
            .map(|(key, list)| {
                let names = list
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                (key, names)
            })
            .collect();
        Self { dependencies }
    }

    pub fn dependencies_of(&self, key: &str) -> &[String] {
        self.dependencies.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
impl DependencyManifest {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            dependencies: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }
}
