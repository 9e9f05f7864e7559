//! Structured file reader with a pre-parsed cache.
//!
//! # Responsibilities
//! - Read a path in the format its extension names
//! - Serve a pre-parsed snapshot when it is at least as new as the file
//! - Fall back to the last good parse when the file has a syntax error
//! - Edit dictionaries in place under the cache's lock and atomic rename

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::cache::{self, CacheError, CacheStore, Dependencies, Namespace};
use crate::observability::{metrics, FarmLog, LogKind};
use crate::source::format::SourceFormat;

/// Errors produced while reading a structured file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported file format: {}", .0.display())]
    UnknownFormat(PathBuf),

    #[error("file {} is not parseable: {reason}", .path.display())]
    NotParseable { path: PathBuf, reason: String },

    #[error("cannot write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Request-scoped reader of structured files.
#[derive(Debug, Default)]
pub struct SourceReader {
    cache: Option<CacheStore>,
    parses: Cell<usize>,
}

impl SourceReader {
    pub fn new(cache: Option<CacheStore>) -> Self {
        Self {
            cache,
            parses: Cell::new(0),
        }
    }

    /// Number of files actually parsed by this reader.
    pub fn parse_count(&self) -> usize {
        self.parses.get()
    }

    /// Read and parse `path`.
    pub fn read(&self, path: &Path, log: &mut FarmLog) -> Result<Value, SourceError> {
        let format =
            SourceFormat::from_path(path).ok_or_else(|| SourceError::UnknownFormat(path.to_path_buf()))?;
        if !path.is_file() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }

        let key = path.to_string_lossy();
        let previous = match &self.cache {
            Some(store) => match store.load::<Value>(Namespace::Sources, &key) {
                Some(cached) if cached.fresh => {
                    metrics::record_cache_hit(Namespace::Sources.as_str());
                    return Ok(cached.payload);
                }
                other => {
                    metrics::record_cache_miss(Namespace::Sources.as_str());
                    other
                }
            },
            None => None,
        };

        // Stamp first: an edit racing the read must leave the snapshot stale.
        let mut deps = Dependencies::new();
        deps.track(path);
        let bytes = fs::read(path)?;
        self.parses.set(self.parses.get() + 1);
        metrics::record_source_parse(format.as_str());

        match format.parse(&bytes) {
            Ok(value) => {
                if let Some(store) = &self.cache {
                    cache::report_write(store.store(Namespace::Sources, &key, &value, &deps), log);
                }
                Ok(value)
            }
            Err(reason) => match previous {
                Some(stale) => {
                    log.push(
                        LogKind::Source,
                        format!(
                            "syntax error in {}: {}; serving the last good parse ({}s old)",
                            path.display(),
                            reason,
                            stale.age_secs()
                        ),
                    );
                    Ok(stale.payload)
                }
                None => Err(SourceError::NotParseable {
                    path: path.to_path_buf(),
                    reason,
                }),
            },
        }
    }

    /// Edit a dictionary file in place while holding its write lock.
    ///
    /// The file is re-read under the lock, so entries other writers added
    /// since the caller last read it are kept. Returns whether the file was
    /// rewritten; an edit that changes nothing leaves the file untouched.
    pub fn update_dictionary(
        &self,
        path: &Path,
        edit: impl FnOnce(&mut Map<String, Value>),
    ) -> Result<bool, SourceError> {
        let format =
            SourceFormat::from_path(path).ok_or_else(|| SourceError::UnknownFormat(path.to_path_buf()))?;
        cache::store::with_lock(path, || {
            let mut map = match fs::read(path) {
                Ok(bytes) => {
                    self.parses.set(self.parses.get() + 1);
                    metrics::record_source_parse(format.as_str());
                    match format.parse(&bytes) {
                        Ok(Value::Object(map)) => map,
                        Ok(_) => {
                            return Err(SourceError::NotParseable {
                                path: path.to_path_buf(),
                                reason: "expected a dictionary".to_string(),
                            })
                        }
                        Err(reason) => {
                            return Err(SourceError::NotParseable {
                                path: path.to_path_buf(),
                                reason,
                            })
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
                Err(e) => return Err(e.into()),
            };

            let before = map.clone();
            edit(&mut map);
            if map == before {
                return Ok(false);
            }
            let bytes = format.render_dictionary(&map).map_err(|reason| SourceError::Write {
                path: path.to_path_buf(),
                reason,
            })?;
            cache::store::replace(path, &bytes)?;
            Ok(true)
        })
    }
}
