//! Snapshot persistence.
//!
//! # Responsibilities
//! - Map (namespace, key) to a snapshot file under the cache root
//! - Judge freshness by comparing each recorded dependency stamp with the
//!   file as it is now
//! - Write snapshots without ever exposing a partial file to readers
//!
//! # Design Decisions
//! - Writers take a non-blocking exclusive lock on `<file>.lock`; losing the
//!   race means "skip caching this time", not an error for the request
//! - Payload goes to a temp file in the destination directory and is renamed
//!   into place, so a reader sees either the old or the new snapshot
//! - Readers never lock; an undecodable snapshot is a miss

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::cache::snapshot::{CacheSnapshot, Cached, Dependencies};
use crate::observability::metrics;

/// Cache namespaces, one directory each under the cache root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Existence + identity of a tenant.
    Wikis,
    /// Compiled settings of a tenant.
    Config,
    /// Host capabilities last reported for a tenant.
    Environment,
    /// Pre-parsed structured source files.
    Sources,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Wikis => "wikis",
            Namespace::Config => "config",
            Namespace::Environment => "environment",
            Namespace::Sources => "sources",
        }
    }
}

/// Errors that can occur while writing a snapshot.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("snapshot {} is locked by another writer", .0.display())]
    Locked(PathBuf),
}

/// Snapshot store rooted at one cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the snapshot file for `key` in `namespace`.
    pub fn entry_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.root
            .join(namespace.as_str())
            .join(format!("{}.mpk", escape_key(key)))
    }

    /// Read a snapshot, fresh or not. `None` when absent or undecodable.
    pub fn load<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<Cached<T>> {
        let path = self.entry_path(namespace, key);
        let written_at = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let bytes = fs::read(&path).ok()?;

        let snapshot: CacheSnapshot<T> = match rmp_serde::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Ignoring undecodable snapshot");
                return None;
            }
        };

        let fresh = snapshot.dependencies.unchanged();
        Some(Cached {
            payload: snapshot.payload,
            dependencies: snapshot.dependencies,
            written_at,
            fresh,
        })
    }

    /// Read a snapshot only if it is fresh, recording hit/miss metrics.
    pub fn load_fresh<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<Cached<T>> {
        match self.load(namespace, key) {
            Some(cached) if cached.fresh => {
                metrics::record_cache_hit(namespace.as_str());
                Some(cached)
            }
            _ => {
                metrics::record_cache_miss(namespace.as_str());
                None
            }
        }
    }

    /// Persist a snapshot.
    ///
    /// Errors are returned for logging only; callers carry on with the
    /// computed value either way.
    pub fn store<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        payload: &T,
        dependencies: &Dependencies,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(namespace, key);
        let result = write_snapshot(&path, payload, dependencies);
        if result.is_err() {
            metrics::record_cache_write_failure(namespace.as_str());
        }
        result
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    dependencies: &'a Dependencies,
    payload: &'a T,
}

fn write_snapshot<T: Serialize>(
    path: &Path,
    payload: &T,
    dependencies: &Dependencies,
) -> Result<(), CacheError> {
    let bytes = rmp_serde::to_vec_named(&SnapshotRef {
        dependencies,
        payload,
    })?;
    write_atomic(path, &bytes)
}

/// Write `bytes` to `path` under an exclusive lock, via temp file + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    with_lock(path, || replace(path, bytes))
}

/// Run `f` while holding the non-blocking exclusive lock on `<path>.lock`.
///
/// Losing the race is `CacheError::Locked`; `f` does not run.
pub(crate) fn with_lock<T, E>(path: &Path, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: From<CacheError>,
{
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::from(io::Error::new(io::ErrorKind::InvalidInput, "path has no parent")))?;
    fs::create_dir_all(dir).map_err(CacheError::from)?;

    let mut lock_name = path.as_os_str().to_owned();
    lock_name.push(".lock");
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(PathBuf::from(lock_name))
        .map_err(CacheError::from)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| CacheError::Locked(path.to_path_buf()))?;

    let result = f();
    if let Err(e) = lock_file.unlock() {
        tracing::debug!(path = %path.display(), error = %e, "Unlock failed, released on close");
    }
    result
}

/// Replace `path` through a temp file in the same directory. Caller holds the lock.
pub(crate) fn replace(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_data()?;
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

/// Turn an arbitrary key into a single safe file name.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'_' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    if out.starts_with('.') {
        out.replace_range(0..1, "%2E");
    }
    out
}
