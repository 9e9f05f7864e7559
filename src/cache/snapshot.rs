//! Snapshot envelope and dependency tracking.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Modification time and length of a file when it was consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl FileStamp {
    fn of(meta: &fs::Metadata) -> Self {
        Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        }
    }
}

/// A file a snapshot was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub path: PathBuf,
    /// Whether the file existed when it was consulted.
    pub existed: bool,
    /// `None` for absent files and presence-only dependencies.
    pub stamp: Option<FileStamp>,
}

impl Dependency {
    fn content(path: &Path) -> Self {
        let stamp = fs::metadata(path).ok().map(|meta| FileStamp::of(&meta));
        Self {
            path: path.to_path_buf(),
            existed: stamp.is_some(),
            stamp,
        }
    }

    fn presence(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            existed: path.exists(),
            stamp: None,
        }
    }

    /// True when the file still looks the way it did when it was recorded.
    fn unchanged(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) => self.existed && self.stamp.map_or(true, |stamp| stamp == FileStamp::of(&meta)),
            Err(_) => !self.existed,
        }
    }
}

/// Ordered, de-duplicated set of dependencies collected while computing a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    items: Vec<Dependency>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` with its current stamp.
    ///
    /// Call before reading the file: an edit landing between this call and
    /// the read then shows up as a changed stamp.
    pub fn track(&mut self, path: &Path) {
        if !self.contains(path) {
            self.items.push(Dependency::content(path));
        }
    }

    /// Record only whether `path` exists; edits to it do not matter.
    pub fn track_presence(&mut self, path: &Path) {
        if !self.contains(path) {
            self.items.push(Dependency::presence(path));
        }
    }

    /// Re-record `path` after the caller created, rewrote or removed it.
    pub fn refresh(&mut self, path: &Path) {
        match self.items.iter_mut().find(|d| d.path == path) {
            Some(dep) => *dep = Dependency::content(path),
            None => self.track(path),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.items.iter().any(|d| d.path == path)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when no dependency changed since it was recorded.
    ///
    /// A dependency that appeared or disappeared counts as changed.
    pub fn unchanged(&self) -> bool {
        self.items.iter().all(Dependency::unchanged)
    }
}

/// On-disk envelope around a cached payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot<T> {
    pub dependencies: Dependencies,
    pub payload: T,
}

/// A snapshot read back from disk together with its freshness verdict.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub payload: T,
    pub dependencies: Dependencies,
    /// Modification time of the snapshot file itself.
    pub written_at: SystemTime,
    pub fresh: bool,
}

impl<T> Cached<T> {
    /// Seconds elapsed since the snapshot was written.
    pub fn age_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.written_at)
            .unwrap_or_default()
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tracking_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.toml");
        fs::write(&a, "x = 1").unwrap();

        let mut deps = Dependencies::new();
        deps.track(&a);
        deps.track(&a);
        deps.track(&dir.path().join("missing.toml"));
        assert_eq!(deps.len(), 2);
    }

    fn set_mtime(path: &Path, at: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(at).unwrap();
    }

    #[test]
    fn test_touched_file_is_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.toml");
        fs::write(&a, "x = 1").unwrap();

        let mut deps = Dependencies::new();
        deps.track(&a);
        assert!(deps.unchanged());

        set_mtime(&a, SystemTime::now() + Duration::from_secs(60));
        assert!(!deps.unchanged());
    }

    #[test]
    fn test_edit_dated_in_the_past_is_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("settings.json");
        fs::write(&a, r#"{"timeout": 100}"#).unwrap();

        let mut deps = Dependencies::new();
        deps.track(&a);
        fs::write(&a, r#"{"timeout": 999}"#).unwrap();
        set_mtime(&a, SystemTime::now() - Duration::from_secs(30));
        assert!(!deps.unchanged());
    }

    #[test]
    fn test_appearing_file_is_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("late.toml");

        let mut deps = Dependencies::new();
        deps.track(&missing);
        assert!(deps.unchanged());

        fs::write(&missing, "x = 1").unwrap();
        assert!(!deps.unchanged());
    }

    #[test]
    fn test_presence_ignores_edits() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("1.35/includes");
        fs::create_dir_all(&marker).unwrap();

        let mut deps = Dependencies::new();
        deps.track_presence(&marker);
        fs::write(marker.join("Setup.php"), "<?php").unwrap();
        assert!(deps.unchanged());

        fs::remove_dir_all(dir.path().join("1.35")).unwrap();
        assert!(!deps.unchanged());
    }

    #[test]
    fn test_refresh_adopts_own_write() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("deployments.json");

        let mut deps = Dependencies::new();
        deps.track(&a);
        fs::write(&a, "{}").unwrap();
        assert!(!deps.unchanged());

        deps.refresh(&a);
        assert!(deps.unchanged());
    }
}
