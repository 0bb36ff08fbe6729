use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use super::{StoreResult, Workspace};

const SNAPSHOT_FILE: &str = "workspace.json";

/// Handles disk I/O for a [`Repository`](super::Repository).
///
/// The whole workspace is written as one JSON snapshot using a
/// "write-then-rename" step, so a crash mid-write leaves the previous
/// snapshot intact.
#[derive(Debug)]
pub struct Persistence {
    data_dir: PathBuf,
}

impl Persistence {
    /// Initializes a `Persistence` handler in the specified directory,
    /// creating it if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { data_dir: dir })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.snapshot_path().with_extension("json.tmp")
    }

    /// Writes the workspace snapshot atomically.
    pub fn save_workspace(&self, workspace: &Workspace) -> StoreResult<()> {
        let file_path = self.snapshot_path();
        let temp_path = self.temp_path();

        let bytes = serde_json::to_vec_pretty(workspace)?;

        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &file_path)?;

        Ok(())
    }

    /// Loads the last saved snapshot, or an empty workspace when none exists.
    ///
    /// A leftover temporary file from an interrupted save is discarded. A
    /// snapshot that fails to parse is reported as an error.
    pub fn load(&self) -> StoreResult<Workspace> {
        let temp_path = self.temp_path();
        if temp_path.exists() {
            warn!("Discarding incomplete snapshot {:?}", temp_path);
            if let Err(e) = fs::remove_file(&temp_path) {
                warn!("Could not remove {:?}: {}", temp_path, e);
            }
        }

        let file_path = self.snapshot_path();
        if !file_path.exists() {
            return Ok(Workspace::new());
        }

        let content = fs::read(&file_path)?;
        let mut workspace: Workspace = serde_json::from_slice(&content)?;
        workspace.ensure_root();
        Ok(workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{NodePath, NodeRecord, PropertyValue, StoreError};
    use tempfile::tempdir;

    fn sample_workspace() -> Workspace {
        let mut ws = Workspace::new();
        let mut record = NodeRecord::new("book:Book");
        record
            .properties
            .insert("book:title".to_string(), PropertyValue::from("Dragons Love Tacos"));
        ws.insert("/books".parse::<NodePath>().unwrap(), NodeRecord::new("shelf:catalog"));
        ws.insert("/books/801".parse::<NodePath>().unwrap(), NodeRecord::new("shelf:folder"));
        ws.insert("/books/801/9780803736801".parse::<NodePath>().unwrap(), record);
        ws
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let persistence = Persistence::new(dir.path()).unwrap();

        let ws = sample_workspace();
        persistence.save_workspace(&ws).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded, ws);
    }

    #[test]
    fn test_atomic_rename() {
        let dir = tempdir().unwrap();
        let persistence = Persistence::new(dir.path()).unwrap();

        persistence.save_workspace(&sample_workspace()).unwrap();

        assert!(dir.path().join("workspace.json").exists());
        assert!(!dir.path().join("workspace.json.tmp").exists());
    }

    #[test]
    fn test_missing_snapshot_is_empty_workspace() {
        let dir = tempdir().unwrap();
        let persistence = Persistence::new(dir.path().join("nested")).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded, Workspace::new());
    }

    #[test]
    fn test_stale_temp_file_is_removed() {
        let dir = tempdir().unwrap();
        let persistence = Persistence::new(dir.path()).unwrap();
        persistence.save_workspace(&sample_workspace()).unwrap();
        fs::write(dir.path().join("workspace.json.tmp"), b"{ half written").unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded, sample_workspace());
        assert!(!dir.path().join("workspace.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("workspace.json"), b"not json").unwrap();
        let persistence = Persistence::new(dir.path()).unwrap();

        assert!(matches!(persistence.load(), Err(StoreError::Serialization(_))));
    }
}
