//! Local artifact layout. An artifact's presence is the durable record that
//! its stage finished, so artifacts are only ever written atomically.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// `results/<id>.json` and `webvtt/<id>.vtt` under configurable roots.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    results_dir: PathBuf,
    webvtt_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(results_dir: impl Into<PathBuf>, webvtt_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            webvtt_dir: webvtt_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn result_path(&self, item_id: &str) -> Result<PathBuf> {
        validate_item_id(item_id)?;
        Ok(self.results_dir.join(format!("{item_id}.json")))
    }

    pub fn webvtt_path(&self, item_id: &str) -> Result<PathBuf> {
        validate_item_id(item_id)?;
        Ok(self.webvtt_dir.join(format!("{item_id}.vtt")))
    }

    /// Whether a transcript for `item_id` has already been downloaded.
    pub fn has_result(&self, item_id: &str) -> Result<bool> {
        Ok(self.result_path(item_id)?.exists())
    }

    /// Persist a transcript payload as `results/<item_id>.json`.
    pub fn write_result(&self, item_id: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.result_path(item_id)?;
        write_atomic(&path, contents)?;
        Ok(path)
    }
}

/// Reject ids that would escape the artifact directory.
fn validate_item_id(item_id: &str) -> Result<()> {
    let bad = item_id.is_empty()
        || item_id == "."
        || item_id == ".."
        || item_id.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidOption(format!(
            "item id can't be used as a file name: {item_id:?}"
        )));
    }
    Ok(())
}

/// Write to a `.part` sibling first, then rename into place, so a crash never
/// leaves a truncated file where a finished artifact is expected.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".part");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = std::fs::File::create(&tmp_path)?;
    if let Err(e) = file.write_all(contents).and_then(|_| file.flush()) {
        drop(file);
        std::fs::remove_file(&tmp_path).ok();
        return Err(e.into());
    }
    drop(file);

    std::fs::rename(&tmp_path, path)?;
    debug!(path = %path.display(), bytes = contents.len(), "artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let store = ArtifactStore::new("results", "webvtt");
        assert_eq!(
            store.result_path("abc").unwrap(),
            PathBuf::from("results/abc.json")
        );
        assert_eq!(
            store.webvtt_path("abc").unwrap(),
            PathBuf::from("webvtt/abc.vtt")
        );
    }

    #[test]
    fn test_rejects_traversal_ids() {
        let store = ArtifactStore::new("results", "webvtt");
        for id in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(store.result_path(id).is_err(), "{id:?} should be rejected");
        }
        // dots inside an id are fine
        assert!(store.result_path("item.2024.v1").is_ok());
    }

    #[test]
    fn test_write_result_creates_dir_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("results"), dir.path().join("webvtt"));

        assert!(!store.has_result("abc").unwrap());
        let path = store.write_result("abc", b"{}").unwrap();
        assert!(store.has_result("abc").unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!dir.path().join("results/abc.json.part").exists());
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vtt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
