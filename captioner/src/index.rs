use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::{write_atomic, ArtifactStore};
use crate::error::Result;
use crate::types::ManifestItem;

/// Per-item metadata published alongside the transcripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub language: String,
    pub title: String,
    pub item_url: String,
    pub media_master_url: String,
    pub media_stream_url: String,
}

impl From<&ManifestItem> for IndexEntry {
    fn from(item: &ManifestItem) -> Self {
        Self {
            language: item.language.clone(),
            title: item.title.clone(),
            item_url: item.item_url.clone(),
            media_master_url: item.media_master_url.clone(),
            media_stream_url: item.media_stream_url.clone(),
        }
    }
}

/// Map every manifest item that has a downloaded transcript to its metadata.
/// Later manifest lines win when an id repeats.
pub fn build_index(
    items: &[ManifestItem],
    artifacts: &ArtifactStore,
) -> Result<BTreeMap<String, IndexEntry>> {
    let mut index = BTreeMap::new();
    for item in items {
        match artifacts.has_result(&item.item_id) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!("not indexing: {e}");
                continue;
            }
        }
        index.insert(item.item_id.clone(), IndexEntry::from(item));
    }
    Ok(index)
}

/// Build the index and write it as JSON to `path`.
pub fn write_index(
    items: &[ManifestItem],
    artifacts: &ArtifactStore,
    path: &Path,
) -> Result<usize> {
    let index = build_index(items, artifacts)?;
    write_atomic(path, &serde_json::to_vec(&index)?)?;
    info!(path = %path.display(), entries = index.len(), "index written");
    Ok(index.len())
}
