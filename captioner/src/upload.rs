use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::remote::{BlobStore, Downloader, Probe};

/// Used when the source doesn't declare a content type.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Storage key for an item's source media: `<item_id>.<ext>`.
pub fn object_key(item_id: &str, extension: &str) -> String {
    format!("{item_id}.{extension}")
}

/// Lowercase file extension (without the dot) of a URL's path component.
pub fn media_extension(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let ext = Path::new(parsed.path()).extension()?.to_str()?;
    Some(ext.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    AlreadyPresent,
    Uploaded { content_type: String },
}

/// Copies source media into blob storage at most once per key.
pub struct UploadDeduplicator {
    store: Arc<dyn BlobStore>,
    downloader: Arc<dyn Downloader>,
}

impl UploadDeduplicator {
    pub fn new(store: Arc<dyn BlobStore>, downloader: Arc<dyn Downloader>) -> Self {
        Self { store, downloader }
    }

    /// Make sure `key` exists in storage, copying it from `source_url` if not.
    ///
    /// Only a definite "not found" triggers the copy. Any other probe failure
    /// is returned as an error.
    pub async fn ensure_uploaded(&self, source_url: &str, key: &str) -> Result<UploadOutcome> {
        if let Probe::Found(existing) = self.store.head(key).await? {
            info!(key, size = existing.size, "already uploaded; won't repeat upload");
            return Ok(UploadOutcome::AlreadyPresent);
        }

        // Removed, with its contents, when dropped.
        let staging = tempfile::tempdir()?;
        let local_path = staging.path().join("media");

        let declared = self.downloader.download_to(source_url, &local_path).await?;
        let content_type = declared.unwrap_or_else(|| {
            warn!(%source_url, "source has no content type; using {FALLBACK_CONTENT_TYPE}");
            FALLBACK_CONTENT_TYPE.to_string()
        });

        self.store
            .upload_file(key, &local_path, &content_type)
            .await?;
        info!(key, %content_type, "uploaded");

        Ok(UploadOutcome::Uploaded { content_type })
    }
}
