use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::remote::{Downloader, RemoteError};

const USER_AGENT: &str = concat!("captioner/", env!("CARGO_PKG_VERSION"));

/// `Downloader` over plain HTTP(S) GETs.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    progress: bool,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(transport)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            progress: true,
        }
    }

    /// Show a progress bar for media downloads (on by default; indicatif hides
    /// it when stderr isn't a terminal).
    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, RemoteError> {
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        Ok(response)
    }

    fn progress_bar(&self, total_size: u64, dest: &Path) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Downloading {}", dest.display()));
        pb
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download_to(&self, url: &str, dest: &Path) -> Result<Option<String>, RemoteError> {
        let response = self.get(url).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let total_size = response.content_length().unwrap_or(0);
        let pb = self.progress_bar(total_size, dest);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;
        pb.finish_and_clear();

        if total_size > 0 && downloaded != total_size {
            warn!(
                %url,
                expected = total_size,
                actual = downloaded,
                "size mismatch; source may have been truncated"
            );
        }
        debug!(%url, bytes = downloaded, "downloaded");

        Ok(content_type)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self.get(url).await?;
        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}
