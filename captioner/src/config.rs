use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::RetryPolicy;
use crate::error::Error;

/// Custom vocabulary attached to every submitted job.
pub const DEFAULT_VOCABULARY: &str = "LCCoreTerms";

/// Pause between manifest lines, keeping us under the service's baseline rate.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(500);

/// A manifest language the transcription service can handle.
///
/// Manifests name languages in plain English ("english", "spanish"); the
/// service wants a locale code ("en-US", "es-US").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    /// Resolve a manifest language name, case-insensitively.
    pub fn new(name: &str) -> Result<Self, Error> {
        match name.trim().to_lowercase().as_str() {
            "english" => Ok(Language::English),
            "spanish" => Ok(Language::Spanish),
            _ => Err(Error::UnsupportedLanguage(name.to_string())),
        }
    }

    /// Language code as the service expects it.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Spanish => "es-US",
        }
    }

    /// List all supported languages as (manifest_name, code) pairs.
    pub fn supported() -> Vec<(&'static str, &'static str)> {
        vec![("english", "en-US"), ("spanish", "es-US")]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Media container formats the transcription service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    Mp4,
    Wav,
    Flac,
}

impl MediaFormat {
    /// Parse from a file extension without the dot ("mp3", "WAV").
    pub fn from_extension(ext: &str) -> Result<Self, Error> {
        match ext.to_lowercase().as_str() {
            "mp3" => Ok(MediaFormat::Mp3),
            "mp4" => Ok(MediaFormat::Mp4),
            "wav" => Ok(MediaFormat::Wav),
            "flac" => Ok(MediaFormat::Flac),
            _ => Err(Error::UnsupportedFormat(ext.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Wav => "wav",
            MediaFormat::Flac => "flac",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for pipeline options.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Downloaded transcripts, one `<item_id>.json` per completed job.
    pub results_dir: PathBuf,
    /// Generated subtitles, one `<item_id>.vtt` per transcript.
    pub webvtt_dir: PathBuf,
    /// Item metadata for every item with a result.
    pub index_path: PathBuf,
    pub vocabulary_name: Option<String>,
    pub item_delay: Duration,
    /// Applied to job submission.
    pub submit_policy: RetryPolicy,
    /// Applied to each page of the completed-job listing.
    pub list_policy: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            webvtt_dir: PathBuf::from("webvtt"),
            index_path: PathBuf::from("index.json"),
            vocabulary_name: Some(DEFAULT_VOCABULARY.to_string()),
            item_delay: DEFAULT_ITEM_DELAY,
            submit_policy: RetryPolicy::submission(),
            list_policy: RetryPolicy::enumeration(),
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results_dir(mut self, dir: PathBuf) -> Self {
        self.results_dir = dir;
        self
    }

    pub fn webvtt_dir(mut self, dir: PathBuf) -> Self {
        self.webvtt_dir = dir;
        self
    }

    pub fn index_path(mut self, path: PathBuf) -> Self {
        self.index_path = path;
        self
    }

    /// Set the custom vocabulary. An empty name submits jobs without one.
    pub fn vocabulary_name(mut self, name: &str) -> Self {
        let name = name.trim();
        self.vocabulary_name = (!name.is_empty()).then(|| name.to_string());
        self
    }

    pub fn item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Set the submission retry policy. It must be bounded: a batch can't stall
    /// on one item forever.
    pub fn submit_policy(mut self, policy: RetryPolicy) -> Result<Self, Error> {
        if policy.max_attempts().is_none() {
            return Err(Error::InvalidOption(
                "submission retry policy must be bounded".into(),
            ));
        }
        self.submit_policy = policy;
        Ok(self)
    }

    pub fn list_policy(mut self, policy: RetryPolicy) -> Self {
        self.list_policy = policy;
        self
    }
}
