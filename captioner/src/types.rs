use serde::{Deserialize, Deserializer, Serialize};

use crate::config::MediaFormat;

/// One media item from a manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub item_id: String,
    pub language: String,
    pub title: String,
    pub item_url: String,
    pub media_master_url: String,
    pub media_stream_url: String,
}

/// Lifecycle of a remote transcription job. Owned by the service; we only poll it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote transcription job as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionJob {
    pub job_name: String,
    pub status: JobStatus,
    pub media_uri: Option<String>,
    pub language_code: Option<String>,
    /// Where the finished transcript can be fetched; only set once completed.
    pub transcript_uri: Option<String>,
}

/// Everything needed to start a job. `job_name` doubles as the idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub struct StartJobRequest {
    pub job_name: String,
    pub media_uri: String,
    pub media_format: MediaFormat,
    pub language_code: String,
    pub vocabulary_name: Option<String>,
}

/// One page of a job listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPage {
    pub job_names: Vec<String>,
    pub next_token: Option<String>,
}

/// Raw ASR output as persisted in `results/<job_name>.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptDocument {
    #[serde(rename = "jobName", default)]
    pub job_name: String,
    pub results: TranscriptResults,
}

impl TranscriptDocument {
    pub fn items(&self) -> &[AsrItem] {
        &self.results.items
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResults {
    #[serde(default)]
    pub items: Vec<AsrItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Pronunciation,
    Punctuation,
}

/// A recognized word or punctuation mark. Punctuation carries no timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AsrItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub start_time: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

impl AsrItem {
    pub fn is_punctuation(&self) -> bool {
        self.kind == ItemKind::Punctuation
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alternative {
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub confidence: Option<f64>,
}

/// The service encodes numbers as decimal strings ("12.34"); accept either form.
fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Float(f64),
        Text(String),
    }

    match Option::<Number>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Number::Float(v)) => Ok(Some(v)),
        Some(Number::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// A single timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleCue {
    /// 1-based position in the output.
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Ordered, non-overlapping cues for one transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Captions {
    pub cues: Vec<SubtitleCue>,
}

impl Captions {
    /// Format as WebVTT subtitles.
    pub fn to_vtt(&self) -> String {
        let mut out = String::from("WEBVTT\n\n");
        for cue in &self.cues {
            out.push_str(&format!("{}\n", cue.index));
            out.push_str(&format!(
                "{} --> {}\n",
                format_cue_time(cue.start),
                format_cue_time(cue.end)
            ));
            out.push_str(&cue.text);
            out.push_str("\n\n");
        }
        out
    }
}

/// Format seconds as a WebVTT timestamp: HH:MM:SS.mmm
///
/// The millisecond field is `(seconds * 1000) mod 1000`, truncated. Because the
/// product is taken in floating point, inputs like `2.01` render as `.009`
/// rather than `.010`; existing subtitle files depend on this rendering.
pub fn format_cue_time(seconds: f64) -> String {
    let h = (seconds / 3600.0).floor() as u64;
    let m = ((seconds % 3600.0) / 60.0).floor() as u64;
    let s = (seconds % 60.0) as u64;
    let ms = ((seconds * 1000.0) % 1000.0) as u64;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}
