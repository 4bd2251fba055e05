use crate::remote::RemoteError;

/// All errors that can occur in captioner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transcript has no items")]
    EmptyTranscript,

    #[error("malformed transcript: {0}")]
    MalformedTranscript(String),

    #[error("unsupported language: \"{0}\"; supported: english, spanish")]
    UnsupportedLanguage(String),

    #[error("unsupported media format: \"{0}\"; supported: mp3, mp4, wav, flac")]
    UnsupportedFormat(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("gave up after {attempts} throttled attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the underlying remote failure was a rate-limit response.
    pub fn is_throttling(&self) -> bool {
        matches!(self, Error::Remote(e) if e.is_throttling())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
