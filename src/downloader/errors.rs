// Error types for the download core

use std::io;

use lazy_static::lazy_static;
use regex::Regex;

/// Every failure the download core can surface.
///
/// Variants backed by an external tool keep the tool's raw output in
/// `diagnostics`. It goes to the logs, never to end users: use
/// [`DownloadError::public_message`] when rendering an error to a caller.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The URL does not resolve to any media
    #[error("media not found: {reason}")]
    NotFound { reason: String },

    /// Metadata or fetch tool failed (spawn error, non-zero exit)
    #[error("provider error: {message}")]
    Provider { message: String, diagnostics: String },

    /// Provider output could not be parsed
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// No stream matches the selection policy
    #[error("no suitable format found")]
    NoSuitableFormat,

    /// Muxing is required but the media has no audio-only stream
    #[error("no audio stream available for muxing")]
    NoAudioStream,

    /// Fetching stream bytes into local storage failed
    #[error("fetch failed: {message}")]
    FetchFailed { message: String, diagnostics: String },

    /// External mux/convert tool failed
    #[error("transcode failed: {message}")]
    TranscodeFailed { message: String, diagnostics: String },

    /// Local storage error while handling artifacts
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

lazy_static! {
    static ref ERROR_LINE_RE: Regex = Regex::new(r"(?m)^ERROR:\s*(.+)$").unwrap();
    static ref NOT_FOUND_RE: Regex = Regex::new(
        r"(?i)(video unavailable|not found|http error 404|does not exist|unsupported url|is not a valid url|no video formats found|this video has been removed)"
    )
    .unwrap();
}

impl DownloadError {
    pub fn provider(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn fetch(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::FetchFailed {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn transcode(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::TranscodeFailed {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Classify the stderr of a failed metadata query.
    ///
    /// yt-dlp reports a missing video and a broken network the same way
    /// (non-zero exit), so the `ERROR:` line decides between `NotFound` and
    /// `Provider`.
    pub fn from_provider_output(stderr: &str) -> Self {
        let headline = ERROR_LINE_RE
            .captures_iter(stderr)
            .last()
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| last_line(stderr));

        if NOT_FOUND_RE.is_match(&headline) {
            return Self::NotFound { reason: headline };
        }

        Self::provider(headline, stderr)
    }

    /// Raw tool output attached to this error, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Provider { diagnostics, .. }
            | Self::FetchFailed { diagnostics, .. }
            | Self::TranscodeFailed { diagnostics, .. } => Some(diagnostics.as_str()),
            _ => None,
        }
    }

    /// Message safe to show to an end user: no paths, no tool invocations.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested media could not be found",
            Self::NoSuitableFormat => "No suitable format is available for this media",
            Self::NoAudioStream => "No audio track is available for this media",
            _ => "The media could not be processed",
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown error")
        .to_string()
}
