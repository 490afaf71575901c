// Common data models for downloader

use serde::{Deserialize, Serialize};

/// One playable item as reported by the metadata provider.
///
/// Built per request from a live provider query and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Whole seconds, fractional provider values are truncated
    pub duration_seconds: u64,
    pub thumbnail: Option<String>,
    /// Canonical page URL, used when a stream can only be fetched through the provider
    pub webpage_url: String,
    /// Selectable encodings in provider order (not sorted by quality)
    pub streams: Vec<StreamDescriptor>,
}

impl MediaDescriptor {
    /// Video-bearing streams deduplicated by label, first occurrence wins.
    pub fn quality_options(&self) -> Vec<QualityOption> {
        let mut seen = std::collections::HashSet::new();
        self.streams
            .iter()
            .filter(|s| s.has_video && !s.label.is_empty())
            .filter(|s| seen.insert(s.label.as_str()))
            .map(|s| QualityOption {
                label: s.label.clone(),
                format_key: s.format_key.clone(),
                mime_type: s.mime_type.clone(),
            })
            .collect()
    }
}

/// One selectable encoding of a [`MediaDescriptor`].
///
/// At least one of `has_video` / `has_audio` is always true; the provider
/// backend drops entries carrying neither (storyboards and the like).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Human quality tag (e.g. "1080p", "medium")
    pub label: String,
    /// Opaque provider identifier (e.g. "137", "hls-720p")
    pub format_key: String,
    /// Container extension (mp4, webm, m4a)
    pub container: String,
    pub mime_type: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub audio_channels: u32,
    /// Size hint in bytes, exact or approximate
    pub filesize: Option<u64>,
    #[serde(skip)]
    pub locator: StreamLocator,
}

impl StreamDescriptor {
    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video && !self.has_audio
    }
}

/// Where the bytes of a stream come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StreamLocator {
    /// Plain HTTP(S) resource; headers are replayed on fetch
    Direct {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Only the provider tool itself can fetch this format
    #[default]
    Delegated,
}

/// Quality entry for a picker UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOption {
    pub label: String,
    pub format_key: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Playlist with "flat" entries (no per-entry streams; duration and
/// thumbnail may be missing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistDescriptor {
    pub id: String,
    pub title: String,
    pub author: String,
    pub entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub author: String,
    pub duration_seconds: Option<u64>,
    pub thumbnail: Option<String>,
    pub url: Option<String>,
}

/// Result of "get info": a single video or a playlist
#[derive(Debug, Clone)]
pub enum MediaInfo {
    Video(MediaDescriptor),
    Playlist(PlaylistDescriptor),
}

impl MediaInfo {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Video(_) => "video",
            Self::Playlist(_) => "playlist",
        }
    }
}

/// Output container the caller receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp4,
    Mp3,
}

impl MediaFormat {
    /// Parse the free-form request field. Empty or unknown values mean
    /// "unspecified" and leave the choice to the format selector.
    pub fn from_request(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Download request as received from the driving layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    /// "mp4", "mp3" or empty
    #[serde(default)]
    pub format: String,
    /// Numeric format key, quality label like "720p", or empty
    #[serde(default)]
    pub quality: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn requested_format(&self) -> Option<MediaFormat> {
        MediaFormat::from_request(&self.format)
    }
}
