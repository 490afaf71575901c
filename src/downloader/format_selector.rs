// FormatSelector - resolves a format/quality request to concrete streams
//
// Order of precedence on the video path:
// 1. quality is a non-negative integer -> exact format key
// 2. quality label match, preferring a stream that already carries audio
// 3. first stream with audio channels, else the first video stream
// A selected stream without audio is paired with the first audio-only stream.

use super::errors::{DownloadError, Result};
use super::models::{MediaFormat, StreamDescriptor};

/// Outcome of format resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One stream carrying both tracks, delivered as-is
    Muxed(StreamDescriptor),
    /// Video-only and audio-only streams to combine
    Mux {
        video: StreamDescriptor,
        audio: StreamDescriptor,
    },
    /// Audio source to convert to MP3
    AudioTranscode(StreamDescriptor),
}

impl Selection {
    /// Output kind, which drives the filename extension and content type
    pub fn output_format(&self) -> MediaFormat {
        match self {
            Self::Muxed(_) | Self::Mux { .. } => MediaFormat::Mp4,
            Self::AudioTranscode(_) => MediaFormat::Mp3,
        }
    }

    pub fn format_keys(&self) -> Vec<&str> {
        match self {
            Self::Muxed(s) | Self::AudioTranscode(s) => vec![s.format_key.as_str()],
            Self::Mux { video, audio } => vec![video.format_key.as_str(), audio.format_key.as_str()],
        }
    }
}

/// Deterministic stream selection: identical input always yields the same
/// selection, and every returned descriptor is an owned clone.
pub struct FormatSelector;

impl FormatSelector {
    pub fn select(
        streams: &[StreamDescriptor],
        format: Option<MediaFormat>,
        quality: &str,
    ) -> Result<Selection> {
        if streams.is_empty() {
            return Err(DownloadError::NoSuitableFormat);
        }

        let wants_audio = match format {
            Some(MediaFormat::Mp3) => true,
            Some(MediaFormat::Mp4) => false,
            None => !streams.iter().any(|s| s.has_video),
        };

        if wants_audio {
            Self::select_audio(streams)
        } else {
            Self::select_video(streams, quality.trim())
        }
    }

    fn select_audio(streams: &[StreamDescriptor]) -> Result<Selection> {
        streams
            .iter()
            .find(|s| s.is_audio_only())
            .or_else(|| streams.first())
            .map(|s| Selection::AudioTranscode(s.clone()))
            .ok_or(DownloadError::NoSuitableFormat)
    }

    fn select_video(streams: &[StreamDescriptor], quality: &str) -> Result<Selection> {
        let candidates: Vec<&StreamDescriptor> = streams.iter().filter(|s| s.has_video).collect();

        let selected = Self::match_format_key(&candidates, quality)
            .or_else(|| Self::match_label(&candidates, quality))
            .or_else(|| Self::fallback(&candidates))
            .cloned()
            .ok_or(DownloadError::NoSuitableFormat)?;

        if selected.has_audio {
            return Ok(Selection::Muxed(selected));
        }

        let audio = streams
            .iter()
            .find(|s| s.is_audio_only())
            .cloned()
            .ok_or(DownloadError::NoAudioStream)?;

        Ok(Selection::Mux {
            video: selected,
            audio,
        })
    }

    /// Numeric quality values are opaque format keys
    fn match_format_key<'a>(
        candidates: &[&'a StreamDescriptor],
        quality: &str,
    ) -> Option<&'a StreamDescriptor> {
        quality.parse::<u64>().ok()?;
        candidates.iter().find(|s| s.format_key == quality).copied()
    }

    /// Label match. When several streams share the label, one that already
    /// has audio wins over an earlier video-only one.
    fn match_label<'a>(
        candidates: &[&'a StreamDescriptor],
        quality: &str,
    ) -> Option<&'a StreamDescriptor> {
        if quality.is_empty() {
            return None;
        }

        let mut matches = candidates.iter().filter(|s| s.label == quality);
        let first = matches.next().copied()?;
        if first.has_audio {
            return Some(first);
        }

        matches.find(|s| s.has_audio).copied().or(Some(first))
    }

    fn fallback<'a>(candidates: &[&'a StreamDescriptor]) -> Option<&'a StreamDescriptor> {
        candidates
            .iter()
            .find(|s| s.audio_channels > 0)
            .or_else(|| candidates.first())
            .copied()
    }
}
