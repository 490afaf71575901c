// Capability traits for the pluggable backends

use std::fmt;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::errors::Result;
use super::models::{MediaDescriptor, PlaylistDescriptor, StreamDescriptor};

/// Bytes of one remote stream
pub struct RemoteStream {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    /// Known up front for plain HTTP, estimated or absent otherwise
    pub content_length: Option<u64>,
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Metadata provider and stream fetch service.
///
/// Exactly one implementation is active per process; the orchestrator only
/// sees this trait.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Query full metadata, including streams, for a single video
    async fn fetch_video(&self, url: &str) -> Result<MediaDescriptor>;

    /// Query flat playlist metadata. A URL that is not a playlist must
    /// fail with `NotFound`.
    async fn fetch_playlist(&self, url: &str) -> Result<PlaylistDescriptor>;

    /// Open the byte stream of one of `media`'s streams
    async fn open_stream(
        &self,
        media: &MediaDescriptor,
        stream: &StreamDescriptor,
    ) -> Result<RemoteStream>;
}

/// Mux and audio-transcode service.
///
/// Output paths are chosen by the caller and never equal an input path.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Name of the processor (for logging)
    fn name(&self) -> &'static str;

    /// Combine a video-only and an audio-only file into a widely playable MP4
    async fn mux_video_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    /// Encode an audio (or audio-bearing) file to MP3
    async fn convert_to_mp3(&self, input: &Path, output: &Path) -> Result<()>;
}
