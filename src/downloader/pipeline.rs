// Artifact pipeline: fetch selected streams, then mux or transcode

use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use super::artifact::{Artifact, RequestScope};
use super::errors::{DownloadError, Result};
use super::format_selector::Selection;
use super::models::{MediaDescriptor, StreamDescriptor};
use super::traits::{MediaProcessor, MediaProvider};

/// Turns a [`Selection`] into one finished artifact.
///
/// Every artifact created along the way is a drop guard, so any early
/// return (error or cancellation) leaves nothing behind in the store.
#[derive(Clone)]
pub struct ArtifactPipeline {
    provider: Arc<dyn MediaProvider>,
    processor: Arc<dyn MediaProcessor>,
}

impl ArtifactPipeline {
    pub fn new(provider: Arc<dyn MediaProvider>, processor: Arc<dyn MediaProcessor>) -> Self {
        Self {
            provider,
            processor,
        }
    }

    pub async fn materialize(
        &self,
        scope: &RequestScope,
        media: &MediaDescriptor,
        selection: &Selection,
    ) -> Result<Artifact> {
        match selection {
            Selection::Muxed(stream) => self.fetch(scope, media, stream, "media").await,
            Selection::Mux { video, audio } => self.mux(scope, media, video, audio).await,
            Selection::AudioTranscode(stream) => self.transcode(scope, media, stream).await,
        }
    }

    async fn mux(
        &self,
        scope: &RequestScope,
        media: &MediaDescriptor,
        video: &StreamDescriptor,
        audio: &StreamDescriptor,
    ) -> Result<Artifact> {
        // Independent downloads. If one fails the other future is dropped
        // and its partial file goes with it.
        let (video_file, audio_file) = tokio::try_join!(
            self.fetch(scope, media, video, "video"),
            self.fetch(scope, media, audio, "audio"),
        )?;

        let output = scope.artifact("muxed.mp4");
        tracing::debug!(
            processor = self.processor.name(),
            video = %video.format_key,
            audio = %audio.format_key,
            "muxing"
        );
        let result = self
            .processor
            .mux_video_audio(video_file.path(), audio_file.path(), output.path())
            .await;

        drop(video_file);
        drop(audio_file);

        result?;
        Ok(output)
    }

    async fn transcode(
        &self,
        scope: &RequestScope,
        media: &MediaDescriptor,
        stream: &StreamDescriptor,
    ) -> Result<Artifact> {
        let raw = self.fetch(scope, media, stream, "raw").await?;

        let output = scope.artifact("audio.mp3");
        tracing::debug!(
            processor = self.processor.name(),
            source = %stream.format_key,
            "converting to mp3"
        );
        let result = self.processor.convert_to_mp3(raw.path(), output.path()).await;

        drop(raw);

        result?;
        Ok(output)
    }

    /// Copy one remote stream into a fresh artifact
    async fn fetch(
        &self,
        scope: &RequestScope,
        media: &MediaDescriptor,
        stream: &StreamDescriptor,
        role: &str,
    ) -> Result<Artifact> {
        let artifact = scope.artifact(role);
        let remote = self.provider.open_stream(media, stream).await?;
        let mut reader = remote.reader;

        let mut file = tokio::fs::File::create(artifact.path()).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            DownloadError::fetch(
                format!("stream {} interrupted", stream.format_key),
                e.to_string(),
            )
        })?;
        file.flush().await?;

        tracing::debug!(
            format = %stream.format_key,
            role,
            written,
            expected = ?remote.content_length,
            "stream fetched"
        );

        Ok(artifact)
    }
}
