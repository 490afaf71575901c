// Orchestrator: get-info and download on top of resolver, selector and pipeline

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use super::artifact::ArtifactStore;
use super::backends::{FfmpegProcessor, YtDlpProvider};
use super::config::DownloaderConfig;
use super::errors::{DownloadError, Result};
use super::format_selector::FormatSelector;
use super::lifecycle::{Lifecycle, RequestState};
use super::models::{DownloadRequest, MediaFormat, MediaInfo};
use super::pipeline::ArtifactPipeline;
use super::resolver::MetadataResolver;
use super::stream::SelfCleaningStream;
use super::traits::{MediaProcessor, MediaProvider};

/// A finished download ready to be streamed to the caller
#[derive(Debug)]
pub struct Download {
    pub stream: SelfCleaningStream,
    pub filename: String,
    pub content_type: &'static str,
    pub format: MediaFormat,
}

/// Entry point of the core. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct Downloader {
    resolver: MetadataResolver,
    pipeline: ArtifactPipeline,
    store: ArtifactStore,
}

impl Downloader {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        processor: Arc<dyn MediaProcessor>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            resolver: MetadataResolver::new(provider.clone()),
            pipeline: ArtifactPipeline::new(provider, processor),
            store,
        }
    }

    /// yt-dlp for metadata and fetching, ffmpeg for muxing and MP3
    pub fn from_config(config: &DownloaderConfig) -> Result<Self> {
        let provider = YtDlpProvider::new(config.clone())?;
        let processor = FfmpegProcessor::new(config);
        Ok(Self::new(
            Arc::new(provider),
            Arc::new(processor),
            ArtifactStore::new(&config.temp_dir),
        ))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Playlist first, single video second.
    ///
    /// The order is a heuristic: playlist URLs usually also match the video
    /// pattern, so trying the narrower reading first picks the playlist when
    /// one exists. It is kept for compatibility, not because it is exact.
    pub async fn get_info(&self, url: &str) -> Result<MediaInfo> {
        let span = tracing::info_span!("get_info", request_id = %Uuid::new_v4());
        async {
            let playlist_err = match self.resolver.resolve_playlist(url).await {
                Ok(playlist) => {
                    tracing::info!(entries = playlist.entries.len(), "resolved playlist");
                    return Ok(MediaInfo::Playlist(playlist));
                }
                Err(e) => e,
            };

            match self.resolver.resolve_video(url).await {
                Ok(media) => {
                    tracing::info!(streams = media.streams.len(), "resolved video");
                    Ok(MediaInfo::Video(media))
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        diagnostics = e.diagnostics().unwrap_or(""),
                        playlist_error = %playlist_err,
                        "could not resolve media"
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn download(&self, request: &DownloadRequest) -> Result<Download> {
        let scope = self.store.scope().await?;
        let span = tracing::info_span!("download", request_id = %scope.id());

        async move {
            let mut lifecycle = Lifecycle::new();

            let media = match self.resolver.resolve_video(&request.url).await {
                Ok(media) => media,
                Err(e) => {
                    lifecycle.fail(&e);
                    return Err(e);
                }
            };
            lifecycle.advance(RequestState::Selecting);

            let selection =
                match FormatSelector::select(&media.streams, request.requested_format(), &request.quality) {
                    Ok(selection) => selection,
                    Err(e) => {
                        lifecycle.fail(&e);
                        return Err(e);
                    }
                };
            tracing::info!(
                title = %media.title,
                formats = ?selection.format_keys(),
                output = selection.output_format().extension(),
                "format selected"
            );
            lifecycle.advance(RequestState::Materializing);

            let opened = match self.pipeline.materialize(&scope, &media, &selection).await {
                Ok(artifact) => SelfCleaningStream::open(artifact, scope.id()).await,
                Err(e) => Err(e),
            };
            let stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    lifecycle.fail(&e);
                    return Err(e);
                }
            };
            lifecycle.advance(RequestState::Streaming);
            let stream = stream.with_lifecycle(lifecycle);

            let format = selection.output_format();
            Ok(Download {
                filename: output_filename(&media.title, &media.id, format),
                content_type: format.content_type(),
                format,
                stream,
            })
        }
        .instrument(span)
        .await
    }
}

/// `"{title}.{ext}"`, with the id standing in for a blank title
fn output_filename(title: &str, id: &str, format: MediaFormat) -> String {
    let stem = [title.trim(), id.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("download");
    format!("{}.{}", stem, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{
        audio_only, muxed, sample_media, sample_playlist, store_is_empty, video_only,
        FakeProcessor, FakeProvider,
    };
    use tokio::io::AsyncReadExt;

    fn downloader(
        provider: FakeProvider,
        processor: FakeProcessor,
    ) -> (tempfile::TempDir, Downloader, Arc<FakeProvider>, Arc<FakeProcessor>) {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(provider);
        let processor = Arc::new(processor);
        let downloader = Downloader::new(
            provider.clone(),
            processor.clone(),
            ArtifactStore::new(dir.path()),
        );
        (dir, downloader, provider, processor)
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename("My Song", "x", MediaFormat::Mp3), "My Song.mp3");
        assert_eq!(output_filename("  ", "abc", MediaFormat::Mp4), "abc.mp4");
        assert_eq!(output_filename("", "", MediaFormat::Mp4), "download.mp4");
    }

    #[tokio::test]
    async fn test_get_info_prefers_playlist() {
        let url = "https://example/playlist?list=PL123";
        let (_dir, downloader, provider, _) = downloader(
            FakeProvider::new()
                .with_playlist(url, sample_playlist())
                .with_video(url, sample_media(vec![])),
            FakeProcessor::new(),
        );

        let info = downloader.get_info(url).await.unwrap();

        assert_eq!(info.kind(), "playlist");
        assert_eq!(provider.calls(), vec![format!("playlist:{}", url)]);
    }

    #[tokio::test]
    async fn test_get_info_falls_back_to_video() {
        let url = "https://example/watch?v=vid123";
        let (_dir, downloader, provider, _) = downloader(
            FakeProvider::new().with_video(url, sample_media(vec![muxed("360p", "18")])),
            FakeProcessor::new(),
        );

        let info = downloader.get_info(url).await.unwrap();

        match info {
            MediaInfo::Video(media) => assert_eq!(media.id, "vid123"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(
            provider.calls(),
            vec![format!("playlist:{}", url), format!("video:{}", url)]
        );
    }

    #[tokio::test]
    async fn test_get_info_surfaces_video_error() {
        let (_dir, downloader, _, _) = downloader(FakeProvider::new(), FakeProcessor::new());

        let err = downloader.get_info("https://example/nothing").await.unwrap_err();
        assert!(matches!(err, DownloadError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_download_mp3_end_to_end() {
        let media = sample_media(vec![muxed("360p", "18"), audio_only("medium", "140")]);
        let (dir, downloader, provider, processor) = downloader(
            FakeProvider::new().with_video("V", media).with_bytes("140", b"AAC"),
            FakeProcessor::new(),
        );

        let mut download = downloader
            .download(&DownloadRequest::new("V").with_format("mp3"))
            .await
            .unwrap();

        assert_eq!(download.filename, "Sample Title.mp3");
        assert_eq!(download.content_type, "audio/mpeg");
        assert_eq!(provider.calls(), vec!["video:V", "stream:140"]);
        assert_eq!(processor.calls(), vec!["mp3"]);

        let mut body = Vec::new();
        download.stream.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"MP3:AAC");

        download.stream.close();
        download.stream.close();
        assert!(store_is_empty(dir.path()));

        use RequestState::*;
        assert_eq!(
            download.stream.lifecycle().map(|l| l.history().to_vec()),
            Some(vec![Resolving, Selecting, Materializing, Streaming, Closed])
        );
    }

    #[tokio::test]
    async fn test_download_mp4_muxes_split_streams() {
        let media = sample_media(vec![video_only("1080p", "137"), audio_only("medium", "140")]);
        let (dir, downloader, _, processor) = downloader(
            FakeProvider::new().with_video("V", media),
            FakeProcessor::new(),
        );

        let download = downloader
            .download(&DownloadRequest::new("V").with_format("mp4"))
            .await
            .unwrap();

        assert_eq!(download.filename, "Sample Title.mp4");
        assert_eq!(download.content_type, "video/mp4");
        assert_eq!(processor.calls(), vec!["mux"]);
        assert_eq!(download.stream.content_length(), b"137+140".len() as u64);

        drop(download);
        assert!(store_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_defaulted_format_drives_extension() {
        // no format given and no video streams: the output is audio, so .mp3
        let media = sample_media(vec![audio_only("medium", "140")]);
        let (_dir, downloader, _, _) = downloader(
            FakeProvider::new().with_video("V", media),
            FakeProcessor::new(),
        );

        let download = downloader.download(&DownloadRequest::new("V")).await.unwrap();

        assert_eq!(download.format, MediaFormat::Mp3);
        assert_eq!(download.filename, "Sample Title.mp3");
    }

    #[tokio::test]
    async fn test_download_failure_leaves_no_artifacts() {
        let media = sample_media(vec![video_only("1080p", "137"), audio_only("medium", "140")]);
        let (dir, downloader, _, _) = downloader(
            FakeProvider::new().with_video("V", media),
            FakeProcessor::new().failing_mux(),
        );

        let err = downloader
            .download(&DownloadRequest::new("V").with_format("mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::TranscodeFailed { .. }));
        assert!(store_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_download_resolves_as_single_video() {
        let (_dir, downloader, provider, _) = downloader(FakeProvider::new(), FakeProcessor::new());

        let err = downloader
            .download(&DownloadRequest::new("https://example/watch?v=X&list=PL1"))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::NotFound { .. }));
        assert_eq!(
            provider.calls(),
            vec!["video:https://example/watch?v=X&list=PL1"]
        );
    }
}
