// In-memory provider and processor doubles shared by the unit tests

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use super::errors::{DownloadError, Result};
use super::models::{
    MediaDescriptor, PlaylistDescriptor, PlaylistEntry, StreamDescriptor, StreamLocator,
};
use super::traits::{MediaProcessor, MediaProvider, RemoteStream};

pub fn make_stream(label: &str, key: &str, video: bool, audio: bool) -> StreamDescriptor {
    StreamDescriptor {
        label: label.to_string(),
        format_key: key.to_string(),
        container: if video { "mp4" } else { "m4a" }.to_string(),
        mime_type: if video { "video/mp4" } else { "audio/mp4" }.to_string(),
        has_video: video,
        has_audio: audio,
        audio_channels: if audio { 2 } else { 0 },
        filesize: None,
        locator: StreamLocator::Delegated,
    }
}

pub fn video_only(label: &str, key: &str) -> StreamDescriptor {
    make_stream(label, key, true, false)
}

pub fn audio_only(label: &str, key: &str) -> StreamDescriptor {
    make_stream(label, key, false, true)
}

pub fn muxed(label: &str, key: &str) -> StreamDescriptor {
    make_stream(label, key, true, true)
}

pub fn sample_media(streams: Vec<StreamDescriptor>) -> MediaDescriptor {
    MediaDescriptor {
        id: "vid123".to_string(),
        title: "Sample Title".to_string(),
        author: "Someone".to_string(),
        description: String::new(),
        duration_seconds: 212,
        thumbnail: Some("https://img.example/vid123.jpg".to_string()),
        webpage_url: "https://example/watch?v=vid123".to_string(),
        streams,
    }
}

pub fn sample_playlist() -> PlaylistDescriptor {
    PlaylistDescriptor {
        id: "PL123".to_string(),
        title: "Sample Playlist".to_string(),
        author: "Someone".to_string(),
        entries: vec![PlaylistEntry {
            id: "vid123".to_string(),
            title: "Sample Title".to_string(),
            author: "Someone".to_string(),
            duration_seconds: None,
            thumbnail: None,
            url: Some("https://example/watch?v=vid123".to_string()),
        }],
    }
}

pub fn store_is_empty(root: &Path) -> bool {
    std::fs::read_dir(root)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

/// Provider double. Unknown URLs are `NotFound`; streams yield their
/// configured bytes, or the format key itself when none were configured.
#[derive(Default)]
pub struct FakeProvider {
    videos: HashMap<String, MediaDescriptor>,
    playlists: HashMap<String, PlaylistDescriptor>,
    bytes: HashMap<String, Vec<u8>>,
    broken: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, url: &str, media: MediaDescriptor) -> Self {
        self.videos.insert(url.to_string(), media);
        self
    }

    pub fn with_playlist(mut self, url: &str, playlist: PlaylistDescriptor) -> Self {
        self.playlists.insert(url.to_string(), playlist);
        self
    }

    pub fn with_bytes(mut self, format_key: &str, bytes: &[u8]) -> Self {
        self.bytes.insert(format_key.to_string(), bytes.to_vec());
        self
    }

    /// The stream opens fine but fails on the first read
    pub fn with_broken_stream(mut self, format_key: &str) -> Self {
        self.broken.push(format_key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_video(&self, url: &str) -> Result<MediaDescriptor> {
        self.record(format!("video:{}", url));
        self.videos.get(url).cloned().ok_or_else(|| DownloadError::NotFound {
            reason: format!("no video at {}", url),
        })
    }

    async fn fetch_playlist(&self, url: &str) -> Result<PlaylistDescriptor> {
        self.record(format!("playlist:{}", url));
        self.playlists.get(url).cloned().ok_or_else(|| DownloadError::NotFound {
            reason: format!("no playlist at {}", url),
        })
    }

    async fn open_stream(
        &self,
        _media: &MediaDescriptor,
        stream: &StreamDescriptor,
    ) -> Result<RemoteStream> {
        self.record(format!("stream:{}", stream.format_key));

        if self.broken.contains(&stream.format_key) {
            return Ok(RemoteStream {
                reader: Box::pin(BrokenReader),
                content_length: None,
            });
        }

        let bytes = self
            .bytes
            .get(&stream.format_key)
            .cloned()
            .unwrap_or_else(|| stream.format_key.as_bytes().to_vec());
        Ok(RemoteStream {
            content_length: Some(bytes.len() as u64),
            reader: Box::pin(io::Cursor::new(bytes)),
        })
    }
}

struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

/// Processor double. Mux writes `VIDEO+AUDIO`, MP3 writes `MP3:` + input.
/// Failing modes leave a partial output behind before erroring.
#[derive(Default)]
pub struct FakeProcessor {
    fail_mux: bool,
    fail_mp3: bool,
    calls: Mutex<Vec<String>>,
    inputs_existed: Mutex<bool>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_mux(mut self) -> Self {
        self.fail_mux = true;
        self
    }

    pub fn failing_mp3(mut self) -> Self {
        self.fail_mp3 = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inputs_existed(&self) -> bool {
        *self.inputs_existed.lock().unwrap()
    }
}

#[async_trait]
impl MediaProcessor for FakeProcessor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn mux_video_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.calls.lock().unwrap().push("mux".to_string());
        *self.inputs_existed.lock().unwrap() = video.exists() && audio.exists();

        if self.fail_mux {
            std::fs::write(output, b"partial")?;
            return Err(DownloadError::transcode(
                "mux exited with status 1",
                "encoder exploded",
            ));
        }

        let mut combined = std::fs::read(video)?;
        combined.push(b'+');
        combined.extend(std::fs::read(audio)?);
        std::fs::write(output, combined)?;
        Ok(())
    }

    async fn convert_to_mp3(&self, input: &Path, output: &Path) -> Result<()> {
        self.calls.lock().unwrap().push("mp3".to_string());
        *self.inputs_existed.lock().unwrap() = input.exists();

        if self.fail_mp3 {
            std::fs::write(output, b"partial")?;
            return Err(DownloadError::transcode(
                "convert exited with status 1",
                "bad input",
            ));
        }

        let mut encoded = b"MP3:".to_vec();
        encoded.extend(std::fs::read(input)?);
        std::fs::write(output, encoded)?;
        Ok(())
    }
}
