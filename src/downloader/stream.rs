// Byte stream over a finished artifact that deletes it on close

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use uuid::Uuid;

use super::artifact::Artifact;
use super::errors::Result;
use super::lifecycle::{Lifecycle, RequestState};

/// Sequential reader over a finished artifact.
///
/// The first [`close`](Self::close) drops the file handle and deletes the
/// backing artifact; later calls do nothing. Dropping the stream closes it,
/// so a response body torn down by a client disconnect still cleans up.
/// Deletion failures are logged, never returned.
#[derive(Debug)]
pub struct SelfCleaningStream {
    file: Option<File>,
    artifact: Option<Artifact>,
    content_length: u64,
    request_id: Uuid,
    lifecycle: Option<Lifecycle>,
}

impl SelfCleaningStream {
    /// Take ownership of `artifact`. If the file can't be opened the
    /// artifact is still deleted before the error returns.
    pub async fn open(artifact: Artifact, request_id: Uuid) -> Result<Self> {
        let file = File::open(artifact.path()).await?;
        let content_length = file.metadata().await?.len();

        Ok(Self {
            file: Some(file),
            artifact: Some(artifact),
            content_length,
            request_id,
            lifecycle: None,
        })
    }

    /// Attach the request's lifecycle; the first close moves it to `Closed`.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn lifecycle(&self) -> Option<&Lifecycle> {
        self.lifecycle.as_ref()
    }

    /// Size of the artifact in bytes at open time
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none() && self.artifact.is_none()
    }

    pub fn close(&mut self) {
        drop(self.file.take());

        if let Some(artifact) = self.artifact.take() {
            let path = artifact.path().to_path_buf();
            match artifact.delete() {
                Ok(()) => tracing::debug!(request_id = %self.request_id, "stream closed"),
                Err(e) => tracing::warn!(
                    request_id = %self.request_id,
                    path = %path.display(),
                    error = %e,
                    "stream closed but artifact could not be deleted"
                ),
            }
            if let Some(lifecycle) = self.lifecycle.as_mut() {
                lifecycle.advance(RequestState::Closed);
            }
        }
    }
}

impl AsyncRead for SelfCleaningStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_read(cx, buf),
            // closed streams read as EOF
            None => Poll::Ready(Ok(())),
        }
    }
}

impl Drop for SelfCleaningStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::artifact::ArtifactStore;
    use tokio::io::AsyncReadExt;

    async fn stream_with(content: &[u8]) -> (tempfile::TempDir, SelfCleaningStream) {
        let dir = tempfile::tempdir().unwrap();
        let scope = ArtifactStore::new(dir.path()).scope().await.unwrap();
        let artifact = scope.artifact("out.mp4");
        tokio::fs::write(artifact.path(), content).await.unwrap();
        let stream = SelfCleaningStream::open(artifact, scope.id()).await.unwrap();
        (dir, stream)
    }

    fn dir_is_empty(dir: &tempfile::TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_reads_then_close_deletes() {
        let (dir, mut stream) = stream_with(b"hello world").await;
        assert_eq!(stream.content_length(), 11);

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello world");
        assert!(!dir_is_empty(&dir));

        stream.close();
        assert!(stream.is_closed());
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (dir, mut stream) = stream_with(b"x").await;
        stream.close();
        stream.close();
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_drop_mid_stream_deletes() {
        let (dir, mut stream) = stream_with(&[7u8; 4096]).await;
        let mut partial = [0u8; 16];
        stream.read_exact(&mut partial).await.unwrap();

        drop(stream);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_read_after_close_is_eof() {
        let (_dir, mut stream) = stream_with(b"data").await;
        stream.close();

        let mut out = Vec::new();
        assert_eq!(stream.read_to_end(&mut out).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_still_releases_name() {
        let dir = tempfile::tempdir().unwrap();
        let scope = ArtifactStore::new(dir.path()).scope().await.unwrap();
        let artifact = scope.artifact("missing");

        assert!(SelfCleaningStream::open(artifact, scope.id()).await.is_err());
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_first_close_ends_the_lifecycle_once() {
        let (_dir, stream) = stream_with(b"x").await;
        let mut lifecycle = Lifecycle::new();
        for next in [
            RequestState::Selecting,
            RequestState::Materializing,
            RequestState::Streaming,
        ] {
            lifecycle.advance(next);
        }
        let mut stream = stream.with_lifecycle(lifecycle);

        stream.close();
        stream.close();

        let lifecycle = stream.lifecycle().unwrap();
        assert_eq!(lifecycle.state(), RequestState::Closed);
        let closes = lifecycle
            .history()
            .iter()
            .filter(|s| **s == RequestState::Closed)
            .count();
        assert_eq!(closes, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_deletion_does_not_escalate() {
        let dir = tempfile::tempdir().unwrap();
        let scope = ArtifactStore::new(dir.path()).scope().await.unwrap();
        let artifact = scope.artifact("out.mp4");

        // a non-empty directory in place of the file makes remove_file fail
        std::fs::create_dir(artifact.path()).unwrap();
        std::fs::write(artifact.path().join("keep"), b"x").unwrap();
        let blocked = artifact.path().to_path_buf();

        let mut stream = SelfCleaningStream::open(artifact, scope.id()).await.unwrap();
        stream.close();
        assert!(stream.is_closed());
        assert!(blocked.exists());

        stream.close();
        assert!(stream.is_closed());
    }
}
