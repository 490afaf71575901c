// ffmpeg media processor: mux split streams, convert audio to MP3

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::downloader::config::DownloaderConfig;
use crate::downloader::errors::{DownloadError, Result};
use crate::downloader::traits::MediaProcessor;
use crate::downloader::utils::{run_output_with_timeout, tail};

pub struct FfmpegProcessor {
    ffmpeg_path: PathBuf,
    mp3_bitrate: String,
    process_timeout: Option<Duration>,
}

impl FfmpegProcessor {
    pub fn new(config: &DownloaderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            mp3_bitrate: config.mp3_bitrate.clone(),
            process_timeout: config.process_timeout,
        }
    }

    /// Re-encode to H.264/AAC with the moov atom up front, so the result
    /// plays everywhere and can start before it is fully received.
    fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), video.into(), "-i".into(), audio.into()];
        args.extend(
            [
                "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-pix_fmt", "yuv420p",
                "-c:a", "aac", "-b:a", "128k", "-movflags", "+faststart",
            ]
            .iter()
            .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    fn mp3_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];
        args.extend(
            ["-vn", "-f", "mp3", "-b:a", self.mp3_bitrate.as_str()]
                .iter()
                .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    async fn run(&self, operation: &str, args: Vec<OsString>) -> Result<()> {
        tracing::debug!(operation, tool = %self.ffmpeg_path.display(), "running ffmpeg");

        let output = run_output_with_timeout(&self.ffmpeg_path, &args, self.process_timeout)
            .await
            .map_err(|e| {
                let message = if e.kind() == io::ErrorKind::TimedOut {
                    format!("{} timed out", operation)
                } else {
                    format!("failed to run ffmpeg for {}", operation)
                };
                DownloadError::transcode(message, e.to_string())
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));

        Err(DownloadError::transcode(
            format!("{} exited with {}", operation, output.status),
            tail(&diagnostics, 20),
        ))
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn mux_video_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.run("mux", Self::mux_args(video, audio, output)).await
    }

    async fn convert_to_mp3(&self, input: &Path, output: &Path) -> Result<()> {
        self.run("mp3 conversion", self.mp3_args(input, output)).await
    }
}
