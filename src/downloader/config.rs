// Runtime configuration for the download core

use std::path::PathBuf;
use std::time::Duration;

use super::tools::{locate_tool, ToolKind};

/// Settings shared by the metadata provider, the media processor and the
/// artifact store. Built once at process start.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// yt-dlp binary
    pub ytdlp_path: PathBuf,
    /// ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Directory holding transient artifacts
    pub temp_dir: PathBuf,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to a Netscape cookies.txt file, passed through verbatim
    pub cookies_path: Option<PathBuf>,
    /// Socket timeout handed to yt-dlp, in seconds
    pub socket_timeout_secs: u32,
    /// Value for `--extractor-args` (e.g. "youtube:player_client=ios")
    pub extractor_args: Option<String>,
    /// Target bitrate for MP3 conversion
    pub mp3_bitrate: String,
    /// Kill external processes running longer than this. `None` waits forever.
    pub process_timeout: Option<Duration>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: locate_tool(ToolKind::YtDlp),
            ffmpeg_path: locate_tool(ToolKind::Ffmpeg),
            temp_dir: std::env::temp_dir().join("media-downloader"),
            proxy: None,
            cookies_path: None,
            socket_timeout_secs: 30,
            extractor_args: None,
            mp3_bitrate: "192k".to_string(),
            process_timeout: None,
        }
    }
}

impl DownloaderConfig {
    /// Defaults overridden by `MEDIA_DL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = var("MEDIA_DL_YTDLP") {
            config.ytdlp_path = PathBuf::from(path);
        }
        if let Some(path) = var("MEDIA_DL_FFMPEG") {
            config.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(dir) = var("MEDIA_DL_TEMP_DIR") {
            config = config.with_temp_dir(dir);
        }
        config = config
            .with_proxy(var("MEDIA_DL_PROXY"))
            .with_cookies_path(var("MEDIA_DL_COOKIES").map(PathBuf::from))
            .with_extractor_args(var("MEDIA_DL_PLAYER_CLIENT").map(|c| format!("youtube:player_client={}", c)));

        if let Some(secs) = var("MEDIA_DL_PROCESS_TIMEOUT") {
            match secs.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(secs) => config = config.with_process_timeout(Some(Duration::from_secs(secs))),
                Err(_) => tracing::warn!(value = %secs, "ignoring invalid MEDIA_DL_PROCESS_TIMEOUT"),
            }
        }

        config
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<PathBuf>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_extractor_args(mut self, args: Option<String>) -> Self {
        self.extractor_args = args;
        self
    }

    pub fn with_mp3_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.mp3_bitrate = bitrate.into();
        self
    }

    pub fn with_process_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.process_timeout = timeout;
        self
    }
}
