// yt-dlp metadata provider and stream fetcher
//
// Metadata comes from `yt-dlp -J`. Plain HTTP formats are fetched directly
// with reqwest; everything else (HLS, DASH fragments) is piped through
// `yt-dlp -o -`.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use tokio_util::io::StreamReader;

use super::process_stream::ProcessStream;
use crate::downloader::config::DownloaderConfig;
use crate::downloader::errors::{DownloadError, Result};
use crate::downloader::models::{
    MediaDescriptor, PlaylistDescriptor, PlaylistEntry, StreamDescriptor, StreamLocator,
};
use crate::downloader::traits::{MediaProvider, RemoteStream};
use crate::downloader::utils::{get_network_args, get_session_args, run_output_with_timeout};

pub struct YtDlpProvider {
    config: DownloaderConfig,
    client: reqwest::Client,
}

impl YtDlpProvider {
    pub fn new(config: DownloaderConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.socket_timeout_secs as u64));

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| DownloadError::provider("invalid proxy URL", e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::provider("failed to build HTTP client", e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Arguments shared by every yt-dlp invocation
    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--ignore-config".to_string(),
        ];
        args.extend(get_network_args(&self.config));
        args.extend(get_session_args(&self.config));
        args
    }

    fn metadata_args(&self, mode: &str, url: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push("-J".to_string());
        args.push(mode.to_string());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn stream_args(&self, format_key: &str, url: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(
            ["--no-progress", "--no-part", "-f", format_key, "-o", "-", "--", url]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    /// Run a metadata query and return its stdout
    async fn query(&self, args: Vec<String>) -> Result<Vec<u8>> {
        tracing::debug!(
            tool = %self.config.ytdlp_path.display(),
            args = %args.join(" "),
            "querying metadata"
        );

        let output = run_output_with_timeout(&self.config.ytdlp_path, &args, self.config.process_timeout)
            .await
            .map_err(|e| {
                let message = if e.kind() == io::ErrorKind::TimedOut {
                    "yt-dlp timed out"
                } else {
                    "failed to run yt-dlp"
                };
                DownloadError::provider(message, e.to_string())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::from_provider_output(&stderr));
        }

        Ok(output.stdout)
    }

    async fn open_direct(
        &self,
        stream: &StreamDescriptor,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<RemoteStream> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                DownloadError::fetch(format!("request for format {} failed", stream.format_key), e.to_string())
            })?;

        let content_length = response.content_length().or(stream.filesize);
        let body = response.bytes_stream().map_err(io::Error::other);

        Ok(RemoteStream {
            reader: Box::pin(StreamReader::new(body)),
            content_length,
        })
    }

    fn open_delegated(&self, media: &MediaDescriptor, stream: &StreamDescriptor) -> Result<RemoteStream> {
        let args = self.stream_args(&stream.format_key, &media.webpage_url);
        tracing::debug!(format = %stream.format_key, "delegating fetch to yt-dlp");

        let process = ProcessStream::spawn(&self.config.ytdlp_path, &args)
            .map_err(|e| DownloadError::fetch("failed to start yt-dlp", e.to_string()))?;

        Ok(RemoteStream {
            reader: Box::pin(process),
            content_length: stream.filesize,
        })
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_video(&self, url: &str) -> Result<MediaDescriptor> {
        let stdout = self.query(self.metadata_args("--no-playlist", url)).await?;
        parse_video(&stdout, url)
    }

    async fn fetch_playlist(&self, url: &str) -> Result<PlaylistDescriptor> {
        let stdout = self.query(self.metadata_args("--flat-playlist", url)).await?;
        parse_playlist(&stdout)
    }

    async fn open_stream(
        &self,
        media: &MediaDescriptor,
        stream: &StreamDescriptor,
    ) -> Result<RemoteStream> {
        match &stream.locator {
            StreamLocator::Direct { url, headers } => self.open_direct(stream, url, headers).await,
            StreamLocator::Delegated => self.open_delegated(media, stream),
        }
    }
}

fn parse_json(stdout: &[u8]) -> Result<Value> {
    serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::MalformedResponse(format!("invalid JSON: {}", e)))
}

fn is_playlist(json: &Value) -> bool {
    json["_type"].as_str() == Some("playlist") || json["entries"].is_array()
}

fn string_field(json: &Value, key: &str) -> String {
    json[key].as_str().unwrap_or("").to_string()
}

fn author_of(json: &Value) -> String {
    ["uploader", "channel", "uploader_id"]
        .iter()
        .find_map(|key| json[*key].as_str().filter(|s| !s.is_empty()))
        .unwrap_or("")
        .to_string()
}

fn thumbnail_of(json: &Value) -> Option<String> {
    json["thumbnail"]
        .as_str()
        .filter(|s| !s.is_empty())
        .or_else(|| {
            json["thumbnails"]
                .as_array()
                .and_then(|list| list.iter().rev().find_map(|t| t["url"].as_str()))
        })
        .map(str::to_string)
}

/// Fractional seconds truncated, negatives clamped to zero
fn duration_of(json: &Value) -> Option<u64> {
    json["duration"].as_f64().map(|d| d.max(0.0) as u64)
}

fn parse_video(stdout: &[u8], requested_url: &str) -> Result<MediaDescriptor> {
    let json = parse_json(stdout)?;

    if is_playlist(&json) {
        return Err(DownloadError::NotFound {
            reason: "URL resolves to a playlist, not a single video".to_string(),
        });
    }

    let id = json["id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DownloadError::MalformedResponse("missing video id".to_string()))?
        .to_string();

    // Single-format extractors put the format fields at the top level
    let streams = match json["formats"].as_array() {
        Some(formats) => formats.iter().filter_map(parse_format).collect(),
        None => parse_format(&json).into_iter().collect(),
    };

    let webpage_url = json["webpage_url"]
        .as_str()
        .filter(|s| !s.is_empty())
        .unwrap_or(requested_url)
        .to_string();

    Ok(MediaDescriptor {
        id,
        title: string_field(&json, "title"),
        author: author_of(&json),
        description: string_field(&json, "description"),
        duration_seconds: duration_of(&json).unwrap_or(0),
        thumbnail: thumbnail_of(&json),
        webpage_url,
        streams,
    })
}

/// `None` for entries carrying neither video nor audio
fn parse_format(f: &Value) -> Option<StreamDescriptor> {
    let format_key = f["format_id"].as_str().filter(|s| !s.is_empty())?.to_string();

    // A missing codec field means "unknown", which yt-dlp treats as present
    let has_video = f["vcodec"].as_str().map_or(true, |v| v != "none");
    let has_audio = f["acodec"].as_str().map_or(true, |a| a != "none");
    if !has_video && !has_audio {
        return None;
    }

    let container = string_field(f, "ext");
    let label = f["format_note"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            f["height"]
                .as_u64()
                .filter(|_| has_video)
                .map(|h| format!("{}p", h))
        })
        .unwrap_or_else(|| if has_video { String::new() } else { "audio".to_string() });

    let audio_channels = if has_audio {
        f["audio_channels"].as_u64().unwrap_or(2) as u32
    } else {
        0
    };

    let filesize = f["filesize"]
        .as_u64()
        .or_else(|| f["filesize_approx"].as_f64().map(|v| v.max(0.0) as u64));

    Some(StreamDescriptor {
        mime_type: mime_for(&container, has_video),
        label,
        format_key,
        container,
        has_video,
        has_audio,
        audio_channels,
        filesize,
        locator: locator_of(f),
    })
}

fn locator_of(f: &Value) -> StreamLocator {
    let protocol = f["protocol"].as_str().unwrap_or("");
    match f["url"].as_str() {
        Some(url) if protocol == "http" || protocol == "https" => StreamLocator::Direct {
            url: url.to_string(),
            headers: f["http_headers"]
                .as_object()
                .map(|headers| {
                    headers
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                        .collect()
                })
                .unwrap_or_default(),
        },
        _ => StreamLocator::Delegated,
    }
}

fn mime_for(container: &str, has_video: bool) -> String {
    let kind = if has_video { "video" } else { "audio" };
    match container {
        "mp4" | "m4a" | "m4v" => format!("{}/mp4", kind),
        "webm" | "weba" => format!("{}/webm", kind),
        "mp3" => "audio/mpeg".to_string(),
        "ogg" | "opus" => "audio/ogg".to_string(),
        "3gp" => "video/3gpp".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

fn parse_playlist(stdout: &[u8]) -> Result<PlaylistDescriptor> {
    let json = parse_json(stdout)?;

    if !is_playlist(&json) {
        return Err(DownloadError::NotFound {
            reason: "URL does not resolve to a playlist".to_string(),
        });
    }

    let author = author_of(&json);
    let entries = json["entries"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter(|e| e.is_object())
                .map(|e| PlaylistEntry {
                    id: string_field(e, "id"),
                    title: string_field(e, "title"),
                    author: author_of(e),
                    duration_seconds: duration_of(e),
                    thumbnail: thumbnail_of(e),
                    url: e["url"]
                        .as_str()
                        .or_else(|| e["webpage_url"].as_str())
                        .map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(PlaylistDescriptor {
        id: string_field(&json, "id"),
        title: string_field(&json, "title"),
        author,
        entries,
    })
}
