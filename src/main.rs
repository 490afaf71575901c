// media-downloader HTTP server

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use media_downloader_lib::downloader::tools::{probe_tool, ToolKind};
use media_downloader_lib::downloader::{Downloader, DownloaderConfig};
use media_downloader_lib::http;

#[derive(Debug, Parser)]
#[command(version, about = "Resolve and download online media as MP4 or MP3")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "MEDIA_DL_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Directory served for every path other than the API routes
    #[arg(long, env = "MEDIA_DL_STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = DownloaderConfig::from_env();

    for (kind, path) in [
        (ToolKind::YtDlp, &config.ytdlp_path),
        (ToolKind::Ffmpeg, &config.ffmpeg_path),
    ] {
        let info = probe_tool(kind, path).await;
        match info.version {
            Some(version) => {
                tracing::info!(tool = kind.as_str(), path = %info.path.display(), %version, "tool found")
            }
            None => tracing::warn!(
                tool = kind.as_str(),
                path = %info.path.display(),
                "tool not available, requests needing it will fail"
            ),
        }
    }

    tracing::info!(temp_dir = %config.temp_dir.display(), "artifact store");
    let downloader = Downloader::from_config(&config)?;
    let app = http::router(downloader, &cli.static_dir);

    let listener = TcpListener::bind(cli.listen).await?;
    tracing::info!("listening on http://{}", cli.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
