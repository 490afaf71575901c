// Helpers for running external tools

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::config::DownloaderConfig;

/// Run a command to completion, capturing stdout and stderr.
///
/// Both pipes are drained on their own tasks so a chatty process can't block
/// on a full pipe. With `limit` set, an overrunning child is killed and the
/// call fails with `ErrorKind::TimedOut`. Dropping the returned future kills
/// the child as well.
pub async fn run_output_with_timeout<I, S>(
    program: &Path,
    args: I,
    limit: Option<Duration>,
) -> io::Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("failed to capture stdout"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("failed to capture stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let status = match limit {
        Some(limit) => match timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timed out after {}s", limit.as_secs()),
                ));
            }
        },
        None => child.wait().await?,
    };

    let stdout = stdout_task.await.map_err(io::Error::other)??;
    let stderr = stderr_task.await.map_err(io::Error::other)??;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Last `max_lines` non-empty lines of tool output, for log lines.
pub fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Build network arguments for yt-dlp
pub fn get_network_args(config: &DownloaderConfig) -> Vec<String> {
    let mut args = vec![
        "--socket-timeout".to_string(),
        config.socket_timeout_secs.to_string(),
    ];

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build cookie and extractor arguments for yt-dlp
pub fn get_session_args(config: &DownloaderConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(path) = &config.cookies_path {
        args.push("--cookies".to_string());
        args.push(path.to_string_lossy().into_owned());
    }

    if let Some(extractor_args) = &config.extractor_args {
        args.push("--extractor-args".to_string());
        args.push(extractor_args.clone());
    }

    args
}
