// External tool discovery

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    YtDlp,
    Ffmpeg,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "--version",
            ToolKind::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub kind: ToolKind,
    pub path: PathBuf,
    pub version: Option<String>,
    pub is_available: bool,
}

/// Resolve a tool binary: common install locations first, then `PATH`.
/// Falls back to the bare name so the spawn error names the missing tool.
pub fn locate_tool(kind: ToolKind) -> PathBuf {
    let binary_name = kind.as_str();

    let common_paths = [
        format!("/usr/bin/{}", binary_name),
        format!("/usr/local/bin/{}", binary_name),
        format!("/opt/homebrew/bin/{}", binary_name),
    ];

    for path in common_paths {
        if Path::new(&path).exists() {
            return PathBuf::from(path);
        }
    }

    which::which(binary_name).unwrap_or_else(|_| PathBuf::from(binary_name))
}

/// Run the tool's version command. Used for the startup report only.
pub async fn probe_tool(kind: ToolKind, path: &Path) -> ToolInfo {
    let output = Command::new(path)
        .arg(kind.version_arg())
        .stdin(Stdio::null())
        .output()
        .await;

    let version = match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        _ => None,
    };

    ToolInfo {
        kind,
        path: path.to_path_buf(),
        is_available: version.is_some(),
        version,
    }
}
