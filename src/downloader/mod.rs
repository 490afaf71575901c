// Download core: metadata resolution, format selection, artifact pipeline

pub mod artifact;
pub mod backends;
pub mod config;
pub mod errors;
pub mod format_selector;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod resolver;
pub mod stream;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::ArtifactStore;
pub use config::DownloaderConfig;
pub use errors::DownloadError;
pub use format_selector::{FormatSelector, Selection};
pub use lifecycle::{Lifecycle, RequestState};
pub use models::{DownloadRequest, MediaDescriptor, MediaFormat, MediaInfo, PlaylistDescriptor};
pub use orchestrator::{Download, Downloader};
pub use stream::SelfCleaningStream;
pub use traits::{MediaProcessor, MediaProvider};
