pub mod downloader;
pub mod http;
