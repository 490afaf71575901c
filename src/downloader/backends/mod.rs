// Concrete provider and processor backends

pub mod ffmpeg;
pub mod process_stream;
pub mod ytdlp;

pub use ffmpeg::FfmpegProcessor;
pub use ytdlp::YtDlpProvider;
