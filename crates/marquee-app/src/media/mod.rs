//! ffmpeg- and cpal-backed media elements.
//!
//! Decoding runs in `ffmpeg`/`ffprobe` subprocesses on worker threads; the
//! elements themselves live on the UI thread and only exchange messages with
//! those workers.

pub mod audio;
pub mod preview;
pub mod probe;
pub mod stream;
pub mod subtitles;
pub mod types;

pub use preview::FfmpegPreviewElement;
pub use stream::{FfmpegElement, TrackSource};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg/ffprobe not found on PATH")]
    FfmpegMissing,
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },
    #[error("ffprobe failed: {0}")]
    Probe(String),
    #[error("no video stream found")]
    NoVideo,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("audio output unavailable: {0}")]
    Audio(String),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Catch a panic in a worker body and log it instead of tearing down the app.
pub(crate) fn spawn_worker<F>(name: &str, body: F) -> Result<std::thread::JoinHandle<()>, MediaError>
where
    F: FnOnce() + Send + 'static,
{
    let label = name.to_string();
    std::thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body)) {
                let msg = if let Some(s) = e.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = e.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".into()
                };
                log::error!("{label} thread panicked: {msg}");
            }
        })
        .map_err(|source| MediaError::Spawn {
            tool: "worker thread",
            source,
        })
}
