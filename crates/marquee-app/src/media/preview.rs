//! The hidden, muted preview element.
//!
//! Seek requests queue to a worker thread which, before each decode, skips
//! to the newest queued request. Each decode asks the server for the
//! low-bitrate preview rendition starting at the requested time and keeps the
//! first frame ffmpeg reads from it. The transcoded stream has no seek index,
//! so ffmpeg itself never seeks. A superseded request never lands; the one
//! that does reports its own time as `current_time`.

use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use image::ImageFormat;
use url::Url;

use super::types::DecodedFrame;
use super::{MediaError, probe, spawn_worker};
use crate::player::chapters::TICKS_PER_SECOND;
use crate::player::element::{MediaElement, MediaEvent};

enum PreviewMsg {
    Landed(DecodedFrame),
    Failed { time: f64, message: String },
}

pub struct FfmpegPreviewElement {
    requests: Sender<f64>,
    results: Receiver<PreviewMsg>,
    shutdown: Arc<AtomicBool>,
    time: f64,
    duration: Option<f64>,
    frame: Option<DecodedFrame>,
    events: Vec<MediaEvent>,
}

impl FfmpegPreviewElement {
    /// `duration` is the server-reported runtime; the preview rendition is
    /// never probed.
    pub fn new(url: &Url, duration: Option<f64>) -> Result<Self, MediaError> {
        if !probe::ffmpeg_available() {
            return Err(MediaError::FfmpegMissing);
        }
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<f64>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let url = url.clone();
        let worker_shutdown = shutdown.clone();
        spawn_worker("preview-decode", move || {
            serve_requests(&url, request_rx, result_tx, worker_shutdown);
        })?;

        Ok(Self {
            requests: request_tx,
            results: result_rx,
            shutdown,
            time: 0.0,
            duration,
            frame: None,
            events: Vec::new(),
        })
    }
}

impl MediaElement for FfmpegPreviewElement {
    fn seek(&mut self, secs: f64) {
        let upper = self.duration.unwrap_or(f64::MAX);
        let target = if secs.is_finite() { secs.clamp(0.0, upper) } else { 0.0 };
        if self.requests.send(target).is_ok() {
            self.events.push(MediaEvent::Seeking);
        }
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn current_frame(&self) -> Option<&DecodedFrame> {
        self.frame.as_ref()
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        while let Ok(msg) = self.results.try_recv() {
            match msg {
                PreviewMsg::Landed(frame) => {
                    self.time = frame.pts;
                    self.frame = Some(frame);
                    self.events.push(MediaEvent::Seeked);
                }
                PreviewMsg::Failed { time, message } => {
                    self.events
                        .push(MediaEvent::Error(format!("preview at {time:.2}s: {message}")));
                }
            }
        }
        std::mem::take(&mut self.events)
    }
}

impl Drop for FfmpegPreviewElement {
    fn drop(&mut self) {
        // The worker also exits once the request channel disconnects
        self.shutdown.store(true, Ordering::Release);
    }
}

fn serve_requests(
    url: &Url,
    requests: Receiver<f64>,
    results: Sender<PreviewMsg>,
    shutdown: Arc<AtomicBool>,
) {
    while let Ok(mut target) = requests.recv() {
        let mut superseded = 0;
        while let Ok(newer) = requests.try_recv() {
            target = newer;
            superseded += 1;
        }
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        if superseded > 0 {
            log::debug!("Preview skipped {superseded} stale seek(s)");
        }
        let msg = match extract_frame(url, target) {
            Ok(frame) => PreviewMsg::Landed(frame),
            Err(e) => PreviewMsg::Failed {
                time: target,
                message: e.to_string(),
            },
        };
        if results.send(msg).is_err() {
            break;
        }
    }
    log::debug!("Preview worker stopped");
}

/// `url` with the server-side transcode starting at `time`.
fn url_at(url: &Url, time: f64) -> Url {
    let ticks = (time.max(0.0) * TICKS_PER_SECOND).round() as i64;
    let mut url = url.clone();
    url.query_pairs_mut()
        .append_pair("startTimeTicks", &ticks.to_string());
    url
}

/// Decode the single frame at `time` from the preview rendition at `url`.
fn extract_frame(url: &Url, time: f64) -> Result<DecodedFrame, MediaError> {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-nostdin", "-i"])
        .arg(url_at(url, time).as_str())
        .args([
            "-an", "-sn",
            "-frames:v", "1",
            "-f", "image2pipe",
            "-c:v", "png",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|source| MediaError::Spawn {
            tool: "ffmpeg",
            source,
        })?;

    if output.stdout.is_empty() {
        return Err(MediaError::Decode(format!(
            "no frame at {time:.2}s (exit status {})",
            output.status.code().unwrap_or(-1)
        )));
    }
    decode_png(&output.stdout, time)
}

fn decode_png(bytes: &[u8], time: f64) -> Result<DecodedFrame, MediaError> {
    let rgba = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedFrame {
        data: rgba.into_raw(),
        width,
        height,
        pts: time,
    })
}
