//! The primary, audible element.
//!
//! A probe worker reads stream metadata, then every play position change
//! starts a fresh pair of ffmpeg decoders (RGBA video, f32 audio) tagged with
//! a new generation number. Frames from older generations are dropped on
//! arrival, and the old decoder threads notice the generation moved on and
//! kill their processes. Presentation follows a wall clock anchored at the
//! last play or seek; audio plays through [`AudioOutput`] at its own pace.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use url::Url;

use super::audio::{AudioOutput, AudioShared};
use super::probe::{self, MAX_DECODE_WIDTH, StreamMeta};
use super::subtitles::{self, Cue};
use super::types::DecodedFrame;
use super::{MediaError, spawn_worker};
use crate::api::ApiClient;
use crate::api::client::redact;
use crate::player::captions::{TextTrack, TrackId};
use crate::player::element::{MediaElement, MediaEvent, PlaybackElement};

/// Decoded frames buffered ahead of presentation.
const FRAME_QUEUE: usize = 4;
const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);
/// How far the clock may run past the last frame before playback stalls.
const STALL_THRESHOLD: f64 = 0.5;
const SEND_POLL: Duration = Duration::from_millis(50);
const AUDIO_CHUNK_BYTES: usize = 16 * 1024;

/// A caption track offered by the server.
#[derive(Debug, Clone)]
pub struct TrackSource {
    pub label: String,
    pub language: Option<String>,
    pub url: Url,
}

enum ControlMsg {
    Meta(StreamMeta),
    Failed(String),
    EndOfStream { generation: u64 },
}

struct FrameMsg {
    generation: u64,
    frame: DecodedFrame,
}

/// Media time as a function of wall time.
#[derive(Debug, Clone, Copy, Default)]
struct Clock {
    anchor_media: f64,
    anchor_at: Option<Instant>,
}

impl Clock {
    fn position(&self, now: Instant) -> f64 {
        match self.anchor_at {
            Some(at) => self.anchor_media + now.saturating_duration_since(at).as_secs_f64(),
            None => self.anchor_media,
        }
    }

    fn is_running(&self) -> bool {
        self.anchor_at.is_some()
    }

    fn start(&mut self, now: Instant) {
        if self.anchor_at.is_none() {
            self.anchor_at = Some(now);
        }
    }

    fn stop(&mut self, now: Instant) {
        self.anchor_media = self.position(now);
        self.anchor_at = None;
    }

    /// Jump to `media` and stop.
    fn reset(&mut self, media: f64) {
        self.anchor_media = media;
        self.anchor_at = None;
    }
}

pub struct FfmpegElement {
    url: String,
    meta: Option<StreamMeta>,
    /// `CanPlay` has been raised for the first decoded frame.
    can_play: bool,
    generation: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    control_tx: Sender<ControlMsg>,
    control_rx: Receiver<ControlMsg>,
    frame_tx: Sender<FrameMsg>,
    frame_rx: Receiver<FrameMsg>,
    cue_rx: Option<Receiver<(TrackId, Result<Vec<Cue>, String>)>>,
    audio: Option<AudioOutput>,
    current: Option<DecodedFrame>,
    next: Option<DecodedFrame>,
    clock: Clock,
    position: f64,
    pending_start: f64,
    /// Waiting for the first frame of the current decoder generation.
    awaiting_frame: bool,
    seek_in_flight: bool,
    paused: bool,
    stalled: bool,
    ended: bool,
    decoder_finished: bool,
    volume: f64,
    tracks: Vec<TextTrack>,
    events: Vec<MediaEvent>,
    last_time_update: Option<Instant>,
}

impl FfmpegElement {
    /// Start probing `url`. Caption cues are fetched in the background with
    /// `client` when given.
    pub fn new(
        url: &Url,
        sources: Vec<TrackSource>,
        client: Option<ApiClient>,
    ) -> Result<Self, MediaError> {
        if !probe::ffmpeg_available() {
            return Err(MediaError::FfmpegMissing);
        }
        let url = url.to_string();
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE);

        let audio = match AudioOutput::new() {
            Ok(audio) => Some(audio),
            Err(e) => {
                log::warn!("Playing without sound: {e}");
                None
            }
        };

        let probe_url = url.clone();
        let probe_tx = control_tx.clone();
        spawn_worker("media-probe", move || {
            let msg = match probe::probe_stream(&probe_url) {
                Ok(meta) => ControlMsg::Meta(meta),
                Err(e) => ControlMsg::Failed(e.to_string()),
            };
            let _ = probe_tx.send(msg);
        })?;

        let tracks: Vec<TextTrack> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| TextTrack::new(TrackId(i), s.label.clone(), s.language.clone()))
            .collect();
        let cue_rx = match client {
            Some(client) if !sources.is_empty() => Some(spawn_cue_fetch(client, sources)?),
            _ => None,
        };

        Ok(Self {
            url,
            meta: None,
            can_play: false,
            generation: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            control_tx,
            control_rx,
            frame_tx,
            frame_rx,
            cue_rx,
            audio,
            current: None,
            next: None,
            clock: Clock::default(),
            position: 0.0,
            pending_start: 0.0,
            awaiting_frame: true,
            seek_in_flight: false,
            paused: true,
            stalled: false,
            ended: false,
            decoder_finished: false,
            volume: 1.0,
            tracks,
            events: vec![MediaEvent::LoadStart],
            last_time_update: None,
        })
    }

    fn update(&mut self, now: Instant) {
        self.receive_cues();
        while let Ok(msg) = self.control_rx.try_recv() {
            match msg {
                ControlMsg::Meta(meta) => self.on_meta(meta),
                ControlMsg::Failed(message) => {
                    self.awaiting_frame = false;
                    self.events.push(MediaEvent::Error(message));
                }
                ControlMsg::EndOfStream { generation } => {
                    if generation == self.generation.load(Ordering::Acquire) {
                        self.decoder_finished = true;
                    }
                }
            }
        }
        if self.meta.is_none() {
            return;
        }

        if self.awaiting_frame {
            if let Some(frame) = self.pull_frame() {
                self.land(frame, now);
            } else if self.decoder_finished {
                // Seeked at or past the last frame
                self.awaiting_frame = false;
                if std::mem::take(&mut self.seek_in_flight) {
                    self.events.push(MediaEvent::Seeked);
                }
                self.finish(now);
            }
            return;
        }
        if self.paused {
            return;
        }

        if self.next.is_none() {
            self.next = self.pull_frame();
        }
        if self.stalled && self.next.is_some() {
            self.stalled = false;
            self.clock.start(now);
            self.resume_audio();
            self.events.push(MediaEvent::CanPlay);
        }

        let mut position = self.clock.position(now);
        if let Some(duration) = self.duration() {
            position = position.min(duration);
        }
        while self.next.as_ref().is_some_and(|f| f.pts <= position) {
            self.current = self.next.take();
            self.next = self.pull_frame();
        }
        self.position = position;

        let last_pts = self.current.as_ref().map_or(self.pending_start, |f| f.pts);
        if self.next.is_none() && position > last_pts + STALL_THRESHOLD {
            if self.decoder_finished {
                self.finish(now);
                return;
            }
            if !self.stalled {
                log::debug!("Playback stalled at {last_pts:.2}s");
                self.stalled = true;
                self.clock.reset(last_pts);
                self.position = last_pts;
                self.pause_audio();
                self.events.push(MediaEvent::Waiting);
            }
        }

        if self
            .last_time_update
            .is_none_or(|at| now.duration_since(at) >= TIME_UPDATE_INTERVAL)
        {
            self.last_time_update = Some(now);
            self.events.push(MediaEvent::TimeUpdate);
        }
    }

    fn on_meta(&mut self, meta: StreamMeta) {
        log::info!(
            "Stream ready: {}x{} @ {:.2}fps, {}, audio: {}",
            meta.width,
            meta.height,
            meta.fps,
            meta.duration_secs
                .map_or_else(|| "unknown length".to_string(), |d| format!("{d:.1}s")),
            meta.has_audio
        );
        self.meta = Some(meta);
        self.events.push(MediaEvent::LoadedMetadata);
        self.events.push(MediaEvent::DurationChange);
        self.start_decode(self.pending_start);
    }

    fn land(&mut self, frame: DecodedFrame, now: Instant) {
        self.awaiting_frame = false;
        self.position = frame.pts;
        self.clock.reset(frame.pts);
        self.current = Some(frame);
        if std::mem::take(&mut self.seek_in_flight) {
            self.events.push(MediaEvent::Seeked);
        }
        self.events.push(MediaEvent::TimeUpdate);
        self.last_time_update = Some(now);
        if !std::mem::replace(&mut self.can_play, true) {
            self.events.push(MediaEvent::CanPlay);
        }
        if !self.paused {
            self.clock.start(now);
            self.resume_audio();
        }
    }

    fn finish(&mut self, now: Instant) {
        self.clock.stop(now);
        self.position = self.duration().unwrap_or(self.position);
        self.clock.reset(self.position);
        self.ended = true;
        self.stalled = false;
        self.pause_audio();
        if !self.paused {
            self.paused = true;
            self.events.push(MediaEvent::Pause);
        }
        self.events.push(MediaEvent::Ended);
    }

    /// Next frame of the live generation, discarding stale ones.
    fn pull_frame(&mut self) -> Option<DecodedFrame> {
        let live = self.generation.load(Ordering::Acquire);
        while let Ok(msg) = self.frame_rx.try_recv() {
            if msg.generation == live {
                return Some(msg.frame);
            }
        }
        None
    }

    fn start_decode(&mut self, start: f64) {
        let Some(meta) = self.meta.clone() else {
            self.pending_start = start;
            return;
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.pending_start = start;
        self.decoder_finished = false;
        self.next = None;

        let (width, height) = meta.decode_size(MAX_DECODE_WIDTH);
        let job = DecodeJob {
            url: self.url.clone(),
            start,
            generation,
            live: self.generation.clone(),
            shutdown: self.shutdown.clone(),
        };

        let video_job = job.clone();
        let frame_tx = self.frame_tx.clone();
        let control_tx = self.control_tx.clone();
        let fps = meta.fps;
        if let Err(e) = spawn_worker("video-decode", move || {
            decode_video(video_job, width, height, fps, frame_tx, control_tx);
        }) {
            self.events.push(MediaEvent::Error(e.to_string()));
            return;
        }

        if let Some(audio) = self.audio.as_ref().filter(|_| meta.has_audio) {
            audio.flush();
            let shared = audio.shared();
            let (rate, channels) = (audio.sample_rate, audio.channels);
            if let Err(e) = spawn_worker("audio-decode", move || {
                decode_audio(job, shared, rate, channels);
            }) {
                log::warn!("Audio decoder failed to start: {e}");
            }
        }
    }

    fn receive_cues(&mut self) {
        let Some(rx) = self.cue_rx.as_ref() else {
            return;
        };
        while let Ok((id, result)) = rx.try_recv() {
            let Some(track) = self.tracks.iter_mut().find(|t| t.id == id) else {
                continue;
            };
            match result {
                Ok(cues) => {
                    log::debug!("Loaded {} cues for '{}'", cues.len(), track.label);
                    track.cues = cues;
                }
                Err(e) => log::warn!("Caption track '{}' unavailable: {e}", track.label),
            }
        }
    }

    fn resume_audio(&self) {
        if let Some(audio) = &self.audio {
            audio.resume();
        }
    }

    fn pause_audio(&self) {
        if let Some(audio) = &self.audio {
            audio.pause();
        }
    }
}

impl MediaElement for FfmpegElement {
    fn seek(&mut self, secs: f64) {
        let upper = self.duration().unwrap_or(f64::MAX);
        let target = if secs.is_finite() { secs.clamp(0.0, upper) } else { 0.0 };
        self.events.push(MediaEvent::Seeking);
        self.awaiting_frame = true;
        self.seek_in_flight = true;
        self.ended = false;
        self.stalled = false;
        self.position = target;
        self.clock.reset(target);
        self.pause_audio();
        self.start_decode(target);
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        self.meta.as_ref().and_then(|m| m.duration_secs)
    }

    fn current_frame(&self) -> Option<&DecodedFrame> {
        self.current.as_ref()
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        self.update(Instant::now());
        std::mem::take(&mut self.events)
    }
}

impl PlaybackElement for FfmpegElement {
    fn play(&mut self) {
        if !self.paused {
            return;
        }
        if self.ended {
            self.seek(0.0);
        }
        self.paused = false;
        self.events.push(MediaEvent::Play);
        if !self.awaiting_frame && !self.stalled {
            self.clock.start(Instant::now());
            self.resume_audio();
        }
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        if self.clock.is_running() {
            self.clock.stop(Instant::now());
            self.position = self.clock.position(Instant::now());
        }
        self.pause_audio();
        self.events.push(MediaEvent::Pause);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(audio) = &self.audio {
            audio.set_volume(self.volume as f32);
        }
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn text_tracks(&self) -> &[TextTrack] {
        &self.tracks
    }

    fn text_tracks_mut(&mut self) -> &mut [TextTrack] {
        &mut self.tracks
    }
}

impl Drop for FfmpegElement {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.pause_audio();
        log::debug!("Primary element dropped; decoders stopping");
    }
}

#[derive(Clone)]
struct DecodeJob {
    url: String,
    start: f64,
    generation: u64,
    live: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl DecodeJob {
    fn is_live(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
            && self.live.load(Ordering::Acquire) == self.generation
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin", "-ss", &format!("{:.3}", self.start), "-i"])
            .arg(&self.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }
}

fn decode_video(
    job: DecodeJob,
    width: u32,
    height: u32,
    fps: f64,
    frame_tx: Sender<FrameMsg>,
    control_tx: Sender<ControlMsg>,
) {
    let mut cmd = job.ffmpeg();
    cmd.args([
        "-an", "-sn",
        "-vf", &format!("scale={width}:{height}"),
        "-f", "rawvideo",
        "-pix_fmt", "rgba",
        "pipe:1",
    ]);
    let Some(mut child) = spawn_logged(&mut cmd, "video") else {
        let _ = control_tx.send(ControlMsg::Failed("could not start video decoder".into()));
        return;
    };
    let Some(mut stdout) = child.stdout.take() else {
        reap(child);
        return;
    };

    let mut buf = vec![0u8; DecodedFrame::expected_len(width, height)];
    let mut index: u64 = 0;
    'frames: while job.is_live() {
        if stdout.read_exact(&mut buf).is_err() {
            if job.is_live() {
                log::debug!("Video decoder reached end at frame {index}");
                let _ = control_tx.send(ControlMsg::EndOfStream {
                    generation: job.generation,
                });
            }
            break;
        }
        let mut msg = FrameMsg {
            generation: job.generation,
            frame: DecodedFrame {
                data: buf.clone(),
                width,
                height,
                pts: job.start + index as f64 / fps,
            },
        };
        index += 1;
        loop {
            match frame_tx.send_timeout(msg, SEND_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !job.is_live() {
                        break 'frames;
                    }
                    msg = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => break 'frames,
            }
        }
    }
    reap(child);
}

fn decode_audio(job: DecodeJob, shared: Arc<AudioShared>, sample_rate: u32, channels: u16) {
    let mut cmd = job.ffmpeg();
    cmd.args([
        "-vn", "-sn",
        "-f", "f32le",
        "-ac", &channels.to_string(),
        "-ar", &sample_rate.to_string(),
        "pipe:1",
    ]);
    let Some(mut child) = spawn_logged(&mut cmd, "audio") else {
        return;
    };
    let Some(mut stdout) = child.stdout.take() else {
        reap(child);
        return;
    };

    let mut bytes = vec![0u8; AUDIO_CHUNK_BYTES];
    'chunks: while job.is_live() {
        if stdout.read_exact(&mut bytes).is_err() {
            break;
        }
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let mut offset = 0;
        while offset < samples.len() {
            if !job.is_live() {
                break 'chunks;
            }
            let pushed = shared.ring.push(&samples[offset..]);
            offset += pushed;
            if pushed == 0 {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }
    reap(child);
}

fn spawn_logged(cmd: &mut Command, what: &str) -> Option<Child> {
    match cmd.spawn() {
        Ok(child) => Some(child),
        Err(e) => {
            log::error!("Failed to spawn ffmpeg {what} decoder: {e}");
            None
        }
    }
}

fn reap(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_cue_fetch(
    client: ApiClient,
    sources: Vec<TrackSource>,
) -> Result<Receiver<(TrackId, Result<Vec<Cue>, String>)>, MediaError> {
    let (tx, rx) = crossbeam_channel::unbounded();
    spawn_worker("caption-fetch", move || {
        for (i, source) in sources.iter().enumerate() {
            let result = client
                .fetch_text(&source.url)
                .map_err(|e| e.to_string())
                .and_then(|text| subtitles::parse(&text).map_err(|e| e.to_string()));
            if let Err(e) = &result {
                log::debug!("Caption fetch {} failed: {e}", redact(&source.url));
            }
            if tx.send((TrackId(i), result)).is_err() {
                break;
            }
        }
    })?;
    Ok(rx)
}
