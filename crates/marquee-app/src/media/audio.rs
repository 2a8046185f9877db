//! Audio output for the primary element.
//!
//! The decode thread pushes interleaved f32 samples into a lock-free ring;
//! the cpal callback drains it, applying volume and silence while paused.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::MediaError;

/// Ring capacity in samples (power of 2). About 0.7 s of 48 kHz stereo.
const RING_SIZE: usize = 1 << 16;
const RING_MASK: usize = RING_SIZE - 1;

/// Single-producer single-consumer sample ring. Samples are stored as f32
/// bit patterns in atomics so neither side needs `unsafe`.
pub struct SampleRing {
    data: Box<[AtomicU32]>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleRing {
    pub fn new() -> Self {
        Self {
            data: (0..RING_SIZE).map(|_| AtomicU32::new(0)).collect(),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Producer side. Writes as many samples as fit; returns how many.
    pub fn push(&self, samples: &[f32]) -> usize {
        let wp = self.write_pos.load(Ordering::Relaxed);
        let rp = self.read_pos.load(Ordering::Acquire);
        let free = RING_SIZE - wp.wrapping_sub(rp);
        let count = free.min(samples.len());
        for (i, sample) in samples[..count].iter().enumerate() {
            self.data[wp.wrapping_add(i) & RING_MASK].store(sample.to_bits(), Ordering::Relaxed);
        }
        self.write_pos.store(wp.wrapping_add(count), Ordering::Release);
        count
    }

    /// Consumer side. Returns number of samples read into `dst`.
    pub fn read(&self, dst: &mut [f32]) -> usize {
        let wp = self.write_pos.load(Ordering::Acquire);
        let rp = self.read_pos.load(Ordering::Relaxed);
        let count = wp.wrapping_sub(rp).min(dst.len());
        for (i, out) in dst[..count].iter_mut().enumerate() {
            *out = f32::from_bits(self.data[rp.wrapping_add(i) & RING_MASK].load(Ordering::Relaxed));
        }
        self.read_pos.store(rp.wrapping_add(count), Ordering::Release);
        count
    }

    /// Consumer side: drop everything buffered.
    pub fn discard(&self) {
        let wp = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(wp, Ordering::Release);
    }

    pub fn available(&self) -> usize {
        let wp = self.write_pos.load(Ordering::Acquire);
        let rp = self.read_pos.load(Ordering::Acquire);
        wp.wrapping_sub(rp)
    }

    pub fn free(&self) -> usize {
        RING_SIZE - self.available()
    }
}

/// State shared between the UI thread, the decode thread and the callback.
pub struct AudioShared {
    pub ring: SampleRing,
    volume_bits: AtomicU32,
    paused: AtomicBool,
    flush: AtomicBool,
    underruns: AtomicU64,
}

impl AudioShared {
    fn new() -> Self {
        Self {
            ring: SampleRing::new(),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            paused: AtomicBool::new(true),
            flush: AtomicBool::new(false),
            underruns: AtomicU64::new(0),
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Fill one callback buffer.
    fn render(&self, data: &mut [f32]) {
        if self.flush.swap(false, Ordering::AcqRel) {
            self.ring.discard();
        }
        if self.is_paused() {
            data.fill(0.0);
            return;
        }
        let read = self.ring.read(data);
        if read < data.len() {
            data[read..].fill(0.0);
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
        let volume = self.volume();
        if volume < 1.0 {
            for sample in &mut data[..read] {
                *sample *= volume;
            }
        }
    }
}

pub struct AudioOutput {
    _stream: Stream,
    shared: Arc<AudioShared>,
    pub sample_rate: u32,
    pub channels: u16,
    pub device_name: String,
}

impl AudioOutput {
    /// Open the default output device. Starts paused.
    pub fn new() -> Result<Self, MediaError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MediaError::Audio("no output device".into()))?;

        let device_name = device
            .description()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|_| "Unknown".into());

        let config = device
            .default_output_config()
            .map_err(|e| MediaError::Audio(e.to_string()))?;
        let sample_rate = config.sample_rate();
        let channels = config.channels();
        log::info!("Audio output: {device_name}, {sample_rate}Hz, {channels}ch");

        let shared = Arc::new(AudioShared::new());
        let callback_shared = shared.clone();

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_shared.render(data);
                },
                |err| {
                    log::error!("Audio stream error: {err}");
                },
                None,
            )
            .map_err(|e| MediaError::Audio(e.to_string()))?;
        stream.play().map_err(|e| MediaError::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            shared,
            sample_rate,
            channels,
            device_name,
        })
    }

    /// Producer handle for the decode thread.
    pub fn shared(&self) -> Arc<AudioShared> {
        self.shared.clone()
    }

    pub fn set_volume(&self, volume: f32) {
        self.shared
            .volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Relaxed);
    }

    /// Drop buffered samples at the next callback (used on seek).
    pub fn flush(&self) {
        self.shared.flush.store(true, Ordering::Release);
    }

    pub fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Relaxed)
    }
}
