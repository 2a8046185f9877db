//! The seam between the player engine and a concrete media backend.
//!
//! Elements behave like an HTML media element: commands return immediately
//! and their effects are reported later as [`MediaEvent`]s drained once per
//! frame with `poll_events`.

use crate::media::types::DecodedFrame;
use crate::player::captions::TextTrack;

/// Notifications raised by a media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    CanPlay,
    Waiting,
    Play,
    Pause,
    Seeking,
    Seeked,
    TimeUpdate,
    DurationChange,
    Ended,
    Error(String),
}

/// A seekable video surface. The hidden preview element only needs this much.
pub trait MediaElement {
    /// Begin moving to `secs`. Completion is reported by [`MediaEvent::Seeked`].
    fn seek(&mut self, secs: f64);
    /// Position of the frame currently presented, in seconds.
    fn current_time(&self) -> f64;
    /// Total length in seconds, once known.
    fn duration(&self) -> Option<f64>;
    /// The frame currently presented, if any has been decoded.
    fn current_frame(&self) -> Option<&DecodedFrame>;
    /// Drain notifications raised since the last call.
    fn poll_events(&mut self) -> Vec<MediaEvent>;
}

/// The primary, audible element with transport and text tracks.
pub trait PlaybackElement: MediaElement {
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// Output gain in `[0, 1]`.
    fn set_volume(&mut self, volume: f64);
    fn volume(&self) -> f64;
    fn text_tracks(&self) -> &[TextTrack];
    fn text_tracks_mut(&mut self) -> &mut [TextTrack];
}
