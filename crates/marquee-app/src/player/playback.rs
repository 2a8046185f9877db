//! Transport, volume, fullscreen and caption state for the primary element.
//!
//! The controller never assumes a command took effect: playing, seeking,
//! loading and fullscreen flags are all derived from notifications coming
//! back from the element or the window.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::player::captions::{Captions, TrackId};
use crate::player::element::{MediaEvent, PlaybackElement};
use crate::player::prefs::{PreferenceStore, Preferences};
use crate::player::timer::Timer;

/// Inactivity before the controls bar hides during playback.
pub const CONTROLS_HIDE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum FullscreenError {
    #[error("no monitor available for fullscreen")]
    NoMonitor,
    #[error("fullscreen request rejected: {0}")]
    Rejected(String),
}

/// The window that hosts the player. Requests are fire-and-forget; the
/// resulting state comes back through [`PlaybackController::on_fullscreen_changed`].
pub trait FullscreenHost {
    fn request_fullscreen(&mut self) -> Result<(), FullscreenError>;
    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError>;
}

#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub current_time: f64,
    pub duration: Option<f64>,
    pub volume: f64,
    pub previous_volume: f64,
    pub is_playing: bool,
    pub is_fullscreen: bool,
    pub is_loading: bool,
    pub is_seeking: bool,
    pub has_ended: bool,
    pub show_chapter_markers: bool,
    pub captions: Captions,
    pub controls_visible: bool,
}

pub struct PlaybackController<E: PlaybackElement, S: PreferenceStore> {
    element: Option<E>,
    prefs: Preferences<S>,
    state: PlaybackState,
    hide_timer: Timer,
}

impl<E: PlaybackElement, S: PreferenceStore> PlaybackController<E, S> {
    pub fn new(element: Option<E>, prefs: Preferences<S>) -> Self {
        let state = PlaybackState {
            current_time: 0.0,
            duration: None,
            volume: prefs.volume(),
            previous_volume: prefs.previous_volume(),
            is_playing: false,
            is_fullscreen: false,
            is_loading: false,
            is_seeking: false,
            has_ended: false,
            show_chapter_markers: prefs.show_chapter_markers(),
            captions: Captions::from_prefs(&prefs),
            controls_visible: true,
        };
        let mut controller = Self {
            element,
            prefs,
            state,
            hide_timer: Timer::new(),
        };
        let volume = controller.state.volume;
        if let Some(element) = controller.element.as_mut() {
            element.set_volume(volume);
        }
        controller
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn element(&self) -> Option<&E> {
        self.element.as_ref()
    }

    pub fn prefs(&self) -> &Preferences<S> {
        &self.prefs
    }

    pub fn is_paused(&self) -> bool {
        self.element.as_ref().is_none_or(|e| e.is_paused())
    }

    pub fn toggle_play(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if element.is_paused() {
            element.play();
        } else {
            element.pause();
        }
    }

    /// Direct seek of the primary element.
    pub fn seek(&mut self, secs: f64) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        let upper = self.state.duration.unwrap_or(f64::MAX);
        let target = secs.clamp(0.0, upper);
        log::debug!("Seek to {target:.2}s");
        element.seek(target);
    }

    /// Seek relative to the current position.
    pub fn skip(&mut self, delta_secs: f64) {
        self.seek(self.state.current_time + delta_secs);
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        self.state.volume = volume;
        if let Some(element) = self.element.as_mut() {
            element.set_volume(volume);
        }
        if volume > 0.0 {
            self.state.previous_volume = volume;
            self.prefs.set_previous_volume(volume);
        }
        self.prefs.set_volume(volume);
    }

    pub fn adjust_volume(&mut self, delta: f64) {
        self.set_volume(self.state.volume + delta);
    }

    pub fn toggle_mute(&mut self) {
        if self.state.volume > 0.0 {
            self.state.previous_volume = self.state.volume;
            self.prefs.set_previous_volume(self.state.volume);
            self.set_volume(0.0);
        } else {
            self.set_volume(self.state.previous_volume);
        }
    }

    /// Ask the host to enter or leave fullscreen. State changes only when the
    /// host reports back.
    pub fn toggle_fullscreen(&mut self, host: &mut dyn FullscreenHost) {
        let result = if self.state.is_fullscreen {
            host.exit_fullscreen()
        } else {
            host.request_fullscreen()
        };
        if let Err(e) = result {
            log::warn!("Fullscreen toggle failed: {e}");
        }
    }

    pub fn on_fullscreen_changed(&mut self, fullscreen: bool) {
        if self.state.is_fullscreen != fullscreen {
            log::info!("Fullscreen {}", if fullscreen { "entered" } else { "exited" });
        }
        self.state.is_fullscreen = fullscreen;
    }

    /// Pointer moved over the player: show controls and restart the hide timer.
    pub fn pointer_activity(&mut self, now: Instant) {
        self.state.controls_visible = true;
        self.hide_timer.schedule(now, CONTROLS_HIDE_DELAY);
    }

    pub fn toggle_chapter_markers(&mut self) {
        self.state.show_chapter_markers = !self.state.show_chapter_markers;
        self.prefs
            .set_show_chapter_markers(self.state.show_chapter_markers);
    }

    pub fn toggle_captions(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        self.state
            .captions
            .toggle(element.text_tracks_mut(), &mut self.prefs);
    }

    /// Turn captions off if they are on.
    pub fn disable_captions(&mut self) {
        if self.state.captions.enabled {
            self.toggle_captions();
        }
    }

    pub fn select_track(&mut self, id: TrackId) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        self.state
            .captions
            .select(element.text_tracks_mut(), id, &mut self.prefs);
    }

    pub fn select_track_label(&mut self, label: &str) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        self.state
            .captions
            .select_label(element.text_tracks_mut(), label, &mut self.prefs);
    }

    /// Drain element notifications into state and run the hide timer.
    /// Returns the notifications so the owner can react to them too.
    pub fn tick(&mut self, now: Instant) -> Vec<MediaEvent> {
        let events = match self.element.as_mut() {
            Some(element) => element.poll_events(),
            None => Vec::new(),
        };
        for event in &events {
            self.apply(event);
        }

        if self.hide_timer.fire(now) && self.state.is_playing {
            self.state.controls_visible = false;
        }
        events
    }

    /// Release the element and stop the hide timer.
    pub fn teardown(&mut self) -> Option<E> {
        self.hide_timer.cancel();
        self.state.is_playing = false;
        self.element.take()
    }

    fn apply(&mut self, event: &MediaEvent) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        match event {
            MediaEvent::LoadStart | MediaEvent::Waiting => self.state.is_loading = true,
            MediaEvent::CanPlay => self.state.is_loading = false,
            MediaEvent::LoadedMetadata => {
                self.state.duration = element.duration();
                self.state.captions.on_metadata(element.text_tracks_mut());
            }
            MediaEvent::DurationChange => self.state.duration = element.duration(),
            MediaEvent::Seeking => {
                self.state.is_seeking = true;
                self.state.has_ended = false;
                self.state.current_time = element.current_time();
            }
            MediaEvent::Seeked => {
                self.state.is_seeking = false;
                self.state.current_time = element.current_time();
            }
            MediaEvent::TimeUpdate => self.state.current_time = element.current_time(),
            MediaEvent::Play => {
                self.state.is_playing = true;
                self.state.has_ended = false;
            }
            MediaEvent::Pause => {
                self.state.is_playing = false;
                self.state.controls_visible = true;
            }
            MediaEvent::Ended => {
                self.state.is_playing = false;
                self.state.has_ended = true;
                self.state.controls_visible = true;
            }
            MediaEvent::Error(message) => {
                self.state.is_loading = false;
                log::error!("Playback error: {message}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::captions::{TextTrack, TrackMode};
    use crate::player::element::fake::FakeElement;
    use crate::player::prefs::MemoryStore;

    #[derive(Default)]
    struct FakeHost {
        reject: bool,
        requests: usize,
        exits: usize,
    }

    impl FullscreenHost for FakeHost {
        fn request_fullscreen(&mut self) -> Result<(), FullscreenError> {
            self.requests += 1;
            if self.reject {
                Err(FullscreenError::Rejected("not allowed".into()))
            } else {
                Ok(())
            }
        }

        fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
            self.exits += 1;
            Ok(())
        }
    }

    fn controller() -> PlaybackController<FakeElement, MemoryStore> {
        PlaybackController::new(
            Some(FakeElement::new(120.0)),
            Preferences::new(MemoryStore::new()),
        )
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn mute_round_trip_restores_exact_volume() {
        let mut ctl = controller();
        ctl.set_volume(0.7);
        ctl.toggle_mute();
        assert_eq!(ctl.state().volume, 0.0);
        assert_eq!(ctl.state().previous_volume, 0.7);
        assert_eq!(ctl.element().unwrap().volume, 0.0);
        ctl.toggle_mute();
        assert_eq!(ctl.state().volume, 0.7);
        assert_eq!(ctl.prefs().volume(), 0.7);
    }

    #[test]
    fn volume_clamps_and_zero_keeps_previous() {
        let mut ctl = controller();
        ctl.set_volume(1.5);
        assert_eq!(ctl.state().volume, 1.0);
        ctl.set_volume(0.4);
        ctl.set_volume(-2.0);
        assert_eq!(ctl.state().volume, 0.0);
        assert_eq!(ctl.state().previous_volume, 0.4);
        assert_eq!(ctl.prefs().previous_volume(), 0.4);
    }

    #[test]
    fn stored_volume_applied_on_construction() {
        let mut prefs = Preferences::new(MemoryStore::new());
        prefs.set_volume(0.25);
        let ctl = PlaybackController::new(Some(FakeElement::new(10.0)), prefs);
        assert_eq!(ctl.state().volume, 0.25);
        assert_eq!(ctl.element().unwrap().volume, 0.25);
    }

    #[test]
    fn controls_hide_after_inactivity_while_playing() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.toggle_play();
        ctl.tick(t0);
        assert!(ctl.state().is_playing);

        ctl.pointer_activity(t0);
        ctl.tick(ms(t0, 2_999));
        assert!(ctl.state().controls_visible);
        ctl.tick(ms(t0, 3_001));
        assert!(!ctl.state().controls_visible);

        ctl.pointer_activity(ms(t0, 3_500));
        assert!(ctl.state().controls_visible);
        ctl.tick(ms(t0, 6_400));
        assert!(ctl.state().controls_visible);
        ctl.tick(ms(t0, 6_501));
        assert!(!ctl.state().controls_visible);
    }

    #[test]
    fn controls_stay_while_paused() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.pointer_activity(t0);
        ctl.tick(ms(t0, 5_000));
        assert!(ctl.state().controls_visible);
    }

    #[test]
    fn play_state_follows_events() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.toggle_play();
        assert!(!ctl.state().is_playing);
        let events = ctl.tick(t0);
        assert_eq!(events, vec![MediaEvent::Play]);
        assert!(ctl.state().is_playing);
        ctl.toggle_play();
        ctl.tick(t0);
        assert!(!ctl.state().is_playing);
        assert_eq!(ctl.element().unwrap().pause_calls, 1);
    }

    #[test]
    fn loading_and_seeking_indicators() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.element.as_mut().unwrap().events.push(MediaEvent::LoadStart);
        ctl.tick(t0);
        assert!(ctl.state().is_loading);
        ctl.element.as_mut().unwrap().events.push(MediaEvent::CanPlay);
        ctl.tick(t0);
        assert!(!ctl.state().is_loading);

        ctl.seek(30.0);
        ctl.tick(t0);
        assert!(ctl.state().is_seeking);
        ctl.element.as_mut().unwrap().land(30.0, 2, 2);
        ctl.tick(t0);
        assert!(!ctl.state().is_seeking);
        assert_eq!(ctl.state().current_time, 30.0);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let mut ctl = controller();
        ctl.element.as_mut().unwrap().events.push(MediaEvent::LoadedMetadata);
        ctl.tick(Instant::now());
        ctl.seek(500.0);
        ctl.seek(-3.0);
        assert_eq!(ctl.element().unwrap().seeks, vec![120.0, 0.0]);
    }

    #[test]
    fn fullscreen_rejection_is_logged_not_applied() {
        let mut ctl = controller();
        let mut host = FakeHost {
            reject: true,
            ..FakeHost::default()
        };
        ctl.toggle_fullscreen(&mut host);
        assert_eq!(host.requests, 1);
        assert!(!ctl.state().is_fullscreen);
    }

    #[test]
    fn fullscreen_state_comes_from_host_notification() {
        let mut ctl = controller();
        let mut host = FakeHost::default();
        ctl.toggle_fullscreen(&mut host);
        assert!(!ctl.state().is_fullscreen);
        ctl.on_fullscreen_changed(true);
        ctl.toggle_fullscreen(&mut host);
        assert_eq!(host.exits, 1);
        // Left fullscreen by other means
        ctl.on_fullscreen_changed(false);
        assert!(!ctl.state().is_fullscreen);
    }

    #[test]
    fn missing_element_is_silent_noop() {
        let mut ctl: PlaybackController<FakeElement, MemoryStore> =
            PlaybackController::new(None, Preferences::new(MemoryStore::new()));
        ctl.toggle_play();
        ctl.seek(10.0);
        ctl.toggle_captions();
        ctl.select_track(TrackId(0));
        assert!(ctl.tick(Instant::now()).is_empty());
        assert!(ctl.is_paused());
    }

    #[test]
    fn captions_restored_on_metadata() {
        let mut prefs = Preferences::new(MemoryStore::new());
        prefs.set_captions_enabled(true);
        prefs.set_caption_track("English");
        let mut element = FakeElement::new(60.0);
        element.tracks = vec![
            TextTrack::new(TrackId(0), "Español", None),
            TextTrack::new(TrackId(1), "English", None),
        ];
        element.events.push(MediaEvent::LoadedMetadata);
        let mut ctl = PlaybackController::new(Some(element), prefs);
        ctl.tick(Instant::now());

        let tracks = &ctl.element().unwrap().tracks;
        assert_eq!(tracks[0].mode, TrackMode::Disabled);
        assert_eq!(tracks[1].mode, TrackMode::Showing);
        assert_eq!(ctl.state().captions.selected, Some(TrackId(1)));

        ctl.disable_captions();
        assert!(!ctl.state().captions.enabled);
        assert!(!ctl.prefs().captions_enabled());
    }

    #[test]
    fn selected_label_restores_next_session() {
        let tracks = || {
            vec![
                TextTrack::new(TrackId(0), "Commentary", None),
                TextTrack::new(TrackId(1), "English", None),
            ]
        };
        let mut element = FakeElement::new(60.0);
        element.tracks = tracks();
        let mut first = PlaybackController::new(Some(element), Preferences::new(MemoryStore::new()));
        first.select_track_label("English");
        assert!(first.prefs().captions_enabled());
        assert_eq!(first.prefs().caption_track().as_deref(), Some("English"));

        let store = first.prefs().store().clone();
        let mut element = FakeElement::new(60.0);
        element.tracks = tracks();
        element.events.push(MediaEvent::LoadedMetadata);
        let mut second = PlaybackController::new(Some(element), Preferences::new(store));
        second.tick(Instant::now());
        let modes: Vec<TrackMode> = second.element().unwrap().tracks.iter().map(|t| t.mode).collect();
        assert_eq!(modes, vec![TrackMode::Disabled, TrackMode::Showing]);
    }

    #[test]
    fn chapter_marker_toggle_persists() {
        let mut ctl = controller();
        assert!(ctl.state().show_chapter_markers);
        ctl.toggle_chapter_markers();
        assert!(!ctl.state().show_chapter_markers);
        assert!(!ctl.prefs().show_chapter_markers());
    }

    #[test]
    fn teardown_stops_hide_timer() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.toggle_play();
        ctl.tick(t0);
        ctl.pointer_activity(t0);
        assert!(ctl.teardown().is_some());
        ctl.tick(ms(t0, 10_000));
        assert!(ctl.state().controls_visible);
    }
}
