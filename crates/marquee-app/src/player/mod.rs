//! Playback and scrub-preview engine.
//!
//! [`Player`] wires the controllers together for one item. Everything here is
//! driven from the UI thread: input handlers call into the player, and
//! `tick` runs once per frame with the current time.

pub mod captions;
pub mod chapters;
pub mod element;
pub mod frame_cache;
pub mod playback;
pub mod prefs;
pub mod preview;
pub mod scrub;
pub mod timer;

use std::time::Instant;

use crate::api::types::ItemDetails;
use crate::media::types::DecodedFrame;

use self::chapters::ChapterMarker;
use self::element::{MediaElement, MediaEvent, PlaybackElement};
use self::playback::PlaybackController;
use self::prefs::{PreferenceStore, Preferences};
use self::scrub::{ScrubConfig, ScrubController, TrackGeometry};

/// The two media elements a player drives. Either may be missing, in which
/// case the operations that need it do nothing.
pub struct PlayerElements<P, V> {
    pub primary: Option<P>,
    pub preview: Option<V>,
}

pub struct Player<P, V, S>
where
    P: PlaybackElement,
    V: MediaElement,
    S: PreferenceStore,
{
    item: ItemDetails,
    markers: Vec<ChapterMarker>,
    playback: PlaybackController<P, S>,
    scrub: ScrubController<V>,
    on_close: Option<Box<dyn FnOnce()>>,
    torn_down: bool,
}

impl<P, V, S> Player<P, V, S>
where
    P: PlaybackElement,
    V: MediaElement,
    S: PreferenceStore,
{
    pub fn new(
        item: ItemDetails,
        elements: PlayerElements<P, V>,
        prefs: Preferences<S>,
        config: ScrubConfig,
        on_close: impl FnOnce() + 'static,
    ) -> Self {
        let markers = chapters::marker_positions(&item.chapters, item.run_time_ticks);
        log::info!(
            "Player opened for '{}' ({} chapters, {} subtitle streams)",
            item.name,
            markers.len(),
            item.subtitle_streams().count()
        );
        Self {
            item,
            markers,
            playback: PlaybackController::new(elements.primary, prefs),
            scrub: ScrubController::new(config, elements.preview),
            on_close: Some(Box::new(on_close)),
            torn_down: false,
        }
    }

    pub fn item(&self) -> &ItemDetails {
        &self.item
    }

    pub fn markers(&self) -> &[ChapterMarker] {
        &self.markers
    }

    pub fn playback(&self) -> &PlaybackController<P, S> {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController<P, S> {
        &mut self.playback
    }

    pub fn scrub(&self) -> &ScrubController<V> {
        &self.scrub
    }

    /// Duration from the element, else the runtime the server reported.
    pub fn duration(&self) -> Option<f64> {
        self.playback
            .state()
            .duration
            .or_else(|| self.item.runtime_secs())
    }

    pub fn current_frame(&self) -> Option<&DecodedFrame> {
        self.playback.element()?.current_frame()
    }

    pub fn active_caption(&self) -> Option<&str> {
        let element = self.playback.element()?;
        captions::active_cue_text(element.text_tracks(), self.playback.state().current_time)
    }

    pub fn chapter_at(&self, secs: f64) -> Option<&ChapterMarker> {
        chapters::chapter_at(&self.markers, secs)
    }

    /// Advance timers and drain both elements.
    pub fn tick(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        for event in self.playback.tick(now) {
            if event == MediaEvent::Play {
                self.scrub.on_play();
            }
        }
        self.scrub.tick(now);
    }

    pub fn pointer_activity(&mut self, now: Instant) {
        self.playback.pointer_activity(now);
    }

    pub fn track_hover(&mut self, now: Instant, x: f32, track: TrackGeometry) {
        let duration = self.duration();
        let paused = self.playback.is_paused();
        self.scrub.pointer_move(now, x, track, duration, paused);
    }

    pub fn track_leave(&mut self) {
        self.scrub.pointer_leave();
    }

    /// Click on the track: seek the primary element straight there.
    pub fn track_click(&mut self, x: f32, track: TrackGeometry) {
        if let Some(target) = self.scrub.click(x, track, self.duration()) {
            self.playback.seek(target);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.torn_down
    }

    /// Tear down and notify the owner. Later calls do nothing.
    pub fn close(&mut self) {
        self.teardown();
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scrub.teardown();
        if self.playback.teardown().is_some() {
            log::info!("Player closed for '{}'", self.item.name);
        }
    }
}

impl<P, V, S> Drop for Player<P, V, S>
where
    P: PlaybackElement,
    V: MediaElement,
    S: PreferenceStore,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::api::types::Chapter;
    use crate::player::element::fake::FakeElement;
    use crate::player::prefs::MemoryStore;

    const TRACK: TrackGeometry = TrackGeometry {
        left: 100.0,
        width: 1000.0,
    };

    fn item() -> ItemDetails {
        ItemDetails {
            id: "abc".into(),
            name: "Test".into(),
            run_time_ticks: Some(100 * 10_000_000),
            chapters: vec![
                Chapter {
                    start_position_ticks: 0,
                    name: "One".into(),
                },
                Chapter {
                    start_position_ticks: 50 * 10_000_000,
                    name: "Two".into(),
                },
            ],
            ..ItemDetails::default()
        }
    }

    fn player(closes: Rc<Cell<u32>>) -> Player<FakeElement, FakeElement, MemoryStore> {
        Player::new(
            item(),
            PlayerElements {
                primary: Some(FakeElement::new(100.0)),
                preview: Some(FakeElement::new(100.0)),
            },
            Preferences::new(MemoryStore::new()),
            ScrubConfig::default(),
            move || closes.set(closes.get() + 1),
        )
    }

    #[test]
    fn close_callback_fires_once() {
        let closes = Rc::new(Cell::new(0));
        let mut p = player(closes.clone());
        p.close();
        p.close();
        assert_eq!(closes.get(), 1);
        assert!(p.is_closed());
        drop(p);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn click_seeks_primary_not_preview() {
        let mut p = player(Rc::new(Cell::new(0)));
        p.track_click(350.0, TRACK);
        assert_eq!(p.playback().element().unwrap().seeks, vec![25.0]);
        assert!(p.scrub().driver().element().unwrap().seeks.is_empty());
    }

    #[test]
    fn play_hides_preview() {
        let mut p = player(Rc::new(Cell::new(0)));
        let t0 = Instant::now();
        p.track_hover(t0, 600.0, TRACK);
        assert!(p.scrub().view().visible);
        p.playback_mut().toggle_play();
        p.tick(t0 + Duration::from_millis(10));
        assert!(!p.scrub().view().visible);
        assert!(!p.scrub().seek_pending());
    }

    #[test]
    fn hover_uses_server_runtime_before_metadata() {
        let mut p = player(Rc::new(Cell::new(0)));
        let t0 = Instant::now();
        p.track_hover(t0, 700.0, TRACK);
        p.tick(t0 + Duration::from_millis(150));
        assert_eq!(p.scrub().driver().element().unwrap().seeks, vec![60.0]);
        assert_eq!(p.chapter_at(60.0).unwrap().name, "Two");
    }

    #[test]
    fn markers_from_item_chapters() {
        let p = player(Rc::new(Cell::new(0)));
        let percents: Vec<f64> = p.markers().iter().map(|m| m.percent).collect();
        assert_eq!(percents, vec![0.0, 50.0]);
    }

    #[test]
    fn tick_after_close_is_inert() {
        let mut p = player(Rc::new(Cell::new(0)));
        p.close();
        p.tick(Instant::now());
        assert!(p.playback().element().is_none());
        assert!(!p.scrub().driver().is_attached());
    }
}
