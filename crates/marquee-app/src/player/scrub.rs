//! Hover-to-preview over the progress track.
//!
//! While paused, pointer movement is turned into a target time. A cached frame
//! for that second is shown immediately; otherwise a trailing debounced seek is
//! issued to the preview driver so a sweep across the track results in one
//! decode where the pointer comes to rest. Fast movement collapses the preview
//! box until the pointer has been quiet for the settle period, except near the
//! track ends where the box always stays fully shown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::player::element::MediaElement;
use crate::player::frame_cache::{EncodedFrame, FrameCache};
use crate::player::preview::PreviewDriver;
use crate::player::timer::Timer;

/// Tunables for scrubbing and preview capture.
#[derive(Debug, Clone)]
pub struct ScrubConfig {
    /// Trailing delay before a hover turns into a preview seek.
    pub debounce: Duration,
    /// Quiet time after which a moving pointer counts as settled.
    pub settle: Duration,
    /// Travel (px) that counts as movement.
    pub move_threshold: f32,
    /// Distance (px) from either track end where suppression is off.
    pub edge_margin: f32,
    pub box_width: u32,
    pub box_height: u32,
    pub jpeg_quality: u8,
    pub cache_capacity: usize,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            settle: Duration::from_millis(200),
            move_threshold: 5.0,
            edge_margin: 160.0,
            box_width: 240,
            box_height: 135,
            jpeg_quality: 60,
            cache_capacity: 900,
        }
    }
}

/// Horizontal extent of the progress track in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackGeometry {
    pub left: f32,
    pub width: f32,
}

impl TrackGeometry {
    pub fn new(left: f32, width: f32) -> Self {
        Self { left, width }
    }

    pub fn time_at(&self, x: f32, duration: f64) -> f64 {
        if self.width <= 0.0 {
            return 0.0;
        }
        ((x - self.left) as f64 * duration / self.width as f64).clamp(0.0, duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Settled,
    Moving,
}

/// What the progress bar should draw for the preview.
#[derive(Debug, Clone, Default)]
pub struct PreviewView {
    pub visible: bool,
    /// Full size and opacity. False while the pointer is moving.
    pub expanded: bool,
    /// Centre of the preview box relative to the track's left edge.
    pub left: f32,
    pub target_time: f64,
    pub image: Option<Arc<EncodedFrame>>,
}

pub struct ScrubController<E: MediaElement> {
    config: ScrubConfig,
    driver: PreviewDriver<E>,
    cache: FrameCache,
    debounce: Timer,
    settle: Timer,
    pending_target: Option<f64>,
    motion: MotionState,
    /// Position and time movement is measured from. Travel only counts as
    /// movement when it happens within one settle period of the anchor.
    anchor: Option<(f32, Instant)>,
    near_edge: bool,
    view: PreviewView,
}

impl<E: MediaElement> ScrubController<E> {
    pub fn new(config: ScrubConfig, preview_element: Option<E>) -> Self {
        let driver = PreviewDriver::new(
            preview_element,
            config.box_width,
            config.box_height,
            config.jpeg_quality,
        );
        let cache = FrameCache::new(config.cache_capacity);
        Self {
            config,
            driver,
            cache,
            debounce: Timer::new(),
            settle: Timer::new(),
            pending_target: None,
            motion: MotionState::Settled,
            anchor: None,
            near_edge: false,
            view: PreviewView::default(),
        }
    }

    /// Pointer moved over the track at window x-coordinate `x`.
    pub fn pointer_move(
        &mut self,
        now: Instant,
        x: f32,
        track: TrackGeometry,
        duration: Option<f64>,
        paused: bool,
    ) {
        let Some(duration) = duration.filter(|d| *d > 0.0) else {
            self.hide();
            return;
        };
        if !paused {
            self.hide();
            return;
        }

        self.track_motion(now, x);

        let local_x = x - track.left;
        let margin = self.config.edge_margin.min(track.width / 2.0);
        self.near_edge = local_x < margin || local_x > track.width - margin;

        let target = track.time_at(x, duration);
        self.view.visible = true;
        self.view.target_time = target;
        self.view.left = local_x.clamp(margin, (track.width - margin).max(margin));

        let key = FrameCache::key_for(target);
        if let Some(frame) = self.cache.get(key) {
            // Newer position supersedes anything still waiting to fire
            self.debounce.cancel();
            self.pending_target = None;
            self.view.image = Some(frame);
        } else {
            self.pending_target = Some(target);
            self.debounce.schedule(now, self.config.debounce);
        }
    }

    pub fn pointer_leave(&mut self) {
        self.hide();
    }

    /// Playback resumed: previews are for paused scrubbing only.
    pub fn on_play(&mut self) {
        self.hide();
    }

    /// Target time for a click at `x`, if the duration is known.
    pub fn click(&self, x: f32, track: TrackGeometry, duration: Option<f64>) -> Option<f64> {
        duration
            .filter(|d| *d > 0.0)
            .map(|d| track.time_at(x, d))
    }

    /// Fire due timers and collect frames the preview element has produced.
    pub fn tick(&mut self, now: Instant) {
        if self.debounce.fire(now)
            && let Some(target) = self.pending_target.take()
        {
            self.driver.seek_to(target);
        }
        if self.settle.fire(now) {
            self.motion = MotionState::Settled;
            self.anchor = None;
        }
        if let Some(frame) = self.driver.poll(&mut self.cache)
            && self.view.visible
        {
            self.view.image = Some(frame);
        }
    }

    pub fn view(&self) -> PreviewView {
        PreviewView {
            expanded: self.view.visible && (self.near_edge || self.motion == MotionState::Settled),
            ..self.view.clone()
        }
    }

    #[cfg(test)]
    pub fn motion(&self) -> MotionState {
        self.motion
    }

    #[cfg(test)]
    pub fn seek_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    #[cfg(test)]
    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    #[cfg(test)]
    pub fn cache_mut(&mut self) -> &mut FrameCache {
        &mut self.cache
    }

    #[cfg(test)]
    pub fn driver(&self) -> &PreviewDriver<E> {
        &self.driver
    }

    pub fn config(&self) -> &ScrubConfig {
        &self.config
    }

    /// Cancel timers, drop the cache and release the preview element.
    pub fn teardown(&mut self) {
        self.hide();
        self.cache.clear();
        if self.driver.detach().is_some() {
            log::debug!("Preview element released");
        }
    }

    fn track_motion(&mut self, now: Instant, x: f32) {
        match self.anchor {
            Some((anchor_x, anchor_at)) if now.duration_since(anchor_at) <= self.config.settle => {
                if (x - anchor_x).abs() > self.config.move_threshold {
                    self.motion = MotionState::Moving;
                    self.anchor = Some((x, now));
                    self.settle.schedule(now, self.config.settle);
                }
            }
            // Slow drift: start a fresh window without counting it as movement
            _ => self.anchor = Some((x, now)),
        }
    }

    fn hide(&mut self) {
        self.debounce.cancel();
        self.settle.cancel();
        self.pending_target = None;
        self.motion = MotionState::Settled;
        self.anchor = None;
        self.near_edge = false;
        self.view.visible = false;
        self.view.image = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::element::fake::FakeElement;

    const TRACK: TrackGeometry = TrackGeometry {
        left: 0.0,
        width: 1000.0,
    };

    fn controller() -> ScrubController<FakeElement> {
        ScrubController::new(ScrubConfig::default(), Some(FakeElement::new(100.0)))
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    fn seeks(ctl: &ScrubController<FakeElement>) -> Vec<f64> {
        ctl.driver().element().map(|e| e.seeks.clone()).unwrap_or_default()
    }

    #[test]
    fn rapid_hover_issues_one_seek_to_last_position() {
        let mut ctl = controller();
        let t0 = Instant::now();
        // 100 s over 1000 px: x=100 -> 10 s, x=120 -> 12 s, x=150 -> 15 s
        ctl.pointer_move(t0, 100.0, TRACK, Some(100.0), true);
        ctl.tick(ms(t0, 40));
        ctl.pointer_move(ms(t0, 50), 120.0, TRACK, Some(100.0), true);
        ctl.tick(ms(t0, 90));
        ctl.pointer_move(ms(t0, 100), 150.0, TRACK, Some(100.0), true);

        ctl.tick(ms(t0, 249));
        assert!(seeks(&ctl).is_empty());
        ctl.tick(ms(t0, 250));
        assert_eq!(seeks(&ctl), vec![15.0]);
        ctl.tick(ms(t0, 1000));
        assert_eq!(seeks(&ctl).len(), 1);
    }

    #[test]
    fn cached_second_short_circuits_seek() {
        let mut ctl = controller();
        let frame = Arc::new(EncodedFrame {
            second: 7,
            width: 4,
            height: 4,
            jpeg: vec![1, 2, 3],
        });
        ctl.cache_mut().put(7, frame.clone());

        let t0 = Instant::now();
        ctl.pointer_move(t0, 78.0, TRACK, Some(100.0), true);
        let view = ctl.view();
        assert!((view.target_time - 7.8).abs() < 1e-9);
        assert!(Arc::ptr_eq(view.image.as_ref().unwrap(), &frame));
        assert!(!ctl.seek_pending());

        ctl.tick(ms(t0, 500));
        assert!(seeks(&ctl).is_empty());
    }

    #[test]
    fn cache_hit_cancels_earlier_pending_seek() {
        let mut ctl = controller();
        ctl.cache_mut().put(
            7,
            Arc::new(EncodedFrame {
                second: 7,
                width: 1,
                height: 1,
                jpeg: Vec::new(),
            }),
        );
        let t0 = Instant::now();
        ctl.pointer_move(t0, 300.0, TRACK, Some(100.0), true);
        assert!(ctl.seek_pending());
        ctl.pointer_move(ms(t0, 50), 78.0, TRACK, Some(100.0), true);
        ctl.tick(ms(t0, 400));
        assert!(seeks(&ctl).is_empty());
    }

    #[test]
    fn fast_movement_collapses_then_settles() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.pointer_move(t0, 500.0, TRACK, Some(100.0), true);
        assert_eq!(ctl.motion(), MotionState::Settled);
        assert!(ctl.view().expanded);

        ctl.pointer_move(ms(t0, 50), 520.0, TRACK, Some(100.0), true);
        assert_eq!(ctl.motion(), MotionState::Moving);
        assert!(!ctl.view().expanded);
        assert!(ctl.view().visible);

        ctl.tick(ms(t0, 249));
        assert_eq!(ctl.motion(), MotionState::Moving);
        // No frame has arrived; settling does not depend on one
        ctl.tick(ms(t0, 250));
        assert_eq!(ctl.motion(), MotionState::Settled);
        assert!(ctl.view().expanded);
    }

    #[test]
    fn small_jitter_is_not_movement() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.pointer_move(t0, 500.0, TRACK, Some(100.0), true);
        ctl.pointer_move(ms(t0, 10), 502.0, TRACK, Some(100.0), true);
        ctl.pointer_move(ms(t0, 20), 504.0, TRACK, Some(100.0), true);
        assert_eq!(ctl.motion(), MotionState::Settled);
        ctl.pointer_move(ms(t0, 30), 506.0, TRACK, Some(100.0), true);
        assert_eq!(ctl.motion(), MotionState::Moving);
    }

    #[test]
    fn slow_drift_stays_settled() {
        let mut ctl = controller();
        let t0 = Instant::now();
        for (i, x) in [500.0, 502.0, 504.0, 506.0, 508.0].into_iter().enumerate() {
            ctl.pointer_move(ms(t0, 300 * i as u64), x, TRACK, Some(100.0), true);
            assert_eq!(ctl.motion(), MotionState::Settled);
        }
        assert!(ctl.view().expanded);

        // The same 6 px inside one window is still movement
        ctl.pointer_move(ms(t0, 1250), 514.0, TRACK, Some(100.0), true);
        assert_eq!(ctl.motion(), MotionState::Moving);
    }

    #[test]
    fn near_edge_stays_expanded_and_clamped() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.pointer_move(t0, 300.0, TRACK, Some(100.0), true);
        ctl.pointer_move(ms(t0, 20), 50.0, TRACK, Some(100.0), true);
        assert_eq!(ctl.motion(), MotionState::Moving);

        let view = ctl.view();
        assert!(view.visible);
        assert!(view.expanded);
        assert_eq!(view.left, 160.0);

        ctl.pointer_move(ms(t0, 30), 990.0, TRACK, Some(100.0), true);
        let view = ctl.view();
        assert!(view.expanded);
        assert_eq!(view.left, 840.0);
    }

    #[test]
    fn narrow_track_centres_preview() {
        let mut ctl = controller();
        let narrow = TrackGeometry::new(10.0, 200.0);
        ctl.pointer_move(Instant::now(), 20.0, narrow, Some(100.0), true);
        assert_eq!(ctl.view().left, 100.0);
    }

    #[test]
    fn playing_or_leaving_hides_and_cancels() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.pointer_move(t0, 400.0, TRACK, Some(100.0), true);
        assert!(ctl.seek_pending());
        ctl.pointer_move(ms(t0, 10), 410.0, TRACK, Some(100.0), false);
        assert!(!ctl.view().visible);
        assert!(!ctl.seek_pending());

        ctl.pointer_move(ms(t0, 20), 400.0, TRACK, Some(100.0), true);
        ctl.pointer_leave();
        assert!(!ctl.view().visible);
        ctl.tick(ms(t0, 1000));
        assert!(seeks(&ctl).is_empty());
    }

    #[test]
    fn landed_frame_shows_and_is_cached() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.pointer_move(t0, 420.0, TRACK, Some(100.0), true);
        ctl.tick(ms(t0, 150));
        assert_eq!(seeks(&ctl), vec![42.0]);

        if let Some(element) = ctl.driver.element_mut() {
            element.land(41.7, 32, 18);
        }
        ctl.tick(ms(t0, 200));
        assert!(ctl.cache().contains(41));
        assert_eq!(ctl.view().image.unwrap().second, 41);
    }

    #[test]
    fn click_maps_to_time() {
        let ctl = controller();
        assert_eq!(ctl.click(250.0, TRACK, Some(100.0)), Some(25.0));
        assert_eq!(ctl.click(-40.0, TRACK, Some(100.0)), Some(0.0));
        assert_eq!(ctl.click(2000.0, TRACK, Some(100.0)), Some(100.0));
        assert_eq!(ctl.click(250.0, TRACK, None), None);
    }

    #[test]
    fn unknown_duration_shows_nothing() {
        let mut ctl = controller();
        ctl.pointer_move(Instant::now(), 250.0, TRACK, None, true);
        assert!(!ctl.view().visible);
        assert!(!ctl.seek_pending());
    }

    #[test]
    fn teardown_releases_everything() {
        let mut ctl = controller();
        let t0 = Instant::now();
        ctl.cache_mut().put(
            1,
            Arc::new(EncodedFrame {
                second: 1,
                width: 1,
                height: 1,
                jpeg: Vec::new(),
            }),
        );
        ctl.pointer_move(t0, 400.0, TRACK, Some(100.0), true);
        ctl.teardown();
        assert!(ctl.cache().is_empty());
        assert!(!ctl.driver().is_attached());
        assert!(!ctl.seek_pending());
        ctl.tick(ms(t0, 1000));
    }
}
