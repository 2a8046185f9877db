use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use winit::keyboard::KeyCode;
use winit::window::{Fullscreen, Window};

use crate::api::client::redact;
use crate::api::{ApiClient, ItemDetails, StreamUrls};
use crate::gpu::GpuContext;
use crate::media::{FfmpegElement, FfmpegPreviewElement, TrackSource};
use crate::player::playback::{FullscreenError, FullscreenHost, PlaybackState};
use crate::player::prefs::{AnyStore, Preferences};
use crate::player::scrub::ScrubConfig;
use crate::player::{Player, PlayerElements};
use crate::ui::{EguiOverlay, PlayerAction, PlayerView};

const SKIP_SECS: f64 = 10.0;
const VOLUME_STEP: f64 = 0.05;

pub type MediaPlayer = Player<FfmpegElement, FfmpegPreviewElement, AnyStore>;

/// Borderless fullscreen on whichever monitor the window is on.
struct WindowHost<'a> {
    window: &'a Window,
}

impl FullscreenHost for WindowHost<'_> {
    fn request_fullscreen(&mut self) -> Result<(), FullscreenError> {
        if self.window.current_monitor().is_none() {
            return Err(FullscreenError::NoMonitor);
        }
        self.window
            .set_fullscreen(Some(Fullscreen::Borderless(None)));
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
        self.window.set_fullscreen(None);
        Ok(())
    }
}

pub struct App {
    pub gpu: GpuContext,
    pub egui_overlay: EguiOverlay,
    pub window: Arc<Window>,
    pub player: MediaPlayer,
    view: PlayerView,
    closed: Rc<Cell<bool>>,
}

impl App {
    pub fn new(window: Arc<Window>, client: &ApiClient, item: ItemDetails) -> Result<Self> {
        let gpu = GpuContext::new(window.clone())?;
        let egui_overlay = EguiOverlay::new(&gpu.device, gpu.format, &window);
        window.set_title(&format!("{} - Marquee", item.name));

        let urls = StreamUrls::new(client.session(), &item.id)?;
        let mut view = PlayerView::new();
        load_poster(client, &urls, &item, &egui_overlay.context(), &mut view);

        let elements = build_elements(client, &urls, &item);
        let closed = Rc::new(Cell::new(false));
        let on_close = {
            let closed = closed.clone();
            move || closed.set(true)
        };
        let player = Player::new(
            item,
            elements,
            Preferences::new(AnyStore::open_default()),
            ScrubConfig::default(),
            on_close,
        );

        Ok(Self {
            gpu,
            egui_overlay,
            window,
            player,
            view,
            closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.egui_overlay
            .resize(width, height, self.window.scale_factor() as f32);
        // Fullscreen changes, including ones made by the window manager,
        // arrive as resizes
        let fullscreen = self.window.fullscreen().is_some();
        self.player
            .playback_mut()
            .on_fullscreen_changed(fullscreen);
    }

    pub fn update(&mut self) {
        self.player.tick(Instant::now());
    }

    /// Build this frame's UI and apply whatever the user did in it.
    pub fn draw_ui(&mut self) {
        let mut actions = Vec::new();
        let (view, player) = (&mut self.view, &self.player);
        self.egui_overlay
            .run(&self.window, |ctx| actions = view.show(ctx, player));

        let now = Instant::now();
        for action in actions {
            self.apply(action, now);
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        if let Some(action) = key_action(key, self.player.playback().state()) {
            let now = Instant::now();
            self.player.pointer_activity(now);
            self.apply(action, now);
        }
    }

    pub fn apply(&mut self, action: PlayerAction, now: Instant) {
        if self.player.is_closed() {
            return;
        }
        let playback = self.player.playback_mut();
        match action {
            PlayerAction::TogglePlay => playback.toggle_play(),
            PlayerAction::Skip(delta) => playback.skip(delta),
            PlayerAction::SetVolume(v) => playback.set_volume(v),
            PlayerAction::AdjustVolume(delta) => playback.adjust_volume(delta),
            PlayerAction::ToggleMute => playback.toggle_mute(),
            PlayerAction::ToggleFullscreen => {
                let mut host = WindowHost {
                    window: &self.window,
                };
                playback.toggle_fullscreen(&mut host);
            }
            PlayerAction::ToggleCaptions => playback.toggle_captions(),
            PlayerAction::SelectTrack(id) => playback.select_track(id),
            PlayerAction::CaptionsOff => playback.disable_captions(),
            PlayerAction::ToggleChapterMarkers => playback.toggle_chapter_markers(),
            PlayerAction::Close => self.player.close(),
            PlayerAction::TrackHover { x, track } => self.player.track_hover(now, x, track),
            PlayerAction::TrackLeave => self.player.track_leave(),
            PlayerAction::TrackClick { x, track } => self.player.track_click(x, track),
            PlayerAction::PointerActivity => self.player.pointer_activity(now),
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.gpu.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("marquee-encoder"),
                });

        self.gpu.clear(&mut encoder, &surface_view);
        self.egui_overlay
            .render(&self.gpu.device, &self.gpu.queue, &mut encoder, &surface_view);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Keyboard shortcuts. Escape leaves fullscreen first and closes otherwise.
pub fn key_action(key: KeyCode, state: &PlaybackState) -> Option<PlayerAction> {
    let action = match key {
        KeyCode::Space => PlayerAction::TogglePlay,
        KeyCode::KeyF => PlayerAction::ToggleFullscreen,
        KeyCode::KeyM => PlayerAction::ToggleMute,
        KeyCode::KeyC => PlayerAction::ToggleCaptions,
        KeyCode::ArrowLeft => PlayerAction::Skip(-SKIP_SECS),
        KeyCode::ArrowRight => PlayerAction::Skip(SKIP_SECS),
        KeyCode::ArrowUp => PlayerAction::AdjustVolume(VOLUME_STEP),
        KeyCode::ArrowDown => PlayerAction::AdjustVolume(-VOLUME_STEP),
        KeyCode::Escape if state.is_fullscreen => PlayerAction::ToggleFullscreen,
        KeyCode::Escape => PlayerAction::Close,
        _ => return None,
    };
    Some(action)
}

/// Both elements for `item`. A backend that fails to start is left out and
/// the player runs without it.
fn build_elements(
    client: &ApiClient,
    urls: &StreamUrls,
    item: &ItemDetails,
) -> PlayerElements<FfmpegElement, FfmpegPreviewElement> {
    let tracks: Vec<TrackSource> = item
        .subtitle_streams()
        .map(|stream| TrackSource {
            label: stream.track_label(),
            language: stream.language.clone(),
            url: urls.subtitle(stream.index),
        })
        .collect();

    let primary_url = urls.primary();
    let primary = match FfmpegElement::new(&primary_url, tracks, Some(client.clone())) {
        Ok(element) => {
            log::info!("Streaming {}", redact(&primary_url));
            Some(element)
        }
        Err(e) => {
            log::error!("Primary element unavailable: {e}");
            None
        }
    };

    let preview = match FfmpegPreviewElement::new(&urls.preview(), item.runtime_secs()) {
        Ok(element) => Some(element),
        Err(e) => {
            log::error!("Preview element unavailable: {e}");
            None
        }
    };

    PlayerElements { primary, preview }
}

fn load_poster(
    client: &ApiClient,
    urls: &StreamUrls,
    item: &ItemDetails,
    ctx: &egui::Context,
    view: &mut PlayerView,
) {
    let Some(tag) = item.primary_image_tag() else {
        return;
    };
    let url = urls.poster(tag);
    let decoded = client
        .fetch_bytes(&url)
        .map_err(|e| e.to_string())
        .and_then(|bytes| image::load_from_memory(&bytes).map_err(|e| e.to_string()));
    match decoded {
        Ok(poster) => view.set_poster(ctx, &poster.into_rgba8()),
        Err(e) => log::warn!("No poster for '{}': {e}", item.name),
    }
}
