//! The full-window player: letterboxed video, captions, loading state and
//! the controls bar.
//!
//! The view only reads the [`Player`]; everything the user does comes back
//! as [`PlayerAction`]s for the app to apply.

use egui::{
    Align, Align2, Color32, ColorImage, Context, CornerRadius, FontId, Layout, Pos2, Rect, Sense,
    Stroke, TextureHandle, TextureOptions, Ui, Vec2,
};
use std::sync::Arc;

use image::RgbaImage;

use super::progress_bar::ProgressBar;
use super::theme;
use crate::media::types::DecodedFrame;
use crate::player::Player;
use crate::player::captions::TrackId;
use crate::player::chapters;
use crate::player::element::{MediaElement, PlaybackElement};
use crate::player::frame_cache::EncodedFrame;
use crate::player::prefs::PreferenceStore;
use crate::player::preview::{decode_preview, letterbox};
use crate::player::scrub::TrackGeometry;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    TogglePlay,
    /// Relative seek in seconds.
    Skip(f64),
    SetVolume(f64),
    AdjustVolume(f64),
    ToggleMute,
    ToggleFullscreen,
    ToggleCaptions,
    SelectTrack(TrackId),
    CaptionsOff,
    ToggleChapterMarkers,
    Close,
    TrackHover { x: f32, track: TrackGeometry },
    TrackLeave,
    TrackClick { x: f32, track: TrackGeometry },
    PointerActivity,
}

#[derive(Default)]
pub struct PlayerView {
    video: Option<TextureHandle>,
    video_pts: Option<f64>,
    /// Preview texture and the cache entry it was decoded from. A later
    /// capture of the same second replaces the entry, so identity is the key.
    preview: Option<(Arc<EncodedFrame>, TextureHandle)>,
    poster: Option<TextureHandle>,
    last_hover: Option<f32>,
}

impl PlayerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_poster(&mut self, ctx: &Context, image: &RgbaImage) {
        let size = [image.width() as usize, image.height() as usize];
        let color = ColorImage::from_rgba_unmultiplied(size, image.as_raw());
        self.poster = Some(ctx.load_texture("poster", color, TextureOptions::LINEAR));
    }

    pub fn show<P, V, S>(&mut self, ctx: &Context, player: &Player<P, V, S>) -> Vec<PlayerAction>
    where
        P: PlaybackElement,
        V: MediaElement,
        S: PreferenceStore,
    {
        let mut actions = Vec::new();

        if ctx.input(|i| i.pointer.delta() != Vec2::ZERO || i.pointer.any_pressed()) {
            actions.push(PlayerAction::PointerActivity);
        }

        if let Some(frame) = player.current_frame() {
            self.sync_video(ctx, frame);
        }
        let preview_view = player.scrub().view();
        if let Some(image) = &preview_view.image {
            self.sync_preview(ctx, image);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let full = ui.max_rect();
                let state = player.playback().state();

                match (&self.video, &self.poster) {
                    (Some(texture), _) => paint_letterboxed(ui, full, texture),
                    (None, Some(poster)) => paint_letterboxed(ui, full, poster),
                    (None, None) => {}
                }

                if state.is_loading || state.is_seeking {
                    let spinner = Rect::from_center_size(full.center(), Vec2::splat(48.0));
                    ui.put(spinner, egui::Spinner::new().size(48.0).color(theme::TEXT));
                }

                let bar_top = if state.controls_visible {
                    full.max.y - theme::CONTROLS_HEIGHT
                } else {
                    full.max.y - theme::SPACING
                };
                if let Some(text) = player.active_caption() {
                    paint_caption(ui, full, bar_top, text);
                }

                if state.controls_visible {
                    self.title_bar(ui, full, &player.item().name, &mut actions);
                    let bar = Rect::from_min_max(Pos2::new(full.min.x, bar_top), full.max);
                    self.controls_bar(ui, bar, player, &mut actions);
                } else if self.last_hover.take().is_some() {
                    actions.push(PlayerAction::TrackLeave);
                }
            });

        actions
    }

    fn sync_video(&mut self, ctx: &Context, frame: &DecodedFrame) {
        if self.video_pts == Some(frame.pts) || !frame.is_well_formed() {
            return;
        }
        let size = [frame.width as usize, frame.height as usize];
        let image = ColorImage::from_rgba_unmultiplied(size, &frame.data);
        match &mut self.video {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => self.video = Some(ctx.load_texture("video", image, TextureOptions::LINEAR)),
        }
        self.video_pts = Some(frame.pts);
    }

    fn sync_preview(&mut self, ctx: &Context, frame: &Arc<EncodedFrame>) {
        if matches!(&self.preview, Some((shown, _)) if Arc::ptr_eq(shown, frame)) {
            return;
        }
        match decode_preview(frame) {
            Ok(rgba) => {
                let size = [rgba.width() as usize, rgba.height() as usize];
                let image = ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                match &mut self.preview {
                    Some((shown, texture)) => {
                        texture.set(image, TextureOptions::LINEAR);
                        *shown = frame.clone();
                    }
                    None => {
                        let texture = ctx.load_texture("scrub-preview", image, TextureOptions::LINEAR);
                        self.preview = Some((frame.clone(), texture));
                    }
                }
            }
            Err(e) => log::warn!("Dropping preview for {}s: {e}", frame.second),
        }
    }

    fn title_bar(&self, ui: &mut Ui, full: Rect, title: &str, actions: &mut Vec<PlayerAction>) {
        let bar = Rect::from_min_size(
            full.min,
            Vec2::new(full.width(), theme::BUTTON_SIZE + 2.0 * theme::SPACING),
        );
        ui.painter()
            .rect_filled(bar, CornerRadius::ZERO, theme::OVERLAY_BG);
        let close = Rect::from_center_size(
            Pos2::new(bar.min.x + theme::SPACING + theme::BUTTON_SIZE / 2.0, bar.center().y),
            Vec2::splat(theme::BUTTON_SIZE),
        );
        if icon_button(ui, close, "✕").on_hover_text("Close (Esc)").clicked() {
            actions.push(PlayerAction::Close);
        }
        ui.painter().text(
            Pos2::new(close.max.x + theme::SPACING, bar.center().y),
            Align2::LEFT_CENTER,
            title,
            FontId::proportional(theme::BODY_SIZE + 2.0),
            theme::TEXT,
        );
    }

    fn controls_bar<P, V, S>(
        &mut self,
        ui: &mut Ui,
        bar: Rect,
        player: &Player<P, V, S>,
        actions: &mut Vec<PlayerAction>,
    ) where
        P: PlaybackElement,
        V: MediaElement,
        S: PreferenceStore,
    {
        let state = player.playback().state();
        ui.painter()
            .rect_filled(bar, CornerRadius::ZERO, theme::OVERLAY_BG);

        let track = Rect::from_min_size(
            Pos2::new(bar.min.x + theme::SPACING * 2.0, bar.min.y + theme::SPACING),
            Vec2::new(bar.width() - theme::SPACING * 4.0, theme::TRACK_HEIGHT),
        );
        let preview_view = player.scrub().view();
        let config = player.scrub().config();
        let preview_chapter = preview_view
            .visible
            .then(|| player.chapter_at(preview_view.target_time))
            .flatten()
            .map(|m| m.name.as_str());
        let progress = ProgressBar {
            current_time: state.current_time,
            duration: player.duration(),
            markers: player.markers(),
            show_markers: state.show_chapter_markers,
            preview: &preview_view,
            preview_texture: self.preview.as_ref().map(|(_, t)| t),
            preview_chapter,
            box_size: Vec2::new(config.box_width as f32, config.box_height as f32),
        };
        progress.show(ui, track, &mut self.last_hover, actions);

        let row = Rect::from_min_max(
            Pos2::new(track.min.x, track.max.y + theme::SPACING),
            Pos2::new(track.max.x, bar.max.y - theme::SPACING / 2.0),
        );
        let mut row_ui = ui.new_child(
            egui::UiBuilder::new()
                .max_rect(row)
                .layout(Layout::left_to_right(Align::Center)),
        );
        let ui = &mut row_ui;

        let (play_rect, play) = ui.allocate_exact_size(Vec2::splat(theme::BUTTON_SIZE), Sense::click());
        paint_play_icon(ui, play_rect, state.is_playing, play.hovered());
        if play.clicked() {
            actions.push(PlayerAction::TogglePlay);
        }

        ui.label(time_label(state.current_time, player.duration()));

        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            let fs_icon = if state.is_fullscreen { "🗗" } else { "⛶" };
            if ui.button(fs_icon).on_hover_text("Fullscreen (F)").clicked() {
                actions.push(PlayerAction::ToggleFullscreen);
            }

            let mut volume = state.volume;
            let slider = egui::Slider::new(&mut volume, 0.0..=1.0).show_value(false);
            if ui.add_sized(Vec2::new(90.0, theme::BUTTON_SIZE), slider).changed() {
                actions.push(PlayerAction::SetVolume(volume));
            }
            let mute_icon = if state.volume == 0.0 { "🔇" } else { "🔊" };
            if ui.button(mute_icon).on_hover_text("Mute (M)").clicked() {
                actions.push(PlayerAction::ToggleMute);
            }

            let captions = &state.captions;
            if !captions.available.is_empty() {
                ui.menu_button("CC", |ui| {
                    let mut enabled = captions.enabled;
                    if ui.checkbox(&mut enabled, "Captions (C)").changed() {
                        actions.push(PlayerAction::ToggleCaptions);
                    }
                    ui.separator();
                    if ui.selectable_label(captions.selected.is_none(), "Off").clicked() {
                        actions.push(PlayerAction::CaptionsOff);
                    }
                    for info in &captions.available {
                        let label = match &info.language {
                            Some(lang) if !info.label.contains(lang.as_str()) => {
                                format!("{} ({lang})", info.label)
                            }
                            _ => info.label.clone(),
                        };
                        if ui
                            .selectable_label(captions.selected == Some(info.id), label)
                            .clicked()
                        {
                            actions.push(PlayerAction::SelectTrack(info.id));
                        }
                    }
                });
            }

            if !player.markers().is_empty() {
                let chapters = ui.selectable_label(state.show_chapter_markers, "Chapters");
                if chapters.clicked() {
                    actions.push(PlayerAction::ToggleChapterMarkers);
                }
            }
        });
    }
}

fn time_label(current: f64, duration: Option<f64>) -> String {
    let total = duration.map_or_else(|| "--:--".to_string(), chapters::format_time);
    format!("{} / {}", chapters::format_time(current), total)
}

fn paint_letterboxed(ui: &Ui, area: Rect, texture: &TextureHandle) {
    let [w, h] = texture.size();
    let fit = letterbox(
        w as u32,
        h as u32,
        area.width().max(1.0) as u32,
        area.height().max(1.0) as u32,
    );
    let rect = Rect::from_min_size(
        area.min + Vec2::new(fit.x as f32, fit.y as f32),
        Vec2::new(fit.width as f32, fit.height as f32),
    );
    ui.painter().image(
        texture.id(),
        rect,
        Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
        Color32::WHITE,
    );
}

fn paint_caption(ui: &Ui, full: Rect, bar_top: f32, text: &str) {
    let painter = ui.painter();
    let galley = painter.layout(
        text.to_owned(),
        FontId::proportional(theme::CAPTION_SIZE),
        Color32::WHITE,
        full.width() * 0.8,
    );
    let size = galley.size();
    let pos = Pos2::new(
        full.center().x - size.x / 2.0,
        bar_top - theme::SPACING * 3.0 - size.y,
    );
    painter.rect_filled(
        Rect::from_min_size(pos, size).expand2(Vec2::new(10.0, 4.0)),
        CornerRadius::same(4),
        theme::CAPTION_BG,
    );
    painter.galley(pos, galley, Color32::WHITE);
}

fn icon_button(ui: &mut Ui, rect: Rect, icon: &str) -> egui::Response {
    let response = ui.allocate_rect(rect, Sense::click());
    if response.hovered() {
        ui.painter().rect_filled(
            rect,
            CornerRadius::same(4),
            Color32::from_rgba_unmultiplied(255, 255, 255, 30),
        );
    }
    ui.painter().text(
        rect.center(),
        Align2::CENTER_CENTER,
        icon,
        FontId::proportional(theme::BODY_SIZE + 2.0),
        theme::TEXT,
    );
    response
}

fn paint_play_icon(ui: &Ui, rect: Rect, playing: bool, hovered: bool) {
    let painter = ui.painter();
    if hovered {
        painter.rect_filled(
            rect,
            CornerRadius::same(4),
            Color32::from_rgba_unmultiplied(255, 255, 255, 30),
        );
    }
    let center = rect.center();
    let icon = rect.width() * 0.5;
    if playing {
        let bar = Vec2::new(icon * 0.25, icon);
        let offset = icon * 0.25;
        for dx in [-offset, offset] {
            painter.rect_filled(
                Rect::from_center_size(Pos2::new(center.x + dx, center.y), bar),
                CornerRadius::same(2),
                theme::TEXT,
            );
        }
    } else {
        let points = vec![
            Pos2::new(center.x - icon * 0.4, center.y - icon * 0.5),
            Pos2::new(center.x - icon * 0.4, center.y + icon * 0.5),
            Pos2::new(center.x + icon * 0.5, center.y),
        ];
        painter.add(egui::Shape::convex_polygon(points, theme::TEXT, Stroke::NONE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ItemDetails;
    use crate::player::PlayerElements;
    use crate::player::element::fake::FakeElement;
    use crate::player::prefs::{MemoryStore, Preferences};
    use crate::player::scrub::ScrubConfig;

    fn player(primary: FakeElement) -> Player<FakeElement, FakeElement, MemoryStore> {
        Player::new(
            ItemDetails {
                name: "Test".into(),
                run_time_ticks: Some(90 * 10_000_000),
                ..ItemDetails::default()
            },
            PlayerElements {
                primary: Some(primary),
                preview: None,
            },
            Preferences::new(MemoryStore::new()),
            ScrubConfig::default(),
            || {},
        )
    }

    fn run(ctx: &Context, view: &mut PlayerView, p: &Player<FakeElement, FakeElement, MemoryStore>) -> Vec<PlayerAction> {
        let mut actions = Vec::new();
        let input = egui::RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, Vec2::new(1280.0, 720.0))),
            ..Default::default()
        };
        let _ = ctx.run(input, |ctx| actions = view.show(ctx, p));
        actions
    }

    #[test]
    fn time_label_formats_unknown_duration() {
        assert_eq!(time_label(65.0, None), "1:05 / --:--");
        assert_eq!(time_label(3.0, Some(3725.0)), "0:03 / 1:02:05");
    }

    #[test]
    fn idle_frame_produces_no_actions() {
        let ctx = Context::default();
        let mut view = PlayerView::new();
        let p = player(FakeElement::new(90.0));
        assert!(run(&ctx, &mut view, &p).is_empty());
    }

    #[test]
    fn video_texture_follows_presented_frame() {
        let ctx = Context::default();
        let mut view = PlayerView::new();
        let mut element = FakeElement::new(90.0);
        element.land(4.0, 16, 9);
        let p = player(element);

        run(&ctx, &mut view, &p);
        let id = view.video.as_ref().unwrap().id();
        run(&ctx, &mut view, &p);
        assert_eq!(view.video_pts, Some(4.0));
        assert_eq!(view.video.as_ref().unwrap().id(), id);
        assert_eq!(view.video.as_ref().unwrap().size(), [16, 9]);
    }

    fn jpeg_frame(second: u64, shade: u8) -> Arc<EncodedFrame> {
        let pixels = image::RgbImage::from_pixel(4, 4, image::Rgb([shade; 3]));
        Arc::new(EncodedFrame {
            second,
            width: 4,
            height: 4,
            jpeg: crate::player::preview::encode_jpeg(&pixels, 80).unwrap(),
        })
    }

    #[test]
    fn recapture_of_same_second_replaces_preview() {
        let ctx = Context::default();
        let mut view = PlayerView::new();
        let first = jpeg_frame(7, 20);
        let recaptured = jpeg_frame(7, 200);

        view.sync_preview(&ctx, &first);
        assert!(Arc::ptr_eq(&view.preview.as_ref().unwrap().0, &first));
        view.sync_preview(&ctx, &recaptured);
        assert!(Arc::ptr_eq(&view.preview.as_ref().unwrap().0, &recaptured));
    }
}
