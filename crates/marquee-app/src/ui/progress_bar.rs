//! Seek track with chapter ticks and the floating scrub preview.

use egui::{
    Align2, Color32, CornerRadius, FontId, Id, LayerId, Order, Pos2, Rect, Sense, Stroke,
    TextureHandle, Ui, Vec2,
};

use super::player_view::PlayerAction;
use super::theme;
use crate::player::chapters::{self, ChapterMarker};
use crate::player::scrub::{PreviewView, TrackGeometry};

pub struct ProgressBar<'a> {
    pub current_time: f64,
    pub duration: Option<f64>,
    pub markers: &'a [ChapterMarker],
    pub show_markers: bool,
    pub preview: &'a PreviewView,
    pub preview_texture: Option<&'a TextureHandle>,
    pub preview_chapter: Option<&'a str>,
    pub box_size: Vec2,
}

impl ProgressBar<'_> {
    /// Draws into `rect` and pushes the pointer interactions onto `actions`.
    ///
    /// `last_hover` carries the pointer x across frames: hover is reported
    /// only when the pointer moves, and leaving the track exactly once.
    pub fn show(
        &self,
        ui: &mut Ui,
        rect: Rect,
        last_hover: &mut Option<f32>,
        actions: &mut Vec<PlayerAction>,
    ) {
        let hit_rect = Rect::from_center_size(
            rect.center(),
            Vec2::new(rect.width(), theme::TRACK_HIT_HEIGHT),
        );
        let response = ui.allocate_rect(hit_rect, Sense::click());
        let track = TrackGeometry::new(rect.min.x, rect.width());

        let painter = ui.painter();
        painter.rect_filled(rect, CornerRadius::same(3), theme::TRACK_BG);

        let progress = match self.duration {
            Some(d) if d > 0.0 => (self.current_time / d).clamp(0.0, 1.0) as f32,
            _ => 0.0,
        };
        let fill = Rect::from_min_size(rect.min, Vec2::new(rect.width() * progress, rect.height()));
        painter.rect_filled(fill, CornerRadius::same(3), theme::ACCENT);

        if self.show_markers {
            for marker in self.markers {
                let x = rect.min.x + rect.width() * (marker.percent / 100.0) as f32;
                painter.line_segment(
                    [Pos2::new(x, rect.min.y - 2.0), Pos2::new(x, rect.max.y + 2.0)],
                    Stroke::new(2.0, theme::CHAPTER_TICK),
                );
            }
        }

        if progress > 0.0 {
            let radius = if response.hovered() { 7.0 } else { 5.0 };
            painter.circle_filled(
                Pos2::new(fill.max.x, rect.center().y),
                radius,
                theme::ACCENT,
            );
        }

        match response.hover_pos() {
            Some(pos) if *last_hover != Some(pos.x) => {
                *last_hover = Some(pos.x);
                actions.push(PlayerAction::TrackHover { x: pos.x, track });
            }
            Some(_) => {}
            None => {
                if last_hover.take().is_some() {
                    actions.push(PlayerAction::TrackLeave);
                }
            }
        }

        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            actions.push(PlayerAction::TrackClick { x: pos.x, track });
        }

        if self.preview.visible {
            self.draw_preview(ui, rect);
        }
    }

    fn draw_preview(&self, ui: &Ui, track_rect: Rect) {
        let (scale, alpha) = if self.preview.expanded {
            (1.0, 1.0)
        } else {
            (theme::PREVIEW_COLLAPSED_SCALE, theme::PREVIEW_COLLAPSED_ALPHA)
        };
        let size = self.box_size * scale;
        let label_height = 20.0;
        let bottom = track_rect.min.y - theme::PREVIEW_GAP;
        let center_x = track_rect.min.x + self.preview.left;
        let image_rect = Rect::from_min_size(
            Pos2::new(center_x - size.x / 2.0, bottom - label_height - size.y),
            size,
        );

        let painter = ui
            .ctx()
            .layer_painter(LayerId::new(Order::Tooltip, Id::new("scrub-preview")));
        let frame_rect = image_rect.expand(2.0);
        painter.rect_filled(
            frame_rect.union(Rect::from_min_max(
                frame_rect.left_bottom(),
                Pos2::new(frame_rect.max.x, bottom),
            )),
            CornerRadius::same(4),
            theme::OVERLAY_BG.gamma_multiply(alpha),
        );

        match self.preview_texture {
            Some(texture) => {
                painter.image(
                    texture.id(),
                    image_rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE.gamma_multiply(alpha),
                );
            }
            None => {
                painter.rect_filled(image_rect, CornerRadius::ZERO, Color32::BLACK);
            }
        }

        let label = match self.preview_chapter {
            Some(name) => format!("{}  {}", chapters::format_time(self.preview.target_time), name),
            None => chapters::format_time(self.preview.target_time),
        };
        painter.text(
            Pos2::new(center_x, bottom - label_height / 2.0),
            Align2::CENTER_CENTER,
            label,
            FontId::proportional(theme::SMALL_SIZE),
            theme::TEXT.gamma_multiply(alpha),
        );
    }
}
