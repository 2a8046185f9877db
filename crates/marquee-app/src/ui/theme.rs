//! Player colours, sizes and egui style.

use egui::{Color32, Context, FontId, TextStyle};

pub const OVERLAY_BG: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 170);
pub const TEXT: Color32 = Color32::from_rgb(0xE8, 0xE8, 0xE8);
pub const TEXT_DIM: Color32 = Color32::from_rgb(0xA0, 0xA0, 0xA0);
pub const ACCENT: Color32 = Color32::from_rgb(0x4D, 0xA8, 0xDA);
pub const TRACK_BG: Color32 = Color32::from_rgba_premultiplied(90, 90, 90, 160);
pub const CHAPTER_TICK: Color32 = Color32::from_rgb(0xF0, 0xC0, 0x40);
pub const CAPTION_BG: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 200);

pub const CONTROLS_HEIGHT: f32 = 64.0;
pub const TRACK_HEIGHT: f32 = 6.0;
pub const TRACK_HIT_HEIGHT: f32 = 18.0;
pub const BUTTON_SIZE: f32 = 28.0;
pub const SPACING: f32 = 8.0;
pub const PREVIEW_GAP: f32 = 12.0;
/// Scale of the preview box while the pointer is moving.
pub const PREVIEW_COLLAPSED_SCALE: f32 = 0.6;
pub const PREVIEW_COLLAPSED_ALPHA: f32 = 0.45;
pub const CAPTION_SIZE: f32 = 24.0;
pub const BODY_SIZE: f32 = 14.0;
pub const SMALL_SIZE: f32 = 12.0;

pub fn apply(ctx: &Context) {
    ctx.set_visuals(egui::Visuals::dark());
    let mut style = (*ctx.style()).clone();
    style.spacing.item_spacing = egui::vec2(SPACING, 4.0);
    style.spacing.button_padding = egui::vec2(6.0, 2.0);
    style
        .text_styles
        .insert(TextStyle::Body, FontId::proportional(BODY_SIZE));
    style
        .text_styles
        .insert(TextStyle::Small, FontId::proportional(SMALL_SIZE));
    style
        .text_styles
        .insert(TextStyle::Button, FontId::proportional(BODY_SIZE));
    style.visuals.override_text_color = Some(TEXT);
    ctx.set_style(style);
}
