//! Scrub-preview frame capture.
//!
//! Drives the hidden low-bitrate element and, whenever it finishes a seek,
//! letterboxes its current frame into a preview-sized raster, JPEG-encodes it
//! and stores it in the [`FrameCache`] under the whole second the element
//! actually landed on. That may differ from the second last requested when a
//! seek was superseded mid-flight; the cache records what was decoded.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use thiserror::Error;

use crate::media::types::DecodedFrame;
use crate::player::element::{MediaElement, MediaEvent};
use crate::player::frame_cache::{EncodedFrame, FrameCache};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("preview element has no decoded frame")]
    NoFrame,
    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("preview box has zero area")]
    EmptyBox,
    #[error("image encode/decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Placement of a scaled source inside a fixed box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fit `src` inside `dst` preserving aspect ratio, centred on the free axis.
pub fn letterbox(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Letterbox {
    let src_aspect = src_w.max(1) as f64 / src_h.max(1) as f64;
    let dst_aspect = dst_w.max(1) as f64 / dst_h.max(1) as f64;

    let (width, height) = if src_aspect > dst_aspect {
        // Source is wider: width constrains, bars top/bottom
        (dst_w, ((dst_w as f64 / src_aspect).round() as u32).clamp(1, dst_h.max(1)))
    } else {
        // Source is taller: height constrains, bars left/right
        (((dst_h as f64 * src_aspect).round() as u32).clamp(1, dst_w.max(1)), dst_h)
    };

    Letterbox {
        x: (dst_w.saturating_sub(width)) / 2,
        y: (dst_h.saturating_sub(height)) / 2,
        width,
        height,
    }
}

/// Draw `frame` letterboxed onto a black `box_w` x `box_h` canvas.
pub fn rasterize(frame: &DecodedFrame, box_w: u32, box_h: u32) -> Result<RgbImage, PreviewError> {
    if box_w == 0 || box_h == 0 {
        return Err(PreviewError::EmptyBox);
    }
    let expected = DecodedFrame::expected_len(frame.width, frame.height);
    let source = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .filter(|_| frame.width > 0 && frame.height > 0)
        .ok_or(PreviewError::InvalidFrame {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.data.len(),
        })?;

    let fit = letterbox(frame.width, frame.height, box_w, box_h);
    let scaled = imageops::resize(&source, fit.width, fit.height, FilterType::Triangle);
    let scaled = DynamicImage::ImageRgba8(scaled).into_rgb8();

    let mut canvas = RgbImage::from_pixel(box_w, box_h, Rgb([0, 0, 0]));
    imageops::overlay(&mut canvas, &scaled, fit.x as i64, fit.y as i64);
    Ok(canvas)
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PreviewError> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    image.write_with_encoder(encoder)?;
    Ok(buf.into_inner())
}

/// Decode a cached preview back to RGBA for display.
pub fn decode_preview(frame: &EncodedFrame) -> Result<RgbaImage, PreviewError> {
    let image = image::load_from_memory_with_format(&frame.jpeg, ImageFormat::Jpeg)?;
    Ok(image.to_rgba8())
}

/// Owns the hidden preview element and feeds captured frames into the cache.
pub struct PreviewDriver<E: MediaElement> {
    element: Option<E>,
    box_width: u32,
    box_height: u32,
    quality: u8,
}

impl<E: MediaElement> PreviewDriver<E> {
    pub fn new(element: Option<E>, box_width: u32, box_height: u32, quality: u8) -> Self {
        Self {
            element,
            box_width,
            box_height,
            quality,
        }
    }

    /// Ask the hidden element to move to `secs`. Completion arrives via `poll`.
    pub fn seek_to(&mut self, secs: f64) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        log::debug!("Preview seek to {secs:.2}s");
        element.seek(secs);
    }

    /// Drain the element's notifications. For every completed seek, capture
    /// the current frame into `cache`. Returns the most recent frame stored.
    pub fn poll(&mut self, cache: &mut FrameCache) -> Option<Arc<EncodedFrame>> {
        let element = self.element.as_mut()?;
        let mut stored = None;
        for event in element.poll_events() {
            match event {
                MediaEvent::Seeked => {
                    match capture(element, self.box_width, self.box_height, self.quality) {
                        Ok(frame) => {
                            let frame = Arc::new(frame);
                            log::debug!("Cached preview frame for second {}", frame.second);
                            cache.put(frame.second, frame.clone());
                            stored = Some(frame);
                        }
                        Err(e) => log::warn!("Preview capture failed: {e}"),
                    }
                }
                MediaEvent::Error(message) => log::warn!("Preview element error: {message}"),
                _ => {}
            }
        }
        stored
    }

    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.element.is_some()
    }

    #[cfg(test)]
    pub fn element(&self) -> Option<&E> {
        self.element.as_ref()
    }

    #[cfg(test)]
    pub fn element_mut(&mut self) -> Option<&mut E> {
        self.element.as_mut()
    }

    /// Release the element (and whatever resources it holds).
    pub fn detach(&mut self) -> Option<E> {
        self.element.take()
    }
}

fn capture<E: MediaElement>(
    element: &E,
    box_w: u32,
    box_h: u32,
    quality: u8,
) -> Result<EncodedFrame, PreviewError> {
    let frame = element.current_frame().ok_or(PreviewError::NoFrame)?;
    let canvas = rasterize(frame, box_w, box_h)?;
    let jpeg = encode_jpeg(&canvas, quality)?;
    Ok(EncodedFrame {
        second: FrameCache::key_for(element.current_time()),
        width: canvas.width(),
        height: canvas.height(),
        jpeg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::element::fake::FakeElement;

    #[test]
    fn letterbox_wide_source_bars_top_bottom() {
        let fit = letterbox(1920, 1080, 240, 240);
        assert_eq!(fit.width, 240);
        assert_eq!(fit.height, 135);
        assert_eq!(fit.x, 0);
        assert_eq!(fit.y, 52);
    }

    #[test]
    fn letterbox_tall_source_bars_left_right() {
        let fit = letterbox(1080, 1920, 240, 135);
        assert_eq!(fit.height, 135);
        assert_eq!(fit.width, 76);
        assert_eq!(fit.y, 0);
        assert_eq!(fit.x, 82);
    }

    #[test]
    fn letterbox_same_aspect_fills() {
        let fit = letterbox(1280, 720, 240, 135);
        assert_eq!(
            fit,
            Letterbox {
                x: 0,
                y: 0,
                width: 240,
                height: 135
            }
        );
    }

    #[test]
    fn rasterize_keeps_bars_black() {
        let frame = DecodedFrame {
            data: vec![255; DecodedFrame::expected_len(40, 10)],
            width: 40,
            height: 10,
            pts: 0.0,
        };
        let canvas = rasterize(&frame, 40, 40).unwrap();
        assert_eq!(canvas.dimensions(), (40, 40));
        assert_eq!(canvas.get_pixel(20, 0), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(20, 20), &Rgb([255, 255, 255]));
    }

    #[test]
    fn rasterize_rejects_short_buffer() {
        let frame = DecodedFrame {
            data: vec![0; 10],
            width: 4,
            height: 4,
            pts: 0.0,
        };
        assert!(matches!(
            rasterize(&frame, 16, 9),
            Err(PreviewError::InvalidFrame { expected: 64, actual: 10, .. })
        ));
    }

    #[test]
    fn encoded_preview_decodes_at_box_size() {
        let frame = DecodedFrame {
            data: vec![128; DecodedFrame::expected_len(64, 36)],
            width: 64,
            height: 36,
            pts: 0.0,
        };
        let jpeg = encode_jpeg(&rasterize(&frame, 32, 18).unwrap(), 60).unwrap();
        let decoded = decode_preview(&EncodedFrame {
            second: 0,
            width: 32,
            height: 18,
            jpeg,
        })
        .unwrap();
        assert_eq!(decoded.dimensions(), (32, 18));
    }

    #[test]
    fn seeked_frame_is_cached_under_landed_second() {
        let mut driver = PreviewDriver::new(Some(FakeElement::new(600.0)), 32, 18, 60);
        let mut cache = FrameCache::new(16);

        driver.seek_to(15.2);
        // The element snapped to a keyframe slightly earlier
        driver.element.as_mut().unwrap().land(14.9, 64, 36);
        let stored = driver.poll(&mut cache).unwrap();

        assert_eq!(stored.second, 14);
        assert!(cache.contains(14));
        assert!(!cache.contains(15));
        assert_eq!(driver.element().unwrap().seeks, vec![15.2]);
    }

    #[test]
    fn capture_failure_is_swallowed() {
        let mut element = FakeElement::new(60.0);
        element.frame = Some(DecodedFrame {
            data: vec![0; 3],
            width: 8,
            height: 8,
            pts: 0.0,
        });
        element.events.push(MediaEvent::Seeked);
        let mut driver = PreviewDriver::new(Some(element), 32, 18, 60);
        let mut cache = FrameCache::new(16);
        assert!(driver.poll(&mut cache).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn detached_driver_is_noop() {
        let mut driver: PreviewDriver<FakeElement> = PreviewDriver::new(None, 32, 18, 60);
        let mut cache = FrameCache::new(4);
        driver.seek_to(3.0);
        assert!(driver.poll(&mut cache).is_none());
        assert!(cache.is_empty());
    }
}
