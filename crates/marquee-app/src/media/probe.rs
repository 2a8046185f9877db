//! Stream metadata via `ffprobe`.

use std::process::{Command, Stdio};
use std::sync::OnceLock;

use super::MediaError;

/// Widest frame the primary element decodes; larger sources are scaled down.
pub const MAX_DECODE_WIDTH: u32 = 1920;

/// Whether `ffmpeg` and `ffprobe` can be run. Cached per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| ["ffprobe", "ffmpeg"].iter().all(|tool| runs(tool)))
}

fn runs(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: Option<f64>,
    pub has_audio: bool,
}

impl StreamMeta {
    /// Output size for decoding, capped at `max_width` with even dimensions.
    pub fn decode_size(&self, max_width: u32) -> (u32, u32) {
        scaled_size(self.width, self.height, max_width)
    }
}

pub fn probe_stream(url: &str) -> Result<StreamMeta, MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|source| MediaError::Spawn {
            tool: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::Probe(format!(
            "exit status {}",
            output.status.code().unwrap_or(-1)
        )));
    }
    parse_probe_json(&output.stdout)
}

/// Extract [`StreamMeta`] from `ffprobe -print_format json` output.
pub fn parse_probe_json(bytes: &[u8]) -> Result<StreamMeta, MediaError> {
    let json: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| MediaError::Probe(format!("invalid JSON: {e}")))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| MediaError::Probe("no streams in output".into()))?;

    let video = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or(MediaError::NoVideo)?;
    let has_audio = streams
        .iter()
        .any(|s| s["codec_type"].as_str() == Some("audio"));

    let width = video["width"].as_u64().unwrap_or(0) as u32;
    let height = video["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(MediaError::Probe("video stream has no dimensions".into()));
    }

    let fps = parse_frame_rate(
        video["avg_frame_rate"]
            .as_str()
            .filter(|r| *r != "0/0")
            .or_else(|| video["r_frame_rate"].as_str())
            .unwrap_or("30/1"),
    );

    let duration_secs = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| video["duration"].as_str().and_then(|s| s.parse::<f64>().ok()))
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(StreamMeta {
        width,
        height,
        fps,
        duration_secs,
        has_audio,
    })
}

/// "30000/1001" → 29.97. Falls back to 30 on anything odd.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let fps = if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().unwrap_or(30.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d > 0.0 { n / d } else { 30.0 }
    } else {
        rate.parse().unwrap_or(30.0)
    };
    if fps.is_finite() && fps > 0.0 { fps } else { 30.0 }
}

pub fn scaled_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    let (w, h) = if width > max_width {
        let h = (height as f64 * max_width as f64 / width as f64).round() as u32;
        (max_width, h)
    } else {
        (width, height)
    };
    // yuv → rgba scalers want even sizes
    ((w & !1).max(2), (h & !1).max(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rates() {
        assert_eq!(parse_frame_rate("25/1"), 25.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("24"), 24.0);
        assert_eq!(parse_frame_rate("0/0"), 30.0);
        assert_eq!(parse_frame_rate("junk"), 30.0);
    }

    #[test]
    fn probe_output() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 3840, "height": 2160, "avg_frame_rate": "24000/1001", "r_frame_rate": "24000/1001"},
                {"codec_type": "audio", "channels": 6}
            ],
            "format": {"duration": "5400.250000"}
        }"#;
        let meta = parse_probe_json(json).unwrap();
        assert_eq!(meta.width, 3840);
        assert!(meta.has_audio);
        assert_eq!(meta.duration_secs, Some(5400.25));
        assert_eq!(meta.decode_size(MAX_DECODE_WIDTH), (1920, 1080));
    }

    #[test]
    fn probe_without_video_fails() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(parse_probe_json(json), Err(MediaError::NoVideo)));
    }

    #[test]
    fn live_stream_has_no_duration() {
        let json = br#"{"streams": [{"codec_type": "video", "width": 640, "height": 360, "r_frame_rate": "30/1"}], "format": {"duration": "N/A"}}"#;
        let meta = parse_probe_json(json).unwrap();
        assert!(meta.duration_secs.is_none());
        assert!(!meta.has_audio);
    }

    #[test]
    fn odd_sizes_are_evened() {
        assert_eq!(scaled_size(1281, 721, 1920), (1280, 720));
        assert_eq!(scaled_size(2000, 1001, 1000), (1000, 500));
        assert_eq!(scaled_size(1, 1, 1920), (2, 2));
    }
}
