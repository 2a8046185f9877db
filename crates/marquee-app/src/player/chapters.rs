//! Chapter markers and time formatting for the progress bar.

use crate::api::types::Chapter;

/// Server timestamps are in 100 ns ticks.
pub const TICKS_PER_SECOND: f64 = 10_000_000.0;

pub fn ticks_to_secs(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND
}

/// A chapter positioned along the track.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterMarker {
    /// Position along the track in `[0, 100]`.
    pub percent: f64,
    pub name: String,
    pub start_secs: f64,
}

/// Place chapters as a percentage of the runtime. Returns nothing when the
/// runtime is unknown; chapters starting outside the runtime are dropped.
pub fn marker_positions(chapters: &[Chapter], runtime_ticks: Option<i64>) -> Vec<ChapterMarker> {
    let Some(runtime) = runtime_ticks.filter(|t| *t > 0) else {
        return Vec::new();
    };
    chapters
        .iter()
        .filter(|c| (0..=runtime).contains(&c.start_position_ticks))
        .map(|c| ChapterMarker {
            percent: c.start_position_ticks as f64 / runtime as f64 * 100.0,
            name: c.name.clone(),
            start_secs: ticks_to_secs(c.start_position_ticks),
        })
        .collect()
}

/// The chapter containing `secs`: the last one starting at or before it.
pub fn chapter_at(markers: &[ChapterMarker], secs: f64) -> Option<&ChapterMarker> {
    markers
        .iter()
        .filter(|m| m.start_secs <= secs)
        .max_by(|a, b| a.start_secs.total_cmp(&b.start_secs))
}

/// `M:SS` below an hour, `H:MM:SS` above.
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() { secs.max(0.0) as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
