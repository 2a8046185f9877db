//! WebVTT and SRT parsing for caption tracks.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubtitleError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("missing WEBVTT header")]
    MissingHeader,
    #[error("subtitle file has no cues")]
    Empty,
}

/// One timed caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// Parse a subtitle document, picking the format from its header.
pub fn parse(content: &str) -> Result<Vec<Cue>, SubtitleError> {
    let body = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    if body.trim_start().starts_with("WEBVTT") {
        parse_vtt(body)
    } else {
        parse_srt(body)
    }
}

/// WebVTT: header line, optional NOTE/STYLE/REGION blocks, optional cue ids.
pub fn parse_vtt(content: &str) -> Result<Vec<Cue>, SubtitleError> {
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    let content = content.replace("\r\n", "\n");
    let mut blocks = content.split("\n\n");

    let header = blocks.next().unwrap_or("");
    if !header.trim_start().starts_with("WEBVTT") {
        return Err(SubtitleError::MissingHeader);
    }

    let mut cues = Vec::new();
    for block in blocks {
        let block = block.trim_matches('\n');
        if block.is_empty()
            || block.starts_with("NOTE")
            || block.starts_with("STYLE")
            || block.starts_with("REGION")
        {
            continue;
        }
        push_cue(&mut cues, block);
    }
    finish(cues)
}

/// SRT: numbered blocks, comma as the millisecond separator.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>, SubtitleError> {
    let content = content.replace("\r\n", "\n");
    let mut cues = Vec::new();
    for block in content.split("\n\n") {
        let block = block.trim_matches('\n');
        if block.trim().is_empty() {
            continue;
        }
        push_cue(&mut cues, block);
    }
    finish(cues)
}

/// The first cue covering `position`, if any.
pub fn cue_at(cues: &[Cue], position: Duration) -> Option<&Cue> {
    cues.iter()
        .find(|cue| position >= cue.start && position < cue.end)
}

fn finish(mut cues: Vec<Cue>) -> Result<Vec<Cue>, SubtitleError> {
    if cues.is_empty() {
        return Err(SubtitleError::Empty);
    }
    cues.sort_by_key(|c| c.start);
    Ok(cues)
}

/// A cue with bad timing is dropped on its own; the rest of the track survives.
fn push_cue(cues: &mut Vec<Cue>, block: &str) {
    match parse_block(block) {
        Ok(Some(cue)) => cues.push(cue),
        Ok(None) => {}
        Err(e) => log::debug!("Skipping subtitle cue: {e}"),
    }
}

fn parse_block(block: &str) -> Result<Option<Cue>, SubtitleError> {
    let lines: Vec<&str> = block.lines().collect();
    let Some(timing_idx) = lines.iter().position(|line| line.contains("-->")) else {
        return Ok(None);
    };
    let (start, end) = parse_timing(lines[timing_idx])?;
    let text = lines[timing_idx + 1..]
        .iter()
        .map(|l| strip_tags(l.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(Cue { start, end, text }))
}

/// "00:00:01.000 --> 00:00:04.000 line:90%" (cue settings after the end time are ignored)
fn parse_timing(line: &str) -> Result<(Duration, Duration), SubtitleError> {
    let (start_str, rest) = line
        .split_once("-->")
        .ok_or_else(|| SubtitleError::InvalidTimestamp(line.to_string()))?;
    let end_str = rest.split_whitespace().next().unwrap_or("");
    Ok((parse_timestamp(start_str.trim())?, parse_timestamp(end_str)?))
}

/// "HH:MM:SS.mmm", "MM:SS.mmm", either separator for milliseconds.
fn parse_timestamp(s: &str) -> Result<Duration, SubtitleError> {
    let invalid = || SubtitleError::InvalidTimestamp(s.to_string());
    let normalized = s.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, sec] => (0, *m, *sec),
        [h, m, sec] => (h.parse::<u64>().map_err(|_| invalid())?, *m, *sec),
        _ => return Err(invalid()),
    };
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let (whole, frac) = seconds.split_once('.').unwrap_or((seconds, "0"));
    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let millis_str: String = format!("{frac:0<3}").chars().take(3).collect();
    let millis: u64 = millis_str.parse().map_err(|_| invalid())?;
    Ok(Duration::from_millis(
        ((hours * 60 + minutes) * 60 + whole) * 1000 + millis,
    ))
}

/// Drop inline markup such as `<i>`, `<b>`, `<c.yellow>` and `<00:00:01.000>`.
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
