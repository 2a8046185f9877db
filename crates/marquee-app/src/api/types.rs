use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::player::chapters::ticks_to_secs;

/// Item attributes as returned by `GET /Users/{user}/Items/{item}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ItemDetails {
    pub id: String,
    pub name: String,
    /// Runtime in 100 ns ticks.
    pub run_time_ticks: Option<i64>,
    pub chapters: Vec<Chapter>,
    pub overview: Option<String>,
    /// Image kind ("Primary", "Backdrop", ...) to cache tag.
    pub image_tags: HashMap<String, String>,
    pub media_streams: Vec<MediaStream>,
}

impl ItemDetails {
    pub fn runtime_secs(&self) -> Option<f64> {
        self.run_time_ticks
            .filter(|t| *t > 0)
            .map(ticks_to_secs)
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.media_streams.iter().filter(|s| s.is_subtitle())
    }

    pub fn primary_image_tag(&self) -> Option<&str> {
        self.image_tags.get("Primary").map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Chapter {
    pub start_position_ticks: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaStream {
    pub index: i32,
    #[serde(rename = "Type")]
    pub stream_type: String,
    pub display_title: Option<String>,
    pub language: Option<String>,
    pub codec: Option<String>,
    pub is_external: bool,
}

impl MediaStream {
    pub fn is_subtitle(&self) -> bool {
        self.stream_type == "Subtitle"
    }

    /// Human-readable caption track label.
    pub fn track_label(&self) -> String {
        self.display_title
            .as_deref()
            .or(self.language.as_deref())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Track {}", self.index))
    }
}
