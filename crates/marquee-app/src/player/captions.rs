//! Caption track selection.
//!
//! Tracks live on the primary element; this module only flips their modes.
//! At most one track is `Showing` at a time. In-session selection uses the
//! synthetic [`TrackId`] assigned when the element enumerated its tracks;
//! across sessions the choice is remembered by label, and when several
//! tracks share a label the first one wins.

use std::time::Duration;

use crate::media::subtitles::{self, Cue};
use crate::player::prefs::{PreferenceStore, Preferences};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    Disabled,
    Showing,
}

#[derive(Debug, Clone)]
pub struct TextTrack {
    pub id: TrackId,
    pub label: String,
    pub language: Option<String>,
    pub mode: TrackMode,
    /// Empty until the cue file has been fetched.
    pub cues: Vec<Cue>,
}

impl TextTrack {
    pub fn new(id: TrackId, label: impl Into<String>, language: Option<String>) -> Self {
        Self {
            id,
            label: label.into(),
            language,
            mode: TrackMode::Disabled,
            cues: Vec::new(),
        }
    }
}

/// What the controls need to list a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: TrackId,
    pub label: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Captions {
    pub enabled: bool,
    /// Label of the last selected track (persisted).
    pub selected_label: Option<String>,
    pub selected: Option<TrackId>,
    pub available: Vec<TrackInfo>,
}

impl Captions {
    pub fn from_prefs<S: PreferenceStore>(prefs: &Preferences<S>) -> Self {
        Self {
            enabled: prefs.captions_enabled(),
            selected_label: prefs.caption_track(),
            selected: None,
            available: Vec::new(),
        }
    }

    /// Run once the element's metadata (and so its track list) is available:
    /// disable everything, then re-enable the remembered track if captions
    /// were on and a track with that label still exists.
    pub fn on_metadata(&mut self, tracks: &mut [TextTrack]) {
        self.available = tracks
            .iter()
            .map(|t| TrackInfo {
                id: t.id,
                label: t.label.clone(),
                language: t.language.clone(),
            })
            .collect();
        disable_all(tracks);
        self.selected = None;

        if !self.enabled {
            return;
        }
        let restored = self
            .selected_label
            .as_deref()
            .and_then(|label| find_by_label(tracks, label));
        match restored {
            Some(id) => {
                show(tracks, id);
                self.selected = Some(id);
                log::info!("Restored caption track '{}'", self.selected_label.as_deref().unwrap_or(""));
            }
            None => {
                // Remembered track is gone; stay off for this session without
                // touching the stored preference.
                self.enabled = false;
            }
        }
    }

    /// Turn captions on (remembered track, else the first one) or off.
    pub fn toggle<S: PreferenceStore>(&mut self, tracks: &mut [TextTrack], prefs: &mut Preferences<S>) {
        if self.enabled {
            disable_all(tracks);
            self.enabled = false;
            self.selected = None;
            prefs.set_captions_enabled(false);
            return;
        }

        let target = self
            .selected_label
            .as_deref()
            .and_then(|label| find_by_label(tracks, label))
            .or_else(|| tracks.first().map(|t| t.id));
        match target {
            Some(id) => self.select(tracks, id, prefs),
            None => log::debug!("No caption tracks to enable"),
        }
    }

    /// Show exactly `id`, mark captions on and remember its label.
    pub fn select<S: PreferenceStore>(
        &mut self,
        tracks: &mut [TextTrack],
        id: TrackId,
        prefs: &mut Preferences<S>,
    ) {
        if !show(tracks, id) {
            log::debug!("Caption track {:?} not found", id);
            return;
        }
        let label = tracks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.label.clone())
            .unwrap_or_default();
        self.enabled = true;
        self.selected = Some(id);
        prefs.set_captions_enabled(true);
        prefs.set_caption_track(&label);
        self.selected_label = Some(label);
    }

    /// Select by label (first match).
    pub fn select_label<S: PreferenceStore>(
        &mut self,
        tracks: &mut [TextTrack],
        label: &str,
        prefs: &mut Preferences<S>,
    ) {
        match find_by_label(tracks, label) {
            Some(id) => self.select(tracks, id, prefs),
            None => log::debug!("Caption track '{label}' not found"),
        }
    }
}

pub fn disable_all(tracks: &mut [TextTrack]) {
    for track in tracks.iter_mut() {
        track.mode = TrackMode::Disabled;
    }
}

/// Disable every track, then show `id`. Returns false if no such track.
pub fn show(tracks: &mut [TextTrack], id: TrackId) -> bool {
    if !tracks.iter().any(|t| t.id == id) {
        return false;
    }
    for track in tracks.iter_mut() {
        track.mode = if track.id == id {
            TrackMode::Showing
        } else {
            TrackMode::Disabled
        };
    }
    true
}

pub fn find_by_label(tracks: &[TextTrack], label: &str) -> Option<TrackId> {
    tracks.iter().find(|t| t.label == label).map(|t| t.id)
}

pub fn showing(tracks: &[TextTrack]) -> Option<&TextTrack> {
    tracks.iter().find(|t| t.mode == TrackMode::Showing)
}

/// Text of the showing track's cue at `secs`.
pub fn active_cue_text(tracks: &[TextTrack], secs: f64) -> Option<&str> {
    let track = showing(tracks)?;
    let position = Duration::from_secs_f64(secs.max(0.0));
    subtitles::cue_at(&track.cues, position).map(|cue| cue.text.as_str())
}
