//! Stream, subtitle and image URLs for one item.
//!
//! ffmpeg cannot attach per-request headers, so media URLs carry the access
//! token as the `api_key` query parameter.

use url::Url;

use crate::api::ApiError;
use crate::api::client::Session;

/// Preview rendition: small frames and a starved bitrate. Only the hidden
/// preview element uses it.
const PREVIEW_PARAMS: [(&str, &str); 6] = [
    ("maxWidth", "320"),
    ("maxHeight", "180"),
    ("videoBitRate", "160000"),
    ("videoCodec", "h264"),
    ("audioCodec", "aac"),
    ("audioBitRate", "32000"),
];

const POSTER_MAX_WIDTH: &str = "1280";

#[derive(Debug, Clone)]
pub struct StreamUrls {
    base: Url,
    token: String,
    item_id: String,
}

impl StreamUrls {
    pub fn new(session: &Session, item_id: &str) -> Result<Self, ApiError> {
        Ok(Self {
            base: session.base_url()?,
            token: session.access_token.clone(),
            item_id: item_id.to_string(),
        })
    }

    /// Original file, served without transcoding.
    pub fn primary(&self) -> Url {
        let mut url = self.join(&["Videos", &self.item_id, "stream"]);
        url.query_pairs_mut()
            .append_pair("static", "true")
            .append_pair("api_key", &self.token);
        url
    }

    pub fn preview(&self) -> Url {
        let mut url = self.join(&["Videos", &self.item_id, "stream.mp4"]);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in PREVIEW_PARAMS {
                query.append_pair(key, value);
            }
            query.append_pair("api_key", &self.token);
        }
        url
    }

    /// A subtitle stream converted to WebVTT by the server.
    pub fn subtitle(&self, stream_index: i32) -> Url {
        let index = stream_index.to_string();
        let mut url = self.join(&[
            "Videos",
            &self.item_id,
            &self.item_id,
            "Subtitles",
            &index,
            "0",
            "Stream.vtt",
        ]);
        url.query_pairs_mut().append_pair("api_key", &self.token);
        url
    }

    pub fn poster(&self, tag: &str) -> Url {
        let mut url = self.join(&["Items", &self.item_id, "Images", "Primary"]);
        url.query_pairs_mut()
            .append_pair("tag", tag)
            .append_pair("maxWidth", POSTER_MAX_WIDTH);
        url
    }

    fn join(&self, segments: &[&str]) -> Url {
        join_segments(&self.base, segments)
    }
}

/// Append percent-encoded path segments to `base`, keeping any path prefix
/// the server is mounted under.
pub fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
