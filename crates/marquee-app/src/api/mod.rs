pub mod client;
pub mod types;
pub mod urls;

pub use client::{ApiClient, Session};
pub use types::{Chapter, ItemDetails, MediaStream};
pub use urls::StreamUrls;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Transport(#[from] ureq::Error),
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
}
