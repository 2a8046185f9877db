//! Blocking media-server client.

use std::time::Duration;

use serde::de::DeserializeOwned;
use ureq::Agent;
use url::Url;

use crate::api::ApiError;
use crate::api::types::ItemDetails;
use crate::api::urls::join_segments;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const TOKEN_HEADER: &str = "X-Emby-Token";

/// Server location and credentials for one signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub server_url: String,
    pub access_token: String,
    pub user_id: String,
}

impl Session {
    pub fn base_url(&self) -> Result<Url, ApiError> {
        Url::parse(self.server_url.trim()).map_err(|source| ApiError::InvalidUrl {
            url: self.server_url.clone(),
            source,
        })
    }
}

/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    agent: Agent,
    session: Session,
}

impl ApiClient {
    pub fn new(session: Session) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `GET /Users/{user}/Items/{item}`
    pub fn fetch_item(&self, item_id: &str) -> Result<ItemDetails, ApiError> {
        let base = self.session.base_url()?;
        let url = join_segments(&base, &["Users", &self.session.user_id, "Items", item_id]);
        let item: ItemDetails = self.get_json(&url)?;
        log::info!("Loaded item '{}' ({})", item.name, item.id);
        Ok(item)
    }

    pub fn fetch_text(&self, url: &Url) -> Result<String, ApiError> {
        let mut response = self.get(url)?;
        Ok(response.body_mut().read_to_string()?)
    }

    pub fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, ApiError> {
        let mut response = self.get(url)?;
        Ok(response.body_mut().read_to_vec()?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ApiError> {
        let body = self.fetch_text(url)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn get(&self, url: &Url) -> Result<ureq::http::Response<ureq::Body>, ApiError> {
        log::debug!("GET {}", redact(url));
        let response = self
            .agent
            .get(url.as_str())
            .header(TOKEN_HEADER, &self.session.access_token)
            .header("Accept", "application/json")
            .call()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: redact(url),
            });
        }
        Ok(response)
    }
}

/// URL with the `api_key` parameter masked, for logs and errors.
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "api_key") {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "api_key" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_server_url() {
        let session = Session {
            server_url: "not a url".into(),
            access_token: String::new(),
            user_id: String::new(),
        };
        assert!(matches!(session.base_url(), Err(ApiError::InvalidUrl { .. })));
    }

    #[test]
    fn redact_masks_token() {
        let url = Url::parse("http://h/Videos/a/stream?static=true&api_key=secret").unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("static=true"));
        let plain = Url::parse("http://h/Items/a").unwrap();
        assert_eq!(redact(&plain), "http://h/Items/a");
    }
}
