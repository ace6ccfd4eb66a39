//! HTTP client for the origin service's query interface.

use async_trait::async_trait;
use gaswatch_core::device::Device;
use gaswatch_core::reading::Reading;
use gaswatch_core::settings::Settings;
use gaswatch_core::window::Since;
use serde::de::DeserializeOwned;

use crate::error::ObserverError;

/// Read access to the history the origin still retains.
#[async_trait]
pub trait OriginHistory: Send + Sync {
    /// Retained readings at or after `since`, oldest first.
    ///
    /// A device the origin has never heard of has no history.
    async fn readings(&self, device_id: &str, since: Since) -> Result<Vec<Reading>, ObserverError>;

    async fn settings(&self, device_id: &str) -> Result<Option<Settings>, ObserverError>;

    async fn devices(&self) -> Result<Vec<Device>, ObserverError>;
}

/// [`OriginHistory`] over the origin's REST API, using [`reqwest`].
pub struct OriginClient {
    client: reqwest::Client,
    base_url: String,
}

impl OriginClient {
    /// * `base_url` - Origin base URL, e.g. `http://host:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (and its connection pool).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    /// `{base_url}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ObserverError> {
        let base = &self.base_url;
        let mut url = reqwest::Url::parse(base)
            .map_err(|e| ObserverError::Config(format!("invalid origin URL '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ObserverError::Config(format!("origin URL '{base}' cannot be a base")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET the endpoint and decode the body; a 404 becomes `None`.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Option<T>, ObserverError> {
        let response = self
            .client
            .get(self.endpoint(segments)?)
            .query(query)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ObserverError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ObserverError::OriginStatus {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl OriginHistory for OriginClient {
    async fn readings(&self, device_id: &str, since: Since) -> Result<Vec<Reading>, ObserverError> {
        let query = match since {
            Since::All => Vec::new(),
            Since::From(bound) => vec![("since", bound.timestamp_millis().to_string())],
        };
        let readings = self
            .get_optional(&["api", "data", device_id], &query)
            .await?;
        Ok(readings.unwrap_or_default())
    }

    async fn settings(&self, device_id: &str) -> Result<Option<Settings>, ObserverError> {
        self.get_optional(&["api", "settings", device_id], &[])
            .await
    }

    async fn devices(&self) -> Result<Vec<Device>, ObserverError> {
        let devices = self.get_optional(&["api", "devices"], &[]).await?;
        Ok(devices.unwrap_or_default())
    }
}
