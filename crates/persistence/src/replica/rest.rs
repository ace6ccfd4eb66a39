//! Replica store backed by a realtime-database style REST API.
//!
//! Each path is addressed as `{base}/{path}.json`. Records are written with
//! `PUT` and history is read with `orderBy="$key"&limitToLast=N`. An optional
//! auth token is passed as `?auth=`.

use std::time::Duration;

use async_trait::async_trait;
use gaswatch_core::alert::AlertEvent;
use gaswatch_core::device::Device;
use gaswatch_core::provenance::Provenance;
use gaswatch_core::reading::Reading;
use gaswatch_core::settings::Settings;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::ReplicaStore;
use crate::error::ReplicaError;

/// HTTP request timeout for a single replica call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct RestReplicaStore {
    client: reqwest::Client,
    base: Url,
    auth: Option<String>,
}

impl RestReplicaStore {
    pub fn new(base_url: &str, auth: Option<String>) -> Result<Self, ReplicaError> {
        let base = Url::parse(base_url).map_err(|e| {
            ReplicaError::Unavailable(format!("invalid replica URL '{base_url}': {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(ReplicaError::Unavailable(format!(
                "replica URL '{base_url}' cannot hold paths"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, base, auth })
    }

    /// `{base}/{segments...}.json`, with the auth token if configured.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ReplicaError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ReplicaError::Unavailable("replica URL cannot hold paths".into()))?;
            path.pop_if_empty();
            if let Some((last, parents)) = segments.split_last() {
                path.extend(parents);
                path.push(&format!("{last}.json"));
            }
        }
        if let Some(auth) = &self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        Ok(url)
    }

    async fn put<T: Serialize + Sync>(
        &self,
        segments: &[&str],
        body: &T,
    ) -> Result<(), ReplicaError> {
        let url = self.endpoint(segments)?;
        let response = self.client.put(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(ReplicaError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn get(&self, segments: &[&str], limit: Option<usize>) -> Result<Value, ReplicaError> {
        let mut url = self.endpoint(segments)?;
        if let Some(limit) = limit {
            url.query_pairs_mut()
                .append_pair("orderBy", "\"$key\"")
                .append_pair("limitToLast", &limit.to_string());
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ReplicaError::Status(response.status().as_u16()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ReplicaError::Decode(e.to_string()))
    }
}

/// Decode the children of a collection node. Records that do not decode are
/// skipped so one malformed entry does not hide the rest.
fn decode_children<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ReplicaError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(key, child)| match serde_json::from_value(child) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Skipping undecodable replica record");
                    None
                }
            })
            .collect()),
        other => Err(ReplicaError::Decode(format!(
            "expected an object of records, got {other}"
        ))),
    }
}

#[async_trait]
impl ReplicaStore for RestReplicaStore {
    async fn put_device(&self, device: &Device) -> Result<(), ReplicaError> {
        self.put(&["devices", &device.device_id], device).await
    }

    async fn put_settings(&self, settings: &Settings) -> Result<(), ReplicaError> {
        self.put(&["settings", &settings.device_id], settings).await
    }

    async fn put_reading(&self, reading: &Reading) -> Result<(), ReplicaError> {
        let key = reading.id.to_string();
        self.put(&["sensorData", &reading.device_id, &key], reading)
            .await
    }

    async fn put_alert(&self, alert: &AlertEvent) -> Result<(), ReplicaError> {
        let key = alert.id.to_string();
        self.put(&["alerts", &alert.device_id, &key], alert).await
    }

    async fn recent_readings(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<Reading>, ReplicaError> {
        let value = self.get(&["sensorData", device_id], Some(limit)).await?;
        let mut readings: Vec<Reading> = decode_children(value)?;
        readings.sort_by_key(|r| (r.timestamp, r.id));
        Ok(readings)
    }

    async fn recent_alerts(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<AlertEvent>, ReplicaError> {
        let value = self.get(&["alerts", device_id], Some(limit)).await?;
        let mut alerts: Vec<AlertEvent> = decode_children(value)?;
        alerts.sort_by_key(|a| std::cmp::Reverse((a.timestamp, a.id)));
        Ok(alerts
            .into_iter()
            .map(|a| a.with_provenance(Provenance::ExternalStore))
            .collect())
    }

    async fn get_settings(&self, device_id: &str) -> Result<Option<Settings>, ReplicaError> {
        match self.get(&["settings", device_id], None).await? {
            Value::Null => Ok(None),
            value => {
                let mut settings: Settings = serde_json::from_value(value)
                    .map_err(|e| ReplicaError::Decode(e.to_string()))?;
                if settings.device_id.is_empty() {
                    settings.device_id = device_id.to_string();
                }
                Ok(Some(settings))
            }
        }
    }

    async fn list_devices(&self) -> Result<Vec<Device>, ReplicaError> {
        let value = self.get(&["devices"], None).await?;
        decode_children(value)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn endpoint_appends_json_suffix_and_auth() {
        let store = RestReplicaStore::new(
            "https://gas-monitor.example.firebaseio.com/",
            Some("secret".into()),
        )
        .unwrap();

        let url = store.endpoint(&["alerts", "gas-1", "abc"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gas-monitor.example.firebaseio.com/alerts/gas-1/abc.json?auth=secret"
        );
    }

    #[test]
    fn endpoint_escapes_device_ids() {
        let store = RestReplicaStore::new("https://db.example.com/root", None).unwrap();
        let url = store.endpoint(&["devices", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "https://db.example.com/root/devices/a%2Fb%20c.json");
    }

    #[test]
    fn rejects_unusable_base() {
        assert_matches!(
            RestReplicaStore::new("mailto:ops@example.com", None),
            Err(ReplicaError::Unavailable(_))
        );
        assert_matches!(
            RestReplicaStore::new("not a url", None),
            Err(ReplicaError::Unavailable(_))
        );
    }

    #[test]
    fn decode_children_skips_bad_records() {
        let value = json!({
            "-legacy": {"value": 12},
            "018f2a4e-0000-7000-8000-000000000001": {
                "id": "018f2a4e-0000-7000-8000-000000000001",
                "deviceId": "gas-1",
                "value": 640.0,
                "timestamp": 1700000000000_i64
            }
        });
        let readings: Vec<Reading> = decode_children(value).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 640.0);
    }

    #[test]
    fn decode_children_null_is_empty() {
        let readings: Vec<Reading> = decode_children(Value::Null).unwrap();
        assert!(readings.is_empty());
        assert_matches!(
            decode_children::<Reading>(json!(42)),
            Err(ReplicaError::Decode(_))
        );
    }
}
