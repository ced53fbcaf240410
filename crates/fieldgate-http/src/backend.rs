use async_trait::async_trait;
use fieldgate_domain::{BackendForwarder, BackendResponse, GatewayError, GatewayResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Forwards validated payloads to the trusting backend.
///
/// The payload bytes go out exactly as the device serialized them; the
/// forwarder never re-serializes. Any HTTP status is a completed bridging
/// attempt; only network-level failures are errors, and there is no retry
/// here.
pub struct HttpBackendForwarder {
    client: Client,
    base_url: Url,
}

impl HttpBackendForwarder {
    pub fn new(base_url: &str, timeout: Duration) -> GatewayResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            GatewayError::Configuration(format!("invalid backend base URL '{}': {}", base_url, e))
        })?;
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            GatewayError::Configuration(format!("failed to build backend HTTP client: {}", e))
        })?;
        Ok(Self { client, base_url })
    }

    /// `{base}/device/{device_id}/data`, with `device_id` path-escaped.
    fn data_url(&self, device_id: &str) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Configuration(format!(
                    "backend base URL '{}' cannot carry paths",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["device", device_id, "data"]);
        Ok(url)
    }
}

#[async_trait]
impl BackendForwarder for HttpBackendForwarder {
    async fn forward(&self, device_id: &str, payload: &str) -> GatewayResult<BackendResponse> {
        let url = self.data_url(device_id)?;
        debug!(url = %url, payload_size = payload.len(), "forwarding payload to backend");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| GatewayError::BackendTransport(anyhow::Error::new(e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::BackendTransport(anyhow::Error::new(e)))?;

        debug!(status, body_size = body.len(), "backend answered");
        Ok(BackendResponse { status, body })
    }
}
