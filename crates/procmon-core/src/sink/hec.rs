//! Splunk HTTP Event Collector sink.

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::{EventSink, SinkError, encode_events};
use crate::normalize::NormalizedEvent;

/// Path of the HEC JSON event endpoint.
const EVENT_PATH: &str = "/services/collector/event";

/// Connection settings for a HEC endpoint.
#[derive(Clone)]
pub struct HecConfig {
    /// Base URL (`https://host:8088`) or full event endpoint URL.
    pub url: String,
    pub token: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Accept self-signed or otherwise invalid certificates.
    pub accept_invalid_certs: bool,
}

impl HecConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
        }
    }
}

impl std::fmt::Debug for HecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HecConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Posts event batches to a Splunk HEC endpoint.
///
/// Each batch is a single request with concatenated JSON events. Retrying is
/// left to the monitor's restart policy.
pub struct HecSink {
    client: Client,
    endpoint: Url,
    authorization: String,
}

impl HecSink {
    pub fn new(config: &HecConfig) -> Result<Self, SinkError> {
        let endpoint = event_endpoint(&config.url)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            authorization: format!("Splunk {}", config.token),
        })
    }

    /// Resolved event endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl EventSink for HecSink {
    fn write(&mut self, events: Vec<NormalizedEvent>) -> Result<(), SinkError> {
        if events.is_empty() {
            debug!("HEC: empty batch, nothing to send");
            return Ok(());
        }

        let body = encode_events(&events)?;
        let bytes = body.len();

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, self.authorization.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        debug!("HEC: sent {} events ({} bytes)", events.len(), bytes);
        Ok(())
    }
}

/// Appends the event path when `url` has none.
fn event_endpoint(url: &str) -> Result<Url, SinkError> {
    let mut parsed = Url::parse(url).map_err(|_| SinkError::InvalidUrl(url.to_string()))?;
    if parsed.path() == "/" || parsed.path().is_empty() {
        parsed.set_path(EVENT_PATH);
    }
    Ok(parsed)
}
