//! HTTP implementation of the heater controller contract.
//!
//! Speaks to the controller's `/temperatura/*` JSON endpoints. Any non-2xx
//! status is reported as [`RemoteError::Status`].

use crate::remote::{Ack, RawReading, RemoteClient, RemoteError, RemoteFuture, TemperatureBounds};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Controller address used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

const SETTINGS_PATH: &str = "/temperatura/settings";
const CURRENT_PATH: &str = "/temperatura/current";

/// Longest error body kept in a [`RemoteError::Status`].
const MAX_ERROR_BODY: usize = 256;

/// reqwest-backed controller client.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteClient {
    /// Build from an optional base URL override and an optional per-request timeout.
    /// `None` for the timeout leaves requests unbounded.
    pub fn new(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an already configured reqwest client.
    pub fn with_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        Self {
            client,
            base_url: base.trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn settings_endpoint(&self) -> String {
        format!("{}{SETTINGS_PATH}", self.base_url)
    }

    fn current_endpoint(&self) -> String {
        format!("{}{CURRENT_PATH}", self.base_url)
    }
}

/// Map a non-success status into a `RemoteError`, keeping a bounded slice of the body.
fn check_error(status: reqwest::StatusCode, body: String) -> RemoteError {
    let mut body = body.trim().to_owned();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
        body.push('…');
    }
    RemoteError::Status { status: status.as_u16(), body }
}

/// Read the body of a response, failing on non-2xx.
async fn read_body(resp: reqwest::Response) -> Result<String, RemoteError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(check_error(status, text));
    }
    Ok(text)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))
}

impl RemoteClient for HttpRemoteClient {
    fn name(&self) -> &str {
        &self.base_url
    }

    fn get_settings(&self) -> RemoteFuture<TemperatureBounds> {
        Box::pin(fetch_json(self.get(self.settings_endpoint())))
    }

    fn put_settings(&self, bounds: TemperatureBounds) -> RemoteFuture<Ack> {
        let url = self.settings_endpoint();
        tracing::debug!(%url, min = bounds.min, max = bounds.max, "PUT");
        let request = self.client.put(url).json(&bounds);
        Box::pin(async move {
            let body = send(request).await?;
            Ok(Ack::from_body(&body))
        })
    }

    fn get_current_sample(&self) -> RemoteFuture<RawReading> {
        Box::pin(fetch_json(self.get(self.current_endpoint())))
    }
}

impl HttpRemoteClient {
    fn get(&self, url: String) -> reqwest::RequestBuilder {
        tracing::debug!(%url, "GET");
        self.client.get(url)
    }
}

/// Send a prepared request and return the success body.
async fn send(request: reqwest::RequestBuilder) -> Result<String, RemoteError> {
    let resp = request
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;
    read_body(resp).await
}

async fn fetch_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, RemoteError> {
    let body = send(request).await?;
    decode(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: Option<&str>) -> HttpRemoteClient {
        HttpRemoteClient::with_client(reqwest::Client::new(), base.map(str::to_owned))
    }

    #[test]
    fn default_endpoints() {
        let c = client(None);
        assert_eq!(c.settings_endpoint(), "http://localhost:3000/temperatura/settings");
        assert_eq!(c.current_endpoint(), "http://localhost:3000/temperatura/current");
        assert_eq!(c.name(), "http://localhost:3000");
    }

    #[test]
    fn custom_base_url_trailing_slash() {
        let c = client(Some("http://aquario.lan:8080/"));
        assert_eq!(c.settings_endpoint(), "http://aquario.lan:8080/temperatura/settings");
    }

    #[test]
    fn error_status_keeps_body() {
        let err = check_error(reqwest::StatusCode::BAD_REQUEST, " min above max \n".into());
        assert_eq!(err, RemoteError::Status { status: 400, body: "min above max".into() });
        assert_eq!(err.to_string(), "controller returned 400: min above max");
    }

    #[test]
    fn error_body_is_bounded() {
        let err = check_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "é".repeat(400));
        let RemoteError::Status { body, .. } = err else {
            panic!("expected status error");
        };
        assert!(body.len() <= MAX_ERROR_BODY + '…'.len_utf8());
        assert!(body.ends_with('…'));
    }

    #[test]
    fn decode_failure_is_decode_error() {
        let err = decode::<TemperatureBounds>(r#"{"min": 1}"#).unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[test]
    fn timeout_is_optional() {
        assert!(HttpRemoteClient::new(None, None).is_ok());
        assert!(HttpRemoteClient::new(None, Some(Duration::from_secs(5))).is_ok());
    }
}
