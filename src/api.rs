use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::status::{Incident, LiveCheckResult, ServiceStatus};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Everything that can go wrong talking to the backend. All four taxa
/// get the same treatment upstream (log and keep the previous state),
/// but the distinction matters for the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("backend reported failure")]
    Application,
}

/// Response envelope used by every backend endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
}

/// HTTP client for the status backend.
pub struct StatusApi {
    client: reqwest::Client,
    base: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl StatusApi {
    pub fn new(base: Url, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
            api_key,
            timeout,
        }
    }

    /// `GET /status`: backend-stored services with full trimmed history.
    pub async fn fetch_status(&self) -> Result<Vec<ServiceStatus>> {
        let url = self.endpoint("status")?;
        let request = self.client.get(url);
        self.execute(request).await
    }

    /// `POST /status/check`: asks the backend to probe every service
    /// right now and return the fresh state (no history).
    pub async fn live_check(&self) -> Result<Vec<LiveCheckResult>> {
        let url = self.endpoint("status/check")?;
        let request = self.client.post(url);
        self.execute(request).await
    }

    /// `GET /incidents?action=active`: currently open incidents.
    pub async fn fetch_incidents(&self) -> Result<Vec<Incident>> {
        let url = self.endpoint("incidents")?;
        let request = self.client.get(url).query(&[("action", "active")]);
        self.execute(request).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ApiError::Malformed(format!("bad endpoint url: {e}")))
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let mut request = request
            .header("Content-Type", "application/json")
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| self.wrap(e))?;
        debug!("backend responded {}", response.status());

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout)
            } else {
                ApiError::Malformed(e.to_string())
            }
        })?;

        match envelope {
            Envelope {
                success: true,
                data: Some(data),
            } => Ok(data),
            Envelope {
                success: true,
                data: None,
            } => Err(ApiError::Malformed("payload is missing data".into())),
            Envelope { success: false, .. } => Err(ApiError::Application),
        }
    }

    fn wrap(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Network(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response on an ephemeral port and
    /// returns the base URL to point the client at.
    async fn serve_json(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/api")
    }

    fn api(base: &str, timeout: Duration) -> StatusApi {
        StatusApi::new(Url::parse(base).unwrap(), None, timeout)
    }

    #[test]
    fn test_envelope_decodes_success() {
        let raw = r#"{ "success": true, "data": [1, 2, 3] }"#;
        let envelope: Envelope<Vec<i32>> = serde_json::from_str(raw).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_envelope_rejects_missing_success() {
        let raw = r#"{ "data": [] }"#;
        let decoded: std::result::Result<Envelope<Vec<i32>>, _> = serde_json::from_str(raw);
        assert!(decoded.is_err());
    }

    #[test]
    fn test_endpoint_join_handles_trailing_slash() {
        let api = StatusApi::new(
            Url::parse("https://status.example.com/api/").unwrap(),
            None,
            Duration::from_secs(30),
        );
        let url = api.endpoint("status/check").unwrap();
        assert_eq!(url.as_str(), "https://status.example.com/api/status/check");
    }

    #[tokio::test]
    async fn test_stalled_request_classified_as_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the connection, read the request, never answer.
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(3)).await;
            drop(socket);
        });

        let api = api(&format!("http://{addr}/api"), Duration::from_millis(200));
        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_refused_connection_classified_as_network() {
        // Bind then drop, so the port is known to refuse connections.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let api = api(&format!("http://{addr}/api"), Duration::from_secs(2));
        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_success_false_classified_as_application() {
        let base = serve_json(r#"{"success":false,"data":null}"#).await;
        let api = api(&base, Duration::from_secs(5));
        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Application), "{err:?}");
    }

    #[tokio::test]
    async fn test_success_without_data_classified_as_malformed() {
        let base = serve_json(r#"{"success":true,"data":null}"#).await;
        let api = api(&base, Duration::from_secs(5));
        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_non_json_body_classified_as_malformed() {
        let base = serve_json("status is fine, trust me").await;
        let api = api(&base, Duration::from_secs(5));
        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)), "{err:?}");
    }
}
