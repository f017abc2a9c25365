//! HTTP boundary to the remote image host.
//!
//! The upload loop only sees [`ImageHost`]; the reqwest-backed implementation
//! lives here next to the wire types so tests can swap in a scripted host.

use crate::constants::{DEFAULT_ENDPOINT, REQUEST_TIMEOUT};
use crate::error::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON body accepted by the host.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadPayload {
    pub image: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl UploadPayload {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            image: STANDARD.encode(bytes),
            kind: "base64",
        }
    }
}

/// Raw status and body of a host response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReply {
    pub status: u16,
    pub body: String,
}

impl HostReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure to obtain any reply at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Connection(String),
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(msg) => write!(f, "timeout: {}", msg),
            TransportError::Connection(msg) => write!(f, "connection error: {}", msg),
            TransportError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() || e.is_body() {
            TransportError::Connection(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Issues exactly one request for `payload` authenticated as `client_id`.
    async fn post_image(
        &self,
        payload: &UploadPayload,
        client_id: &str,
    ) -> std::result::Result<HostReply, TransportError>;
}

/// Success envelope returned by the host.
#[derive(Debug, Deserialize)]
pub struct HostResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<HostResponseData>,
}

#[derive(Debug, Deserialize)]
pub struct HostResponseData {
    #[serde(default)]
    pub link: Option<String>,
}

/// Anonymous upload endpoint reached over HTTPS with reqwest.
#[derive(Debug, Clone)]
pub struct HttpImageHost {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpImageHost {
    pub fn new(endpoint: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn post_image(
        &self,
        payload: &UploadPayload,
        client_id: &str,
    ) -> std::result::Result<HostReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Client-ID {}", client_id))
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HostReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload = UploadPayload::from_bytes(b"hello");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["image"], "aGVsbG8=");
        assert_eq!(json["type"], "base64");
    }

    #[test]
    fn test_host_response_parsing() {
        let body = r#"{"success":true,"status":200,"data":{"id":"abc","link":"https://i.imgur.com/abc.png"}}"#;
        let parsed: HostResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.success);
        assert_eq!(
            parsed.data.and_then(|d| d.link).as_deref(),
            Some("https://i.imgur.com/abc.png")
        );
    }

    #[test]
    fn test_host_response_failure_without_data() {
        let parsed: HostResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!parsed.success);
        assert!(parsed.data.is_none());
    }

    #[test]
    fn test_http_image_host_default_endpoint() {
        let host = HttpImageHost::new(None).unwrap();
        assert_eq!(host.endpoint(), "https://api.imgur.com/3/image");

        let host = HttpImageHost::new(Some("http://127.0.0.1:9/upload".to_string())).unwrap();
        assert_eq!(host.endpoint(), "http://127.0.0.1:9/upload");
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Timeout("30s".to_string()).to_string(),
            "timeout: 30s"
        );
        assert_eq!(
            TransportError::Connection("refused".to_string()).to_string(),
            "connection error: refused"
        );
    }
}
